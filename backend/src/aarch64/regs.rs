/// AArch64 general-purpose register indices used by the emitter.
///
/// Register 31 encodes `wzr`/`xzr` in data-processing instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reg {
    X0 = 0,
    X1 = 1,
    X9 = 9,
    X10 = 10,
    X11 = 11,
    X12 = 12,
    X13 = 13,
    X16 = 16,
    Xzr = 31,
}

impl Reg {
    #[inline]
    pub const fn enc(self) -> u32 {
        self as u32
    }
}

/// Pointer to the guest `X86State`, live for the whole unit.
pub const ENV: Reg = Reg::X0;

/// Jump-table record of the exit being taken; read by the dispatcher.
pub const RECORD: Reg = Reg::X1;

// Scratch assignment. All are caller-saved temporaries in AAPCS64, so
// emitted code needs no prologue.

/// x86 destination operand.
pub const DST: Reg = Reg::X9;
/// x86 source operand.
pub const SRC: Reg = Reg::X10;
/// Operation result.
pub const RES: Reg = Reg::X11;
/// Flag extraction temporary.
pub const TMP: Reg = Reg::X12;
/// Working copy of the guest EFLAGS.
pub const FLAGS: Reg = Reg::X13;
/// Indirect branch register for exits (IP0).
pub const BRANCH: Reg = Reg::X16;
