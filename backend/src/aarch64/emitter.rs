//! AArch64 instruction encoders.
//!
//! Every function appends exactly one instruction word, except the
//! `emit_mov_imm*` helpers which always use a fixed-length sequence.
//! Branch displacements are in instructions, relative to the branch.

use crate::aarch64::regs::Reg;
use crate::code_buffer::CodeSink;

// -- Opcode constants (32-bit forms unless suffixed _X) --

// Load/store, unsigned scaled offset
pub const OPC_LDR_W: u32 = 0xB940_0000;
pub const OPC_STR_W: u32 = 0xB900_0000;
pub const OPC_LDR_X: u32 = 0xF940_0000;

// Move wide
pub const OPC_MOVZ_W: u32 = 0x5280_0000;
pub const OPC_MOVK_W: u32 = 0x7280_0000;
pub const OPC_MOVZ_X: u32 = 0xD280_0000;
pub const OPC_MOVK_X: u32 = 0xF280_0000;

// Add/sub, immediate
pub const OPC_SUBS_IMM_W: u32 = 0x7100_0000;

// Bitfield
pub const OPC_BFM_W: u32 = 0x3300_0000;
pub const OPC_UBFM_W: u32 = 0x5300_0000;

// Conditional select
pub const OPC_CSINC_W: u32 = 0x1A80_0400;

// Branches
pub const OPC_B: u32 = 0x1400_0000;
pub const OPC_CBZ_X: u32 = 0xB400_0000;
pub const OPC_TBZ: u32 = 0x3600_0000;
pub const OPC_TBNZ: u32 = 0x3700_0000;
pub const OPC_BR: u32 = 0xD61F_0000;
pub const OPC_RET: u32 = 0xD65F_03C0;

/// Data-processing (shifted register) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpOp {
    Add,
    Adds,
    Sub,
    Subs,
    And,
    Orr,
    Eor,
    Ands,
}

impl DpOp {
    #[inline]
    const fn opcode(self) -> u32 {
        match self {
            DpOp::Add => 0x0B00_0000,
            DpOp::Adds => 0x2B00_0000,
            DpOp::Sub => 0x4B00_0000,
            DpOp::Subs => 0x6B00_0000,
            DpOp::And => 0x0A00_0000,
            DpOp::Orr => 0x2A00_0000,
            DpOp::Eor => 0x4A00_0000,
            DpOp::Ands => 0x6A00_0000,
        }
    }
}

/// Shift applied to the second register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Shift {
    Lsl = 0,
    Lsr = 1,
    Asr = 2,
}

/// AArch64 condition codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArmCond {
    Eq = 0x0,
    Ne = 0x1,
    Cs = 0x2,
    Cc = 0x3,
    Mi = 0x4,
    Pl = 0x5,
    Vs = 0x6,
    Vc = 0x7,
    Hi = 0x8,
    Ls = 0x9,
    Ge = 0xA,
    Lt = 0xB,
    Gt = 0xC,
    Le = 0xD,
}

// -- Load/store --

/// `ldr wt, [xn, #offset]`
pub fn emit_ldr_w(sink: &mut dyn CodeSink, rt: Reg, rn: Reg, offset: usize) {
    assert!(offset % 4 == 0 && offset / 4 < 4096, "ldr w offset {offset}");
    sink.emit_u32(OPC_LDR_W | ((offset / 4) as u32) << 10 | rn.enc() << 5 | rt.enc());
}

/// `str wt, [xn, #offset]`
pub fn emit_str_w(sink: &mut dyn CodeSink, rt: Reg, rn: Reg, offset: usize) {
    assert!(offset % 4 == 0 && offset / 4 < 4096, "str w offset {offset}");
    sink.emit_u32(OPC_STR_W | ((offset / 4) as u32) << 10 | rn.enc() << 5 | rt.enc());
}

/// `ldr xt, [xn, #offset]`
pub fn emit_ldr_x(sink: &mut dyn CodeSink, rt: Reg, rn: Reg, offset: usize) {
    assert!(offset % 8 == 0 && offset / 8 < 4096, "ldr x offset {offset}");
    sink.emit_u32(OPC_LDR_X | ((offset / 8) as u32) << 10 | rn.enc() << 5 | rt.enc());
}

// -- Move wide --

fn move_wide(opc: u32, rd: Reg, imm16: u16, hw: u32) -> u32 {
    opc | hw << 21 | (imm16 as u32) << 5 | rd.enc()
}

pub fn emit_movz_w(sink: &mut dyn CodeSink, rd: Reg, imm16: u16, hw: u32) {
    debug_assert!(hw < 2);
    sink.emit_u32(move_wide(OPC_MOVZ_W, rd, imm16, hw));
}

pub fn emit_movk_w(sink: &mut dyn CodeSink, rd: Reg, imm16: u16, hw: u32) {
    debug_assert!(hw < 2);
    sink.emit_u32(move_wide(OPC_MOVK_W, rd, imm16, hw));
}

pub fn emit_movz_x(sink: &mut dyn CodeSink, rd: Reg, imm16: u16, hw: u32) {
    debug_assert!(hw < 4);
    sink.emit_u32(move_wide(OPC_MOVZ_X, rd, imm16, hw));
}

pub fn emit_movk_x(sink: &mut dyn CodeSink, rd: Reg, imm16: u16, hw: u32) {
    debug_assert!(hw < 4);
    sink.emit_u32(move_wide(OPC_MOVK_X, rd, imm16, hw));
}

/// Load a 32-bit constant. Always two instructions, so sizes do not
/// depend on the value.
pub fn emit_mov_imm32(sink: &mut dyn CodeSink, rd: Reg, val: u32) {
    emit_movz_w(sink, rd, val as u16, 0);
    emit_movk_w(sink, rd, (val >> 16) as u16, 1);
}

/// Load a 64-bit constant. Always four instructions.
pub fn emit_mov_imm64(sink: &mut dyn CodeSink, rd: Reg, val: u64) {
    emit_movz_x(sink, rd, val as u16, 0);
    for hw in 1..4 {
        emit_movk_x(sink, rd, (val >> (16 * hw)) as u16, hw);
    }
}

// -- Data processing --

/// `<op> wd, wn, wm, <shift> #amount`
pub fn emit_dp_reg(
    sink: &mut dyn CodeSink,
    op: DpOp,
    rd: Reg,
    rn: Reg,
    rm: Reg,
    shift: Shift,
    amount: u32,
) {
    assert!(amount < 32);
    sink.emit_u32(
        op.opcode()
            | (shift as u32) << 22
            | rm.enc() << 16
            | amount << 10
            | rn.enc() << 5
            | rd.enc(),
    );
}

/// `<op> wd, wn, wm`
#[inline]
pub fn emit_dp(sink: &mut dyn CodeSink, op: DpOp, rd: Reg, rn: Reg, rm: Reg) {
    emit_dp_reg(sink, op, rd, rn, rm, Shift::Lsl, 0);
}

/// `cmp wn, #imm12`
pub fn emit_cmp_imm_w(sink: &mut dyn CodeSink, rn: Reg, imm12: u32) {
    assert!(imm12 < 4096);
    sink.emit_u32(OPC_SUBS_IMM_W | imm12 << 10 | rn.enc() << 5 | Reg::Xzr.enc());
}

/// `cset wd, cond` (alias of `csinc wd, wzr, wzr, !cond`)
pub fn emit_cset_w(sink: &mut dyn CodeSink, rd: Reg, cond: ArmCond) {
    let inv = (cond as u32) ^ 1;
    sink.emit_u32(OPC_CSINC_W | Reg::Xzr.enc() << 16 | inv << 12 | Reg::Xzr.enc() << 5 | rd.enc());
}

/// `bfi wd, wn, #lsb, #width`
pub fn emit_bfi_w(sink: &mut dyn CodeSink, rd: Reg, rn: Reg, lsb: u32, width: u32) {
    assert!(lsb < 32 && width >= 1 && lsb + width <= 32);
    let immr = (32 - lsb) % 32;
    let imms = width - 1;
    sink.emit_u32(OPC_BFM_W | immr << 16 | imms << 10 | rn.enc() << 5 | rd.enc());
}

/// `lsr wd, wn, #sh` (alias of `ubfm wd, wn, #sh, #31`)
pub fn emit_lsr_imm_w(sink: &mut dyn CodeSink, rd: Reg, rn: Reg, sh: u32) {
    assert!(sh < 32);
    sink.emit_u32(OPC_UBFM_W | sh << 16 | 31 << 10 | rn.enc() << 5 | rd.enc());
}

// -- Branches --

fn check_disp(words: i32, bits: u32) {
    let lim = 1i32 << (bits - 1);
    assert!(
        (-lim..lim).contains(&words),
        "branch displacement {words} out of {bits}-bit range"
    );
}

/// `b #words`
pub fn emit_b(sink: &mut dyn CodeSink, words: i32) {
    check_disp(words, 26);
    sink.emit_u32(OPC_B | (words as u32 & 0x03FF_FFFF));
}

/// `cbz xt, #words`
pub fn emit_cbz_x(sink: &mut dyn CodeSink, rt: Reg, words: i32) {
    check_disp(words, 19);
    sink.emit_u32(OPC_CBZ_X | (words as u32 & 0x7_FFFF) << 5 | rt.enc());
}

fn test_branch(opc: u32, rt: Reg, bit: u32, words: i32) -> u32 {
    assert!(bit < 64);
    check_disp(words, 14);
    opc | (bit >> 5) << 31 | (bit & 0x1f) << 19 | (words as u32 & 0x3FFF) << 5 | rt.enc()
}

/// `tbz rt, #bit, #words`
pub fn emit_tbz(sink: &mut dyn CodeSink, rt: Reg, bit: u32, words: i32) {
    sink.emit_u32(test_branch(OPC_TBZ, rt, bit, words));
}

/// `tbnz rt, #bit, #words`
pub fn emit_tbnz(sink: &mut dyn CodeSink, rt: Reg, bit: u32, words: i32) {
    sink.emit_u32(test_branch(OPC_TBNZ, rt, bit, words));
}

/// `br xn`
pub fn emit_br(sink: &mut dyn CodeSink, rn: Reg) {
    sink.emit_u32(OPC_BR | rn.enc() << 5);
}

pub fn emit_ret(sink: &mut dyn CodeSink) {
    sink.emit_u32(OPC_RET);
}
