use crate::flags::{FlagSet, FlagWriteMode};

/// Longest legal x86 instruction.
pub const MAX_INSN_LEN: usize = 15;

/// 32-bit general-purpose registers, in ModR/M numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gpr {
    Eax = 0,
    Ecx = 1,
    Edx = 2,
    Ebx = 3,
    Esp = 4,
    Ebp = 5,
    Esi = 6,
    Edi = 7,
}

impl Gpr {
    pub const ALL: [Gpr; 8] = [
        Gpr::Eax,
        Gpr::Ecx,
        Gpr::Edx,
        Gpr::Ebx,
        Gpr::Esp,
        Gpr::Ebp,
        Gpr::Esi,
        Gpr::Edi,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Source operand of a register-form operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(Gpr),
    Imm(u32),
}

/// Two-operand integer ALU operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    /// `sub` without writeback.
    Cmp,
    /// `and` without writeback.
    Test,
}

impl AluOp {
    /// Whether the result is written back to the destination.
    #[inline]
    pub fn writes_back(self) -> bool {
        !matches!(self, AluOp::Cmp | AluOp::Test)
    }

    /// Whether the operation is a subtraction for flag purposes.
    #[inline]
    pub fn is_sub(self) -> bool {
        matches!(self, AluOp::Sub | AluOp::Cmp)
    }

    /// Whether the operation is bitwise (CF and OF forced to zero).
    #[inline]
    pub fn is_logic(self) -> bool {
        matches!(self, AluOp::And | AluOp::Or | AluOp::Xor | AluOp::Test)
    }
}

/// x86 condition codes, numbered as in the `Jcc` opcode low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cond {
    O = 0x0,
    No = 0x1,
    B = 0x2,
    Ae = 0x3,
    E = 0x4,
    Ne = 0x5,
    Be = 0x6,
    A = 0x7,
    S = 0x8,
    Ns = 0x9,
    P = 0xa,
    Np = 0xb,
    L = 0xc,
    Ge = 0xd,
    Le = 0xe,
    G = 0xf,
}

impl Cond {
    /// Flags the condition reads.
    pub fn flags(self) -> FlagSet {
        match self {
            Cond::O | Cond::No => FlagSet::OF,
            Cond::B | Cond::Ae => FlagSet::CF,
            Cond::E | Cond::Ne => FlagSet::ZF,
            Cond::Be | Cond::A => FlagSet::CF | FlagSet::ZF,
            Cond::S | Cond::Ns => FlagSet::SF,
            Cond::P | Cond::Np => FlagSet::PF,
            Cond::L | Cond::Ge => FlagSet::SF | FlagSet::OF,
            Cond::Le | Cond::G => FlagSet::ZF | FlagSet::SF | FlagSet::OF,
        }
    }

    /// Whether this is the negated form of its pair (odd encoding).
    #[inline]
    pub fn is_negated(self) -> bool {
        (self as u8) & 1 != 0
    }
}

/// Lowering-oriented shape of a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum X86Op {
    /// Any padding encoding, including the `lea reg,[reg+0]` idioms.
    Nop,
    Mov { dst: Gpr, src: Operand },
    Alu { op: AluOp, dst: Gpr, src: Operand },
    IncDec { dst: Gpr, inc: bool },
    Jmp,
    Jcc(Cond),
    /// Decoded, but without a lowering-oriented shape.
    Other,
}

/// Control-flow class of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Falls through to the next instruction.
    #[default]
    Next,
    /// Unconditional direct jump.
    Jump,
    /// Conditional direct jump; falls through when not taken.
    CondJump,
    /// Leaves the unit through a transfer with no direct in-unit
    /// destination (call, return, indirect branch, interrupt).
    Exit,
}

impl Flow {
    /// Whether execution never continues with the next instruction.
    #[inline]
    pub fn ends_block(self) -> bool {
        matches!(self, Flow::Jump | Flow::Exit)
    }
}

/// Resolved destination of a jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JumpTarget {
    /// Not a jump.
    #[default]
    None,
    /// Leaves the unit.
    External,
    /// Index of the destination instruction within the unit.
    Internal(usize),
}

/// Per-instruction x86 metadata filled by the decoder and the
/// analysis passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X86Insn {
    pub addr: u64,
    pub size: u8,
    /// Raw encoding; only the first `size` bytes are meaningful.
    pub bytes: [u8; MAX_INSN_LEN],
    pub flags_read: FlagSet,
    pub flags_written: FlagSet,
    pub write_mode: FlagWriteMode,
    pub flow: Flow,
    /// Direct destination, when the instruction has one.
    pub jump_dest: Option<u64>,
    pub jump_target: JumpTarget,
    /// Flags that must be valid after this instruction; `None` until
    /// the liveness pass reaches it.
    pub need_flags: Option<FlagSet>,
    /// Some jump in the unit lands here.
    pub barrier: bool,
    pub op: X86Op,
}

impl X86Insn {
    /// A record for `size` bytes at `addr` with no flag or flow effect.
    pub fn new(addr: u64, bytes: &[u8], op: X86Op) -> Self {
        let size = bytes.len().min(MAX_INSN_LEN);
        let mut raw = [0u8; MAX_INSN_LEN];
        raw[..size].copy_from_slice(&bytes[..size]);
        Self {
            addr,
            size: size as u8,
            bytes: raw,
            flags_read: FlagSet::empty(),
            flags_written: FlagSet::empty(),
            write_mode: FlagWriteMode::Never,
            flow: Flow::Next,
            jump_dest: None,
            jump_target: JumpTarget::None,
            need_flags: None,
            barrier: false,
            op,
        }
    }

    #[inline]
    pub fn raw(&self) -> &[u8] {
        &self.bytes[..self.size as usize]
    }

    /// Address of the following instruction.
    #[inline]
    pub fn next_addr(&self) -> u64 {
        self.addr + self.size as u64
    }

    #[inline]
    pub fn is_jump(&self) -> bool {
        self.flow != Flow::Next
    }

    #[inline]
    pub fn is_conditional(&self) -> bool {
        self.flow == Flow::CondJump
    }

    /// Computed flag need, or every flag when not yet known.
    #[inline]
    pub fn need(&self) -> FlagSet {
        self.need_flags.unwrap_or(FlagSet::ALL)
    }

    /// Neither reads nor writes flags, and does not transfer control.
    #[inline]
    pub fn is_flag_neutral(&self) -> bool {
        self.flags_read.is_empty() && self.flags_written.is_empty() && !self.is_jump()
    }
}

/// Host-side placement of one instruction, measured by the size pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostInfo {
    pub offset: usize,
    pub size: usize,
}

/// One instruction slot of a translation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionRecord {
    pub x86: X86Insn,
    pub host: HostInfo,
}

impl InstructionRecord {
    pub fn new(x86: X86Insn) -> Self {
        Self {
            x86,
            host: HostInfo::default(),
        }
    }
}
