//! Guest CPU state block shared by emitted code and the emulation core.

use std::mem::offset_of;

use crate::flags::{EFLAGS_AF, EFLAGS_CF, EFLAGS_OF, EFLAGS_PF, EFLAGS_SF, EFLAGS_ZF};
use crate::insn::Gpr;

/// Operation recorded in the deferred-flags block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum DeferredOp {
    #[default]
    None = 0,
    Add = 1,
    Sub = 2,
    And = 3,
    Or = 4,
    Xor = 5,
    Inc = 6,
    Dec = 7,
}

impl DeferredOp {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => DeferredOp::None,
            1 => DeferredOp::Add,
            2 => DeferredOp::Sub,
            3 => DeferredOp::And,
            4 => DeferredOp::Or,
            5 => DeferredOp::Xor,
            6 => DeferredOp::Inc,
            7 => DeferredOp::Dec,
            _ => return None,
        })
    }
}

/// Operands and result of the last flag-setting operation whose flags
/// were not fully materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct DeferredFlags {
    pub kind: u32,
    pub op1: u32,
    pub op2: u32,
    pub res: u32,
}

/// 32-bit x86 register file as seen by translated code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[repr(C)]
pub struct X86State {
    pub regs: [u32; 8],
    pub eip: u32,
    pub eflags: u32,
    pub deferred: DeferredFlags,
}

pub const EIP_OFFSET: usize = offset_of!(X86State, eip);
pub const EFLAGS_OFFSET: usize = offset_of!(X86State, eflags);
pub const DEFERRED_KIND_OFFSET: usize =
    offset_of!(X86State, deferred) + offset_of!(DeferredFlags, kind);
pub const DEFERRED_OP1_OFFSET: usize =
    offset_of!(X86State, deferred) + offset_of!(DeferredFlags, op1);
pub const DEFERRED_OP2_OFFSET: usize =
    offset_of!(X86State, deferred) + offset_of!(DeferredFlags, op2);
pub const DEFERRED_RES_OFFSET: usize =
    offset_of!(X86State, deferred) + offset_of!(DeferredFlags, res);

/// Byte offset of a GPR within [`X86State`].
#[inline]
pub const fn gpr_offset(reg: Gpr) -> usize {
    offset_of!(X86State, regs) + reg.index() * 4
}

impl X86State {
    pub fn new() -> Self {
        Self {
            eflags: 0x2, // bit 1 always set
            ..Self::default()
        }
    }

    #[inline]
    pub fn reg(&self, r: Gpr) -> u32 {
        self.regs[r.index()]
    }

    #[inline]
    pub fn set_reg(&mut self, r: Gpr, val: u32) {
        self.regs[r.index()] = val;
    }

    /// Fold pending deferred flags into `eflags`.
    pub fn settle_flags(&mut self) {
        self.eflags = resolve_deferred(&self.deferred, self.eflags);
        self.deferred.kind = DeferredOp::None as u32;
    }
}

/// Recompute CF/PF/AF/ZF/SF/OF from a deferred record.
///
/// Flags the recorded operation does not write keep their value from
/// `eflags`.
pub fn resolve_deferred(df: &DeferredFlags, eflags: u32) -> u32 {
    let Some(kind) = DeferredOp::from_raw(df.kind) else {
        return eflags;
    };
    let (op1, op2, res) = (df.op1, df.op2, df.res);
    let (cf, af, of) = match kind {
        DeferredOp::None => return eflags,
        DeferredOp::Add => (
            Some(res < op1),
            (op1 ^ op2 ^ res) & 0x10 != 0,
            ((op1 ^ res) & (op2 ^ res)) >> 31 != 0,
        ),
        DeferredOp::Sub => (
            Some(op1 < op2),
            (op1 ^ op2 ^ res) & 0x10 != 0,
            ((op1 ^ op2) & (op1 ^ res)) >> 31 != 0,
        ),
        DeferredOp::Inc => (
            None,
            (op1 ^ 1 ^ res) & 0x10 != 0,
            res == 0x8000_0000,
        ),
        DeferredOp::Dec => (
            None,
            (op1 ^ 1 ^ res) & 0x10 != 0,
            res == 0x7fff_ffff,
        ),
        DeferredOp::And | DeferredOp::Or | DeferredOp::Xor => (Some(false), false, false),
    };

    let mut out = eflags & !(EFLAGS_PF | EFLAGS_AF | EFLAGS_ZF | EFLAGS_SF | EFLAGS_OF);
    if let Some(cf) = cf {
        out &= !EFLAGS_CF;
        if cf {
            out |= EFLAGS_CF;
        }
    }
    if (res as u8).count_ones() % 2 == 0 {
        out |= EFLAGS_PF;
    }
    if af {
        out |= EFLAGS_AF;
    }
    if res == 0 {
        out |= EFLAGS_ZF;
    }
    if res >> 31 != 0 {
        out |= EFLAGS_SF;
    }
    if of {
        out |= EFLAGS_OF;
    }
    out
}
