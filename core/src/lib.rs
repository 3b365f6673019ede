//! Shared data model for the x86 block translator: flag sets,
//! instruction records, the guest CPU block and jump-table layout.

pub mod cpu;
pub mod flags;
pub mod insn;
pub mod jump_table;

pub use cpu::{resolve_deferred, DeferredFlags, DeferredOp, X86State};
pub use flags::{FlagSet, FlagWriteMode};
pub use insn::{
    AluOp, Cond, Flow, Gpr, HostInfo, InstructionRecord, JumpTarget, Operand, X86Insn, X86Op,
    MAX_INSN_LEN,
};
pub use jump_table::{x31_hash, JumpTable, JMP_TABLE_STRIDE};
