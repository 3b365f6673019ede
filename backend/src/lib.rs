pub mod aarch64;
pub mod code_buffer;
pub mod exec_mem;

pub use aarch64::Aarch64Emitter;
pub use code_buffer::{CodeSink, CodeWriter, SizeCounter};
pub use exec_mem::{
    flush_icache, CodeArena, CodeRegion, CodeSpan, ExecAllocator, ExecMemError, Mapping,
};

use dynarec_core::jump_table::{SLOT_DISPATCH, SLOT_TARGET};
use dynarec_core::{InstructionRecord, JumpTable, X86Op};

/// Which of the two code generation passes is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Count bytes and exit records; nothing is written.
    Size,
    /// Write code into the allocated region.
    Emit,
}

/// Per-unit state threaded through the emitter by both passes.
pub struct EmitState<'a> {
    pub pass: Pass,
    /// Exits return to the caller instead of going through the table.
    pub standalone: bool,
    /// Host address stored in each record's `DISPATCH` slot.
    pub dispatch_addr: u64,
    table: Option<&'a JumpTable>,
    table_next: usize,
}

impl<'a> EmitState<'a> {
    pub fn sizing(standalone: bool, dispatch_addr: u64) -> Self {
        Self {
            pass: Pass::Size,
            standalone,
            dispatch_addr,
            table: None,
            table_next: 0,
        }
    }

    pub fn emitting(standalone: bool, dispatch_addr: u64, table: Option<&'a JumpTable>) -> Self {
        Self {
            pass: Pass::Emit,
            standalone,
            dispatch_addr,
            table,
            table_next: 0,
        }
    }

    /// Exit records claimed so far.
    #[inline]
    pub fn records_used(&self) -> usize {
        self.table_next
    }

    /// Claim the next exit record for a transfer to `target`.
    ///
    /// Returns the host address of the record, or 0 while sizing (the
    /// emitted sequence has the same length either way). The table is
    /// only filled in the emission pass.
    pub fn alloc_record(&mut self, target: u64) -> u64 {
        let idx = self.table_next;
        self.table_next += 1;
        if self.pass == Pass::Size {
            return 0;
        }
        match self.table {
            Some(table) if idx < table.records() => {
                table.set(idx, SLOT_DISPATCH, self.dispatch_addr);
                table.set(idx, SLOT_TARGET, target);
                table.record_addr(idx)
            }
            _ => {
                tracing::warn!("exit record {idx} for {target:#x} has no table slot");
                0
            }
        }
    }
}

/// Host code generator for decoded x86 instructions.
///
/// The pipeline drives an emitter twice with identical inputs, once into
/// a [`SizeCounter`] and once into a [`CodeWriter`]. Implementations
/// must produce the same byte count in both passes; `host.offset` of
/// every instruction is already known from the size pass when emitting,
/// so forward branches can be encoded directly.
pub trait HostEmitter: Send + Sync {
    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether `op` can be lowered. Discovery stops in front of the
    /// first unsupported instruction.
    fn supports(&self, op: &X86Op) -> bool;

    /// Emit code for `insns[ninst]`, honouring its `need_flags`.
    fn emit_insn(
        &self,
        sink: &mut dyn CodeSink,
        st: &mut EmitState<'_>,
        insns: &[InstructionRecord],
        ninst: usize,
    );

    /// Emit an exit that leaves the unit for x86 address `target`.
    fn emit_exit(&self, sink: &mut dyn CodeSink, st: &mut EmitState<'_>, target: u64);
}
