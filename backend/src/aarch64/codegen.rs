use dynarec_core::cpu::{
    gpr_offset, DeferredOp, DEFERRED_KIND_OFFSET, DEFERRED_OP1_OFFSET, DEFERRED_OP2_OFFSET,
    DEFERRED_RES_OFFSET, EFLAGS_OFFSET, EIP_OFFSET,
};
use dynarec_core::jump_table::{SLOT_DISPATCH, SLOT_LINK};
use dynarec_core::{
    AluOp, Cond, FlagSet, Gpr, InstructionRecord, JumpTarget, Operand, X86Insn, X86Op,
};

use crate::aarch64::emitter::*;
use crate::aarch64::regs::{Reg, BRANCH, DST, ENV, FLAGS, RECORD, RES, SRC, TMP};
use crate::code_buffer::CodeSink;
use crate::{EmitState, HostEmitter};

/// Words in an exit that returns to the caller.
pub const STANDALONE_EXIT_WORDS: usize = 4;
/// Words in an exit that goes through a jump-table record.
pub const LINKED_EXIT_WORDS: usize = 12;

// EFLAGS bit positions as used by the flag extraction sequences.
const CF_BIT: u32 = 0;
const PF_BIT: u32 = 2;
const ZF_BIT: u32 = 6;
const SF_BIT: u32 = 7;
const OF_BIT: u32 = 11;

/// Flags the emitter writes straight into `eflags`. The rest only
/// travel in the deferred record.
const DIRECT_FLAGS: FlagSet = FlagSet::CF
    .union(FlagSet::ZF)
    .union(FlagSet::SF)
    .union(FlagSet::OF);

/// How CF and OF come out of the host flags after the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagSource {
    Add,
    Sub,
    /// Bitwise: CF and OF are cleared.
    Logic,
}

/// Reference lowering of a register-only 32-bit subset to AArch64.
///
/// Guest registers live in the `X86State` block pointed to by `x0`;
/// each instruction loads its operands, computes, and stores back.
/// Only the flags in the instruction's need set are produced.
#[derive(Debug, Default, Clone, Copy)]
pub struct Aarch64Emitter;

impl Aarch64Emitter {
    pub fn new() -> Self {
        Self
    }

    /// Length of one exit sequence in bytes.
    pub fn exit_size(standalone: bool) -> usize {
        4 * if standalone {
            STANDALONE_EXIT_WORDS
        } else {
            LINKED_EXIT_WORDS
        }
    }

    fn load_operand(sink: &mut dyn CodeSink, rd: Reg, src: Operand) {
        match src {
            Operand::Reg(r) => emit_ldr_w(sink, rd, ENV, gpr_offset(r)),
            Operand::Imm(v) => emit_mov_imm32(sink, rd, v),
        }
    }

    /// Flags of `insn` that must land in `eflags`. Flags escaping the
    /// unit are stored in full; the code they reach reads `eflags`
    /// directly.
    fn live_flags(insn: &X86Insn) -> FlagSet {
        let need = insn.need();
        let wanted = if need.contains(FlagSet::PEND) {
            FlagSet::ALL
        } else {
            need
        };
        wanted & insn.flags_written & DIRECT_FLAGS
    }

    fn emit_alu(
        sink: &mut dyn CodeSink,
        insn: &X86Insn,
        op: AluOp,
        dst: Gpr,
        src: Operand,
    ) {
        let live = Self::live_flags(insn);
        let carry = live.intersects(FlagSet::CF | FlagSet::OF);

        emit_ldr_w(sink, DST, ENV, gpr_offset(dst));
        Self::load_operand(sink, SRC, src);

        let (dp, source, kind) = match op {
            AluOp::Add => (
                if carry { DpOp::Adds } else { DpOp::Add },
                FlagSource::Add,
                DeferredOp::Add,
            ),
            AluOp::Sub | AluOp::Cmp => (
                if carry { DpOp::Subs } else { DpOp::Sub },
                FlagSource::Sub,
                DeferredOp::Sub,
            ),
            AluOp::And | AluOp::Test => (DpOp::And, FlagSource::Logic, DeferredOp::And),
            AluOp::Or => (DpOp::Orr, FlagSource::Logic, DeferredOp::Or),
            AluOp::Xor => (DpOp::Eor, FlagSource::Logic, DeferredOp::Xor),
        };
        emit_dp(sink, dp, RES, DST, SRC);

        if op.writes_back() {
            emit_str_w(sink, RES, ENV, gpr_offset(dst));
        }
        Self::finish_flags(sink, insn, live, source, kind);
    }

    fn emit_incdec(sink: &mut dyn CodeSink, insn: &X86Insn, dst: Gpr, inc: bool) {
        let live = Self::live_flags(insn);
        let carry = live.contains(FlagSet::OF);

        emit_ldr_w(sink, DST, ENV, gpr_offset(dst));
        emit_movz_w(sink, SRC, 1, 0);
        let (dp, source, kind) = match (inc, carry) {
            (true, true) => (DpOp::Adds, FlagSource::Add, DeferredOp::Inc),
            (true, false) => (DpOp::Add, FlagSource::Add, DeferredOp::Inc),
            (false, true) => (DpOp::Subs, FlagSource::Sub, DeferredOp::Dec),
            (false, false) => (DpOp::Sub, FlagSource::Sub, DeferredOp::Dec),
        };
        emit_dp(sink, dp, RES, DST, SRC);
        emit_str_w(sink, RES, ENV, gpr_offset(dst));
        Self::finish_flags(sink, insn, live, source, kind);
    }

    /// Materialize `live` into `eflags`, then record or clear the
    /// deferred state.
    fn finish_flags(
        sink: &mut dyn CodeSink,
        insn: &X86Insn,
        live: FlagSet,
        source: FlagSource,
        kind: DeferredOp,
    ) {
        Self::store_flags(sink, live, source);

        let defer = !insn.flags_written.is_empty()
            && insn
                .need()
                .intersects(FlagSet::PEND | FlagSet::PF | FlagSet::AF);
        if defer {
            emit_movz_w(sink, TMP, kind as u16, 0);
            emit_str_w(sink, TMP, ENV, DEFERRED_KIND_OFFSET);
            emit_str_w(sink, DST, ENV, DEFERRED_OP1_OFFSET);
            emit_str_w(sink, SRC, ENV, DEFERRED_OP2_OFFSET);
            emit_str_w(sink, RES, ENV, DEFERRED_RES_OFFSET);
        } else if !live.is_empty() {
            // An older record must not override what was just stored.
            emit_str_w(sink, Reg::Xzr, ENV, DEFERRED_KIND_OFFSET);
        }
    }

    fn store_flags(sink: &mut dyn CodeSink, live: FlagSet, source: FlagSource) {
        if live.is_empty() {
            return;
        }
        emit_ldr_w(sink, FLAGS, ENV, EFLAGS_OFFSET);

        // CF and OF come from NZCV, so they go before the cmp below.
        if live.contains(FlagSet::CF) {
            match source {
                FlagSource::Add => emit_cset_w(sink, TMP, ArmCond::Cs),
                FlagSource::Sub => emit_cset_w(sink, TMP, ArmCond::Cc),
                FlagSource::Logic => {}
            }
            let from = if source == FlagSource::Logic { Reg::Xzr } else { TMP };
            emit_bfi_w(sink, FLAGS, from, CF_BIT, 1);
        }
        if live.contains(FlagSet::OF) {
            if source != FlagSource::Logic {
                emit_cset_w(sink, TMP, ArmCond::Vs);
            }
            let from = if source == FlagSource::Logic { Reg::Xzr } else { TMP };
            emit_bfi_w(sink, FLAGS, from, OF_BIT, 1);
        }
        if live.contains(FlagSet::ZF) {
            emit_cmp_imm_w(sink, RES, 0);
            emit_cset_w(sink, TMP, ArmCond::Eq);
            emit_bfi_w(sink, FLAGS, TMP, ZF_BIT, 1);
        }
        if live.contains(FlagSet::SF) {
            emit_lsr_imm_w(sink, TMP, RES, 31);
            emit_bfi_w(sink, FLAGS, TMP, SF_BIT, 1);
        }

        emit_str_w(sink, FLAGS, ENV, EFLAGS_OFFSET);
    }

    /// Compute the non-negated form of `cond` into a single bit.
    ///
    /// Returns the register and bit that are 1 when the even member of
    /// the condition pair holds.
    fn emit_cond_test(sink: &mut dyn CodeSink, cond: Cond) -> (Reg, u32) {
        emit_ldr_w(sink, FLAGS, ENV, EFLAGS_OFFSET);
        match cond {
            Cond::O | Cond::No => (FLAGS, OF_BIT),
            Cond::B | Cond::Ae => (FLAGS, CF_BIT),
            Cond::E | Cond::Ne => (FLAGS, ZF_BIT),
            Cond::S | Cond::Ns => (FLAGS, SF_BIT),
            Cond::P | Cond::Np => (FLAGS, PF_BIT),
            Cond::Be | Cond::A => {
                // CF | ZF
                emit_lsr_imm_w(sink, TMP, FLAGS, ZF_BIT);
                emit_dp(sink, DpOp::Orr, TMP, TMP, FLAGS);
                (TMP, 0)
            }
            Cond::L | Cond::Ge => {
                // SF ^ OF
                emit_dp_reg(sink, DpOp::Eor, TMP, FLAGS, FLAGS, Shift::Lsr, OF_BIT - SF_BIT);
                (TMP, SF_BIT)
            }
            Cond::Le | Cond::G => {
                // (SF ^ OF) | ZF
                emit_dp_reg(sink, DpOp::Eor, TMP, FLAGS, FLAGS, Shift::Lsr, OF_BIT - SF_BIT);
                emit_dp_reg(sink, DpOp::Orr, TMP, TMP, FLAGS, Shift::Lsl, SF_BIT - ZF_BIT);
                (TMP, SF_BIT)
            }
        }
    }

    /// Branch to an instruction of this unit.
    fn emit_internal_branch(sink: &mut dyn CodeSink, insns: &[InstructionRecord], target: usize) {
        let disp = insns[target].host.offset as i64 - sink.offset() as i64;
        emit_b(sink, (disp / 4) as i32);
    }
}

impl HostEmitter for Aarch64Emitter {
    fn name(&self) -> &'static str {
        "aarch64"
    }

    fn supports(&self, op: &X86Op) -> bool {
        match op {
            X86Op::Nop
            | X86Op::Mov { .. }
            | X86Op::Alu { .. }
            | X86Op::IncDec { .. }
            | X86Op::Jmp => true,
            // PF is never materialized in eflags.
            X86Op::Jcc(cond) => !matches!(cond, Cond::P | Cond::Np),
            X86Op::Other => false,
        }
    }

    fn emit_insn(
        &self,
        sink: &mut dyn CodeSink,
        st: &mut EmitState<'_>,
        insns: &[InstructionRecord],
        ninst: usize,
    ) {
        let insn = &insns[ninst].x86;
        match insn.op {
            X86Op::Nop | X86Op::Other => {}
            X86Op::Mov { dst, src } => {
                Self::load_operand(sink, DST, src);
                emit_str_w(sink, DST, ENV, gpr_offset(dst));
            }
            X86Op::Alu { op, dst, src } => Self::emit_alu(sink, insn, op, dst, src),
            X86Op::IncDec { dst, inc } => Self::emit_incdec(sink, insn, dst, inc),
            X86Op::Jmp => match insn.jump_target {
                JumpTarget::Internal(t) => Self::emit_internal_branch(sink, insns, t),
                _ => {
                    let dest = insn.jump_dest.unwrap_or_else(|| insn.next_addr());
                    self.emit_exit(sink, st, dest);
                }
            },
            X86Op::Jcc(cond) => {
                let (reg, bit) = Self::emit_cond_test(sink, cond);
                let internal = match insn.jump_target {
                    JumpTarget::Internal(t) => Some(t),
                    _ => None,
                };
                // Skip over the taken path when the condition fails.
                let skip = match internal {
                    Some(_) => 2,
                    None => 1 + (Self::exit_size(st.standalone) / 4) as i32,
                };
                if cond.is_negated() {
                    emit_tbnz(sink, reg, bit, skip);
                } else {
                    emit_tbz(sink, reg, bit, skip);
                }
                match internal {
                    Some(t) => Self::emit_internal_branch(sink, insns, t),
                    None => {
                        let dest = insn.jump_dest.unwrap_or_else(|| insn.next_addr());
                        self.emit_exit(sink, st, dest);
                    }
                }
            }
        }
    }

    fn emit_exit(&self, sink: &mut dyn CodeSink, st: &mut EmitState<'_>, target: u64) {
        emit_mov_imm32(sink, TMP, target as u32);
        emit_str_w(sink, TMP, ENV, EIP_OFFSET);
        if st.standalone {
            emit_ret(sink);
            return;
        }

        let record = st.alloc_record(target);
        emit_mov_imm64(sink, RECORD, record);
        emit_ldr_x(sink, BRANCH, RECORD, SLOT_LINK * 8);
        emit_cbz_x(sink, BRANCH, 2);
        emit_br(sink, BRANCH);
        emit_ldr_x(sink, BRANCH, RECORD, SLOT_DISPATCH * 8);
        emit_br(sink, BRANCH);
    }
}
