//! 32-bit x86 decoder built on iced-x86.

use dynarec_core::{
    AluOp, Cond, FlagSet, FlagWriteMode, Flow, Gpr, Operand, X86Insn, X86Op, MAX_INSN_LEN,
};
use iced_x86::{
    Decoder, DecoderOptions, FlowControl, Instruction, Mnemonic, OpKind, Register, RflagsBits,
};

use crate::nops::is_nops;
use crate::{GuestMemory, X86Decoder};

/// Protected-mode (32-bit) decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct IcedDecoder;

impl IcedDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl X86Decoder for IcedDecoder {
    fn decode(&self, mem: &dyn GuestMemory, addr: u64) -> Option<X86Insn> {
        let bytes = mem.fetch(addr, MAX_INSN_LEN);
        if bytes.is_empty() {
            return None;
        }
        let mut decoder = Decoder::with_ip(32, bytes, addr, DecoderOptions::NONE);
        let insn = decoder.decode();
        if insn.is_invalid() {
            return None;
        }
        let raw = &bytes[..insn.len()];

        let mut rec = X86Insn::new(addr, raw, classify(&insn, raw));
        rec.flags_read = flag_set(insn.rflags_read());
        rec.flags_written = flag_set(insn.rflags_modified());
        rec.write_mode = if rec.flags_written.is_empty() {
            FlagWriteMode::Never
        } else if count_may_be_zero(&insn) {
            FlagWriteMode::Maybe
        } else {
            FlagWriteMode::Always
        };
        (rec.flow, rec.jump_dest) = flow_of(&insn);
        Some(rec)
    }
}

/// Map iced's RFLAGS bits onto the translator's flag set.
fn flag_set(bits: u32) -> FlagSet {
    const MAP: [(u32, FlagSet); 6] = [
        (RflagsBits::CF, FlagSet::CF),
        (RflagsBits::PF, FlagSet::PF),
        (RflagsBits::AF, FlagSet::AF),
        (RflagsBits::ZF, FlagSet::ZF),
        (RflagsBits::SF, FlagSet::SF),
        (RflagsBits::OF, FlagSet::OF),
    ];
    MAP.iter()
        .filter(|(bit, _)| bits & bit != 0)
        .fold(FlagSet::empty(), |acc, (_, f)| acc | *f)
}

fn is_near_branch(kind: OpKind) -> bool {
    matches!(
        kind,
        OpKind::NearBranch16 | OpKind::NearBranch32 | OpKind::NearBranch64
    )
}

fn flow_of(insn: &Instruction) -> (Flow, Option<u64>) {
    match insn.flow_control() {
        FlowControl::Next => (Flow::Next, None),
        FlowControl::UnconditionalBranch if is_near_branch(insn.op0_kind()) => {
            (Flow::Jump, Some(insn.near_branch_target()))
        }
        FlowControl::ConditionalBranch if is_near_branch(insn.op0_kind()) => {
            (Flow::CondJump, Some(insn.near_branch_target()))
        }
        _ => (Flow::Exit, None),
    }
}

/// Shifts and rotates leave flags alone when the masked count is zero.
fn count_may_be_zero(insn: &Instruction) -> bool {
    let count_op = match insn.mnemonic() {
        Mnemonic::Shl
        | Mnemonic::Sal
        | Mnemonic::Shr
        | Mnemonic::Sar
        | Mnemonic::Rol
        | Mnemonic::Ror
        | Mnemonic::Rcl
        | Mnemonic::Rcr => 1,
        Mnemonic::Shld | Mnemonic::Shrd => 2,
        _ => return false,
    };
    if count_op >= insn.op_count() {
        return false;
    }
    match insn.op_kind(count_op) {
        OpKind::Register => insn.op_register(count_op) == Register::CL,
        OpKind::Immediate8 => insn.immediate(count_op) & 0x1f == 0,
        _ => false,
    }
}

fn gpr32(reg: Register) -> Option<Gpr> {
    Some(match reg {
        Register::EAX => Gpr::Eax,
        Register::ECX => Gpr::Ecx,
        Register::EDX => Gpr::Edx,
        Register::EBX => Gpr::Ebx,
        Register::ESP => Gpr::Esp,
        Register::EBP => Gpr::Ebp,
        Register::ESI => Gpr::Esi,
        Register::EDI => Gpr::Edi,
        _ => return None,
    })
}

fn reg_operand(insn: &Instruction, n: u32) -> Option<Gpr> {
    if insn.op_kind(n) == OpKind::Register {
        gpr32(insn.op_register(n))
    } else {
        None
    }
}

fn src_operand(insn: &Instruction, n: u32) -> Option<Operand> {
    match insn.op_kind(n) {
        OpKind::Register => gpr32(insn.op_register(n)).map(Operand::Reg),
        OpKind::Immediate32 | OpKind::Immediate8to32 => {
            Some(Operand::Imm(insn.immediate(n) as u32))
        }
        _ => None,
    }
}

fn cond_of(mnemonic: Mnemonic) -> Option<Cond> {
    Some(match mnemonic {
        Mnemonic::Jo => Cond::O,
        Mnemonic::Jno => Cond::No,
        Mnemonic::Jb => Cond::B,
        Mnemonic::Jae => Cond::Ae,
        Mnemonic::Je => Cond::E,
        Mnemonic::Jne => Cond::Ne,
        Mnemonic::Jbe => Cond::Be,
        Mnemonic::Ja => Cond::A,
        Mnemonic::Js => Cond::S,
        Mnemonic::Jns => Cond::Ns,
        Mnemonic::Jp => Cond::P,
        Mnemonic::Jnp => Cond::Np,
        Mnemonic::Jl => Cond::L,
        Mnemonic::Jge => Cond::Ge,
        Mnemonic::Jle => Cond::Le,
        Mnemonic::Jg => Cond::G,
        _ => return None,
    })
}

/// Reduce a decoded instruction to the register-form shapes the
/// emitters lower directly.
fn classify(insn: &Instruction, raw: &[u8]) -> X86Op {
    let mnemonic = insn.mnemonic();
    if mnemonic == Mnemonic::Nop || is_nops(raw) {
        return X86Op::Nop;
    }

    let two_operand = || -> Option<(Gpr, Operand)> {
        if insn.op_count() != 2 {
            return None;
        }
        Some((reg_operand(insn, 0)?, src_operand(insn, 1)?))
    };

    let alu = |op: AluOp| {
        two_operand()
            .map(|(dst, src)| X86Op::Alu { op, dst, src })
            .unwrap_or(X86Op::Other)
    };

    match mnemonic {
        Mnemonic::Mov => two_operand()
            .map(|(dst, src)| X86Op::Mov { dst, src })
            .unwrap_or(X86Op::Other),
        Mnemonic::Add => alu(AluOp::Add),
        Mnemonic::Sub => alu(AluOp::Sub),
        Mnemonic::And => alu(AluOp::And),
        Mnemonic::Or => alu(AluOp::Or),
        Mnemonic::Xor => alu(AluOp::Xor),
        Mnemonic::Cmp => alu(AluOp::Cmp),
        Mnemonic::Test => alu(AluOp::Test),
        Mnemonic::Inc | Mnemonic::Dec if insn.op_count() == 1 => reg_operand(insn, 0)
            .map(|dst| X86Op::IncDec {
                dst,
                inc: mnemonic == Mnemonic::Inc,
            })
            .unwrap_or(X86Op::Other),
        Mnemonic::Jmp if is_near_branch(insn.op0_kind()) => X86Op::Jmp,
        m if is_near_branch(insn.op0_kind()) => cond_of(m).map(X86Op::Jcc).unwrap_or(X86Op::Other),
        _ => X86Op::Other,
    }
}
