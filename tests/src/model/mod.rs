mod cpu;
mod jump_table;

use dynarec_core::flags::{EFLAGS_CF, EFLAGS_OF, EFLAGS_PF, EFLAGS_ZF};
use dynarec_core::{Cond, FlagSet, Flow, X86Insn, X86Op};

#[test]
fn flagset_from_eflags() {
    let set = FlagSet::from_eflags(EFLAGS_CF | EFLAGS_ZF | 0x2);
    assert_eq!(set, FlagSet::CF | FlagSet::ZF);
}

#[test]
fn flagset_eflags_mask_ignores_pend() {
    let mask = (FlagSet::PEND | FlagSet::CF | FlagSet::OF).eflags_mask();
    assert_eq!(mask, EFLAGS_CF | EFLAGS_OF);
    assert_eq!(FlagSet::ALL.eflags_mask() & EFLAGS_PF, EFLAGS_PF);
}

#[test]
fn flagset_processor_flags() {
    let set = FlagSet::PEND | FlagSet::SF;
    assert_eq!(set.processor_flags(), FlagSet::SF);
    assert!(!FlagSet::ALL.contains(FlagSet::PEND));
}

#[test]
fn cond_flags_and_polarity() {
    assert_eq!(Cond::E.flags(), FlagSet::ZF);
    assert_eq!(Cond::A.flags(), FlagSet::CF | FlagSet::ZF);
    assert_eq!(Cond::G.flags(), FlagSet::ZF | FlagSet::SF | FlagSet::OF);
    assert!(!Cond::E.is_negated());
    assert!(Cond::Ne.is_negated());
    assert!(Cond::G.is_negated());
}

#[test]
fn insn_defaults() {
    let insn = X86Insn::new(0x1000, &[0x90], X86Op::Nop);
    assert_eq!(insn.size, 1);
    assert_eq!(insn.raw(), &[0x90]);
    assert_eq!(insn.next_addr(), 0x1001);
    assert!(!insn.is_jump());
    assert!(insn.is_flag_neutral());
    // Unknown need means everything.
    assert_eq!(insn.need(), FlagSet::ALL);
}

#[test]
fn insn_flow_predicates() {
    let mut jcc = X86Insn::new(0x1000, &[0x74, 0x02], X86Op::Jcc(Cond::E));
    jcc.flow = Flow::CondJump;
    assert!(jcc.is_jump());
    assert!(jcc.is_conditional());
    assert!(!jcc.flow.ends_block());

    let mut jmp = X86Insn::new(0x1000, &[0xeb, 0xfe], X86Op::Jmp);
    jmp.flow = Flow::Jump;
    assert!(jmp.is_jump());
    assert!(!jmp.is_conditional());
    assert!(jmp.flow.ends_block());
    assert!(!jmp.is_flag_neutral());
}
