use dynarec_core::cpu::{gpr_offset, EFLAGS_OFFSET, EIP_OFFSET};
use dynarec_core::flags::{EFLAGS_AF, EFLAGS_CF, EFLAGS_OF, EFLAGS_PF, EFLAGS_SF, EFLAGS_ZF};
use dynarec_core::{resolve_deferred, DeferredFlags, DeferredOp, Gpr, X86State};

fn deferred(kind: DeferredOp, op1: u32, op2: u32, res: u32) -> DeferredFlags {
    DeferredFlags {
        kind: kind as u32,
        op1,
        op2,
        res,
    }
}

#[test]
fn state_layout() {
    assert_eq!(gpr_offset(Gpr::Eax), 0);
    assert_eq!(gpr_offset(Gpr::Edi), 28);
    assert_eq!(EIP_OFFSET, 32);
    assert_eq!(EFLAGS_OFFSET, 36);
}

#[test]
fn state_regs() {
    let mut st = X86State::new();
    assert_eq!(st.eflags, 0x2);
    st.set_reg(Gpr::Ecx, 7);
    assert_eq!(st.reg(Gpr::Ecx), 7);
    assert_eq!(st.regs[1], 7);
}

#[test]
fn deferred_add_wraps() {
    let df = deferred(DeferredOp::Add, 0xffff_ffff, 1, 0);
    let fl = resolve_deferred(&df, 0x2);
    assert_ne!(fl & EFLAGS_CF, 0);
    assert_ne!(fl & EFLAGS_ZF, 0);
    assert_ne!(fl & EFLAGS_PF, 0);
    assert_ne!(fl & EFLAGS_AF, 0);
    assert_eq!(fl & EFLAGS_SF, 0);
    assert_eq!(fl & EFLAGS_OF, 0);
    assert_ne!(fl & 0x2, 0);
}

#[test]
fn deferred_add_signed_overflow() {
    let df = deferred(DeferredOp::Add, 0x7fff_ffff, 1, 0x8000_0000);
    let fl = resolve_deferred(&df, 0x2);
    assert_ne!(fl & EFLAGS_OF, 0);
    assert_ne!(fl & EFLAGS_SF, 0);
    assert_eq!(fl & EFLAGS_CF, 0);
}

#[test]
fn deferred_sub_borrow() {
    let df = deferred(DeferredOp::Sub, 1, 2, 0xffff_ffff);
    let fl = resolve_deferred(&df, 0x2);
    assert_ne!(fl & EFLAGS_CF, 0);
    assert_ne!(fl & EFLAGS_SF, 0);
    assert_ne!(fl & EFLAGS_PF, 0);
    assert_eq!(fl & EFLAGS_ZF, 0);
    assert_eq!(fl & EFLAGS_OF, 0);
}

#[test]
fn deferred_inc_keeps_carry() {
    let df = deferred(DeferredOp::Inc, 0x7fff_ffff, 1, 0x8000_0000);
    let fl = resolve_deferred(&df, 0x2 | EFLAGS_CF);
    assert_ne!(fl & EFLAGS_CF, 0);
    assert_ne!(fl & EFLAGS_OF, 0);

    let fl = resolve_deferred(&df, 0x2);
    assert_eq!(fl & EFLAGS_CF, 0);
}

#[test]
fn deferred_dec_overflow() {
    let df = deferred(DeferredOp::Dec, 0x8000_0000, 1, 0x7fff_ffff);
    let fl = resolve_deferred(&df, 0x2);
    assert_ne!(fl & EFLAGS_OF, 0);
    assert_eq!(fl & EFLAGS_SF, 0);
}

#[test]
fn deferred_logic_clears_cf_of() {
    let df = deferred(DeferredOp::Xor, 5, 5, 0);
    let fl = resolve_deferred(&df, 0x2 | EFLAGS_CF | EFLAGS_OF);
    assert_eq!(fl & (EFLAGS_CF | EFLAGS_OF), 0);
    assert_ne!(fl & EFLAGS_ZF, 0);
}

#[test]
fn deferred_none_is_identity() {
    let eflags = 0x2 | EFLAGS_ZF | EFLAGS_OF;
    assert_eq!(resolve_deferred(&DeferredFlags::default(), eflags), eflags);
    let bogus = DeferredFlags {
        kind: 99,
        ..DeferredFlags::default()
    };
    assert_eq!(resolve_deferred(&bogus, eflags), eflags);
}

#[test]
fn settle_flags_consumes_record() {
    let mut st = X86State::new();
    st.deferred = deferred(DeferredOp::Sub, 3, 3, 0);
    st.settle_flags();
    assert_ne!(st.eflags & EFLAGS_ZF, 0);
    assert_eq!(st.deferred.kind, DeferredOp::None as u32);
}
