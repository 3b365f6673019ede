use dynarec_backend::aarch64::emitter::*;
use dynarec_backend::aarch64::Reg;
use dynarec_backend::{CodeSink, CodeWriter};

/// Run `f` against a fresh writer and return the single word it emits.
fn word(f: impl FnOnce(&mut dyn CodeSink)) -> u32 {
    let mut buf = vec![0u8; 4];
    let mut w = CodeWriter::new(&mut buf, 0x4000);
    f(&mut w);
    assert_eq!(w.offset(), 4);
    w.read_u32(0)
}

fn words(f: impl FnOnce(&mut dyn CodeSink)) -> Vec<u32> {
    let mut buf = vec![0u8; 64];
    let mut w = CodeWriter::new(&mut buf, 0x4000);
    f(&mut w);
    (0..w.offset() / 4).map(|i| w.read_u32(i * 4)).collect()
}

#[test]
fn loads_and_stores() {
    assert_eq!(word(|s| emit_ldr_w(s, Reg::X9, Reg::X0, 4)), 0xB940_0409);
    assert_eq!(word(|s| emit_str_w(s, Reg::X9, Reg::X0, 0)), 0xB900_0009);
    assert_eq!(word(|s| emit_str_w(s, Reg::Xzr, Reg::X0, 40)), 0xB900_281F);
    assert_eq!(word(|s| emit_ldr_x(s, Reg::X16, Reg::X1, 24)), 0xF940_0C30);
}

#[test]
fn move_wide() {
    assert_eq!(word(|s| emit_movz_w(s, Reg::X9, 0x1234, 0)), 0x5282_4689);
    assert_eq!(word(|s| emit_movk_w(s, Reg::X12, 0x1234, 1)), 0x72A2_468C);
    assert_eq!(word(|s| emit_movz_x(s, Reg::X1, 0, 0)), 0xD280_0001);
}

#[test]
fn mov_imm_has_fixed_length() {
    assert_eq!(words(|s| emit_mov_imm32(s, Reg::X10, 0)).len(), 2);
    assert_eq!(words(|s| emit_mov_imm32(s, Reg::X10, 0xffff_ffff)).len(), 2);
    assert_eq!(words(|s| emit_mov_imm64(s, Reg::X1, 0)).len(), 4);
    assert_eq!(
        words(|s| emit_mov_imm32(s, Reg::X12, 0x1234_5678)),
        vec![0x528A_CF0C, 0x72A2_468C]
    );
}

#[test]
fn data_processing() {
    assert_eq!(
        word(|s| emit_dp(s, DpOp::Add, Reg::X11, Reg::X9, Reg::X10)),
        0x0B0A_012B
    );
    assert_eq!(
        word(|s| emit_dp(s, DpOp::Adds, Reg::X11, Reg::X9, Reg::X10)),
        0x2B0A_012B
    );
    assert_eq!(
        word(|s| emit_dp(s, DpOp::Subs, Reg::X11, Reg::X9, Reg::X10)),
        0x6B0A_012B
    );
    // eor w12, w13, w13, lsr #4
    assert_eq!(
        word(|s| emit_dp_reg(s, DpOp::Eor, Reg::X12, Reg::X13, Reg::X13, Shift::Lsr, 4)),
        0x4A4D_11AC
    );
    assert_eq!(word(|s| emit_cmp_imm_w(s, Reg::X11, 0)), 0x7100_017F);
}

#[test]
fn flag_extraction() {
    assert_eq!(word(|s| emit_cset_w(s, Reg::X12, ArmCond::Eq)), 0x1A9F_17EC);
    assert_eq!(word(|s| emit_lsr_imm_w(s, Reg::X12, Reg::X11, 31)), 0x531F_7D6C);
    assert_eq!(word(|s| emit_bfi_w(s, Reg::X13, Reg::X12, 6, 1)), 0x331A_018D);
    // bfi at bit 0 uses immr 0.
    assert_eq!(word(|s| emit_bfi_w(s, Reg::X13, Reg::X12, 0, 1)), 0x3300_018D);
}

#[test]
fn branches() {
    assert_eq!(word(|s| emit_b(s, 2)), 0x1400_0002);
    assert_eq!(word(|s| emit_b(s, -1)), 0x17FF_FFFF);
    assert_eq!(word(|s| emit_cbz_x(s, Reg::X16, 2)), 0xB400_0050);
    assert_eq!(word(|s| emit_tbz(s, Reg::X13, 6, 2)), 0x3630_004D);
    assert_eq!(word(|s| emit_tbnz(s, Reg::X13, 6, 2)), 0x3730_004D);
    assert_eq!(word(|s| emit_br(s, Reg::X16)), 0xD61F_0200);
    assert_eq!(word(emit_ret), 0xD65F_03C0);
}

#[test]
#[should_panic]
fn tbz_out_of_range() {
    word(|s| emit_tbz(s, Reg::X13, 0, 1 << 13));
}

#[test]
#[should_panic]
fn unaligned_load_offset() {
    word(|s| emit_ldr_w(s, Reg::X9, Reg::X0, 2));
}
