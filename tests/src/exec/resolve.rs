use dynarec_core::JumpTarget;
use dynarec_exec::resolve_jumps;

use super::{records, STRAIGHT, WITH_SON};

#[test]
fn no_jumps_no_changes() {
    let mut insns = records(STRAIGHT, 5);
    assert_eq!(resolve_jumps(&mut insns), 0);
    for rec in &insns {
        assert_eq!(rec.x86.jump_target, JumpTarget::None);
        assert!(!rec.x86.barrier);
    }
}

#[test]
fn empty_unit() {
    assert_eq!(resolve_jumps(&mut []), 0);
}

#[test]
fn internal_targets_become_barriers() {
    let mut insns = records(WITH_SON, 7);
    assert_eq!(resolve_jumps(&mut insns), 0);
    assert_eq!(insns[1].x86.jump_target, JumpTarget::Internal(5));
    assert_eq!(insns[2].x86.jump_target, JumpTarget::Internal(5));
    assert_eq!(insns[6].x86.jump_target, JumpTarget::External);
    let barriers: Vec<usize> = (0..insns.len()).filter(|&i| insns[i].x86.barrier).collect();
    assert_eq!(barriers, vec![5]);
}

#[test]
fn self_jump_is_internal() {
    let mut insns = records(&[0xeb, 0xfe], 1);
    assert_eq!(resolve_jumps(&mut insns), 0);
    assert_eq!(insns[0].x86.jump_target, JumpTarget::Internal(0));
    assert!(insns[0].x86.barrier);
}

#[test]
fn target_past_the_end_is_external() {
    // jmp to the byte right after the unit.
    let mut insns = records(&[0xeb, 0x00], 1);
    resolve_jumps(&mut insns);
    assert_eq!(insns[0].x86.jump_target, JumpTarget::External);
    assert!(!insns[0].x86.barrier);
}

#[test]
fn target_before_the_start_is_external() {
    // nop; jmp 0x0fff
    let mut insns = records(&[0x90, 0xeb, 0xfc], 2);
    resolve_jumps(&mut insns);
    assert_eq!(insns[1].x86.jump_target, JumpTarget::External);
}

#[test]
fn mid_instruction_target_is_an_anomaly() {
    // je 1003; mov eax,1
    let mut insns = records(&[0x74, 0x01, 0xb8, 0x01, 0x00, 0x00, 0x00], 2);
    assert_eq!(resolve_jumps(&mut insns), 1);
    assert_eq!(insns[0].x86.jump_target, JumpTarget::External);
    assert!(!insns[1].x86.barrier);
}

#[test]
fn indirect_exits_are_external() {
    // nop; jmp eax
    let mut insns = records(&[0x90, 0xff, 0xe0], 2);
    resolve_jumps(&mut insns);
    assert_eq!(insns[0].x86.jump_target, JumpTarget::None);
    assert_eq!(insns[1].x86.jump_target, JumpTarget::External);
}
