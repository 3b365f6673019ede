use dynarec_backend::{Aarch64Emitter, CodeArena, ExecAllocator, HostEmitter};
use dynarec_core::{FlagSet, JumpTable, JumpTarget};
use dynarec_exec::{TranslationContext, EPILOG_HEADROOM};
use dynarec_frontend::IcedDecoder;

use super::{mem, BASE, STRAIGHT, WITH_SON};

fn discover(bytes: &[u8], max_insns: usize) -> TranslationContext {
    let mut ctx = TranslationContext::new(BASE, false, max_insns);
    ctx.discover(&IcedDecoder::new(), &mem(bytes), &Aarch64Emitter::new());
    ctx
}

/// Discover, assign and measure.
fn analyze(bytes: &[u8], standalone: bool) -> (TranslationContext, usize) {
    let m = mem(bytes);
    let dec = IcedDecoder::new();
    let be = Aarch64Emitter::new();
    let mut ctx = TranslationContext::new(BASE, standalone, 512);
    assert!(ctx.discover(&dec, &m, &be) > 0);
    ctx.assign(&dec, &m);
    let size = ctx.measure(&be);
    (ctx, size)
}

#[test]
fn straight_line_stops_at_unsupported() {
    let ctx = discover(STRAIGHT, 512);
    assert_eq!(ctx.instruction_count, 5);
    assert_eq!(ctx.x86_size, 10);
    assert_eq!(ctx.end_address(), 0x100a);
    assert!(ctx.needs_epilogue);
}

#[test]
fn nothing_to_translate() {
    let ctx = discover(&[0xc3], 512);
    assert_eq!(ctx.instruction_count, 0);
    assert_eq!(ctx.x86_size, 0);
}

#[test]
fn self_jump_ends_discovery() {
    let ctx = discover(&[0xeb, 0xfe, 0x90], 512);
    assert_eq!(ctx.instruction_count, 1);
    assert_eq!(ctx.x86_size, 2);
    assert!(!ctx.needs_epilogue);
    // Backward and self targets are never queued.
    assert!(ctx.pending.is_empty());
}

#[test]
fn far_jump_ends_discovery() {
    let ctx = discover(WITH_SON, 512);
    assert_eq!(ctx.instruction_count, 7);
    assert_eq!(ctx.x86_size, 15);
    assert!(!ctx.needs_epilogue);
}

#[test]
fn padding_gap_is_bridged() {
    // jmp 1005; nop; nop; nop; 1005: inc eax; ret
    let ctx = discover(&[0xeb, 0x03, 0x90, 0x90, 0x90, 0x40, 0xc3], 512);
    assert_eq!(ctx.instruction_count, 5);
    assert_eq!(ctx.x86_size, 6);
}

#[test]
fn decodable_gap_is_bridged() {
    // jmp 1007; mov eax,ebx; add eax,1; 1007: inc eax; ret
    let ctx = discover(&[0xeb, 0x05, 0x89, 0xd8, 0x83, 0xc0, 0x01, 0x40, 0xc3], 512);
    assert_eq!(ctx.instruction_count, 4);
    assert_eq!(ctx.x86_size, 8);
}

#[test]
fn unsupported_gap_is_not_bridged() {
    // jmp 1004; ret; nop; 1004: inc eax
    let ctx = discover(&[0xeb, 0x02, 0xc3, 0x90, 0x40, 0xc3], 512);
    assert_eq!(ctx.instruction_count, 1);
    assert_eq!(ctx.x86_size, 2);
}

#[test]
fn misaligned_gap_is_not_bridged() {
    // jmp 1005; mov eax,1 (runs past 1005); ...
    let ctx = discover(&[0xeb, 0x03, 0xb8, 0x01, 0x00, 0x00, 0x00, 0x40, 0xc3], 512);
    assert_eq!(ctx.instruction_count, 1);
}

#[test]
fn max_insns_cuts_the_unit() {
    let ctx = discover(&[0x40; 10], 4);
    assert_eq!(ctx.instruction_count, 4);
    assert_eq!(ctx.x86_size, 4);
    assert!(ctx.needs_epilogue);
}

#[test]
fn assign_fills_records() {
    let (ctx, _) = analyze(STRAIGHT, false);
    assert_eq!(ctx.instructions.len(), 5);
    assert_eq!(ctx.capacity, 5 + EPILOG_HEADROOM);
    assert_eq!(ctx.anomalies, 0);
    assert_eq!(ctx.instructions[1].x86.need_flags, Some(FlagSet::empty()));
}

#[test]
fn assign_tolerates_changed_bytes() {
    let dec = IcedDecoder::new();
    let be = Aarch64Emitter::new();
    let mut ctx = TranslationContext::new(BASE, false, 512);
    ctx.discover(&dec, &mem(STRAIGHT), &be);
    assert_eq!(ctx.instruction_count, 5);

    // The third instruction no longer decodes on the second pass.
    ctx.assign(&dec, &mem(&STRAIGHT[..6]));
    assert_eq!(ctx.instruction_count, 2);
    assert_eq!(ctx.x86_size, 5);
    assert!(ctx.needs_epilogue);
}

#[test]
fn measure_records_host_layout() {
    let (ctx, size) = analyze(STRAIGHT, false);
    assert_eq!(size, ctx.emitted_size);
    let mut expect = 0;
    for rec in &ctx.instructions {
        assert_eq!(rec.host.offset, expect);
        expect += rec.host.size;
    }
    // The epilogue exit follows the last instruction.
    assert_eq!(size, expect + Aarch64Emitter::exit_size(false));
    assert_eq!(ctx.jump_table_size, 1);
    assert!(ctx.child_targets.is_empty());
}

#[test]
fn standalone_needs_no_records() {
    let (ctx, size) = analyze(STRAIGHT, true);
    assert_eq!(ctx.jump_table_size, 0);
    let body: usize = ctx.instructions.iter().map(|r| r.host.size).sum();
    assert_eq!(size, body + Aarch64Emitter::exit_size(true));
}

#[test]
fn measure_finds_sons() {
    let (ctx, _) = analyze(WITH_SON, false);
    assert_eq!(ctx.child_targets, vec![0x1009]);
    assert_eq!(ctx.jump_table_size, 1);
    assert_eq!(ctx.instructions[1].x86.jump_target, JumpTarget::Internal(5));
}

#[test]
fn emit_matches_measure() {
    let (mut ctx, size) = analyze(WITH_SON, false);
    let arena = CodeArena::default();
    let mut region = arena.allocate(size, false).unwrap();
    let table = JumpTable::new(ctx.jump_table_size);
    let be = Aarch64Emitter::new();
    let be: &dyn HostEmitter = &be;

    assert!(ctx.emit(be, &mut region, Some(&table), 0xd15a_7c40));
    assert_eq!(ctx.emitted_size, size);
    assert_eq!(ctx.emitted_start, region.addr());
    assert_eq!(
        ctx.child_emitted_addresses,
        vec![region.addr() + ctx.instructions[5].host.offset as u64]
    );
    assert_eq!(table.get(0, dynarec_core::jump_table::SLOT_TARGET), 0x2000);
}

#[test]
fn emit_reports_overflow() {
    let (mut ctx, size) = analyze(STRAIGHT, true);
    let arena = CodeArena::default();
    // Regions are 16-byte aligned; ask for less than a third.
    let mut region = arena.allocate(size / 3, false).unwrap();
    assert!(region.len() < size);
    assert!(!ctx.emit(&Aarch64Emitter::new(), &mut region, None, 0));
}
