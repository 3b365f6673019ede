//! Backward flag-liveness over the instructions of one unit.

use dynarec_core::{FlagSet, FlagWriteMode, Flow, InstructionRecord, JumpTarget};

/// Jump recursion bound. Reaching it answers "all flags".
pub const MAX_DEPTH: u32 = 5;

/// Flags that must be valid before `insns[index]` when `requested`
/// flags are still wanted downstream.
///
/// Stamps `need_flags` on the instructions it walks through. Loops are
/// cut off by the depth bound rather than by a visited set.
pub fn needed_flags(
    insns: &mut [InstructionRecord],
    index: usize,
    requested: FlagSet,
    depth: u32,
) -> FlagSet {
    if index >= insns.len() || depth >= MAX_DEPTH {
        return FlagSet::ALL;
    }

    let x86 = &insns[index].x86;
    let read = x86.flags_read;
    let written = x86.flags_written;
    let may_set = x86.write_mode == FlagWriteMode::Maybe;
    let flow = x86.flow;
    let target = x86.jump_target;
    let is_jump = x86.is_jump();
    let quiet = x86.is_flag_neutral();

    let mut setf = requested;
    if !read.is_empty() {
        setf = setf.difference(read);
        if setf.is_empty() {
            return read;
        }
    }

    // A quiet run changes nothing: answer once, stamp every member.
    if quiet {
        let end = insns[index..]
            .iter()
            .position(|r| !r.x86.is_flag_neutral())
            .map_or(insns.len(), |n| index + n);
        let need = needed_flags(insns, end, setf, depth);
        for rec in &mut insns[index..end] {
            rec.x86.need_flags = Some(need);
        }
        return need;
    }

    if !written.is_empty() && !may_set {
        if setf.difference(written).is_empty() {
            return read;
        }
        setf |= written;
    }

    let after = if is_jump {
        let mut need = match target {
            JumpTarget::Internal(t) => needed_flags(insns, t, setf, depth + 1),
            JumpTarget::External | JumpTarget::None => FlagSet::PEND,
        };
        if flow == Flow::CondJump {
            need |= needed_flags(insns, index + 1, setf, depth);
        }
        need
    } else {
        needed_flags(insns, index + 1, setf, depth)
    };
    insns[index].x86.need_flags = Some(after);

    let needed = if may_set {
        read | after
    } else {
        read | after.difference(written)
    };
    if needed == FlagSet::PEND | FlagSet::ALL {
        FlagSet::ALL
    } else {
        needed
    }
}

/// Seed the analysis at every flag writer whose need is still unknown.
pub fn compute_flag_liveness(insns: &mut [InstructionRecord]) {
    for i in 0..insns.len() {
        let x86 = &insns[i].x86;
        if x86.flags_written.is_empty() || x86.need_flags.is_some() {
            continue;
        }
        let written = x86.flags_written;
        let may_set = x86.write_mode == FlagWriteMode::Maybe;

        let mut need = needed_flags(insns, i + 1, written, 0);
        // A conditional writer can leave older flags in place that an
        // unknown consumer may read.
        if may_set && need.contains(FlagSet::PEND) {
            need = FlagSet::ALL;
        }
        insns[i].x86.need_flags = Some(need);
    }
}
