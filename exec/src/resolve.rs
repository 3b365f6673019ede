use dynarec_core::{InstructionRecord, JumpTarget};

/// Resolve every jump of the unit to an instruction index or to an
/// exit, marking destinations as barriers.
///
/// Returns the number of anomalies: destinations inside the unit's
/// byte range that do not start an instruction. Those are treated as
/// exits.
pub fn resolve_jumps(insns: &mut [InstructionRecord]) -> usize {
    let (Some(first), Some(last)) = (insns.first(), insns.last()) else {
        return 0;
    };
    let start = first.x86.addr;
    let end = last.x86.next_addr();
    let mut anomalies = 0;

    for i in 0..insns.len() {
        if !insns[i].x86.is_jump() {
            continue;
        }
        let from = insns[i].x86.addr;
        let target = match insns[i].x86.jump_dest {
            None => JumpTarget::External,
            Some(dest) if dest < start || dest >= end => JumpTarget::External,
            Some(dest) => match insns.iter().position(|r| r.x86.addr == dest) {
                Some(k) => {
                    insns[k].x86.barrier = true;
                    JumpTarget::Internal(k)
                }
                None => {
                    tracing::warn!(
                        "jump at {from:#x} lands at {dest:#x}, inside [{start:#x}, {end:#x}) \
                         but off any instruction boundary; treating as exit"
                    );
                    anomalies += 1;
                    JumpTarget::External
                }
            },
        };
        insns[i].x86.jump_target = target;
    }
    anomalies
}
