//! Turns a claimed unit into published code: runs the passes, places
//! the code, creates the sons and publishes everything in order.

use std::sync::Arc;

use dynarec_backend::{flush_icache, CodeSpan, HostEmitter};
use dynarec_core::{x31_hash, JumpTable};
use dynarec_frontend::GuestMemory;

use crate::pipeline::TranslationContext;
use crate::unit::{TranslationUnit, UnitBody, UnitState};
use crate::Dynarec;

/// Target of dump output.
pub const DUMP_TARGET: &str = "dynarec::dump";

/// Fill `unit`, which the caller has moved to `Building`.
///
/// Leaves the unit `Empty`, `Failed` or `Ready`; never panics on
/// translation problems.
pub(crate) fn fill_unit<B: HostEmitter>(
    dynarec: &Dynarec<B>,
    mem: &dyn GuestMemory,
    unit: &Arc<TranslationUnit>,
) {
    let backend: &dyn HostEmitter = &dynarec.backend;
    let standalone = unit.is_standalone();
    let mut ctx = TranslationContext::new(unit.entry(), standalone, dynarec.config.max_insns);

    if ctx.discover(&dynarec.decoder, mem, backend) == 0 {
        tracing::debug!("null-sized block at {:#x}", unit.entry());
        unit.finish_empty();
        return;
    }
    ctx.assign(&dynarec.decoder, mem);
    let predicted = ctx.measure(backend);

    let Some(mut region) = dynarec.allocator.allocate(predicted, standalone) else {
        tracing::debug!(
            "no executable memory for {predicted} bytes (unit {:#x})",
            unit.entry()
        );
        unit.finish_failed();
        return;
    };
    let table = (!standalone && ctx.jump_table_size > 0)
        .then(|| Arc::new(JumpTable::new(ctx.jump_table_size)));

    if dynarec.config.dump > 0 {
        dump_unit(dynarec, &ctx, predicted);
    }

    if !ctx.emit(backend, &mut region, table.as_deref(), dynarec.dispatch_addr) {
        tracing::error!(
            "unit {:#x}: emission wrote {} bytes into a {} byte region",
            unit.entry(),
            ctx.emitted_size,
            region.len()
        );
        unit.finish_failed();
        return;
    }

    flush_icache(region.as_ptr(), ctx.emitted_size);
    if let Err(err) = region.seal() {
        tracing::warn!("cannot seal code of unit {:#x}: {err}", unit.entry());
    }
    if let Some(table) = &table {
        table.fix_owner(Arc::as_ptr(unit) as u64);
    }

    let start = ctx.origin_address;
    let end = ctx.end_address();
    let hash = if standalone {
        x31_hash(mem.fetch(start, ctx.x86_size))
    } else {
        0
    };
    let region = Arc::new(region);

    // Sons must not outlive a parent invalidated during the build.
    if unit.state() != UnitState::Building {
        tracing::debug!("unit {start:#x} retired while building");
        return;
    }

    let mut sons = Vec::new();
    for (&son_addr, &son_host) in ctx.child_targets.iter().zip(&ctx.child_emitted_addresses) {
        let (son, created) = dynarec.registry.lookup_or_create(son_addr);
        // A unit that already exists may be running; leave it alone.
        if !created || !son.try_begin_build() {
            continue;
        }
        let offset = (son_host - ctx.emitted_start) as usize;
        let son_size = (end - son_addr) as usize;
        let body = UnitBody {
            x86_addr: son_addr,
            x86_size: son_size,
            insn_count: ctx
                .instructions
                .iter()
                .filter(|r| r.x86.addr >= son_addr)
                .count(),
            code: CodeSpan::new(region.clone(), offset, ctx.emitted_size - offset),
            jump_table: table.clone(),
            hash: if standalone {
                x31_hash(mem.fetch(son_addr, son_size))
            } else {
                0
            },
            predicted_size: predicted.saturating_sub(offset),
            parent: Some(Arc::downgrade(unit)),
            sons: Vec::new(),
        };
        if son.publish(body) {
            sons.push(son);
        }
    }

    if standalone {
        if let Err(err) = dynarec.guard.protect(start, ctx.x86_size) {
            tracing::warn!("cannot protect source of unit {start:#x}: {err}");
        }
    }

    let body = UnitBody {
        x86_addr: start,
        x86_size: ctx.x86_size,
        insn_count: ctx.instruction_count,
        code: CodeSpan::new(region, 0, ctx.emitted_size),
        jump_table: table,
        hash,
        predicted_size: predicted,
        parent: None,
        sons: sons.clone(),
    };
    if !unit.publish(body) {
        tracing::debug!("unit {start:#x} retired while building");
        for son in &sons {
            son.retire();
            dynarec.registry.remove(son);
        }
        if standalone {
            if let Err(err) = dynarec.guard.unprotect(start, ctx.x86_size) {
                tracing::warn!("cannot unprotect source of unit {start:#x}: {err}");
            }
        }
    }
}

fn dump_unit<B: HostEmitter>(dynarec: &Dynarec<B>, ctx: &TranslationContext, size: usize) {
    let color = dynarec.config.dump > 1;
    let name = dynarec
        .symbols
        .as_deref()
        .and_then(|s| s.lookup(ctx.origin_address))
        .unwrap_or_default();
    tracing::info!(
        target: DUMP_TARGET,
        "emitting {size} bytes for {} x86 bytes => {:#x} {name}",
        ctx.x86_size,
        ctx.origin_address
    );
    for rec in &ctx.instructions {
        let line = dynarec_disas::trace_line(&rec.x86, dynarec.symbols.as_deref(), color);
        tracing::info!(
            target: DUMP_TARGET,
            "{line} ; need={:?} host+{:#x}",
            rec.x86.need(),
            rec.host.offset
        );
    }
}
