//! Disassembly for translation traces.
//!
//! `print_insn_x86` renders one 32-bit x86 instruction in Intel syntax;
//! `trace_line` formats a decoded instruction the way the translator's
//! dump output shows it, with the symbolic name of call and jump
//! targets when a [`SymbolResolver`] knows them.

use std::collections::BTreeMap;
use std::fmt::Write;

use dynarec_core::X86Insn;
use iced_x86::{Decoder, DecoderOptions, FlowControl, Formatter, IntelFormatter, OpKind};

/// Maps guest addresses to symbol names.
pub trait SymbolResolver: Send + Sync {
    fn lookup(&self, addr: u64) -> Option<String>;
}

/// Resolver over a fixed set of symbols.
///
/// An address inside a symbol resolves as `name+off`.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    syms: BTreeMap<u64, (String, u64)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbol covering `[addr, addr + size)`. A zero size matches
    /// the exact address only.
    pub fn insert(&mut self, addr: u64, size: u64, name: impl Into<String>) {
        self.syms.insert(addr, (name.into(), size));
    }

    pub fn len(&self) -> usize {
        self.syms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syms.is_empty()
    }
}

impl SymbolResolver for SymbolTable {
    fn lookup(&self, addr: u64) -> Option<String> {
        let (&start, (name, size)) = self.syms.range(..=addr).next_back()?;
        let off = addr - start;
        if off == 0 {
            Some(name.clone())
        } else if off < *size {
            Some(format!("{name}+{off:#x}"))
        } else {
            None
        }
    }
}

/// Disassemble one 32-bit x86 instruction at `pc`.
///
/// Returns `(assembly_text, instruction_length_in_bytes)`; the length
/// is 0 when the bytes do not decode.
pub fn print_insn_x86(pc: u64, data: &[u8]) -> (String, usize) {
    let mut decoder = Decoder::with_ip(32, data, pc, DecoderOptions::NONE);
    let insn = decoder.decode();
    if insn.is_invalid() {
        return ("(bad)".into(), 0);
    }
    let mut formatter = IntelFormatter::new();
    let mut text = String::new();
    formatter.format(&insn, &mut text);
    (text, insn.len())
}

/// Direct destination of a call or jump, if the instruction has one.
fn branch_target(pc: u64, data: &[u8]) -> Option<u64> {
    let mut decoder = Decoder::with_ip(32, data, pc, DecoderOptions::NONE);
    let insn = decoder.decode();
    let direct = matches!(
        insn.op0_kind(),
        OpKind::NearBranch16 | OpKind::NearBranch32 | OpKind::NearBranch64
    );
    match insn.flow_control() {
        FlowControl::Call | FlowControl::UnconditionalBranch | FlowControl::ConditionalBranch
            if direct =>
        {
            Some(insn.near_branch_target())
        }
        _ => None,
    }
}

/// One dump line: address, raw bytes, Intel syntax and, for direct
/// calls and jumps, the target's symbol.
///
/// `color` wraps the address in ANSI highlighting.
pub fn trace_line(insn: &X86Insn, resolver: Option<&dyn SymbolResolver>, color: bool) -> String {
    let raw = insn.raw();
    let (asm, _) = print_insn_x86(insn.addr, raw);

    let mut line = String::new();
    if color {
        let _ = write!(line, "\x1b[01;33m{:08x}\x1b[m ", insn.addr);
    } else {
        let _ = write!(line, "{:08x} ", insn.addr);
    }
    let mut hex = String::with_capacity(raw.len() * 3);
    for b in raw {
        let _ = write!(hex, "{b:02x} ");
    }
    let _ = write!(line, "{hex:<32}{asm}");

    if let Some(sym) = resolver
        .zip(branch_target(insn.addr, raw))
        .and_then(|(r, target)| r.lookup(target))
    {
        let _ = write!(line, " ; {sym}");
    }
    if insn.barrier {
        line.push_str(" ; <barrier>");
    }
    line
}
