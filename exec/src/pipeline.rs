//! The four translation passes over one unit.
//!
//! discover -> assign -> measure -> emit, each run exactly once and in
//! that order by the builder. The context is owned by the building
//! thread; nothing in it is shared.

use dynarec_backend::{CodeRegion, CodeSink, CodeWriter, EmitState, HostEmitter, SizeCounter};
use dynarec_core::{HostInfo, InstructionRecord, JumpTable, X86Insn};
use dynarec_frontend::{is_nops_at, GuestMemory, X86Decoder};

use crate::liveness::compute_flag_liveness;
use crate::resolve::resolve_jumps;
use crate::worklist::AddressWorklist;

/// Record slots reserved past the discovered count.
pub const EPILOG_HEADROOM: usize = 3;

/// Gaps shorter than this are bridged when they are all padding.
pub const MAX_NOP_GAP: u64 = 15;

/// Gaps shorter than this are bridged when they decode cleanly up to
/// the pending address.
pub const MAX_DECODED_GAP: u64 = 30;

/// Per-build translation state.
#[derive(Debug)]
pub struct TranslationContext {
    pub origin_address: u64,
    pub instruction_count: usize,
    pub capacity: usize,
    pub instructions: Vec<InstructionRecord>,
    pub pending: AddressWorklist,
    pub x86_size: usize,
    pub emitted_size: usize,
    pub emitted_start: u64,
    pub jump_table_size: usize,
    pub child_targets: Vec<u64>,
    pub child_emitted_addresses: Vec<u64>,
    pub standalone: bool,
    /// Discovery stopped on a fall-through; an exit to `end` follows
    /// the last instruction.
    pub needs_epilogue: bool,
    pub anomalies: usize,
    pub max_insns: usize,
}

impl TranslationContext {
    pub fn new(origin_address: u64, standalone: bool, max_insns: usize) -> Self {
        Self {
            origin_address,
            instruction_count: 0,
            capacity: 0,
            instructions: Vec::new(),
            pending: AddressWorklist::new(),
            x86_size: 0,
            emitted_size: 0,
            emitted_start: 0,
            jump_table_size: 0,
            child_targets: Vec::new(),
            child_emitted_addresses: Vec::new(),
            standalone,
            needs_epilogue: false,
            anomalies: 0,
            max_insns: max_insns.max(1),
        }
    }

    /// First x86 address past the unit.
    #[inline]
    pub fn end_address(&self) -> u64 {
        self.origin_address + self.x86_size as u64
    }

    fn decode_supported(
        decoder: &dyn X86Decoder,
        mem: &dyn GuestMemory,
        backend: &dyn HostEmitter,
        addr: u64,
    ) -> Option<X86Insn> {
        decoder
            .decode(mem, addr)
            .filter(|insn| backend.supports(&insn.op))
    }

    /// Whether discovery may continue from `addr` to reach `target`.
    fn can_bridge(
        decoder: &dyn X86Decoder,
        mem: &dyn GuestMemory,
        backend: &dyn HostEmitter,
        addr: u64,
        target: u64,
    ) -> bool {
        let gap = target - addr;
        if gap == 0 {
            return true;
        }
        if gap < MAX_NOP_GAP && is_nops_at(mem, addr, gap as usize) {
            return true;
        }
        if gap >= MAX_DECODED_GAP {
            return false;
        }
        let mut cur = addr;
        while cur < target {
            match Self::decode_supported(decoder, mem, backend, cur) {
                Some(insn) => cur = insn.next_addr(),
                None => return false,
            }
        }
        cur == target
    }

    /// Pass 0: find the instruction boundaries of the unit.
    ///
    /// Returns the instruction count; zero means there is nothing to
    /// translate at the origin.
    pub fn discover(
        &mut self,
        decoder: &dyn X86Decoder,
        mem: &dyn GuestMemory,
        backend: &dyn HostEmitter,
    ) -> usize {
        let mut addr = self.origin_address;
        let mut count = 0;
        self.needs_epilogue = false;

        loop {
            if count >= self.max_insns {
                self.needs_epilogue = true;
                break;
            }
            let Some(insn) = Self::decode_supported(decoder, mem, backend, addr) else {
                self.needs_epilogue = true;
                break;
            };
            if let Some(dest) = insn.jump_dest {
                if dest > addr {
                    self.pending.add(dest);
                }
            }
            count += 1;
            addr = insn.next_addr();

            if insn.flow.ends_block() {
                match self.pending.pop_closest_at_or_after(addr) {
                    Some(target) if Self::can_bridge(decoder, mem, backend, addr, target) => {}
                    _ => break,
                }
            }
        }

        self.instruction_count = count;
        self.x86_size = (addr - self.origin_address) as usize;
        count
    }

    /// Pass 1: decode the discovered range into records, resolve jumps
    /// and barriers, and compute flag liveness.
    pub fn assign(&mut self, decoder: &dyn X86Decoder, mem: &dyn GuestMemory) {
        self.capacity = self.instruction_count + EPILOG_HEADROOM;
        self.instructions = Vec::with_capacity(self.capacity);

        let mut addr = self.origin_address;
        for _ in 0..self.instruction_count {
            let Some(insn) = decoder.decode(mem, addr) else {
                break;
            };
            addr = insn.next_addr();
            self.instructions.push(InstructionRecord::new(insn));
        }
        if self.instructions.len() != self.instruction_count {
            // The bytes changed under us; translate what still decodes.
            tracing::warn!(
                "unit {:#x}: {} of {} instructions decoded again",
                self.origin_address,
                self.instructions.len(),
                self.instruction_count
            );
            self.instruction_count = self.instructions.len();
            self.x86_size = (addr - self.origin_address) as usize;
            self.needs_epilogue = true;
        }

        self.anomalies = resolve_jumps(&mut self.instructions);
        compute_flag_liveness(&mut self.instructions);
    }

    /// Pass 2: measure the host code without writing it.
    ///
    /// Records each instruction's host offset and size, the number of
    /// exit records, and the son entry points. Returns the byte count
    /// to allocate.
    pub fn measure(&mut self, backend: &dyn HostEmitter) -> usize {
        let mut sink = SizeCounter::new();
        let mut st = EmitState::sizing(self.standalone, 0);

        for i in 0..self.instructions.len() {
            let offset = sink.offset();
            backend.emit_insn(&mut sink, &mut st, &self.instructions, i);
            self.instructions[i].host = HostInfo {
                offset,
                size: sink.offset() - offset,
            };
        }
        if self.needs_epilogue {
            backend.emit_exit(&mut sink, &mut st, self.end_address());
        }

        self.jump_table_size = st.records_used();
        self.child_targets = self
            .instructions
            .iter()
            .skip(1)
            .filter(|r| r.x86.barrier)
            .map(|r| r.x86.addr)
            .collect();
        self.emitted_size = sink.offset();
        self.emitted_size
    }

    /// Pass 3: write the code into `region`.
    ///
    /// Returns `false` if the writes ran past the region, in which case
    /// the code is truncated and must not be published.
    pub fn emit(
        &mut self,
        backend: &dyn HostEmitter,
        region: &mut CodeRegion,
        table: Option<&JumpTable>,
        dispatch_addr: u64,
    ) -> bool {
        let base = region.addr();
        let predicted = self.emitted_size;
        self.emitted_start = base;
        self.child_emitted_addresses.clear();

        let mut writer = CodeWriter::new(region.as_mut_slice(), base);
        let mut st = EmitState::emitting(self.standalone, dispatch_addr, table);

        for i in 0..self.instructions.len() {
            let offset = writer.offset();
            let host = self.instructions[i].host;
            if offset != host.offset {
                tracing::debug!(
                    "insn {i} at {:#x}: host offset {offset} in emission, {} when sizing",
                    self.instructions[i].x86.addr,
                    host.offset
                );
            }
            if i > 0 && self.instructions[i].x86.barrier {
                self.child_emitted_addresses.push(base + offset as u64);
            }
            backend.emit_insn(&mut writer, &mut st, &self.instructions, i);
        }
        if self.needs_epilogue {
            backend.emit_exit(&mut writer, &mut st, self.end_address());
        }

        let written = writer.offset();
        if written != predicted {
            tracing::warn!(
                "size difference in unit {:#x} between sizing ({predicted}) and emission ({written})",
                self.origin_address
            );
        }
        self.emitted_size = written;
        !writer.overflowed()
    }
}
