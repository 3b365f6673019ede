//! x86 frontend: guest memory access, instruction decoding and
//! padding recognition.

pub mod nops;
pub mod x86;

pub use nops::{is_nops, is_nops_at};
pub use x86::IcedDecoder;

use dynarec_core::X86Insn;

/// Read-only view of guest code bytes.
pub trait GuestMemory: Send + Sync {
    /// Up to `max` bytes starting at `addr`; shorter (possibly empty)
    /// when the range runs off mapped memory.
    fn fetch(&self, addr: u64, max: usize) -> &[u8];
}

/// Decodes one x86 instruction into a translator record.
pub trait X86Decoder: Send + Sync {
    /// Decode the instruction at `addr`, or `None` when the bytes are
    /// not a valid instruction or are not fully mapped.
    fn decode(&self, mem: &dyn GuestMemory, addr: u64) -> Option<X86Insn>;
}

/// A contiguous guest image mapped at `base`.
#[derive(Debug, Clone, Default)]
pub struct FlatMemory {
    base: u64,
    bytes: Vec<u8>,
}

impl FlatMemory {
    pub fn new(base: u64, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    #[inline]
    pub fn base(&self) -> u64 {
        self.base
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.base + self.bytes.len() as u64
    }

    /// Overwrite guest bytes at `addr` (models self-modifying code).
    ///
    /// Returns `false` and leaves memory untouched when the range is not
    /// fully mapped.
    pub fn write(&mut self, addr: u64, data: &[u8]) -> bool {
        let Some(start) = addr.checked_sub(self.base) else {
            return false;
        };
        let start = start as usize;
        let Some(end) = start.checked_add(data.len()) else {
            return false;
        };
        if end > self.bytes.len() {
            return false;
        }
        self.bytes[start..end].copy_from_slice(data);
        true
    }
}

impl GuestMemory for FlatMemory {
    fn fetch(&self, addr: u64, max: usize) -> &[u8] {
        if addr < self.base || addr >= self.end() {
            return &[];
        }
        let start = (addr - self.base) as usize;
        let end = start.saturating_add(max).min(self.bytes.len());
        &self.bytes[start..end]
    }
}
