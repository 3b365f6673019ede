use std::sync::atomic::{AtomicU64, Ordering};

/// Number of `u64` slots per jump-table record.
pub const JMP_TABLE_STRIDE: usize = 4;

/// Host address of the dispatcher that resolves `TARGET`.
pub const SLOT_DISPATCH: usize = 0;
/// x86 destination of the exit.
pub const SLOT_TARGET: usize = 1;
/// Back-pointer to the owning unit, fixed after allocation.
pub const SLOT_OWNER: usize = 2;
/// Host code of the resolved destination, 0 until linked.
pub const SLOT_LINK: usize = 3;

/// Exit records used by emitted code for transfers out of a unit.
///
/// Emitted code bakes in the absolute address of each record, so the
/// slots live in a boxed slice that never moves.
pub struct JumpTable {
    slots: Box<[AtomicU64]>,
}

impl JumpTable {
    pub fn new(records: usize) -> Self {
        let slots = (0..records * JMP_TABLE_STRIDE)
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { slots }
    }

    /// Number of records.
    #[inline]
    pub fn records(&self) -> usize {
        self.slots.len() / JMP_TABLE_STRIDE
    }

    /// Size in `u64` slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Host address of the first slot.
    #[inline]
    pub fn base_addr(&self) -> u64 {
        self.slots.as_ptr() as u64
    }

    /// Host address of record `idx`.
    #[inline]
    pub fn record_addr(&self, idx: usize) -> u64 {
        assert!(idx < self.records(), "jump table record out of bounds");
        self.base_addr() + (idx * JMP_TABLE_STRIDE * 8) as u64
    }

    pub fn get(&self, idx: usize, slot: usize) -> u64 {
        assert!(slot < JMP_TABLE_STRIDE);
        self.slots[idx * JMP_TABLE_STRIDE + slot].load(Ordering::Acquire)
    }

    pub fn set(&self, idx: usize, slot: usize, val: u64) {
        assert!(slot < JMP_TABLE_STRIDE);
        self.slots[idx * JMP_TABLE_STRIDE + slot].store(val, Ordering::Release);
    }

    /// Write the owner back-pointer into every record.
    pub fn fix_owner(&self, owner: u64) {
        for idx in 0..self.records() {
            self.set(idx, SLOT_OWNER, owner);
        }
    }

    /// Record `idx` now branches straight to `host_code`.
    pub fn link(&self, idx: usize, host_code: u64) {
        self.set(idx, SLOT_LINK, host_code);
    }

    /// Drop every cached link, sending all exits back to the dispatcher.
    pub fn unlink_all(&self) {
        for idx in 0..self.records() {
            self.set(idx, SLOT_LINK, 0);
        }
    }
}

impl std::fmt::Debug for JumpTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JumpTable")
            .field("base", &format_args!("{:#x}", self.base_addr()))
            .field("records", &self.records())
            .finish()
    }
}

/// X31 hash of a byte range, used to detect modified guest code.
pub fn x31_hash(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |h, &b| (h << 5).wrapping_sub(h).wrapping_add(b as u32))
}
