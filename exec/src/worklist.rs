/// Growth step of the worklist's backing storage, in slots.
const GROW: usize = 16;

/// Deduplicating set of x86 addresses still to be explored by
/// discovery.
///
/// Worklists stay small (a handful of forward jump targets per unit),
/// so membership is a linear scan.
#[derive(Debug, Clone, Default)]
pub struct AddressWorklist {
    addrs: Vec<u64>,
}

impl AddressWorklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `addr` unless it is already present.
    pub fn add(&mut self, addr: u64) {
        if self.addrs.contains(&addr) {
            return;
        }
        if self.addrs.len() == self.addrs.capacity() {
            self.addrs.reserve_exact(GROW);
        }
        self.addrs.push(addr);
    }

    /// Drop every address below `floor`, then remove and return the
    /// smallest remaining one.
    pub fn pop_closest_at_or_after(&mut self, floor: u64) -> Option<u64> {
        self.addrs.retain(|&a| a >= floor);
        let (idx, &best) = self
            .addrs
            .iter()
            .enumerate()
            .min_by_key(|&(_, &a)| a)?;
        self.addrs.swap_remove(idx);
        Some(best)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    /// Slots currently reserved.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.addrs.capacity()
    }

    pub fn clear(&mut self) {
        self.addrs.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.addrs.iter().copied()
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.addrs.contains(&addr)
    }
}
