use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dynarec_frontend::GuestMemory;

use crate::unit::{TranslationUnit, UnitState};

/// Map from x86 entry address to the canonical unit for it.
///
/// At most one live unit exists per address. Retired units are replaced
/// on the next lookup.
pub struct UnitRegistry {
    units: DashMap<u64, Arc<TranslationUnit>>,
    standalone: bool,
}

impl UnitRegistry {
    /// `standalone` is stamped on every unit the registry creates.
    pub fn new(standalone: bool) -> Self {
        Self {
            units: DashMap::new(),
            standalone,
        }
    }

    #[inline]
    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    /// Return the unit for `addr`, creating an empty one if there is
    /// none. The flag is `true` when this call created it.
    pub fn lookup_or_create(&self, addr: u64) -> (Arc<TranslationUnit>, bool) {
        match self.units.entry(addr) {
            Entry::Occupied(mut entry) => {
                if entry.get().state() != UnitState::Retired {
                    return (entry.get().clone(), false);
                }
                let unit = Arc::new(TranslationUnit::new(addr, self.standalone));
                entry.insert(unit.clone());
                (unit, true)
            }
            Entry::Vacant(entry) => {
                let unit = Arc::new(TranslationUnit::new(addr, self.standalone));
                entry.insert(unit.clone());
                (unit, true)
            }
        }
    }

    /// The live unit registered at `addr`, in whatever state it is.
    pub fn get(&self, addr: u64) -> Option<Arc<TranslationUnit>> {
        let unit = self.units.get(&addr)?.clone();
        (unit.state() != UnitState::Retired).then_some(unit)
    }

    /// Like [`get`](Self::get), but a standalone unit whose source bytes
    /// changed is retired and dropped instead of returned.
    pub fn get_valid(&self, addr: u64, mem: &dyn GuestMemory) -> Option<Arc<TranslationUnit>> {
        let unit = self.get(addr)?;
        if unit.is_ready() && unit.is_stale(mem) {
            tracing::debug!("unit {addr:#x} source changed, retiring");
            unit.retire();
            self.remove(&unit);
            return None;
        }
        Some(unit)
    }

    /// Drop `unit` from the registry if it is still the one registered
    /// at its entry address.
    pub fn remove(&self, unit: &Arc<TranslationUnit>) -> bool {
        self.units
            .remove_if(&unit.entry(), |_, u| Arc::ptr_eq(u, unit))
            .is_some()
    }

    /// Retire and drop every unit overlapping `[addr, addr + len)`.
    ///
    /// Returns the number of units removed.
    pub fn invalidate_range(&self, addr: u64, len: u64) -> usize {
        let mut removed = 0;
        self.units.retain(|_, unit| {
            if unit.overlaps(addr, len) {
                unit.retire();
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Retire and drop every unit.
    pub fn flush(&self) {
        for entry in self.units.iter() {
            entry.value().retire();
        }
        self.units.clear();
    }
}
