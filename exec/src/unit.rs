use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use dynarec_backend::CodeSpan;
use dynarec_core::{x31_hash, JumpTable};
use dynarec_frontend::GuestMemory;

/// Build state of a translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UnitState {
    /// Created by the registry, not yet claimed by a builder.
    Pending = 0,
    /// One thread is filling the unit.
    Building = 1,
    /// Nothing translatable at the entry point.
    Empty = 2,
    /// No executable memory was available; may be retried.
    Failed = 3,
    /// Published and executable.
    Ready = 4,
    /// Invalidated; must not be entered again.
    Retired = 5,
}

impl UnitState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => UnitState::Pending,
            1 => UnitState::Building,
            2 => UnitState::Empty,
            3 => UnitState::Failed,
            4 => UnitState::Ready,
            _ => UnitState::Retired,
        }
    }
}

/// Everything a finished build produces. Immutable once published.
#[derive(Debug)]
pub struct UnitBody {
    pub x86_addr: u64,
    pub x86_size: usize,
    pub insn_count: usize,
    pub code: CodeSpan,
    /// Exit records; absent for standalone units.
    pub jump_table: Option<Arc<JumpTable>>,
    /// X31 hash of the source bytes (standalone units only).
    pub hash: u32,
    /// Size predicted by the size pass.
    pub predicted_size: usize,
    pub parent: Option<Weak<TranslationUnit>>,
    pub sons: Vec<Arc<TranslationUnit>>,
}

/// A translated block as seen by the registry and the runtime.
///
/// The unit is shared before it is built. The builder stores the body
/// first and then moves `state` to `Ready` with a release store;
/// readers must observe `Ready` (acquire) before touching the code.
#[derive(Debug)]
pub struct TranslationUnit {
    entry: u64,
    standalone: bool,
    state: AtomicU8,
    body: OnceLock<UnitBody>,
}

impl TranslationUnit {
    pub fn new(entry: u64, standalone: bool) -> Self {
        Self {
            entry,
            standalone,
            state: AtomicU8::new(UnitState::Pending as u8),
            body: OnceLock::new(),
        }
    }

    #[inline]
    pub fn entry(&self) -> u64 {
        self.entry
    }

    #[inline]
    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    #[inline]
    pub fn state(&self) -> UnitState {
        UnitState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: UnitState, to: UnitState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claim the unit for building. Only one caller wins; a failed unit
    /// can be claimed again.
    pub fn try_begin_build(&self) -> bool {
        self.transition(UnitState::Pending, UnitState::Building)
            || self.transition(UnitState::Failed, UnitState::Building)
    }

    pub fn finish_empty(&self) -> bool {
        self.transition(UnitState::Building, UnitState::Empty)
    }

    pub fn finish_failed(&self) -> bool {
        self.transition(UnitState::Building, UnitState::Failed)
    }

    /// Store the body and make the unit executable.
    ///
    /// Returns `false` if the unit was retired while building; the body
    /// is kept but the unit never becomes `Ready`.
    pub fn publish(&self, body: UnitBody) -> bool {
        if self.body.set(body).is_err() {
            tracing::warn!("unit {:#x} published twice", self.entry);
            return false;
        }
        // Release pairs with the acquire load in `state()`.
        self.state
            .compare_exchange(
                UnitState::Building as u8,
                UnitState::Ready as u8,
                Ordering::Release,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Invalidate the unit and every son built from its code.
    pub fn retire(&self) {
        let prev = self.state.swap(UnitState::Retired as u8, Ordering::AcqRel);
        if prev == UnitState::Retired as u8 {
            return;
        }
        if let Some(body) = self.body.get() {
            if let Some(table) = &body.jump_table {
                table.unlink_all();
            }
            for son in &body.sons {
                son.retire();
            }
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state() == UnitState::Ready
    }

    /// The build has finished: there is code, or there is nothing to
    /// translate.
    #[inline]
    pub fn is_done(&self) -> bool {
        matches!(self.state(), UnitState::Ready | UnitState::Empty)
    }

    /// Host entry point, once published.
    pub fn code_ptr(&self) -> Option<*const u8> {
        if !self.is_ready() {
            return None;
        }
        self.body.get().map(|b| b.code.as_ptr())
    }

    /// Published body. Stays readable after retirement.
    pub fn body(&self) -> Option<&UnitBody> {
        match self.state() {
            UnitState::Ready | UnitState::Retired => self.body.get(),
            _ => None,
        }
    }

    pub fn sons(&self) -> &[Arc<TranslationUnit>] {
        self.body().map_or(&[], |b| b.sons.as_slice())
    }

    pub fn parent(&self) -> Option<Arc<TranslationUnit>> {
        self.body()?.parent.as_ref()?.upgrade()
    }

    /// x86 byte range `[start, end)`: the translated extent when built,
    /// else just the entry byte.
    pub fn x86_range(&self) -> (u64, u64) {
        match self.body.get() {
            Some(b) => (b.x86_addr, b.x86_addr + b.x86_size as u64),
            None => (self.entry, self.entry + 1),
        }
    }

    pub fn overlaps(&self, addr: u64, len: u64) -> bool {
        let (start, end) = self.x86_range();
        addr < end && start < addr.saturating_add(len)
    }

    /// Whether the source bytes of a standalone unit changed since it
    /// was translated.
    pub fn is_stale(&self, mem: &dyn GuestMemory) -> bool {
        if !self.standalone {
            return false;
        }
        let Some(body) = self.body() else {
            return false;
        };
        let bytes = mem.fetch(body.x86_addr, body.x86_size);
        bytes.len() != body.x86_size || x31_hash(bytes) != body.hash
    }
}
