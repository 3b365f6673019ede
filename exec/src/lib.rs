//! Block translator: turns x86 code into published translation units.
//!
//! [`Dynarec::lookup_or_build`] is the runtime's entry point: it finds
//! or creates the unit for an address in the [`UnitRegistry`] and, if
//! this caller wins the build claim, runs the translation passes
//! (see [`pipeline`]) and publishes the result (see [`builder`]).

pub mod builder;
pub mod config;
pub mod guard;
pub mod liveness;
pub mod pipeline;
pub mod registry;
pub mod resolve;
pub mod unit;
pub mod worklist;

pub use config::{ConfigError, DynarecConfig};
pub use guard::{GuardError, NoGuard, PageGuard, SourceGuard};
pub use liveness::{compute_flag_liveness, needed_flags};
pub use pipeline::{TranslationContext, EPILOG_HEADROOM};
pub use registry::UnitRegistry;
pub use resolve::resolve_jumps;
pub use unit::{TranslationUnit, UnitBody, UnitState};
pub use worklist::AddressWorklist;

use std::sync::Arc;

use dynarec_backend::{CodeArena, ExecAllocator, HostEmitter};
use dynarec_disas::SymbolResolver;
use dynarec_frontend::{GuestMemory, IcedDecoder};

/// Translation state shared by every thread of the emulated process.
pub struct Dynarec<B: HostEmitter> {
    pub registry: UnitRegistry,
    pub backend: B,
    pub config: DynarecConfig,
    pub decoder: IcedDecoder,
    pub allocator: Box<dyn ExecAllocator>,
    pub guard: Box<dyn SourceGuard>,
    pub symbols: Option<Box<dyn SymbolResolver>>,
    /// Host address of the runtime's dispatcher, stored in every exit
    /// record.
    pub dispatch_addr: u64,
}

impl<B: HostEmitter> Dynarec<B> {
    pub fn new(backend: B, config: DynarecConfig) -> Self {
        let allocator = CodeArena::new(config.chunk_size, config.cache_limit);
        Self {
            registry: UnitRegistry::new(config.standalone()),
            backend,
            decoder: IcedDecoder::new(),
            allocator: Box::new(allocator),
            guard: Box::new(NoGuard),
            symbols: None,
            dispatch_addr: 0,
            config,
        }
    }

    pub fn with_allocator(mut self, allocator: impl ExecAllocator + 'static) -> Self {
        self.allocator = Box::new(allocator);
        self
    }

    pub fn with_guard(mut self, guard: impl SourceGuard + 'static) -> Self {
        self.guard = Box::new(guard);
        self
    }

    pub fn with_symbols(mut self, symbols: impl SymbolResolver + 'static) -> Self {
        self.symbols = Some(Box::new(symbols));
        self
    }

    pub fn with_dispatcher(mut self, dispatch_addr: u64) -> Self {
        self.dispatch_addr = dispatch_addr;
        self
    }

    /// Translate `unit` if this caller wins the build claim.
    ///
    /// Always returns the handle. Callers check [`TranslationUnit::is_ready`]
    /// (or `code_ptr`) before running it and fall back to interpretation
    /// otherwise.
    pub fn build(&self, mem: &dyn GuestMemory, unit: Arc<TranslationUnit>) -> Arc<TranslationUnit> {
        if unit.try_begin_build() {
            builder::fill_unit(self, mem, &unit);
        }
        unit
    }

    /// Find the unit for `addr`, translating it on first use.
    pub fn lookup_or_build(&self, mem: &dyn GuestMemory, addr: u64) -> Arc<TranslationUnit> {
        if let Some(unit) = self.registry.get_valid(addr, mem) {
            if unit.is_done() {
                return unit;
            }
        }
        let (unit, _) = self.registry.lookup_or_create(addr);
        self.build(mem, unit)
    }
}
