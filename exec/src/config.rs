use thiserror::Error;

use dynarec_backend::exec_mem::DEFAULT_CHUNK_SIZE;

/// Default cap on decoded instructions per unit.
pub const DEFAULT_MAX_INSNS: usize = 512;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: expected an unsigned integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var}: expected 0 or 1, got {value:?}")]
    InvalidBool { var: &'static str, value: String },

    #[error("{var}: {value} is out of range ({min}..={max})")]
    OutOfRange {
        var: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Translator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynarecConfig {
    /// 0: silent, 1: per-unit trace, 2: trace with ANSI highlighting.
    pub dump: u8,
    /// Units exit through jump-table records that the runtime can link.
    /// When off, every unit is standalone.
    pub linker: bool,
    pub max_insns: usize,
    pub chunk_size: usize,
    /// Upper bound on executable memory mapped for translated code.
    pub cache_limit: usize,
}

impl Default for DynarecConfig {
    fn default() -> Self {
        Self {
            dump: 0,
            linker: true,
            max_insns: DEFAULT_MAX_INSNS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            cache_limit: usize::MAX,
        }
    }
}

impl DynarecConfig {
    pub fn with_dump(mut self, dump: u8) -> Self {
        self.dump = dump;
        self
    }

    pub fn with_linker(mut self, linker: bool) -> Self {
        self.linker = linker;
        self
    }

    pub fn with_max_insns(mut self, max_insns: usize) -> Self {
        self.max_insns = max_insns.max(1);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_cache_limit(mut self, cache_limit: usize) -> Self {
        self.cache_limit = cache_limit;
        self
    }

    /// Units are built standalone when linking is off.
    #[inline]
    pub fn standalone(&self) -> bool {
        !self.linker
    }

    /// Read `DYNAREC_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build a config from a variable lookup; unset variables keep
    /// their defaults.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup("DYNAREC_DUMP") {
            cfg.dump = parse_num("DYNAREC_DUMP", &v, 0, 2)? as u8;
        }
        if let Some(v) = lookup("DYNAREC_LINKER") {
            cfg.linker = parse_bool("DYNAREC_LINKER", &v)?;
        }
        if let Some(v) = lookup("DYNAREC_MAX_INSNS") {
            cfg.max_insns = parse_num("DYNAREC_MAX_INSNS", &v, 1, 1 << 16)? as usize;
        }
        if let Some(v) = lookup("DYNAREC_CHUNK_SIZE") {
            cfg.chunk_size = parse_num("DYNAREC_CHUNK_SIZE", &v, 4096, 1 << 30)? as usize;
        }
        if let Some(v) = lookup("DYNAREC_CACHE_LIMIT") {
            cfg.cache_limit = parse_num("DYNAREC_CACHE_LIMIT", &v, 0, u64::MAX)? as usize;
        }
        Ok(cfg)
    }
}

fn parse_num(var: &'static str, value: &str, min: u64, max: u64) -> Result<u64, ConfigError> {
    let s = value.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    let n = parsed.map_err(|_| ConfigError::InvalidNumber {
        var,
        value: value.to_string(),
    })?;
    if n < min || n > max {
        return Err(ConfigError::OutOfRange {
            var,
            value: n,
            min,
            max,
        });
    }
    Ok(n)
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: value.to_string(),
        }),
    }
}
