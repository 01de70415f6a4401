//! Runtime tunables.
//!
//! The runtime has no configuration file; everything comes from defaults,
//! optionally overridden by environment variables read once per thread
//! when the process arena is first touched.

use crate::block::{DEFAULT_BLOCK_CAPACITY, MAX_ALIGN};

/// Filter directive for the tracing subscriber (`EnvFilter` syntax).
pub const LOG_ENV: &str = "SWEET_LOG";

/// Presence of this variable turns on debug logging for the runtime.
pub const DEBUG_ENV: &str = "LIBSW_DEBUG";

/// Minimum arena block capacity in bytes.
pub const BLOCK_SIZE_ENV: &str = "SWEET_BLOCK_SIZE";

/// Starting buffer size for line input.
pub const DEFAULT_LINE_CAPACITY: usize = 64;

const DEFAULT_LOG_FILTER: &str = if cfg!(feature = "debug_runtime") {
    "debug"
} else {
    "warn"
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    block_capacity: usize,
}

impl ArenaConfig {
    /// Arena whose blocks hold at least `block_capacity` bytes.
    ///
    /// The value is rounded up to a multiple of [`MAX_ALIGN`]; zero becomes
    /// one alignment unit.
    pub fn new(block_capacity: usize) -> Self {
        let block_capacity = block_capacity
            .max(MAX_ALIGN)
            .checked_next_multiple_of(MAX_ALIGN)
            .unwrap_or(usize::MAX - (usize::MAX % MAX_ALIGN));
        Self { block_capacity }
    }

    pub fn block_capacity(&self) -> usize {
        self.block_capacity
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_CAPACITY)
    }
}

/// Everything the process-level runtime reads at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub arena: ArenaConfig,
    pub line_capacity: usize,
    pub log_filter: String,
    /// Environment values that could not be used, reported once logging is up.
    pub rejected: Vec<(&'static str, String)>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::default(),
            line_capacity: DEFAULT_LINE_CAPACITY,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            rejected: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(filter) = lookup(LOG_ENV).filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        } else if lookup(DEBUG_ENV).is_some() {
            config.log_filter = "sweet_runtime=debug".to_owned();
        }

        if let Some(raw) = lookup(BLOCK_SIZE_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => config.arena = ArenaConfig::new(size),
                _ => config.rejected.push((BLOCK_SIZE_ENV, raw)),
            }
        }

        config
    }
}
