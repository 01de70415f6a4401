//! Per-thread runtime state behind the C entry points.
//!
//! Generated code calls `new`, `stdin_getline` and friends without passing
//! any context, so the arena those calls use has to live somewhere. It lives
//! here, one per thread, created on first access from
//! [`RuntimeConfig::from_env`]. Settings that fail to parse are reported when
//! the state is created, so embedders calling `new` directly see them too.
//! Rust callers should hold their own [`Arena`] instead.

use std::cell::RefCell;

use crate::arena::Arena;
use crate::config::RuntimeConfig;
use crate::line::LineReader;
use crate::logging;

pub(crate) struct ThreadState {
    /// Borrowed shared for allocation, exclusively only for teardown.
    pub(crate) arena: RefCell<Arena>,
    pub(crate) line_reader: LineReader,
}

impl ThreadState {
    fn new(config: &RuntimeConfig) -> Self {
        logging::report_rejected(config);
        Self {
            arena: RefCell::new(Arena::with_config(config.arena)),
            line_reader: LineReader::new(config.line_capacity),
        }
    }
}

thread_local! {
    static THREAD_STATE: ThreadState = ThreadState::new(&RuntimeConfig::from_env());
}

/// Run `f` with this thread's runtime state.
pub(crate) fn with_thread_state<R>(f: impl FnOnce(&ThreadState) -> R) -> R {
    THREAD_STATE.with(f)
}
