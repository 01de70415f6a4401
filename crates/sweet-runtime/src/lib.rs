//! Sweet runtime library.
//!
//! Provides the native functions required by Sweet's compiled output:
//! - Arena allocation (`new`, `arena_alloc_init`, `arena_alloc_new`, `arena_alloc_cleanup`)
//! - Printing (`print_int`, `print_str`)
//! - Comparison (`compare_int`, `compare_str`)
//! - Line input (`stdin_getline`)
//! - The program entry (`main` with the `program-entry` feature, or [`run_program`])
//!
//! Memory handed to generated code is never freed individually. It lives in a
//! per-thread [`Arena`] that is released in one pass when the program returns.

use std::ffi::c_void;
use std::io::Write;

pub mod arena;
pub mod block;
pub mod builtins;
pub mod config;
pub mod error;
pub mod line;
pub mod logging;
mod tls;


pub use arena::{Arena, ArenaStats};
pub use block::{Block, DEFAULT_BLOCK_CAPACITY, MAX_ALIGN};
pub use config::{ArenaConfig, RuntimeConfig};
pub use error::{ArenaError, ArenaResult, RuntimeError, RuntimeResult};
pub use line::{Line, LineReader};

use tls::with_thread_state;

// =============================================================================
// Fatal errors
//
// Generated code has no way to recover from a failed allocation, so at the C
// boundary every arena error ends the process.
// =============================================================================

pub(crate) fn fatal(context: &str, err: ArenaError) -> ! {
    tracing::error!(context, error = %err, "fatal allocation failure");
    let _ = std::io::stdout().flush();
    eprintln!("libsw: {context} failed: {err}");
    std::process::exit(1)
}

// =============================================================================
// Arena
// =============================================================================

/// Create this thread's arena head block (idempotent).
#[unsafe(no_mangle)]
pub extern "C" fn arena_alloc_init() {
    with_thread_state(|ts| {
        if let Err(e) = ts.arena.borrow().initialize() {
            fatal("arena_alloc_init", e);
        }
    });
}

/// Allocate `size` bytes from this thread's arena.
///
/// The result is aligned to [`MAX_ALIGN`], zero-filled, and valid until
/// [`arena_alloc_cleanup`]. Never returns null; allocation failure exits
/// the process.
#[unsafe(no_mangle)]
pub extern "C" fn arena_alloc_new(size: usize) -> *mut c_void {
    with_thread_state(|ts| match ts.arena.borrow().allocate(size) {
        Ok(ptr) => ptr.as_ptr().cast(),
        Err(e) => fatal("arena_alloc_new", e),
    })
}

/// Release every block of this thread's arena.
///
/// Everything previously returned by [`new`] or [`stdin_getline`](builtins::stdin_getline)
/// becomes invalid.
#[unsafe(no_mangle)]
pub extern "C" fn arena_alloc_cleanup() {
    with_thread_state(|ts| {
        ts.arena.borrow_mut().teardown();
    });
}

/// The allocation entry point used by generated code.
#[unsafe(no_mangle)]
pub extern "C" fn new(size: usize) -> *mut c_void {
    arena_alloc_new(size)
}

// =============================================================================
// Program entry
// =============================================================================

/// Run a generated program: set up logging and the arena, call `entry`,
/// then flush output and release the arena.
///
/// Returns the process exit status (always 0; failures exit directly).
///
/// # Safety
///
/// `entry` must be safe to call with no arguments on this thread.
pub unsafe fn run_program(entry: unsafe extern "C" fn()) -> i32 {
    let config = RuntimeConfig::from_env();
    logging::init(&config);
    tracing::debug!("libsw runtime v{}", env!("CARGO_PKG_VERSION"));

    arena_alloc_init();
    unsafe { entry() };
    let _ = std::io::stdout().flush();

    let stats = with_thread_state(|ts| ts.arena.borrow().stats());
    tracing::debug!(
        blocks = stats.block_count,
        used = stats.used,
        capacity = stats.capacity,
        "program finished"
    );
    arena_alloc_cleanup();
    0
}

#[cfg(all(feature = "program-entry", not(test)))]
mod program_entry {
    use std::ffi::{c_char, c_int};

    unsafe extern "C" {
        fn sweet_main();
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn main(_argc: c_int, _argv: *const *const c_char) -> c_int {
        unsafe { crate::run_program(sweet_main) }
    }
}
