//! Built-in functions for Sweet programs
//!
//! The compiler lowers printing, the `?` comparison and line input to calls
//! into this module. Each C entry point is a thin wrapper over a Rust
//! function that takes its output, input or arena explicitly.

use std::ffi::{CStr, c_char, c_long};
use std::io::{self, BufRead, Write};

use crate::arena::Arena;
use crate::error::RuntimeError;
use crate::line::LineReader;
use crate::tls::with_thread_state;

/// Integer equality as the `?` operator sees it.
pub fn int_equals(a: usize, b: usize) -> bool {
    let result = a == b;
    tracing::trace!(a, b, result, "int@compare");
    result
}

/// Byte-wise string equality. Lengths are compared first; there is no case
/// folding or locale handling.
pub fn str_equals(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        tracing::trace!(
            a = %a.escape_ascii(),
            b = %b.escape_ascii(),
            "string@compare: length mismatch"
        );
        return false;
    }
    let result = a == b;
    tracing::trace!(a = %a.escape_ascii(), b = %b.escape_ascii(), result, "string@compare");
    result
}

/// Format an integer the way `print_int` does (decimal, no newline).
pub fn write_int<W: Write + ?Sized>(out: &mut W, value: i64) -> io::Result<()> {
    write!(out, "{value}")
}

/// Write raw string bytes the way `print_str` does (no newline).
pub fn write_str<W: Write + ?Sized>(out: &mut W, s: &[u8]) -> io::Result<()> {
    out.write_all(s)
}

/// Borrow a C string, or `None` for null.
///
/// # Safety
///
/// A non-null `ptr` must point to a NUL-terminated string that outlives `'a`.
unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a [u8]> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_bytes())
    }
}

/// Print an integer to stdout
#[unsafe(no_mangle)]
pub extern "C" fn print_int(val: c_long) {
    // Output errors are dropped, as with printf
    let _ = write_int(&mut io::stdout().lock(), i64::from(val));
}

/// Print a string to stdout
///
/// # Safety
///
/// `s` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn print_str(s: *const c_char) {
    let bytes = unsafe { c_str(s) }.unwrap_or(b"(null)".as_slice());
    let _ = write_str(&mut io::stdout().lock(), bytes);
}

/// Compare two integers; returns 1 if equal, 0 otherwise
#[unsafe(no_mangle)]
pub extern "C" fn compare_int(a: usize, b: usize) -> usize {
    usize::from(int_equals(a, b))
}

/// Compare two strings; returns 1 if equal, 0 otherwise
///
/// Two nulls compare equal; a null never equals a string.
///
/// # Safety
///
/// Each argument must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn compare_str(str1: *const c_char, str2: *const c_char) -> usize {
    let equal = match unsafe { (c_str(str1), c_str(str2)) } {
        (Some(a), Some(b)) => str_equals(a, b),
        (None, None) => true,
        _ => false,
    };
    usize::from(equal)
}

/// Read a line from stdin into this thread's arena
///
/// Returns null at end of input. The returned string is NUL-terminated,
/// without its newline, and valid until the arena is cleaned up.
#[unsafe(no_mangle)]
pub extern "C" fn stdin_getline() -> *mut c_char {
    with_thread_state(|ts| {
        let arena = ts.arena.borrow();
        getline(&ts.line_reader, &arena, &mut io::stdin().lock())
    })
}

/// `stdin_getline` over any input. A read error counts as end of input and
/// drops whatever part of the line was already read.
fn getline<R: BufRead + ?Sized>(reader: &LineReader, arena: &Arena, input: &mut R) -> *mut c_char {
    match reader.read_line(arena, input) {
        Ok(Some(line)) => line.as_ptr().cast_mut(),
        Ok(None) => std::ptr::null_mut(),
        Err(RuntimeError::Io(e)) => {
            tracing::warn!(error = %e, "stdin_getline: read failed, treating as end of input");
            std::ptr::null_mut()
        }
        Err(RuntimeError::Arena(e)) => crate::fatal("stdin_getline", e),
    }
}
