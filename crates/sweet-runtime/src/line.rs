//! Line input backed by the arena.
//!
//! The buffer starts small and doubles whenever the next chunk of input would
//! not fit (with room for the trailing NUL). Each growth allocates a fresh
//! region and copies the bytes read so far into it; the old region cannot be
//! returned to the arena and is simply left behind.

use std::ffi::c_char;
use std::io::{BufRead, ErrorKind};

use crate::arena::Arena;
use crate::config::DEFAULT_LINE_CAPACITY;
use crate::error::{ArenaError, RuntimeResult};

/// A line stored in the arena, followed by a NUL byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Line bytes plus the terminating NUL.
    bytes_with_nul: &'a [u8],
}

impl<'a> Line<'a> {
    /// The line without its terminator.
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.bytes_with_nul[..self.len()]
    }

    pub fn as_bytes_with_nul(&self) -> &'a [u8] {
        self.bytes_with_nul
    }

    /// Pointer to the NUL-terminated line, as handed to generated code.
    pub fn as_ptr(&self) -> *const c_char {
        self.bytes_with_nul.as_ptr().cast()
    }

    pub fn len(&self) -> usize {
        self.bytes_with_nul.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineReader {
    initial_capacity: usize,
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_CAPACITY)
    }
}

impl LineReader {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            initial_capacity: initial_capacity.max(1),
        }
    }

    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    /// Read bytes up to a `\n` or end of input.
    ///
    /// Returns `Ok(None)` when the input is already exhausted. The newline
    /// is consumed but not stored. A final line without a newline is
    /// returned as-is.
    pub fn read_line<'a, R: BufRead + ?Sized>(
        &self,
        arena: &'a Arena,
        input: &mut R,
    ) -> RuntimeResult<Option<Line<'a>>> {
        let mut capacity = self.initial_capacity;
        let mut buffer: &'a mut [u8] = arena.alloc_bytes(capacity)?;
        let mut length = 0;
        let mut growths = 0;
        let mut saw_newline = false;

        loop {
            let available = match input.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if available.is_empty() {
                break;
            }

            let (chunk, newline) = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => (&available[..pos], true),
                None => (available, false),
            };

            let needed = length + chunk.len() + 1;
            if needed > capacity {
                while capacity < needed {
                    capacity = capacity
                        .checked_mul(2)
                        .ok_or(ArenaError::CapacityOverflow { requested: needed })?;
                }
                let grown = arena.alloc_bytes(capacity)?;
                grown[..length].copy_from_slice(&buffer[..length]);
                buffer = grown;
                growths += 1;
            }

            buffer[length..length + chunk.len()].copy_from_slice(chunk);
            length += chunk.len();

            let consumed = chunk.len() + usize::from(newline);
            input.consume(consumed);
            if newline {
                saw_newline = true;
                break;
            }
        }

        if length == 0 && !saw_newline {
            tracing::trace!("line input exhausted");
            return Ok(None);
        }

        buffer[length] = 0;
        tracing::trace!(length, capacity, growths, "line read");
        let buffer: &'a [u8] = buffer;
        Ok(Some(Line {
            bytes_with_nul: &buffer[..=length],
        }))
    }
}
