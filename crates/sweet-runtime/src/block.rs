//! Block chain backing the arena.
//!
//! A [`Block`] is one contiguous, zero-initialized segment of arena storage.
//! Blocks form a singly linked list: each block owns its successor, and the
//! arena owns the head. Storage is append-only, so a pointer handed out by
//! [`Block::bump`] stays valid until the block itself is dropped.

use std::alloc::{self, Layout};
use std::cell::{Cell, OnceCell};
use std::ptr::NonNull;

use crate::config::ArenaConfig;
use crate::error::{ArenaError, ArenaResult};

/// Largest alignment any scalar type needs on this platform.
///
/// Every block starts on this boundary and every request is rounded up to a
/// multiple of it, so each returned pointer is usable for any scalar.
pub const MAX_ALIGN: usize = {
    let candidates = [
        std::mem::align_of::<u64>(),
        std::mem::align_of::<f64>(),
        std::mem::align_of::<u128>(),
        std::mem::align_of::<usize>(),
        std::mem::align_of::<*const u8>(),
    ];
    let mut align = 1;
    let mut i = 0;
    while i < candidates.len() {
        if candidates[i] > align {
            align = candidates[i];
        }
        i += 1;
    }
    align
};

/// Default minimum block capacity in bytes.
pub const DEFAULT_BLOCK_CAPACITY: usize = 4096;

/// One segment of arena storage.
///
/// The header and the data region are separate allocations: references handed
/// out point only into data regions, so linking a new block in never writes
/// to memory a caller has borrowed.
pub struct Block {
    /// Start of the data region (`capacity` bytes, `MAX_ALIGN`-aligned).
    data: NonNull<u8>,
    capacity: usize,
    used: Cell<usize>,
    next: OnceCell<Box<Block>>,
}

impl Block {
    /// Allocate a block holding at least `min_capacity` bytes.
    ///
    /// The capacity is the larger of the configured minimum and
    /// `min_capacity`, so an oversized request gets exactly one block that
    /// fits it.
    pub fn create(config: &ArenaConfig, min_capacity: usize) -> ArenaResult<Box<Block>> {
        let capacity = config
            .block_capacity()
            .max(min_capacity)
            .checked_next_multiple_of(MAX_ALIGN)
            .ok_or(ArenaError::CapacityOverflow {
                requested: min_capacity,
            })?;
        let layout = Self::layout(capacity)?;

        // SAFETY: `layout` has non-zero size (capacity >= MAX_ALIGN).
        let data = unsafe { alloc::alloc_zeroed(layout) };
        let data = NonNull::new(data).ok_or(ArenaError::OutOfMemory {
            requested: capacity,
        })?;

        Ok(Box::new(Block {
            data,
            capacity,
            used: Cell::new(0),
            next: OnceCell::new(),
        }))
    }

    fn layout(capacity: usize) -> ArenaResult<Layout> {
        Layout::from_size_align(capacity, MAX_ALIGN).map_err(|_| ArenaError::CapacityOverflow {
            requested: capacity,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.used.get()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.used.get()
    }

    /// Reserve the next `size` bytes and return a pointer to their start.
    ///
    /// # Safety
    ///
    /// `size` must not exceed [`remaining()`](Self::remaining). The arena
    /// checks this before calling.
    #[inline]
    pub unsafe fn bump(&self, size: usize) -> NonNull<u8> {
        debug_assert!(size <= self.remaining(), "bump past end of block");
        let offset = self.used.get();
        self.used.set(offset + size);
        // SAFETY: offset + size <= capacity, so the result is in bounds or
        // one past the end of the data region.
        unsafe { self.data.add(offset) }
    }

    /// Whether `ptr` points into this block's data region.
    pub fn contains(&self, ptr: *const u8) -> bool {
        let start = self.data.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= start && addr < start + self.capacity
    }

    pub fn next(&self) -> Option<&Block> {
        self.next.get().map(|b| &**b)
    }

    /// Link `block` after this one and return it.
    ///
    /// Only called on the tail.
    pub(crate) fn append(&self, block: Box<Block>) -> &Block {
        debug_assert!(self.next.get().is_none(), "append on a non-tail block");
        self.next.get_or_init(|| block)
    }

    /// Detach and return the successor, leaving this block as a tail.
    pub(crate) fn take_next(&mut self) -> Option<Box<Block>> {
        self.next.take()
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: `data` came from `alloc_zeroed` with this exact layout,
        // which was valid at creation time.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.capacity, MAX_ALIGN);
            alloc::dealloc(self.data.as_ptr(), layout);
        }
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("capacity", &self.capacity)
            .field("used", &self.used.get())
            .field("has_next", &self.next.get().is_some())
            .finish()
    }
}
