//! Bump-pointer arena over a growable block chain.
//!
//! The [`Arena`] is the only source of memory for generated Sweet code and
//! for the runtime's own buffers. It hands out regions by bumping an offset
//! inside a [`Block`], appends a new block at the tail when none of the
//! existing ones has room, and releases everything at once on
//! [`teardown`](Arena::teardown). There is no per-allocation free.
//!
//! # Example
//!
//! ```
//! use sweet_runtime::{Arena, MAX_ALIGN};
//!
//! let arena = Arena::new();
//! let ptr = arena.allocate(10).unwrap();
//! assert_eq!(ptr.as_ptr() as usize % MAX_ALIGN, 0);
//!
//! let greeting = arena.alloc_slice_copy(b"hello").unwrap();
//! assert_eq!(greeting, b"hello");
//! ```
//!
//! Regions returned by the safe APIs borrow the arena, so tearing it down
//! while they are alive does not compile:
//!
//! ```compile_fail
//! use sweet_runtime::Arena;
//!
//! let mut arena = Arena::new();
//! let bytes = arena.alloc_bytes(8).unwrap();
//! arena.teardown();
//! bytes[0] = 1;
//! ```

use std::cell::{Cell, OnceCell};
use std::ptr::NonNull;

use crate::block::{Block, MAX_ALIGN};
use crate::config::ArenaConfig;
use crate::error::{ArenaError, ArenaResult};

/// Point-in-time view of an arena's block chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Blocks currently in the chain.
    pub block_count: usize,
    /// Sum of block capacities.
    pub capacity: usize,
    /// Sum of bytes handed out (after rounding).
    pub used: usize,
    /// Blocks created over the arena's lifetime.
    pub blocks_created: usize,
    /// Blocks released over the arena's lifetime.
    pub blocks_released: usize,
}

/// A single-threaded bump allocator.
///
/// Not `Sync`: the C entry points keep one arena per thread.
pub struct Arena {
    config: ArenaConfig,
    head: OnceCell<Box<Block>>,
    blocks_created: Cell<usize>,
    blocks_released: Cell<usize>,
}

impl Arena {
    /// Create an uninitialized arena with the default block capacity.
    pub fn new() -> Self {
        Self::with_config(ArenaConfig::default())
    }

    pub fn with_config(config: ArenaConfig) -> Self {
        Self {
            config,
            head: OnceCell::new(),
            blocks_created: Cell::new(0),
            blocks_released: Cell::new(0),
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.head.get().is_some()
    }

    /// Create the head block if it does not exist yet.
    ///
    /// Calling this more than once is a no-op.
    pub fn initialize(&self) -> ArenaResult<()> {
        self.head().map(|_| ())
    }

    fn head(&self) -> ArenaResult<&Block> {
        if let Some(head) = self.head.get() {
            return Ok(&**head);
        }
        let block = self.create_block(0)?;
        tracing::debug!(capacity = block.capacity(), "arena initialized");
        Ok(&**self.head.get_or_init(|| block))
    }

    fn create_block(&self, min_capacity: usize) -> ArenaResult<Box<Block>> {
        let block = Block::create(&self.config, min_capacity)?;
        self.blocks_created.set(self.blocks_created.get() + 1);
        Ok(block)
    }

    /// Reserve `size` bytes and return a pointer to the start of the region.
    ///
    /// The size is rounded up to a multiple of [`MAX_ALIGN`] and the pointer
    /// is aligned to it. The region stays valid, and never moves, until
    /// [`teardown`](Self::teardown). Its contents start out zeroed.
    ///
    /// The chain is scanned from the head; the first block with enough room
    /// serves the request. Otherwise a block of at least the rounded size is
    /// appended at the tail.
    pub fn allocate(&self, size: usize) -> ArenaResult<NonNull<u8>> {
        let rounded = size
            .checked_next_multiple_of(MAX_ALIGN)
            .ok_or(ArenaError::CapacityOverflow { requested: size })?;

        let mut block = self.head()?;
        loop {
            if rounded <= block.remaining() {
                // SAFETY: checked against `remaining()` just above.
                let ptr = unsafe { block.bump(rounded) };
                tracing::trace!(size, rounded, ptr = ?ptr, "arena allocation");
                return Ok(ptr);
            }
            match block.next() {
                Some(next) => block = next,
                None => break,
            }
        }

        let tail = block.append(self.create_block(rounded)?);
        tracing::debug!(
            capacity = tail.capacity(),
            blocks = self.blocks_created.get() - self.blocks_released.get(),
            "arena block appended"
        );
        // SAFETY: the new block was sized to hold at least `rounded` bytes.
        let ptr = unsafe { tail.bump(rounded) };
        tracing::trace!(size, rounded, ptr = ?ptr, "arena allocation");
        Ok(ptr)
    }

    /// Allocate `size` zeroed bytes as a slice borrowed from the arena.
    #[allow(clippy::mut_from_ref)] // Disjoint regions, handed out once each
    pub fn alloc_bytes(&self, size: usize) -> ArenaResult<&mut [u8]> {
        let ptr = self.allocate(size)?;
        // SAFETY: the region is `size` bytes of zero-initialized block
        // storage that no other allocation overlaps, and it lives as long
        // as the `&self` borrow since blocks are only freed by `teardown`.
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), size) })
    }

    /// Copy `src` into the arena.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_copy(&self, src: &[u8]) -> ArenaResult<&mut [u8]> {
        let dst = self.alloc_bytes(src.len())?;
        dst.copy_from_slice(src);
        Ok(dst)
    }

    /// Blocks in chain order, head first.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        std::iter::successors(self.head.get().map(|b| &**b), |b| b.next())
    }

    pub fn stats(&self) -> ArenaStats {
        let mut stats = ArenaStats {
            blocks_created: self.blocks_created.get(),
            blocks_released: self.blocks_released.get(),
            ..ArenaStats::default()
        };
        for block in self.blocks() {
            stats.block_count += 1;
            stats.capacity += block.capacity();
            stats.used += block.used();
        }
        stats
    }

    /// Release every block, head to tail, and return the arena to its
    /// uninitialized state. Returns the number of blocks released.
    ///
    /// Safe on an arena that was never initialized. Pointers obtained from
    /// [`allocate`](Self::allocate) are dangling afterwards.
    pub fn teardown(&mut self) -> usize {
        let mut released = 0;
        let mut current = self.head.take();
        while let Some(mut block) = current {
            current = block.take_next();
            drop(block);
            released += 1;
        }
        self.blocks_released.set(self.blocks_released.get() + released);
        if released > 0 {
            tracing::debug!(blocks = released, "arena cleaned up");
        }
        released
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::DEFAULT_BLOCK_CAPACITY;

    #[test]
    fn test_new_is_uninitialized() {
        let arena = Arena::new();
        assert!(!arena.is_initialized());
        assert_eq!(arena.stats(), ArenaStats::default());
    }

    #[test]
    fn test_initialize_idempotent() {
        let arena = Arena::new();
        arena.initialize().unwrap();
        arena.initialize().unwrap();
        let stats = arena.stats();
        assert_eq!(stats.block_count, 1);
        assert_eq!(stats.blocks_created, 1);
        assert_eq!(stats.capacity, DEFAULT_BLOCK_CAPACITY);
    }

    #[test]
    fn test_allocate_initializes_lazily() {
        let arena = Arena::new();
        arena.allocate(1).unwrap();
        assert!(arena.is_initialized());
        assert_eq!(arena.stats().block_count, 1);
    }

    #[test]
    fn test_allocate_rounds_to_alignment() {
        let arena = Arena::new();
        let a = arena.allocate(1).unwrap();
        let b = arena.allocate(1).unwrap();
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, MAX_ALIGN);
        assert_eq!(arena.stats().used, 2 * MAX_ALIGN);
    }

    #[test]
    fn test_zero_size_allocation() {
        let arena = Arena::new();
        let a = arena.allocate(0).unwrap();
        let b = arena.allocate(8).unwrap();
        assert_eq!(a.as_ptr() as usize % MAX_ALIGN, 0);
        // A zero-sized region takes no space
        assert_eq!(a, b);
        assert!(arena.alloc_bytes(0).unwrap().is_empty());
    }

    #[test]
    fn test_grows_when_full() {
        let arena = Arena::with_config(ArenaConfig::new(64));
        for _ in 0..4 {
            arena.allocate(16).unwrap();
        }
        assert_eq!(arena.stats().block_count, 1);

        arena.allocate(16).unwrap();
        let stats = arena.stats();
        assert_eq!(stats.block_count, 2);
        assert_eq!(stats.capacity, 128);
        assert_eq!(stats.used, 80);
    }

    #[test]
    fn test_earlier_block_with_room_is_reused() {
        let arena = Arena::with_config(ArenaConfig::new(64));
        let first = arena.allocate(48).unwrap();
        // Does not fit the 16 bytes left in the head
        arena.allocate(32).unwrap();
        assert_eq!(arena.stats().block_count, 2);

        // Fits the head's remainder, so it is served from the head
        let small = arena.allocate(16).unwrap();
        assert_eq!(small.as_ptr() as usize - first.as_ptr() as usize, 48);
        assert_eq!(arena.stats().block_count, 2);
    }

    #[test]
    fn test_oversized_request_gets_own_block() {
        let arena = Arena::new();
        arena.initialize().unwrap();
        let size = DEFAULT_BLOCK_CAPACITY * 2 + 3;
        let bytes = arena.alloc_bytes(size).unwrap();
        assert_eq!(bytes.len(), size);
        bytes[size - 1] = 0xff;

        let tail = arena.blocks().last().unwrap();
        assert_eq!(tail.capacity(), size.next_multiple_of(MAX_ALIGN));
        assert!(tail.contains(bytes.as_ptr()));
        assert_eq!(arena.stats().block_count, 2);
    }

    #[test]
    fn test_oversized_block_becomes_tail() {
        let arena = Arena::with_config(ArenaConfig::new(64));
        arena.allocate(64).unwrap();
        arena.allocate(256).unwrap();
        // The oversized block is sized exactly, so the next request
        // appends a default block after it
        arena.allocate(64).unwrap();
        let capacities: Vec<_> = arena.blocks().map(Block::capacity).collect();
        assert_eq!(capacities, vec![64, 256, 64]);
    }

    #[test]
    fn test_overflowing_request() {
        let arena = Arena::new();
        let err = arena.allocate(usize::MAX).unwrap_err();
        assert_eq!(err, ArenaError::CapacityOverflow { requested: usize::MAX });
        // Rounding fails before the arena is touched
        assert!(!arena.is_initialized());
    }

    #[test]
    fn test_alloc_slice_copy() {
        let arena = Arena::new();
        let a = arena.alloc_slice_copy(b"abc").unwrap();
        let b = arena.alloc_slice_copy(b"defg").unwrap();
        a[0] = b'x';
        assert_eq!(a, b"xbc");
        assert_eq!(b, b"defg");
    }

    #[test]
    fn test_teardown_releases_all_blocks() {
        let mut arena = Arena::with_config(ArenaConfig::new(64));
        for _ in 0..10 {
            arena.allocate(64).unwrap();
        }
        assert_eq!(arena.teardown(), 10);
        let stats = arena.stats();
        assert_eq!(stats.block_count, 0);
        assert_eq!(stats.blocks_created, stats.blocks_released);
        assert!(!arena.is_initialized());
    }

    #[test]
    fn test_teardown_uninitialized() {
        let mut arena = Arena::new();
        assert_eq!(arena.teardown(), 0);
        assert_eq!(arena.teardown(), 0);
    }

    #[test]
    fn test_reuse_after_teardown() {
        let mut arena = Arena::new();
        arena.allocate(32).unwrap();
        arena.teardown();

        arena.allocate(32).unwrap();
        let stats = arena.stats();
        assert_eq!(stats.block_count, 1);
        assert_eq!(stats.used, 32usize.next_multiple_of(MAX_ALIGN));
        assert_eq!(stats.blocks_created, 2);
        assert_eq!(stats.blocks_released, 1);
    }

    #[test]
    fn test_long_chain_teardown() {
        let mut arena = Arena::with_config(ArenaConfig::new(MAX_ALIGN));
        for _ in 0..5_000 {
            arena.allocate(MAX_ALIGN).unwrap();
        }
        assert_eq!(arena.teardown(), 5_000);
    }

    #[test]
    fn test_stats_snapshot() {
        let arena = Arena::with_config(ArenaConfig::new(64));
        arena.allocate(64).unwrap();
        arena.allocate(128).unwrap();
        insta::assert_debug_snapshot!(arena.stats(), @r"
        ArenaStats {
            block_count: 2,
            capacity: 192,
            used: 192,
            blocks_created: 2,
            blocks_released: 0,
        }
        ");
    }
}
