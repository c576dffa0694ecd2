//! LessDB - Arena
//! Bump allocator backing memtable entries.
//!
//! Regions are carved front-to-back out of fixed-size `BytesMut` blocks and
//! handed out exclusively. Nothing is reclaimed individually: a block's
//! memory is released once every region carved from it has been dropped,
//! which in practice is when the memtable and all of its readers are gone.
//! Allocation failure aborts through the global allocator.

use bytes::BytesMut;

/// Default block size, matching common page sizes.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Single-owner bump allocator. Not synchronized; the owning memtable
/// serializes writers.
pub struct Arena {
    /// Unused tail of the current block.
    current: BytesMut,
    block_size: usize,
    /// Total bytes requested from the global allocator.
    memory_usage: usize,
    blocks_allocated: usize,
}

impl Arena {
    /// Create an arena with the default block size.
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(block_size: usize) -> Self {
        assert!(block_size > 0, "arena block size must be positive");
        Self {
            current: BytesMut::new(),
            block_size,
            memory_usage: 0,
            blocks_allocated: 0,
        }
    }

    /// Carve out a zeroed region of exactly `bytes` bytes.
    /// The region never overlaps any other region this arena returned.
    pub fn allocate(&mut self, bytes: usize) -> BytesMut {
        assert!(bytes > 0, "zero-sized arena allocation");
        if bytes <= self.current.len() {
            return self.current.split_to(bytes);
        }
        self.allocate_fallback(bytes)
    }

    fn allocate_fallback(&mut self, bytes: usize) -> BytesMut {
        if bytes > self.block_size / 4 {
            // Large request: give it a block of its own so the rest of the
            // current block is not wasted.
            return self.allocate_new_block(bytes);
        }

        // The remainder of the current block is abandoned.
        self.current = self.allocate_new_block(self.block_size);
        self.current.split_to(bytes)
    }

    fn allocate_new_block(&mut self, size: usize) -> BytesMut {
        self.memory_usage += size;
        self.blocks_allocated += 1;
        log::trace!(
            "arena block #{} of {} bytes ({} bytes total)",
            self.blocks_allocated,
            size,
            self.memory_usage
        );
        BytesMut::zeroed(size)
    }

    /// Total bytes obtained from the allocator so far.
    pub fn memory_usage(&self) -> usize {
        self.memory_usage
    }

    pub fn blocks_allocated(&self) -> usize {
        self.blocks_allocated
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
