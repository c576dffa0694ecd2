//! LessDB - Configuration
//! Tunable parameters for the memtable and its ordered list.

use crate::error::{LessError, Result};

/// Smallest arena block the memtable accepts.
pub const MIN_ARENA_BLOCK_SIZE: usize = 64;

/// Configuration for a [`MemTable`](crate::engine::memtable::MemTable).
#[derive(Debug, Clone)]
pub struct Config {
    /// Size in bytes of each block the arena carves entries from.
    pub arena_block_size: usize,

    /// Fixed seed for the skiplist height generator.
    /// `None` seeds from OS entropy.
    pub skiplist_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            arena_block_size: 4096,
            skiplist_seed: None,
        }
    }
}

impl Config {
    /// Create a Config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the arena block size.
    pub fn with_arena_block_size(mut self, size: usize) -> Self {
        self.arena_block_size = size;
        self
    }

    /// Make skiplist node heights reproducible.
    pub fn with_skiplist_seed(mut self, seed: u64) -> Self {
        self.skiplist_seed = Some(seed);
        self
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.arena_block_size < MIN_ARENA_BLOCK_SIZE {
            return Err(LessError::Config(format!(
                "arena_block_size must be at least {} bytes, got {}",
                MIN_ARENA_BLOCK_SIZE, self.arena_block_size
            )));
        }
        Ok(())
    }
}
