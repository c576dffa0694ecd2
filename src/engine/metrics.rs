//! LessDB - MemTable Metrics
//! Atomic counters describing what a memtable has absorbed.
//!
//! The writer bumps them and any reader may inspect them, lock-free.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::ValueType;

/// Write counters for one memtable.
///
/// All counters use `Ordering::Relaxed`: they are for observability and
/// never used to synchronize access to entries.
#[derive(Debug, Default)]
pub struct MemTableMetrics {
    /// Entries added with `ValueType::Value`.
    pub values: AtomicU64,
    /// Entries added with `ValueType::Deletion`.
    pub tombstones: AtomicU64,
    /// Adds ignored because an identical internal key was present.
    pub duplicates: AtomicU64,
    /// User key bytes stored.
    pub key_bytes: AtomicU64,
    /// Value bytes stored.
    pub value_bytes: AtomicU64,
}

impl MemTableMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry that made it into the table.
    pub fn record_add(&self, kind: ValueType, key_size: usize, value_size: usize) {
        match kind {
            ValueType::Value => self.values.fetch_add(1, Ordering::Relaxed),
            ValueType::Deletion => self.tombstones.fetch_add(1, Ordering::Relaxed),
        };
        self.key_bytes.fetch_add(key_size as u64, Ordering::Relaxed);
        self.value_bytes.fetch_add(value_size as u64, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    /// Entries stored, values and tombstones together.
    pub fn total_entries(&self) -> u64 {
        self.values.load(Ordering::Relaxed) + self.tombstones.load(Ordering::Relaxed)
    }

    /// Format metrics as a human-readable report.
    pub fn report(&self) -> String {
        format!(
            "MemTable metrics:\n\
             \x20 values:      {}\n\
             \x20 tombstones:  {}\n\
             \x20 duplicates:  {}\n\
             \x20 key bytes:   {}\n\
             \x20 value bytes: {}",
            self.values.load(Ordering::Relaxed),
            self.tombstones.load(Ordering::Relaxed),
            self.duplicates.load(Ordering::Relaxed),
            self.key_bytes.load(Ordering::Relaxed),
            self.value_bytes.load(Ordering::Relaxed),
        )
    }
}
