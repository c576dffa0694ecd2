//! LessDB - LSM-Tree Storage Core
//!
//! The in-memory and read-side building blocks of a Log-Structured Merge-Tree
//! key-value store.
//!
//! ## Features
//! - **Arena**: Bump allocation of memtable entries over `bytes` blocks
//! - **SkipList**: Ordered index with one writer and lock-free concurrent readers
//! - **Internal keys**: User key plus packed sequence number and kind
//! - **MemTable**: Multi-version write buffer with snapshot reads and tombstones
//! - **Block reader**: Prefix-compressed blocks with restart-point binary search
//! - **Metrics**: Lock-free atomic counters for observability
//!
//! ## Example
//! ```
//! use lessdb::comparator::InternalKeyComparator;
//! use lessdb::engine::{LookupResult, MemTable};
//! use lessdb::types::ValueType;
//!
//! let mut table = MemTable::new(InternalKeyComparator::bytewise());
//! table.add(1, ValueType::Value, b"key", b"v1");
//! table.add(2, ValueType::Value, b"key", b"v2");
//!
//! assert_eq!(table.get(b"key", 2).value().map(|v| &v[..]), Some(&b"v2"[..]));
//! assert_eq!(table.get(b"key", 1).value().map(|v| &v[..]), Some(&b"v1"[..]));
//! assert_eq!(table.get(b"other", 2), LookupResult::NotFound);
//! ```

pub mod coding;
pub mod comparator;
pub mod config;
pub mod engine;
pub mod error;
pub mod types;
