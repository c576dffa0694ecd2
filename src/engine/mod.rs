//! LessDB - Storage Engine Module
//! In-memory write buffer and on-disk block reader of the LSM core.
//!
//! Writes land in a [`MemTable`]: entries are encoded into an [`Arena`]
//! and indexed by a [`SkipList`] that one writer mutates while any number
//! of readers traverse it. Immutable [`Block`]s of a table are read back
//! through [`BlockCursor`]s.

pub mod arena;
pub mod block;
pub mod memtable;
pub mod metrics;
pub mod skiplist;

pub use self::arena::Arena;
pub use self::block::{Block, BlockContents, BlockCursor, BlockIter};
pub use self::memtable::{LookupResult, MemTable, MemTableEntry, MemTableReader};
pub use self::metrics::MemTableMetrics;
pub use self::skiplist::{Cursor, KeyComparator, NaturalOrder, SkipList, SkipListReader};
