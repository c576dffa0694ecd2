//! LessDB - MemTable (In-Memory Write Buffer)
//! The MemTable is the write-buffer of the LSM-Tree.
//! Every write lands here as a versioned record before it is flushed to
//! immutable blocks on disk.
//!
//! ## Entry Format
//! Each record is one contiguous arena region:
//! ```text
//! [var32: ikey_len][internal key: user_key + 8-byte tag][var32: value_len][value]
//! ```
//! Records are never updated or removed. A delete is a newer record with
//! `ValueType::Deletion` (a tombstone); all history stays until the
//! memtable is dropped.

use std::cmp::Ordering;
use std::ops::Deref;
use std::sync::Arc;

use bytes::Bytes;

use super::arena::Arena;
use super::metrics::MemTableMetrics;
use super::skiplist::{self, KeyComparator, SkipList, SkipListReader};
use crate::coding::{get_length_prefixed, put_length_prefixed, put_var32, var32_length};
use crate::comparator::{Comparator, InternalKeyComparator};
use crate::config::Config;
use crate::error::Result;
use crate::types::{
    internal_key_length, parse_internal_key, put_internal_key, LookupKey, SequenceNumber,
    ValueType,
};

/// Orders memtable records by the internal key at their front.
#[derive(Debug, Clone)]
pub struct EntryComparator {
    icmp: InternalKeyComparator,
}

impl KeyComparator<Bytes> for EntryComparator {
    fn compare(&self, a: &Bytes, b: &Bytes) -> Ordering {
        self.icmp.compare(entry_internal_key(a), entry_internal_key(b))
    }
}

/// The length-prefixed internal key a record (or lookup probe) starts with.
fn entry_internal_key(entry: &[u8]) -> &[u8] {
    let mut input = entry;
    match get_length_prefixed(&mut input) {
        Ok(ikey) => ikey,
        Err(e) => unreachable!("memtable record written by add() failed to parse: {}", e),
    }
}

/// One decoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemTableEntry<'a> {
    pub internal_key: &'a [u8],
    pub user_key: &'a [u8],
    pub sequence: SequenceNumber,
    pub kind: ValueType,
    /// Empty for tombstones.
    pub value: &'a [u8],
}

fn decode_entry(entry: &[u8]) -> MemTableEntry<'_> {
    let mut input = entry;
    let decoded = get_length_prefixed(&mut input).and_then(|internal_key| {
        let parsed = parse_internal_key(internal_key)?;
        let value = get_length_prefixed(&mut input)?;
        Ok(MemTableEntry {
            internal_key,
            user_key: parsed.user_key,
            sequence: parsed.sequence,
            kind: parsed.kind,
            value,
        })
    });
    match decoded {
        Ok(entry) => entry,
        Err(e) => unreachable!("memtable record written by add() failed to parse: {}", e),
    }
}

/// Outcome of a point lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    /// Newest visible version is a value.
    Found(Bytes),
    /// Newest visible version is a tombstone.
    Deleted,
    /// No visible version of the key in this memtable.
    NotFound,
}

impl LookupResult {
    pub fn value(&self) -> Option<&Bytes> {
        match self {
            LookupResult::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// Read side of a memtable. Cloneable and shareable across threads; reads
/// run concurrently with the writer's `add` without locking.
#[derive(Clone)]
pub struct MemTableReader {
    table: SkipListReader<Bytes, EntryComparator>,
    icmp: InternalKeyComparator,
    metrics: Arc<MemTableMetrics>,
}

impl MemTableReader {
    /// Newest version of `user_key` with sequence <= `snapshot`.
    pub fn get(&self, user_key: &[u8], snapshot: SequenceNumber) -> LookupResult {
        let probe = Bytes::copy_from_slice(LookupKey::new(user_key, snapshot).memtable_key());
        let Some(record) = self.table.lower_bound(&probe).key() else {
            return LookupResult::NotFound;
        };

        let entry = decode_entry(record);
        if self.icmp.user_comparator().compare(entry.user_key, user_key) != Ordering::Equal {
            return LookupResult::NotFound;
        }
        match entry.kind {
            ValueType::Value => LookupResult::Found(record.slice_ref(entry.value)),
            ValueType::Deletion => LookupResult::Deleted,
        }
    }

    /// All records in internal-key order.
    pub fn iter(&self) -> MemTableIter<'_> {
        MemTableIter {
            inner: self.table.iter(),
        }
    }

    /// Records starting at the newest version of `user_key` visible at
    /// `snapshot`, or the first record after it.
    pub fn seek(&self, user_key: &[u8], snapshot: SequenceNumber) -> MemTableIter<'_> {
        let probe = Bytes::copy_from_slice(LookupKey::new(user_key, snapshot).memtable_key());
        MemTableIter {
            inner: self.table.lower_bound(&probe).into_iter(),
        }
    }

    /// Number of records, tombstones included.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn metrics(&self) -> &MemTableMetrics {
        &self.metrics
    }

    pub fn comparator(&self) -> &InternalKeyComparator {
        &self.icmp
    }
}

/// In-order iterator over memtable records.
pub struct MemTableIter<'a> {
    inner: skiplist::Iter<'a, Bytes>,
}

impl<'a> Iterator for MemTableIter<'a> {
    type Item = MemTableEntry<'a>;

    fn next(&mut self) -> Option<MemTableEntry<'a>> {
        self.inner.next().map(|record| decode_entry(record))
    }
}

/// The write buffer. Owns the arena and the only insert handle of its
/// skiplist; dereferences to a [`MemTableReader`].
pub struct MemTable {
    reader: MemTableReader,
    table: SkipList<Bytes, EntryComparator>,
    arena: Arena,
}

impl MemTable {
    /// Create an empty memtable with default configuration.
    pub fn new(icmp: InternalKeyComparator) -> Self {
        Self::build(icmp, Arena::new(), None)
    }

    /// Create an empty memtable from validated configuration.
    pub fn with_config(icmp: InternalKeyComparator, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(
            icmp,
            Arena::with_block_size(config.arena_block_size),
            config.skiplist_seed,
        ))
    }

    fn build(icmp: InternalKeyComparator, arena: Arena, seed: Option<u64>) -> Self {
        let cmp = EntryComparator { icmp: icmp.clone() };
        let table = match seed {
            Some(seed) => SkipList::with_seed(cmp, seed),
            None => SkipList::new(cmp),
        };

        log::debug!(
            "memtable created (user comparator {}, arena block {} bytes)",
            icmp.user_comparator().name(),
            arena.block_size()
        );

        Self {
            reader: MemTableReader {
                table: table.reader(),
                icmp,
                metrics: Arc::new(MemTableMetrics::new()),
            },
            table,
            arena,
        }
    }

    /// Record `key -> value` at `sequence`. A `ValueType::Deletion` record
    /// is a tombstone and normally carries an empty value.
    ///
    /// Adding the exact same `(key, sequence, kind)` twice keeps the first
    /// record.
    pub fn add(&mut self, sequence: SequenceNumber, kind: ValueType, key: &[u8], value: &[u8]) {
        let ikey_len = internal_key_length(key.len());
        let ikey_len32 = u32::try_from(ikey_len).unwrap_or_else(|_| {
            panic!("memtable key of {} bytes does not fit a var32 length", key.len())
        });
        let value_len32 = u32::try_from(value.len()).unwrap_or_else(|_| {
            panic!("memtable value of {} bytes does not fit a var32 length", value.len())
        });
        let encoded_len =
            var32_length(ikey_len32) + ikey_len + var32_length(value_len32) + value.len();

        let mut region = self.arena.allocate(encoded_len);
        {
            let mut dst: &mut [u8] = &mut region[..];
            put_var32(&mut dst, ikey_len32);
            put_internal_key(&mut dst, key, sequence, kind);
            put_length_prefixed(&mut dst, value);
            debug_assert!(dst.is_empty());
        }

        let before = self.table.len();
        self.table.insert(region.freeze());
        if self.table.len() > before {
            self.reader.metrics.record_add(kind, key.len(), value.len());
        } else {
            log::warn!("ignoring duplicate memtable record at sequence {}", sequence);
            self.reader.metrics.record_duplicate();
        }
    }

    /// A read handle for other threads.
    pub fn reader(&self) -> MemTableReader {
        self.reader.clone()
    }

    /// Bytes held by the arena.
    pub fn approximate_memory_usage(&self) -> usize {
        self.arena.memory_usage()
    }
}

impl Deref for MemTable {
    type Target = MemTableReader;

    fn deref(&self) -> &MemTableReader {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MAX_SEQUENCE_NUMBER;

    fn new_table() -> MemTable {
        let config = Config::new().with_skiplist_seed(11);
        MemTable::with_config(InternalKeyComparator::bytewise(), &config).unwrap()
    }

    #[test]
    fn test_newer_sequence_sorts_first() {
        let mut table = new_table();
        table.add(5, ValueType::Value, b"a", b"x");
        table.add(6, ValueType::Value, b"a", b"y");

        let entries: Vec<_> = table.iter().map(|e| (e.sequence, e.value.to_vec())).collect();
        assert_eq!(entries, vec![(6, b"y".to_vec()), (5, b"x".to_vec())]);
    }

    #[test]
    fn test_get_latest() {
        let mut table = new_table();
        table.add(1, ValueType::Value, b"key", b"old");
        table.add(2, ValueType::Value, b"key", b"new");
        assert_eq!(
            table.get(b"key", MAX_SEQUENCE_NUMBER),
            LookupResult::Found(Bytes::from_static(b"new"))
        );
    }

    #[test]
    fn test_get_respects_snapshot() {
        let mut table = new_table();
        table.add(10, ValueType::Value, b"key", b"v10");
        table.add(20, ValueType::Value, b"key", b"v20");

        assert_eq!(table.get(b"key", 15).value().map(|v| &v[..]), Some(&b"v10"[..]));
        assert_eq!(table.get(b"key", 20).value().map(|v| &v[..]), Some(&b"v20"[..]));
        assert_eq!(table.get(b"key", 9), LookupResult::NotFound);
    }

    #[test]
    fn test_reads_accept_any_snapshot() {
        let mut table = new_table();
        table.add(MAX_SEQUENCE_NUMBER, ValueType::Value, b"key", b"newest");
        table.add(1, ValueType::Value, b"next", b"n");

        assert_eq!(table.get(b"key", u64::MAX).value().map(|v| &v[..]), Some(&b"newest"[..]));
        let seen: Vec<_> = table.seek(b"key", u64::MAX).map(|e| e.sequence).collect();
        assert_eq!(seen, vec![MAX_SEQUENCE_NUMBER, 1]);
    }

    #[test]
    fn test_tombstone() {
        let mut table = new_table();
        table.add(1, ValueType::Value, b"key", b"value");
        table.add(2, ValueType::Deletion, b"key", b"");
        assert_eq!(table.get(b"key", MAX_SEQUENCE_NUMBER), LookupResult::Deleted);
        assert!(table.get(b"key", 1).value().is_some());
        // both versions are still stored
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_get_missing_neighbours() {
        let mut table = new_table();
        table.add(1, ValueType::Value, b"b", b"1");
        assert_eq!(table.get(b"a", MAX_SEQUENCE_NUMBER), LookupResult::NotFound);
        assert_eq!(table.get(b"c", MAX_SEQUENCE_NUMBER), LookupResult::NotFound);
        assert_eq!(table.get(b"bb", MAX_SEQUENCE_NUMBER), LookupResult::NotFound);
    }

    #[test]
    fn test_iteration_order_across_keys() {
        let mut table = new_table();
        table.add(3, ValueType::Value, b"charlie", b"3");
        table.add(1, ValueType::Value, b"alpha", b"1");
        table.add(2, ValueType::Value, b"bravo", b"2");
        table.add(4, ValueType::Deletion, b"alpha", b"");

        let keys: Vec<_> = table.iter().map(|e| (e.user_key.to_vec(), e.sequence)).collect();
        assert_eq!(
            keys,
            vec![
                (b"alpha".to_vec(), 4),
                (b"alpha".to_vec(), 1),
                (b"bravo".to_vec(), 2),
                (b"charlie".to_vec(), 3),
            ]
        );
    }

    #[test]
    fn test_seek() {
        let mut table = new_table();
        for (seq, key) in [b"a", b"b", b"c", b"d"].iter().enumerate() {
            table.add(seq as u64 + 1, ValueType::Value, *key, b"v");
        }
        let from_c: Vec<_> = table
            .seek(b"bz", MAX_SEQUENCE_NUMBER)
            .map(|e| e.user_key.to_vec())
            .collect();
        assert_eq!(from_c, vec![b"c".to_vec(), b"d".to_vec()]);
    }

    #[test]
    fn test_duplicate_add_is_ignored() {
        let mut table = new_table();
        table.add(7, ValueType::Value, b"k", b"first");
        table.add(7, ValueType::Value, b"k", b"second");
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(b"k", 7).value().map(|v| &v[..]), Some(&b"first"[..]));
        assert_eq!(table.metrics().total_entries(), 1);
        assert_eq!(
            table.metrics().duplicates.load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn test_memory_usage_grows() {
        let mut table = new_table();
        assert_eq!(table.approximate_memory_usage(), 0);
        table.add(1, ValueType::Value, b"k", &[0u8; 100]);
        assert!(table.approximate_memory_usage() >= 100);
        table.add(2, ValueType::Value, b"k", &vec![0u8; 10_000]);
        assert!(table.approximate_memory_usage() >= 10_100);
    }

    #[test]
    fn test_empty_values_and_keys() {
        let mut table = new_table();
        table.add(1, ValueType::Value, b"", b"");
        assert_eq!(
            table.get(b"", MAX_SEQUENCE_NUMBER),
            LookupResult::Found(Bytes::new())
        );
    }

    #[test]
    fn test_reader_outlives_writer() {
        let mut table = new_table();
        table.add(1, ValueType::Value, b"k", b"v");
        let reader = table.reader();
        drop(table);
        assert_eq!(reader.get(b"k", 1).value().map(|v| &v[..]), Some(&b"v"[..]));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config::new().with_arena_block_size(1);
        assert!(MemTable::with_config(InternalKeyComparator::bytewise(), &config).is_err());
    }
}
