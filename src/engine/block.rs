//! LessDB - Block Reader
//! Read-only view over an immutable, prefix-compressed block of sorted
//! key/value entries, as written by the table builder.
//!
//! ## Binary Format
//! ```text
//! entry   := [var32: shared][var32: unshared][var32: value_len][key delta: unshared][value]
//! block   := entry* [fixed32 LE: restart offset]{n} [fixed32 LE: n]
//! ```
//! Each entry stores only the bytes of its key beyond the `shared` prefix
//! it has in common with the previous key. Every restart offset points at
//! an entry with `shared == 0`, so the full key is stored there and binary
//! search can run over restart points. Restart offsets are stored in the
//! same order as the entries they point at.
//!
//! Entry headers are the only untrusted input that gets validated: a bad
//! header leaves the cursor at the end with a corruption status.

use std::cell::OnceCell;
use std::cmp::Ordering;
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use bytes::Bytes;

use crate::coding::{decode_fixed32, get_var32};
use crate::comparator::Comparator;
use crate::error::{LessError, Result};

const RESTART_WIDTH: usize = 4;

/// Owned bytes of one block, as handed over by a table reader.
#[derive(Debug, Clone)]
pub struct BlockContents {
    data: Bytes,
}

impl BlockContents {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Load a file holding exactly one raw block.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        log::debug!("read {} block bytes from {:?}", data.len(), path.as_ref());
        Ok(Self::new(data))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for Block<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("size", &self.data.len())
            .field("num_restarts", &self.num_restarts)
            .field("comparator", &self.cmp.name())
            .finish()
    }
}

/// Decoded lengths of one entry.
#[derive(Debug, Clone, Copy, Default)]
struct EntryHeader {
    shared: usize,
    unshared: usize,
    value_len: usize,
    /// Offset of the key delta.
    key_start: usize,
}

impl EntryHeader {
    fn delta(&self) -> Range<usize> {
        self.key_start..self.key_start + self.unshared
    }

    fn value(&self) -> Range<usize> {
        let start = self.key_start + self.unshared;
        start..start + self.value_len
    }

    fn next_entry(&self) -> usize {
        self.key_start + self.unshared + self.value_len
    }
}

/// Borrowed, read-only block.
pub struct Block<'a> {
    data: &'a [u8],
    /// End of the entries, start of the restart array.
    restarts_offset: usize,
    num_restarts: usize,
    cmp: &'a dyn Comparator,
    entries_decoded: AtomicU64,
}

impl<'a> Block<'a> {
    /// Wrap raw block bytes. Fails if the restart trailer does not fit.
    pub fn new(data: &'a [u8], cmp: &'a dyn Comparator) -> Result<Self> {
        if data.len() < RESTART_WIDTH {
            return Err(LessError::corruption(format!(
                "block of {} bytes has no restart count",
                data.len()
            )));
        }
        let num_restarts = decode_fixed32(&data[data.len() - RESTART_WIDTH..]) as usize;
        let trailer = num_restarts
            .checked_add(1)
            .and_then(|n| n.checked_mul(RESTART_WIDTH))
            .filter(|&len| len <= data.len())
            .ok_or_else(|| {
                LessError::corruption(format!(
                    "{} restart points do not fit a block of {} bytes",
                    num_restarts,
                    data.len()
                ))
            })?;

        log::debug!(
            "opened block: {} bytes, {} restart points ({})",
            data.len(),
            num_restarts,
            cmp.name()
        );

        Ok(Self {
            data,
            restarts_offset: data.len() - trailer,
            num_restarts,
            cmp,
            entries_decoded: AtomicU64::new(0),
        })
    }

    /// Wrap owned block contents.
    pub fn from_contents(contents: &'a BlockContents, cmp: &'a dyn Comparator) -> Result<Self> {
        Self::new(contents.data(), cmp)
    }

    pub fn num_restarts(&self) -> usize {
        self.num_restarts
    }

    /// Total size including the restart trailer.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Number of entry headers decoded by cursors over this block.
    pub fn entries_decoded(&self) -> u64 {
        self.entries_decoded.load(AtomicOrdering::Relaxed)
    }

    /// Offset of the `index`-th restart entry.
    ///
    /// # Panics
    /// If `index >= num_restarts()`.
    pub fn restart_point(&self, index: usize) -> usize {
        assert!(
            index < self.num_restarts,
            "restart index {} out of range ({} restarts)",
            index,
            self.num_restarts
        );
        decode_fixed32(&self.data[self.restarts_offset + index * RESTART_WIDTH..]) as usize
    }

    /// Full key stored at the `index`-th restart point.
    pub fn key_at_restart(&self, index: usize) -> Result<&'a [u8]> {
        let header = self.parse_header(self.restart_point(index))?;
        if header.shared != 0 {
            return Err(LessError::corruption(format!(
                "restart point {} shares {} bytes with its predecessor",
                index, header.shared
            )));
        }
        Ok(&self.data[header.delta()])
    }

    fn parse_header(&self, offset: usize) -> Result<EntryHeader> {
        if offset >= self.restarts_offset {
            return Err(LessError::corruption(format!(
                "entry offset {} is past the entry region ({} bytes)",
                offset, self.restarts_offset
            )));
        }
        let region = &self.data[offset..self.restarts_offset];
        let mut input = region;
        let shared = get_var32(&mut input)? as usize;
        let unshared = get_var32(&mut input)? as usize;
        let value_len = get_var32(&mut input)? as usize;
        if unshared + value_len > input.len() {
            return Err(LessError::corruption(format!(
                "entry at {} claims {} bytes, {} left",
                offset,
                unshared + value_len,
                input.len()
            )));
        }
        Ok(EntryHeader {
            shared,
            unshared,
            value_len,
            key_start: offset + (region.len() - input.len()),
        })
    }

    /// Cursor at the first entry.
    pub fn begin(&self) -> BlockCursor<'_> {
        if self.restarts_offset == 0 {
            return self.end();
        }
        BlockCursor::at(self, 0)
    }

    /// Cursor one past the last entry.
    pub fn end(&self) -> BlockCursor<'_> {
        BlockCursor::end(self)
    }

    /// Cursor at the first entry whose key is not less than `target`.
    pub fn lower_bound(&self, target: &[u8]) -> BlockCursor<'_> {
        if self.num_restarts == 0 || self.restarts_offset == 0 {
            return self.end();
        }

        // Last restart point whose key is <= target. Every entry before it
        // is smaller than target, so the scan can start there.
        let (mut left, mut right) = (0, self.num_restarts);
        while right - left > 1 {
            let mid = left + (right - left) / 2;
            match self.key_at_restart(mid) {
                Ok(key) if self.cmp.compare(key, target) == Ordering::Greater => right = mid,
                Ok(_) => left = mid,
                Err(e) => return BlockCursor::corrupted(self, e),
            }
        }

        let start = self.restart_point(left);
        if start >= self.restarts_offset {
            return BlockCursor::corrupted(
                self,
                LessError::corruption(format!("restart point {} is past the entries", left)),
            );
        }

        let mut cursor = BlockCursor::at(self, start);
        while cursor.valid() && self.cmp.compare(cursor.key(), target) == Ordering::Less {
            cursor.advance();
        }
        cursor
    }

    /// Cursor at the entry whose key equals `target`, or the end.
    /// A corrupted cursor is returned as is so its status stays visible.
    pub fn find(&self, target: &[u8]) -> BlockCursor<'_> {
        let cursor = self.lower_bound(target);
        if !cursor.valid() || self.cmp.compare(cursor.key(), target) == Ordering::Equal {
            cursor
        } else {
            self.end()
        }
    }

    /// Iterate all entries as owned keys and borrowed values.
    pub fn iter(&self) -> BlockIter<'_> {
        BlockIter {
            cursor: self.begin(),
            done: false,
        }
    }
}

/// Where the previous entry's full key can be found.
#[derive(Debug, Clone)]
enum KeyBuf {
    /// Stored whole inside the block.
    Block(Range<usize>),
    Owned(Vec<u8>),
}

impl KeyBuf {
    fn resolve<'k>(&'k self, data: &'k [u8]) -> &'k [u8] {
        match self {
            KeyBuf::Block(range) => &data[range.clone()],
            KeyBuf::Owned(key) => key,
        }
    }
}

/// Position inside a block.
///
/// Keys are rebuilt lazily: `key()` concatenates the shared prefix of the
/// previous key with this entry's delta. During a forward scan the
/// previous key is carried over, so each step costs O(1); otherwise it is
/// rebuilt by replaying from the nearest entry holding a full key.
#[derive(Debug, Clone)]
pub struct BlockCursor<'a> {
    block: &'a Block<'a>,
    /// Start of the current entry, `restarts_offset` at the end.
    offset: usize,
    header: EntryHeader,
    /// Latest entry at or before `offset` that stores a full key.
    restart: usize,
    /// Length of the current entry's full key.
    key_len: usize,
    prev_key: Option<KeyBuf>,
    key: OnceCell<Vec<u8>>,
    corruption: Option<String>,
}

impl<'a> BlockCursor<'a> {
    fn end(block: &'a Block<'a>) -> Self {
        Self {
            block,
            offset: block.restarts_offset,
            header: EntryHeader::default(),
            restart: 0,
            key_len: 0,
            prev_key: None,
            key: OnceCell::new(),
            corruption: None,
        }
    }

    fn corrupted(block: &'a Block<'a>, err: LessError) -> Self {
        let mut cursor = Self::end(block);
        cursor.fail(err);
        cursor
    }

    /// Cursor at an entry that must hold a full key. With no previous
    /// key, any shared prefix is rejected by `seek_entry`.
    fn at(block: &'a Block<'a>, offset: usize) -> Self {
        let mut cursor = Self::end(block);
        cursor.restart = offset;
        cursor.seek_entry(offset);
        cursor
    }

    fn fail(&mut self, err: LessError) {
        let msg = match err {
            LessError::Corruption(msg) => msg,
            other => other.to_string(),
        };
        log::warn!("block cursor stopped: {}", msg);
        self.offset = self.block.restarts_offset;
        self.corruption = Some(msg);
    }

    /// Decode the entry at `offset`. Its shared prefix must fit the
    /// key of the entry the cursor is leaving.
    fn seek_entry(&mut self, offset: usize) {
        self.key = OnceCell::new();
        if offset >= self.block.restarts_offset {
            self.offset = self.block.restarts_offset;
            return;
        }
        let prev_len = self.key_len;
        match self.block.parse_header(offset) {
            Ok(header) if header.shared > prev_len => {
                self.fail(LessError::corruption(format!(
                    "entry at {} shares {} bytes of a {}-byte key",
                    offset, header.shared, prev_len
                )));
            }
            Ok(header) => {
                self.block
                    .entries_decoded
                    .fetch_add(1, AtomicOrdering::Relaxed);
                self.offset = offset;
                self.header = header;
                self.key_len = header.shared + header.unshared;
                if header.shared == 0 {
                    self.restart = offset;
                }
            }
            Err(e) => self.fail(e),
        }
    }

    /// True when positioned at an entry.
    pub fn valid(&self) -> bool {
        self.offset < self.block.restarts_offset
    }

    /// `Err` if the cursor stopped on a malformed entry.
    pub fn status(&self) -> Result<()> {
        match &self.corruption {
            Some(msg) => Err(LessError::Corruption(msg.clone())),
            None => Ok(()),
        }
    }

    /// Byte offset of the current entry.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Full key of the current entry.
    ///
    /// # Panics
    /// If the cursor is not `valid()`.
    pub fn key(&self) -> &[u8] {
        assert!(self.valid(), "key() on a block cursor that is not valid");
        if self.header.shared == 0 {
            return &self.block.data[self.header.delta()];
        }
        self.key.get_or_init(|| self.materialize_key())
    }

    /// Value of the current entry.
    ///
    /// # Panics
    /// If the cursor is not `valid()`.
    pub fn value(&self) -> &'a [u8] {
        assert!(self.valid(), "value() on a block cursor that is not valid");
        let data: &'a [u8] = self.block.data;
        &data[self.header.value()]
    }

    /// Step to the next entry. No-op once at the end.
    pub fn advance(&mut self) {
        if !self.valid() {
            return;
        }
        self.prev_key = if self.header.shared == 0 {
            Some(KeyBuf::Block(self.header.delta()))
        } else {
            self.key.take().map(KeyBuf::Owned)
        };
        self.seek_entry(self.header.next_entry());
    }

    fn materialize_key(&self) -> Vec<u8> {
        let data = self.block.data;
        let shared = self.header.shared;
        let replayed;
        let prev: &[u8] = match &self.prev_key {
            Some(prev) => prev.resolve(data),
            None => {
                replayed = self.replay_previous_key();
                &replayed
            }
        };
        // Checked against the previous key length in `seek_entry`.
        debug_assert!(shared <= prev.len());

        let delta = &data[self.header.delta()];
        let mut key = Vec::with_capacity(shared + delta.len());
        key.extend_from_slice(&prev[..shared]);
        key.extend_from_slice(delta);
        key
    }

    /// Rebuild the previous entry's key by scanning forward from the
    /// nearest full-key entry.
    fn replay_previous_key(&self) -> Vec<u8> {
        let mut cursor = BlockCursor::at(self.block, self.restart);
        let mut prev = Vec::new();
        while cursor.valid() && cursor.offset < self.offset {
            prev.clear();
            prev.extend_from_slice(cursor.key());
            cursor.advance();
        }
        debug_assert_eq!(cursor.offset, self.offset);
        prev
    }
}

impl PartialEq for BlockCursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.block.data, other.block.data) && self.offset == other.offset
    }
}

impl Eq for BlockCursor<'_> {}

/// Iterator over `(key, value)` pairs. Yields one `Err` and stops if an
/// entry is malformed.
pub struct BlockIter<'a> {
    cursor: BlockCursor<'a>,
    done: bool,
}

impl<'a> Iterator for BlockIter<'a> {
    type Item = Result<(Vec<u8>, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.cursor.valid() {
            let item = (self.cursor.key().to_vec(), self.cursor.value());
            self.cursor.advance();
            return Some(Ok(item));
        }
        self.done = true;
        self.cursor.status().err().map(Err)
    }
}
