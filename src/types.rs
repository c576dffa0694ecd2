//! LessDB - Core Type Definitions
//! Sequence numbers, record kinds and the internal-key encoding.
//!
//! ## Internal key layout
//! ```text
//! [user_key: N bytes][tag: 8 bytes LE] where tag = (sequence << 8) | kind
//! ```

use bytes::BufMut;

use crate::coding::{decode_fixed64, put_var32, var32_length};
use crate::error::{LessError, Result};

/// Monotonically assigned write version.
pub type SequenceNumber = u64;

/// Largest sequence number that fits in the tag next to the kind byte.
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1 << 56) - 1;

/// Size of the packed `(sequence, kind)` tag.
pub const TAG_SIZE: usize = 8;

/// Kind of record stored under an internal key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    /// Tombstone: the user key was deleted at this sequence.
    Deletion = 0,
    /// A live value.
    Value = 1,
}

impl ValueType {
    /// Kind used when building seek keys. It must be the highest kind so
    /// that a seek for `(key, seq)` lands before every entry with that
    /// sequence.
    pub const FOR_SEEK: ValueType = ValueType::Value;

    /// Decode a kind byte.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(ValueType::Deletion),
            1 => Some(ValueType::Value),
            _ => None,
        }
    }
}

/// Pack a sequence number and kind into an 8-byte tag.
pub fn pack_tag(sequence: SequenceNumber, kind: ValueType) -> u64 {
    assert!(
        sequence <= MAX_SEQUENCE_NUMBER,
        "sequence number {} exceeds 56 bits",
        sequence
    );
    (sequence << 8) | kind as u64
}

/// Length of the internal key for a user key of `user_key_len` bytes.
pub fn internal_key_length(user_key_len: usize) -> usize {
    user_key_len + TAG_SIZE
}

/// Append the internal key for `(user_key, sequence, kind)` to `dst`.
pub fn put_internal_key<B: BufMut>(
    dst: &mut B,
    user_key: &[u8],
    sequence: SequenceNumber,
    kind: ValueType,
) {
    dst.put_slice(user_key);
    dst.put_u64_le(pack_tag(sequence, kind));
}

/// Build an owned internal key.
pub fn encode_internal_key(user_key: &[u8], sequence: SequenceNumber, kind: ValueType) -> Vec<u8> {
    let mut buf = Vec::with_capacity(internal_key_length(user_key.len()));
    put_internal_key(&mut buf, user_key, sequence, kind);
    buf
}

/// The user-key part of an internal key. Keys shorter than a tag are
/// returned empty.
pub fn extract_user_key(internal_key: &[u8]) -> &[u8] {
    debug_assert!(internal_key.len() >= TAG_SIZE);
    &internal_key[..internal_key.len().saturating_sub(TAG_SIZE)]
}

/// The packed tag of an internal key, 0 if the key is too short.
pub fn extract_tag(internal_key: &[u8]) -> u64 {
    match internal_key.len().checked_sub(TAG_SIZE) {
        Some(at) => decode_fixed64(&internal_key[at..]),
        None => 0,
    }
}

/// A decoded internal key borrowing its user key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInternalKey<'a> {
    pub user_key: &'a [u8],
    pub sequence: SequenceNumber,
    pub kind: ValueType,
}

/// Split an internal key into its parts.
pub fn parse_internal_key(internal_key: &[u8]) -> Result<ParsedInternalKey<'_>> {
    if internal_key.len() < TAG_SIZE {
        return Err(LessError::corruption(format!(
            "internal key of {} bytes is shorter than its tag",
            internal_key.len()
        )));
    }
    let tag = extract_tag(internal_key);
    let kind = ValueType::from_u8((tag & 0xff) as u8)
        .ok_or_else(|| LessError::corruption(format!("unknown value type {}", tag & 0xff)))?;
    Ok(ParsedInternalKey {
        user_key: extract_user_key(internal_key),
        sequence: tag >> 8,
        kind,
    })
}

/// Probe key for reading `user_key` as of `snapshot`.
///
/// Encoded the way memtable entries start (`var32(len) internal_key`), so
/// it can be compared against stored entries directly.
#[derive(Debug, Clone)]
pub struct LookupKey {
    buf: Vec<u8>,
    key_start: usize,
}

impl LookupKey {
    /// Snapshots above `MAX_SEQUENCE_NUMBER` read as the newest one.
    pub fn new(user_key: &[u8], snapshot: SequenceNumber) -> Self {
        let snapshot = snapshot.min(MAX_SEQUENCE_NUMBER);
        let ikey_len = internal_key_length(user_key.len());
        let mut buf = Vec::with_capacity(var32_length(ikey_len as u32) + ikey_len);
        put_var32(&mut buf, ikey_len as u32);
        let key_start = buf.len();
        put_internal_key(&mut buf, user_key, snapshot, ValueType::FOR_SEEK);
        Self { buf, key_start }
    }

    /// Length-prefixed internal key, comparable with memtable entries.
    pub fn memtable_key(&self) -> &[u8] {
        &self.buf
    }

    pub fn internal_key(&self) -> &[u8] {
        &self.buf[self.key_start..]
    }

    pub fn user_key(&self) -> &[u8] {
        extract_user_key(self.internal_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_key_roundtrip_parts() {
        let ikey = encode_internal_key(b"apple", 42, ValueType::Value);
        assert_eq!(ikey.len(), 5 + TAG_SIZE);
        let parsed = parse_internal_key(&ikey).unwrap();
        assert_eq!(parsed.user_key, b"apple");
        assert_eq!(parsed.sequence, 42);
        assert_eq!(parsed.kind, ValueType::Value);
    }

    #[test]
    fn test_tag_packing() {
        assert_eq!(pack_tag(1, ValueType::Deletion), 0x100);
        assert_eq!(pack_tag(1, ValueType::Value), 0x101);
        assert_eq!(
            pack_tag(MAX_SEQUENCE_NUMBER, ValueType::Value) >> 8,
            MAX_SEQUENCE_NUMBER
        );
    }

    #[test]
    #[should_panic(expected = "exceeds 56 bits")]
    fn test_sequence_overflow_panics() {
        pack_tag(MAX_SEQUENCE_NUMBER + 1, ValueType::Value);
    }

    #[test]
    fn test_parse_rejects_short_and_unknown_kind() {
        assert!(parse_internal_key(b"short").unwrap_err().is_corruption());

        let mut ikey = encode_internal_key(b"k", 3, ValueType::Value);
        let last_tag_byte = ikey.len() - TAG_SIZE;
        ikey[last_tag_byte] = 7;
        assert!(parse_internal_key(&ikey).is_err());
    }

    #[test]
    fn test_lookup_key_layout() {
        let lk = LookupKey::new(b"user", 9);
        assert_eq!(lk.user_key(), b"user");
        assert_eq!(lk.memtable_key()[0] as usize, lk.internal_key().len());
        let parsed = parse_internal_key(lk.internal_key()).unwrap();
        assert_eq!(parsed.sequence, 9);
        assert_eq!(parsed.kind, ValueType::FOR_SEEK);
    }

    #[test]
    fn test_lookup_key_clamps_snapshot() {
        let lk = LookupKey::new(b"user", u64::MAX);
        let parsed = parse_internal_key(lk.internal_key()).unwrap();
        assert_eq!(parsed.sequence, MAX_SEQUENCE_NUMBER);
        assert_eq!(parsed.user_key, b"user");
    }
}
