//! LessDB - Binary Coding Primitives
//! Variable-length and fixed-width integer encodings shared by the
//! memtable entry format and the block format.
//!
//! ## Var32
//! Little-endian groups of 7 bits, high bit set on every byte except the
//! last. A `u32` takes at most 5 bytes.

use bytes::{Buf, BufMut};

use crate::error::{LessError, Result};

/// Longest encoding of a `u32` as var32.
pub const MAX_VAR32_LEN: usize = 5;

/// Append `value` as var32.
pub fn put_var32<B: BufMut>(dst: &mut B, mut value: u32) {
    while value >= 0x80 {
        dst.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// Number of bytes `put_var32` writes for `value`.
pub fn var32_length(mut value: u32) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Append `bytes` prefixed by its length as var32.
pub fn put_length_prefixed<B: BufMut>(dst: &mut B, bytes: &[u8]) {
    put_var32(dst, bytes.len() as u32);
    dst.put_slice(bytes);
}

/// Decode a var32 from the front of `input`, advancing it past the
/// consumed bytes. On failure `input` is left untouched.
pub fn get_var32(input: &mut &[u8]) -> Result<u32> {
    let bytes = *input;
    let mut result = 0u32;
    for (i, &byte) in bytes.iter().enumerate().take(MAX_VAR32_LEN) {
        result |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            *input = &bytes[i + 1..];
            return Ok(result);
        }
    }
    if bytes.len() < MAX_VAR32_LEN {
        Err(LessError::corruption("truncated var32"))
    } else {
        Err(LessError::corruption("var32 longer than 5 bytes"))
    }
}

/// Decode a var32 length followed by that many bytes.
pub fn get_length_prefixed<'a>(input: &mut &'a [u8]) -> Result<&'a [u8]> {
    let mut rest = *input;
    let len = get_var32(&mut rest)? as usize;
    if rest.len() < len {
        return Err(LessError::corruption(format!(
            "length-prefixed slice wants {} bytes, {} left",
            len,
            rest.len()
        )));
    }
    let (bytes, tail) = rest.split_at(len);
    *input = tail;
    Ok(bytes)
}

/// Read a little-endian `u32` from the first 4 bytes of `src`.
pub fn decode_fixed32(mut src: &[u8]) -> u32 {
    debug_assert!(src.len() >= 4);
    src.get_u32_le()
}

/// Read a little-endian `u64` from the first 8 bytes of `src`.
pub fn decode_fixed64(mut src: &[u8]) -> u64 {
    debug_assert!(src.len() >= 8);
    src.get_u64_le()
}
