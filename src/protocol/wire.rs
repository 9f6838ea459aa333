//! Wire encoding primitives
//!
//! Two integer encodings are used by the protocol and must not be confused:
//!
//! - **Varints** prefix every variable-length byte string occurring
//!   mid-message and encode small integers (descriptors, counts). Base-128,
//!   most significant group first, continuation bit (0x80) set on all but
//!   the last byte. One value has exactly one encoding.
//! - **Packed sizes** are used only for `len` and `stat` size values:
//!   a minimal-length big-endian byte sequence with no length prefix.
//!   Zero is a single zero byte, never an empty sequence.
//!
//! Decoding distinguishes truncated input (a declared length running past
//! the end of the buffer) from trailing garbage after a complete message;
//! both are protocol errors, never storage errors.

use bytes::BufMut;

use crate::error::{Result, TetherError};

/// Maximum encoded length of a u64 varint (ten 7-bit groups)
const MAX_VARINT_LEN: usize = 10;

/// Append a varint to `buf`.
pub fn put_uvarint(buf: &mut Vec<u8>, value: u64) {
    let mut groups = 1;
    let mut rest = value >> 7;
    while rest != 0 {
        groups += 1;
        rest >>= 7;
    }
    for i in (0..groups).rev() {
        let mut byte = ((value >> (7 * i)) & 0x7f) as u8;
        if i != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
    }
}

/// Parse a varint from the front of `data`.
///
/// Returns the value and the number of bytes consumed.
pub fn uvarint(data: &[u8]) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if i == MAX_VARINT_LEN {
            return Err(TetherError::Protocol(
                "varint overflows 64 bits".to_string(),
            ));
        }
        value = (value << 7) | u64::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(TetherError::Protocol("truncated varint".to_string()))
}

/// Append a length-prefixed byte string to `buf`.
pub fn put_bytes(buf: &mut Vec<u8>, field: &[u8]) {
    put_uvarint(buf, field.len() as u64);
    buf.put_slice(field);
}

/// Parse a length-prefixed byte string from the front of `data`.
///
/// Returns the field and the number of bytes consumed (prefix included).
pub fn bytes_field(data: &[u8]) -> Result<(&[u8], usize)> {
    let (len, nb) = uvarint(data)?;
    let len = usize::try_from(len)
        .map_err(|_| TetherError::Protocol("field length overflows usize".to_string()))?;
    let end = nb
        .checked_add(len)
        .ok_or_else(|| TetherError::Protocol("field length overflows usize".to_string()))?;
    if end > data.len() {
        return Err(TetherError::Protocol(format!(
            "truncated field: declared length {} exceeds remaining {} bytes",
            len,
            data.len() - nb
        )));
    }
    Ok((&data[nb..end], end))
}

/// Encode a size as a minimal big-endian byte sequence.
///
/// Zero encodes as a single zero byte.
pub fn pack_size(value: u64) -> Vec<u8> {
    if value == 0 {
        return vec![0];
    }
    let width = 8 - value.leading_zeros() as usize / 8;
    let mut buf = Vec::with_capacity(width);
    for i in (0..width).rev() {
        buf.put_u8((value >> (8 * i)) as u8);
    }
    buf
}

/// Decode a packed big-endian size. The payload length is the length;
/// there is no prefix.
pub fn unpack_size(data: &[u8]) -> Result<u64> {
    if data.is_empty() {
        return Err(TetherError::Protocol("empty size payload".to_string()));
    }
    if data.len() > 8 {
        return Err(TetherError::Protocol(format!(
            "packed size is {} bytes, wider than 64 bits",
            data.len()
        )));
    }
    let mut value: u64 = 0;
    for &byte in data {
        value = (value << 8) | u64::from(byte);
    }
    Ok(value)
}

/// Pack a sequence of flags into a bit vector, bit *i* in byte i/8 at bit
/// position i%8. Trailing unused bits are zero.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut buf = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            buf[i / 8] |= 1 << (i % 8);
        }
    }
    buf
}

/// Unpack a bit vector produced by [`pack_bits`] back into `count` flags.
pub fn unpack_bits(data: &[u8], count: usize) -> Result<Vec<bool>> {
    if data.len() != count.div_ceil(8) {
        return Err(TetherError::Protocol(format!(
            "bit vector is {} bytes, want {} for {} keys",
            data.len(),
            count.div_ceil(8),
            count
        )));
    }
    Ok((0..count).map(|i| data[i / 8] & (1 << (i % 8)) != 0).collect())
}

/// Reject trailing bytes after a message with no raw-remainder field.
pub fn expect_end(data: &[u8], consumed: usize, what: &str) -> Result<()> {
    if data.len() > consumed {
        return Err(TetherError::Protocol(format!(
            "extra data after {} ({} trailing bytes)",
            what,
            data.len() - consumed
        )));
    }
    Ok(())
}
