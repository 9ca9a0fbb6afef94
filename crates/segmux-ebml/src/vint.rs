//! Variable-length integers.
//!
//! EBML uses VINTs for element ids and sizes. The count of leading zero bits
//! in the first byte gives the total length:
//! - 1xxxxxxx: 1 byte (7 data bits)
//! - 01xxxxxx xxxxxxxx: 2 bytes (14 data bits)
//! - ... up to 8 bytes

use crate::error::{EbmlError, Result};

/// Maximum VINT length in bytes.
pub const MAX_VINT_LENGTH: usize = 8;

/// Maximum element id length in bytes.
pub const MAX_ID_LENGTH: usize = 4;

/// Total VINT length announced by its first byte.
pub fn vint_length(first: u8) -> Option<usize> {
    if first == 0 {
        None
    } else {
        Some(first.leading_zeros() as usize + 1)
    }
}

/// Read an unsigned VINT from the start of `data`, marker bit removed.
///
/// Returns the value and the number of bytes consumed.
pub fn read_vint(data: &[u8]) -> Result<(u64, usize)> {
    let first = *data.first().ok_or(EbmlError::InvalidVint { offset: 0 })?;
    let length = vint_length(first).ok_or(EbmlError::InvalidVint { offset: 0 })?;
    if data.len() < length {
        return Err(EbmlError::InvalidVint { offset: 0 });
    }

    let mut value = (first as u64) & (0xFFu64 >> length);
    for byte in &data[1..length] {
        value = (value << 8) | *byte as u64;
    }
    Ok((value, length))
}

/// Read an element id (marker bits kept).
pub fn read_id(data: &[u8]) -> Result<(u32, usize)> {
    let first = *data.first().ok_or(EbmlError::InvalidVint { offset: 0 })?;
    let length = vint_length(first).ok_or(EbmlError::InvalidVint { offset: 0 })?;
    if length > MAX_ID_LENGTH || data.len() < length {
        return Err(EbmlError::InvalidVint { offset: 0 });
    }

    let id = data[..length]
        .iter()
        .fold(0u32, |acc, b| (acc << 8) | *b as u32);
    Ok((id, length))
}

/// Read an element size; `None` means "unknown size" (all data bits set).
pub fn read_size(data: &[u8]) -> Result<(Option<u64>, usize)> {
    let (value, length) = read_vint(data)?;
    Ok((size_value(value, length), length))
}

/// Interpret a decoded size value, mapping the reserved all-ones pattern.
pub fn size_value(value: u64, length: usize) -> Option<u64> {
    let unknown = (1u64 << (7 * length)) - 1;
    if value == unknown {
        None
    } else {
        Some(value)
    }
}

/// Read a signed VINT as used by EBML lacing deltas.
///
/// The value is stored with a bias of `2^(7*len - 1) - 1`.
pub fn read_signed_vint(data: &[u8]) -> Result<(i64, usize)> {
    let (raw, length) = read_vint(data)?;
    let bias = (1i64 << (7 * length - 1)) - 1;
    Ok((raw as i64 - bias, length))
}

/// Smallest VINT length able to carry `value` (all-ones is reserved).
pub fn encoded_length(value: u64) -> usize {
    (1..=MAX_VINT_LENGTH)
        .find(|len| value < (1u64 << (7 * len)) - 1)
        .unwrap_or(MAX_VINT_LENGTH)
}

/// Encode an unsigned value as a VINT of the minimal length.
pub fn encode_vint(value: u64) -> Vec<u8> {
    encode_vint_with_length(value, encoded_length(value))
}

/// Encode an unsigned value as a VINT of exactly `length` bytes.
pub fn encode_vint_with_length(value: u64, length: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(length);
    for i in (0..length).rev() {
        bytes.push((value >> (8 * i)) as u8);
    }
    bytes[0] |= 0x80 >> (length - 1);
    bytes
}

/// Encode a signed lacing delta.
pub fn encode_signed_vint(value: i64) -> Vec<u8> {
    let length = (1..=MAX_VINT_LENGTH)
        .find(|len| {
            let bias = (1i64 << (7 * len - 1)) - 1;
            value >= -bias && value <= bias
        })
        .unwrap_or(MAX_VINT_LENGTH);
    let bias = (1i64 << (7 * length - 1)) - 1;
    encode_vint_with_length((value + bias) as u64, length)
}

/// Encode an element id (ids already carry their marker bits).
pub fn encode_id(id: u32) -> Vec<u8> {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(3);
    bytes[skip..].to_vec()
}
