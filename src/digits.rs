//! Digit codec: raw bytes ⇄ fixed-width decimal strings.
//!
//! Byte sequences are read as big-endian unsigned integers.  Values are held
//! in a `u128`, so a single conversion handles at most 16 significant bytes;
//! every layout the channel accepts stays well below that.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

const MAX_VALUE_BYTES: usize = 16;

/// Largest byte count `C` for a field of `digits` decimal digits, computed as
/// `floor(bit_length(10^digits - 1) / 8)`.
///
/// Note that `256^C - 1` may render one digit wider than `digits`; callers
/// size the field one digit larger than the argument passed here.
pub fn byte_capacity(digits: usize) -> usize {
    let Some(limit) = u32::try_from(digits).ok().and_then(|d| 10u128.checked_pow(d)) else {
        return MAX_VALUE_BYTES;
    };
    let max = limit - 1;
    let bit_length = (u128::BITS - max.leading_zeros()) as usize;
    bit_length / 8
}

/// Render `bytes` as a big-endian unsigned integer, left-padded with `'0'`
/// to `width` digits.
pub fn bytes_to_decimal(bytes: &[u8], width: usize) -> Result<String> {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    let significant = &bytes[first..];
    if significant.len() > MAX_VALUE_BYTES {
        return Err(Error::ChunkTooLarge { bytes: bytes.len(), width });
    }

    let value = if significant.is_empty() {
        0
    } else {
        BigEndian::read_uint128(significant, significant.len())
    };

    let rendered = value.to_string();
    if rendered.len() > width {
        return Err(Error::ChunkTooLarge { bytes: bytes.len(), width });
    }
    Ok(format!("{rendered:0>width$}"))
}

/// Parse a decimal string and render it as exactly `byte_width` big-endian
/// bytes, left-padded with zeros.
pub fn decimal_to_bytes(digits: &str, byte_width: usize) -> Result<Vec<u8>> {
    let value = parse_decimal(digits)?;
    if truncate(value, byte_width) != value {
        return Err(Error::ValueOverflow { value, byte_width });
    }
    Ok(write_be(value, byte_width))
}

/// Like [`decimal_to_bytes`], but a value too large for `byte_width` keeps
/// only its low-order bytes (`value mod 256^byte_width`) instead of failing.
pub fn decimal_to_bytes_truncating(digits: &str, byte_width: usize) -> Result<Vec<u8>> {
    let value = parse_decimal(digits)?;
    Ok(write_be(truncate(value, byte_width), byte_width))
}

fn truncate(value: u128, byte_width: usize) -> u128 {
    match byte_width {
        0 => 0,
        w if w >= MAX_VALUE_BYTES => value,
        w => value & ((1u128 << (8 * w)) - 1),
    }
}

fn write_be(value: u128, byte_width: usize) -> Vec<u8> {
    let mut out = vec![0u8; byte_width];
    if byte_width > 0 {
        let n = byte_width.min(MAX_VALUE_BYTES);
        BigEndian::write_uint128(&mut out[byte_width - n..], value, n);
    }
    out
}

/// Parse an all-ASCII-digit string.  Signs, whitespace and empty input are
/// rejected.
pub fn parse_decimal(digits: &str) -> Result<u128> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidDigits(digits.to_owned()));
    }
    digits
        .parse::<u128>()
        .map_err(|_| Error::InvalidDigits(digits.to_owned()))
}
