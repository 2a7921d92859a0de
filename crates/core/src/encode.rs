//! Byte-aligned value encoders for the BRS format.
//!
//! These are stateless functions returning owned byte vectors that the save
//! codec concatenates in a fixed order. `BitPacker` reuses them for the
//! same values inside bit streams.
//!
//! # Layouts
//!
//! ```text
//! i32 / u16     little-endian
//! string        ASCII:  i32(len + 1) | bytes | 0x00
//!               other:  i32(-len)    | len x u16 LE code units
//! identifier    16 bytes as four 4-byte groups, each group reversed
//! array         i32(count) | count x element
//! section       i32(len) | i32(0) | len bytes      (0 = stored uncompressed)
//! ```

use uuid::Uuid;

use crate::cursor::ByteCursor;
use crate::error::{EncodingError, Result};

/// Encode a signed 32-bit integer, little-endian.
pub fn write_i32(value: i32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Encode an unsigned 16-bit integer, little-endian.
pub fn write_u16(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

/// Convert a length to the i32 used by every length prefix.
pub fn length_prefix(operation: &'static str, length: usize) -> Result<i32> {
    i32::try_from(length).map_err(|_| EncodingError::LengthOverflow { operation, length }.into())
}

/// Concatenate byte slices in order.
pub fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let total: usize = parts.iter().map(|p| p.len()).sum();
    let mut out = Vec::with_capacity(total);
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

/// Encode a string with the sign-of-length convention.
///
/// Pure ASCII text is written as a positive length (including the null
/// terminator), the raw bytes and a trailing zero. Anything else is written
/// as a negative count of UTF-16 code units followed by the units in
/// little-endian order, with no terminator.
pub fn write_string(text: &str) -> Result<Vec<u8>> {
    if text.is_ascii() {
        let len = length_prefix("write_string", text.len() + 1)?;
        let mut out = Vec::with_capacity(4 + text.len() + 1);
        out.extend_from_slice(&write_i32(len));
        out.extend_from_slice(text.as_bytes());
        out.push(0);
        Ok(out)
    } else {
        let units: Vec<u16> = text.encode_utf16().collect();
        let len = length_prefix("write_string", units.len())?;
        let mut out = Vec::with_capacity(4 + units.len() * 2);
        out.extend_from_slice(&write_i32(-len));
        for unit in units {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        Ok(out)
    }
}

/// Parse the textual form of an identifier.
pub fn parse_identifier(text: &str) -> Result<Uuid> {
    Uuid::parse_str(text).map_err(|_| EncodingError::InvalidIdentifier(text.to_string()).into())
}

/// Encode a 16-byte identifier in the format's mixed-endian layout.
///
/// The canonical bytes are split into four 4-byte groups and the byte
/// order inside each group is reversed. The groups themselves keep their
/// order.
pub fn write_identifier(id: &Uuid) -> Result<Vec<u8>> {
    let mut cursor = ByteCursor::new(id.as_bytes());
    let mut out = Vec::with_capacity(16);
    for group in cursor.chunk(4)? {
        out.extend(group.iter().rev());
    }
    Ok(out)
}

/// Encode a count-prefixed array using `encode_item` for each element.
pub fn write_array<T, F>(items: &[T], mut encode_item: F) -> Result<Vec<u8>>
where
    F: FnMut(&T) -> Result<Vec<u8>>,
{
    let mut out = write_i32(length_prefix("write_array", items.len())?).to_vec();
    for item in items {
        out.extend(encode_item(item)?);
    }
    Ok(out)
}

/// Frame concatenated parts as an uncompressed section.
///
/// Layout: `i32 total_len`, `i32 0` (no compressed length), raw bytes.
pub fn write_uncompressed(parts: &[&[u8]]) -> Result<Vec<u8>> {
    let data = concat(parts);
    let len = length_prefix("write_uncompressed", data.len())?;

    let mut out = Vec::with_capacity(8 + data.len());
    out.extend_from_slice(&write_i32(len));
    out.extend_from_slice(&write_i32(0));
    out.extend(data);
    Ok(out)
}

/// Swap the first and third channel of a 4-byte color (RGBA <-> BGRA).
pub fn bgra([b, g, r, a]: [u8; 4]) -> [u8; 4] {
    [r, g, b, a]
}
