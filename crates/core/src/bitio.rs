//! Bit-level output buffer for the BRS brick and component streams.
//!
//! `BitPacker` fills each byte LSB-first (least significant bit first), which
//! is the order the game's archive reader consumes bits in. Byte-aligned
//! encoders from [`crate::encode`] are written through the same path, so a
//! string or i32 written mid-byte lands bit-shifted, exactly as the reader
//! expects.
//!
//! # Padding Rules
//! - `finish` pads an incomplete final byte with zero bits
//! - `align` does the same mid-stream (used before each brick)
//!
//! # Example
//! ```
//! use brs_transfer_core::bitio::BitPacker;
//!
//! let mut packer = BitPacker::new();
//! packer.write_bit(true);
//! packer.write_bounded_int(3, 4).unwrap(); // two bits: 1, 1
//! assert_eq!(packer.bit_len(), 3);
//!
//! let bytes = packer.finish();
//! assert_eq!(bytes, vec![0b0000_0111]);
//! ```

use uuid::Uuid;

use crate::encode;
use crate::error::{EncodingError, Result};
use crate::save::UnrealValue;

/// Writes bits LSB-first into a growing byte buffer.
///
/// # Invariants
/// - `bit_num` is always < 8
/// - bits of `cur` at or above `bit_num` are zero
#[derive(Debug, Clone, Default)]
pub struct BitPacker {
    /// Completed bytes
    bytes: Vec<u8>,
    /// Current partial byte
    cur: u8,
    /// Number of bits written into `cur` (0-7)
    bit_num: u8,
}

impl BitPacker {
    /// Create a new packer with empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a single bit at the next position of the current byte.
    pub fn write_bit(&mut self, bit: bool) {
        self.cur |= (bit as u8) << self.bit_num;
        self.bit_num += 1;
        if self.bit_num == 8 {
            self.flush_cur();
        }
    }

    /// Write `len` bits from `src`, reading each byte LSB-first.
    ///
    /// # Errors
    /// `EncodingError::ValueOutOfRange` if `src` holds fewer than `len` bits.
    pub fn write_bits(&mut self, src: &[u8], len: usize) -> Result<()> {
        let available = src.len() * 8;
        if len > available {
            return Err(EncodingError::ValueOutOfRange {
                operation: "write_bits",
                value: len as u64,
                max: available as u64 + 1,
            }
            .into());
        }

        for bit in 0..len {
            self.write_bit(src[bit >> 3] & (1 << (bit & 7)) != 0);
        }
        Ok(())
    }

    /// Write every bit of `src`.
    pub fn write_bytes(&mut self, src: &[u8]) {
        if self.bit_num == 0 {
            self.bytes.extend_from_slice(src);
            return;
        }
        for &byte in src {
            self.push_low_bits(byte, 8);
        }
    }

    /// Flush a partial byte, zero-padded. No-op when already aligned.
    pub fn align(&mut self) {
        if self.bit_num > 0 {
            self.flush_cur();
        }
    }

    /// Write an integer known to lie in `[0, max)` using the fewest bits
    /// whose accumulated range covers `max`.
    ///
    /// Bits are emitted low to high and the loop stops as soon as the
    /// value built so far plus the next mask would reach `max`. For
    /// non-power-of-two bounds, large values can take fewer bits than
    /// small ones.
    ///
    /// # Errors
    /// - `EncodingError::InvalidBound` if `max < 2`
    /// - `EncodingError::ValueOutOfRange` if `value >= max`
    ///
    /// Nothing is written on error.
    pub fn write_bounded_int(&mut self, value: u32, max: u32) -> Result<()> {
        if max < 2 {
            return Err(EncodingError::InvalidBound {
                operation: "write_bounded_int",
                max: max as u64,
            }
            .into());
        }
        if value >= max {
            return Err(EncodingError::ValueOutOfRange {
                operation: "write_bounded_int",
                value: value as u64,
                max: max as u64,
            }
            .into());
        }

        // Widened so `accumulated + mask` cannot wrap; a 32-bit mask that
        // shifts out to zero ends the loop in the game's reader.
        let max = max as u64;
        let value = value as u64;
        let mut accumulated = 0u64;
        let mut mask = 1u64;

        while accumulated + mask < max && mask <= u32::MAX as u64 {
            let set = value & mask != 0;
            self.write_bit(set);
            if set {
                accumulated |= mask;
            }
            mask <<= 1;
        }
        Ok(())
    }

    /// Write an unsigned integer as 7-bit groups, low group first.
    ///
    /// Each group is preceded by a continuation bit that is set when more
    /// groups follow.
    pub fn write_packed_unsigned(&mut self, value: u64) {
        let mut value = value;
        loop {
            let group = (value & 0x7F) as u8;
            value >>= 7;
            self.write_bit(value != 0);
            self.push_low_bits(group, 7);
            if value == 0 {
                break;
            }
        }
    }

    /// Write a signed integer as `(|v| << 1) | sign` through
    /// [`write_packed_unsigned`](Self::write_packed_unsigned).
    ///
    /// Bit 0 is `1` for non-negative values and `0` for negative ones. This
    /// is not zig-zag encoding; the polarity is part of the wire format.
    pub fn write_packed_signed(&mut self, value: i32) {
        let magnitude = value.unsigned_abs() as u64;
        self.write_packed_unsigned((magnitude << 1) | (value >= 0) as u64);
    }

    /// Write an IEEE-754 single as its 4 little-endian bytes.
    pub fn write_f32(&mut self, value: f32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a little-endian i32.
    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&encode::write_i32(value));
    }

    /// Write a length-prefixed string (see [`encode::write_string`]).
    pub fn write_string(&mut self, text: &str) -> Result<()> {
        let bytes = encode::write_string(text)?;
        self.write_bytes(&bytes);
        Ok(())
    }

    /// Write a 16-byte identifier (see [`encode::write_identifier`]).
    pub fn write_identifier(&mut self, id: &Uuid) -> Result<()> {
        let bytes = encode::write_identifier(id)?;
        self.write_bytes(&bytes);
        Ok(())
    }

    /// Write `i32 count` followed by each item through `write_item`.
    pub fn write_array<T, F>(&mut self, items: &[T], mut write_item: F) -> Result<()>
    where
        F: FnMut(&mut Self, &T) -> Result<()>,
    {
        self.write_i32(encode::length_prefix("write_array", items.len())?);
        for item in items {
            write_item(self, item)?;
        }
        Ok(())
    }

    /// Write the parts as one uncompressed section
    /// (see [`encode::write_uncompressed`]).
    pub fn write_section(&mut self, parts: &[&[u8]]) -> Result<()> {
        let bytes = encode::write_uncompressed(parts)?;
        self.write_bytes(&bytes);
        Ok(())
    }

    /// Write a component property value of the declared unreal type.
    ///
    /// # Errors
    /// - `EncodingError::UnknownUnrealType` for an unsupported type name
    /// - `EncodingError::UnrealTypeMismatch` if `value` has the wrong shape
    pub fn write_unreal(&mut self, property: &str, type_name: &str, value: &UnrealValue) -> Result<()> {
        let mismatch = || EncodingError::UnrealTypeMismatch {
            property: property.to_string(),
            expected: type_name.to_string(),
            actual: value.kind(),
        };

        match (type_name, value) {
            ("Class" | "String" | "Object", UnrealValue::Text(text)) => self.write_string(text)?,
            ("Boolean", UnrealValue::Boolean(flag)) => self.write_i32(*flag as i32),
            ("Float", UnrealValue::Number(n)) => self.write_f32(*n as f32),
            ("Byte", UnrealValue::Number(n)) => self.write_bytes(&[(*n as i64 & 0xFF) as u8]),
            ("Color", UnrealValue::Array(channels)) if channels.len() == 4 => {
                let mut color = [0u8; 4];
                for (slot, channel) in color.iter_mut().zip(channels) {
                    *slot = (*channel as i64 & 0xFF) as u8;
                }
                self.write_bytes(&encode::bgra(color));
            }
            ("Rotator", UnrealValue::Array(angles)) if angles.len() == 3 => {
                for angle in angles {
                    self.write_f32(*angle as f32);
                }
            }
            ("Class" | "String" | "Object" | "Boolean" | "Float" | "Byte" | "Color" | "Rotator", _) => {
                return Err(mismatch().into());
            }
            _ => return Err(EncodingError::UnknownUnrealType(type_name.to_string()).into()),
        }
        Ok(())
    }

    /// Finish writing and return the output bytes.
    ///
    /// A partial final byte is padded with zeros. This consumes the packer,
    /// so a buffer can only be finished once.
    pub fn finish(mut self) -> Vec<u8> {
        self.align();
        self.bytes
    }

    /// Finish writing and return the bytes framed with an i32 length prefix,
    /// for embedding as a sub-section.
    pub fn finish_section(self) -> Result<Vec<u8>> {
        let body = self.finish();
        let len = encode::length_prefix("finish_section", body.len())?;

        let mut out = Vec::with_capacity(4 + body.len());
        out.extend_from_slice(&encode::write_i32(len));
        out.extend(body);
        Ok(out)
    }

    /// Return the number of complete bytes written so far.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Return the total number of bits written (including partial byte).
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 + self.bit_num as usize
    }

    fn push_low_bits(&mut self, value: u8, count: u8) {
        for bit in 0..count {
            self.write_bit(value & (1 << bit) != 0);
        }
    }

    fn flush_cur(&mut self) {
        self.bytes.push(self.cur);
        self.cur = 0;
        self.bit_num = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use proptest::prelude::*;

    /// LSB-first reader mirroring the packer, used only to check encodings.
    struct BitReader<'a> {
        data: &'a [u8],
        pos: usize,
    }

    impl<'a> BitReader<'a> {
        fn new(data: &'a [u8]) -> Self {
            Self { data, pos: 0 }
        }

        fn bit(&mut self) -> bool {
            let bit = self.data[self.pos >> 3] & (1 << (self.pos & 7)) != 0;
            self.pos += 1;
            bit
        }

        fn bits(&mut self, count: usize) -> u64 {
            (0..count).fold(0, |acc, i| acc | ((self.bit() as u64) << i))
        }

        fn bounded_int(&mut self, max: u32) -> u32 {
            let max = max as u64;
            let mut value = 0u64;
            let mut mask = 1u64;
            while value + mask < max && mask <= u32::MAX as u64 {
                if self.bit() {
                    value |= mask;
                }
                mask <<= 1;
            }
            value as u32
        }

        fn packed_unsigned(&mut self) -> u64 {
            let mut value = 0u64;
            let mut shift = 0;
            loop {
                let more = self.bit();
                value |= self.bits(7) << shift;
                shift += 7;
                if !more {
                    return value;
                }
            }
        }

        fn packed_signed(&mut self) -> i64 {
            let raw = self.packed_unsigned();
            let magnitude = (raw >> 1) as i64;
            if raw & 1 == 1 {
                magnitude
            } else {
                -magnitude
            }
        }

        fn i32(&mut self) -> i32 {
            self.bits(32) as u32 as i32
        }

        fn string(&mut self) -> String {
            let len = self.i32();
            if len >= 0 {
                let bytes: Vec<u8> = (0..len).map(|_| self.bits(8) as u8).collect();
                assert_eq!(bytes.last(), Some(&0), "missing null terminator");
                String::from_utf8(bytes[..bytes.len() - 1].to_vec()).unwrap()
            } else {
                let units: Vec<u16> = (0..-len).map(|_| self.bits(16) as u16).collect();
                String::from_utf16(&units).unwrap()
            }
        }
    }

    #[test]
    fn test_finish_empty() {
        assert!(BitPacker::new().finish().is_empty());
    }

    #[test]
    fn test_eight_bits_no_padding() {
        let mut packer = BitPacker::new();
        for &bit in &[true, false, true, true, false, false, true, false] {
            packer.write_bit(bit);
        }
        assert_eq!(packer.byte_len(), 1);
        assert_eq!(packer.finish(), vec![0b0100_1101]);
    }

    #[test]
    fn test_nine_bits_pads_second_byte() {
        let mut packer = BitPacker::new();
        for _ in 0..9 {
            packer.write_bit(true);
        }
        assert_eq!(packer.finish(), vec![0xFF, 0b0000_0001]);
    }

    #[test]
    fn test_write_bits_partial_source() {
        let mut packer = BitPacker::new();
        packer.write_bits(&[0b1010_1101, 0b0000_0011], 10).unwrap();
        assert_eq!(packer.bit_len(), 10);
        assert_eq!(packer.finish(), vec![0b1010_1101, 0b0000_0011]);
    }

    #[test]
    fn test_write_bits_too_many() {
        let mut packer = BitPacker::new();
        let result = packer.write_bits(&[0xFF], 9);
        assert!(matches!(
            result,
            Err(Error::Encoding(EncodingError::ValueOutOfRange { .. }))
        ));
        assert_eq!(packer.bit_len(), 0);
    }

    #[test]
    fn test_unaligned_bytes() {
        let mut packer = BitPacker::new();
        packer.write_bit(true);
        packer.write_bytes(&[0xFF]);
        assert_eq!(packer.finish(), vec![0xFF, 0b0000_0001]);
    }

    #[test]
    fn test_align() {
        let mut packer = BitPacker::new();
        packer.align();
        assert_eq!(packer.bit_len(), 0);

        packer.write_bit(true);
        packer.align();
        packer.write_bit(true);
        assert_eq!(packer.finish(), vec![1, 1]);
    }

    #[test]
    fn test_bounded_int_scenarios() {
        let mut packer = BitPacker::new();
        packer.write_bounded_int(3, 4).unwrap();
        assert_eq!(packer.bit_len(), 2);
        assert_eq!(packer.finish(), vec![0b11]);

        let mut packer = BitPacker::new();
        packer.write_bounded_int(0, 2).unwrap();
        assert_eq!(packer.bit_len(), 1);
        assert_eq!(packer.finish(), vec![0]);
    }

    #[test]
    fn test_bounded_int_adaptive_width() {
        // max = 5: value 4 takes three bits
        let mut packer = BitPacker::new();
        packer.write_bounded_int(4, 5).unwrap();
        assert_eq!(packer.bit_len(), 3);

        // 0b11 accumulates to 3 and 3 + 4 >= 5, so bit 2 is never written
        let mut packer = BitPacker::new();
        packer.write_bounded_int(3, 5).unwrap();
        assert_eq!(packer.bit_len(), 2);
    }

    #[test]
    fn test_bounded_int_orientation_range() {
        let mut packer = BitPacker::new();
        packer.write_bounded_int(23, 24).unwrap();
        let bytes = packer.finish();
        assert_eq!(BitReader::new(&bytes).bounded_int(24), 23);
    }

    #[test]
    fn test_bounded_int_errors() {
        let mut packer = BitPacker::new();
        assert!(matches!(
            packer.write_bounded_int(0, 1),
            Err(Error::Encoding(EncodingError::InvalidBound { max: 1, .. }))
        ));
        assert!(matches!(
            packer.write_bounded_int(4, 4),
            Err(Error::Encoding(EncodingError::ValueOutOfRange {
                operation: "write_bounded_int",
                value: 4,
                max: 4
            }))
        ));
        assert_eq!(packer.bit_len(), 0);
    }

    #[test]
    fn test_packed_unsigned_300() {
        let mut packer = BitPacker::new();
        packer.write_packed_unsigned(300);
        assert_eq!(packer.bit_len(), 16);

        let bytes = packer.finish();
        let mut reader = BitReader::new(&bytes);
        assert!(reader.bit()); // continuation: 300 >> 7 = 2
        assert_eq!(reader.bits(7), 44);
        assert!(!reader.bit());
        assert_eq!(reader.bits(7), 2);
    }

    #[test]
    fn test_packed_unsigned_zero() {
        let mut packer = BitPacker::new();
        packer.write_packed_unsigned(0);
        assert_eq!(packer.bit_len(), 8);
        assert_eq!(packer.finish(), vec![0]);
    }

    #[test]
    fn test_packed_signed_polarity() {
        let mut packer = BitPacker::new();
        packer.write_packed_signed(5);
        packer.write_packed_signed(-5);
        packer.write_packed_signed(0);
        let bytes = packer.finish();

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.packed_unsigned(), 11); // (5 << 1) | 1
        assert_eq!(reader.packed_unsigned(), 10); // (5 << 1) | 0
        assert_eq!(reader.packed_unsigned(), 1); // zero is non-negative
    }

    #[test]
    fn test_packed_signed_extremes() {
        let mut packer = BitPacker::new();
        packer.write_packed_signed(i32::MIN);
        packer.write_packed_signed(i32::MAX);
        let bytes = packer.finish();

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.packed_signed(), i32::MIN as i64);
        assert_eq!(reader.packed_signed(), i32::MAX as i64);
    }

    #[test]
    fn test_float() {
        let mut packer = BitPacker::new();
        packer.write_f32(1.5);
        assert_eq!(packer.finish(), 1.5f32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_strings_in_stream() {
        let mut packer = BitPacker::new();
        packer.write_bit(true);
        packer.write_string("brick").unwrap();
        packer.write_string("ブリック").unwrap();
        let bytes = packer.finish();

        let mut reader = BitReader::new(&bytes);
        assert!(reader.bit());
        assert_eq!(reader.string(), "brick");
        assert_eq!(reader.string(), "ブリック");
    }

    #[test]
    fn test_array_and_section() {
        let mut packer = BitPacker::new();
        packer
            .write_array(&[7u32, 1], |p, v| p.write_bounded_int(*v, 8))
            .unwrap();
        let bytes = packer.finish();
        assert_eq!(&bytes[0..4], &[2, 0, 0, 0]);
        assert_eq!(bytes[4], 0b001_111);

        let mut packer = BitPacker::new();
        packer.write_section(&[&[9, 9]]).unwrap();
        assert_eq!(packer.finish(), vec![2, 0, 0, 0, 0, 0, 0, 0, 9, 9]);
    }

    #[test]
    fn test_finish_section() {
        let mut packer = BitPacker::new();
        packer.write_bit(true);
        let bytes = packer.finish_section().unwrap();
        assert_eq!(bytes, vec![1, 0, 0, 0, 1]);

        assert_eq!(BitPacker::new().finish_section().unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_unreal_values() {
        let mut packer = BitPacker::new();
        packer
            .write_unreal("Enabled", "Boolean", &UnrealValue::Boolean(true))
            .unwrap();
        packer
            .write_unreal("Tint", "Color", &UnrealValue::Array(vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        packer
            .write_unreal("Level", "Byte", &UnrealValue::Number(258.0))
            .unwrap();
        let bytes = packer.finish();
        assert_eq!(bytes, vec![1, 0, 0, 0, 3, 2, 1, 4, 2]);
    }

    #[test]
    fn test_unreal_mismatch_and_unknown() {
        let mut packer = BitPacker::new();
        assert!(matches!(
            packer.write_unreal("Enabled", "Boolean", &UnrealValue::Number(1.0)),
            Err(Error::Encoding(EncodingError::UnrealTypeMismatch { .. }))
        ));
        assert!(matches!(
            packer.write_unreal("Angles", "Rotator", &UnrealValue::Array(vec![0.0])),
            Err(Error::Encoding(EncodingError::UnrealTypeMismatch { .. }))
        ));
        assert!(matches!(
            packer.write_unreal("X", "Vector", &UnrealValue::Array(vec![0.0; 3])),
            Err(Error::Encoding(EncodingError::UnknownUnrealType(_)))
        ));
        assert_eq!(packer.bit_len(), 0);
    }

    proptest! {
        #[test]
        fn prop_bounded_int_round_trip(max in 2u32..=u32::MAX, seed in any::<u32>(), lead in 0usize..8) {
            let value = seed % max;
            let mut packer = BitPacker::new();
            for _ in 0..lead {
                packer.write_bit(true);
            }
            packer.write_bounded_int(value, max).unwrap();
            let bytes = packer.finish();

            let mut reader = BitReader::new(&bytes);
            reader.bits(lead);
            prop_assert_eq!(reader.bounded_int(max), value);
        }

        #[test]
        fn prop_packed_signed_round_trip(values in prop::collection::vec(any::<i32>(), 1..16)) {
            let mut packer = BitPacker::new();
            for &v in &values {
                packer.write_packed_signed(v);
            }
            let bytes = packer.finish();

            let mut reader = BitReader::new(&bytes);
            for &v in &values {
                prop_assert_eq!(reader.packed_signed(), v as i64);
            }
        }

        #[test]
        fn prop_string_round_trip(text in "\\PC{0,24}", lead in 0usize..8) {
            let mut packer = BitPacker::new();
            for _ in 0..lead {
                packer.write_bit(false);
            }
            packer.write_string(&text).unwrap();
            let bytes = packer.finish();

            let mut reader = BitReader::new(&bytes);
            reader.bits(lead);
            let len = i32::from_le_bytes(bytes_at(&bytes, lead));
            prop_assert_eq!(len >= 0, text.is_ascii());
            prop_assert_eq!(reader.string(), text);
        }
    }

    /// Read the i32 that starts `lead` bits into `bytes`.
    fn bytes_at(bytes: &[u8], lead: usize) -> [u8; 4] {
        let mut reader = BitReader::new(bytes);
        reader.bits(lead);
        (reader.bits(32) as u32).to_le_bytes()
    }
}
