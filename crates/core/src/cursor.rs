//! Forward-only reader view over a byte buffer.
//!
//! `ByteCursor` pairs a borrowed buffer with an explicit read offset. Each
//! `take` hands out the next `n` bytes and advances the offset; the offset
//! never moves backwards.
//!
//! # Example
//! ```
//! use brs_transfer_core::cursor::ByteCursor;
//!
//! let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
//! let mut cursor = ByteCursor::new(&data);
//! assert_eq!(&*cursor.take(2, false).unwrap(), &[1, 2]);
//!
//! let groups = cursor.chunk(3).unwrap();
//! assert_eq!(groups.len(), 2);
//! assert_eq!(&*groups[1], &[6, 7, 8]);
//! assert!(cursor.is_empty());
//! ```

use std::borrow::Cow;

use crate::error::{CursorError, Result};

/// Forward-only read position over a byte slice.
///
/// # Invariants
/// - `offset <= data.len()`
/// - `offset` is monotonically non-decreasing
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Take the next `len` bytes and advance.
    ///
    /// With `copy = false` the result borrows the underlying buffer; with
    /// `copy = true` it is an owned copy the caller may mutate freely.
    ///
    /// # Errors
    /// `CursorError::OutOfBounds` if fewer than `len` bytes remain. The
    /// offset is left unchanged on failure.
    pub fn take(&mut self, len: usize, copy: bool) -> Result<Cow<'a, [u8]>> {
        let available = self.remaining();
        if len > available {
            return Err(CursorError::OutOfBounds {
                offset: self.offset,
                requested: len,
                available,
            }
            .into());
        }

        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;

        Ok(if copy {
            Cow::Owned(slice.to_vec())
        } else {
            Cow::Borrowed(slice)
        })
    }

    /// Split everything that remains into `len`-byte copies, in order.
    ///
    /// # Errors
    /// - `CursorError::ZeroLength` if `len == 0`
    /// - `CursorError::OutOfBounds` if the remainder is not a multiple of
    ///   `len`; `offset` is where the short final chunk would start
    pub fn chunk(&mut self, len: usize) -> Result<Vec<Cow<'a, [u8]>>> {
        if len == 0 {
            return Err(CursorError::ZeroLength.into());
        }

        let remaining = self.remaining();
        let short = remaining % len;
        if short != 0 {
            return Err(CursorError::OutOfBounds {
                offset: self.offset + remaining - short,
                requested: len,
                available: short,
            }
            .into());
        }

        let mut out = Vec::with_capacity(remaining / len);
        while !self.is_empty() {
            out.push(self.take(len, true)?);
        }
        Ok(out)
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Check if the whole buffer has been consumed.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_take_view_and_copy() {
        let data = [10u8, 20, 30, 40];
        let mut cursor = ByteCursor::new(&data);

        let view = cursor.take(1, false).unwrap();
        assert!(matches!(view, Cow::Borrowed(_)));
        assert_eq!(&*view, &[10]);

        let copy = cursor.take(2, true).unwrap();
        assert!(matches!(copy, Cow::Owned(_)));
        assert_eq!(&*copy, &[20, 30]);

        assert_eq!(cursor.position(), 3);
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn test_take_past_end() {
        let data = [1u8, 2, 3];
        let mut cursor = ByteCursor::new(&data);
        cursor.take(2, false).unwrap();

        let result = cursor.take(2, false);
        assert!(matches!(
            result,
            Err(Error::Cursor(CursorError::OutOfBounds {
                offset: 2,
                requested: 2,
                available: 1
            }))
        ));

        // Failed take leaves the offset alone
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_take_zero_at_end() {
        let mut cursor = ByteCursor::new(&[]);
        assert!(cursor.take(0, false).unwrap().is_empty());
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_chunk_even() {
        let data: Vec<u8> = (0..16).collect();
        let mut cursor = ByteCursor::new(&data);

        let chunks = cursor.chunk(4).unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(&*chunks[0], &[0, 1, 2, 3]);
        assert_eq!(&*chunks[3], &[12, 13, 14, 15]);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_chunk_after_take() {
        let data: Vec<u8> = (0..10).collect();
        let mut cursor = ByteCursor::new(&data);
        cursor.take(2, false).unwrap();

        let chunks = cursor.chunk(4).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(&*chunks[0], &[2, 3, 4, 5]);
    }

    #[test]
    fn test_chunk_uneven() {
        let data = [0u8; 10];
        let mut cursor = ByteCursor::new(&data);

        let result = cursor.chunk(4);
        assert!(matches!(
            result,
            Err(Error::Cursor(CursorError::OutOfBounds {
                offset: 8,
                requested: 4,
                available: 2
            }))
        ));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_chunk_zero_length() {
        let mut cursor = ByteCursor::new(&[1, 2]);
        assert!(matches!(
            cursor.chunk(0),
            Err(Error::Cursor(CursorError::ZeroLength))
        ));
    }
}
