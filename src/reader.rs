//! Bounded, little-endian cursor over an immutable byte image.
//!
//! Unlike a stream reader, every chunk reference in the container addresses
//! the file by absolute offset, so the reader exposes `view` to carve out
//! bounded sub-readers rather than only reading sequentially. Every `Reader`
//! — top-level or a view of one — keeps a handle to the whole file image, so
//! `view` can always be called with an absolute offset, not one relative to
//! the current window.

use crate::error::{FormatError, Result};
use std::mem::size_of;

pub struct Reader<'a> {
    root: &'a [u8],
    end: usize,
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            root: data,
            end: data.len(),
            pos: 0,
        }
    }

    /// Absolute offset of the cursor within the file image.
    pub fn absolute_offset(&self) -> usize {
        self.pos
    }

    pub fn file_size(&self) -> usize {
        self.root.len()
    }

    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos == self.end
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.end {
            return Err(FormatError::truncated(pos - self.end, self.pos));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.seek(self.pos + n)
    }

    /// A bounded sub-reader over an absolute `[offset, offset + size)` byte
    /// range of the file image backing this reader.
    pub fn view(&self, offset: usize, size: usize) -> Result<Reader<'a>> {
        let end = offset
            .checked_add(size)
            .ok_or_else(|| FormatError::at("chunk reference overflow", offset))?;
        if end > self.root.len() {
            return Err(FormatError::truncated(end - self.root.len(), offset));
        }
        Ok(Reader {
            root: self.root,
            end,
            pos: offset,
        })
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(FormatError::truncated(n - self.remaining(), self.pos));
        }
        let slice = &self.root[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn bytes_array<const S: usize>(&mut self) -> Result<[u8; S]> {
        let mut buf = [0u8; S];
        buf.copy_from_slice(self.bytes(S)?);
        Ok(buf)
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.root[self.pos..self.end];
        self.pos = self.end;
        slice
    }
}

macro_rules! impl_read_num {
    ($($name:ident : $type:ty),+ $(,)?) => {
        $(
            impl<'a> Reader<'a> {
                pub fn $name(&mut self) -> Result<$type> {
                    let buf = self.bytes_array::<{ size_of::<$type>() }>()?;
                    Ok(<$type>::from_le_bytes(buf))
                }
            }
        )+
    };
}

impl_read_num!(
    u8: u8,
    u16: u16,
    u32: u32,
    u64: u64,
    i32: i32,
    i64: i64,
    f32: f32,
    f64: f64,
);

/// RFC 3309 (reflected) CRC-32, the variant used by the fragment footer
/// checksums and kept here as a standalone helper for fixture-regression
/// guards.
pub fn crc32(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (POLY & mask);
        }
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_check_vector() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn reads_little_endian_integers() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
        let mut r = Reader::new(&data);
        assert_eq!(r.u16().unwrap(), 1);
        assert_eq!(r.u32().unwrap(), 2);
        assert!(r.at_end());
    }

    #[test]
    fn view_is_bounded_to_the_requested_range() {
        let data = [0xAAu8, 1, 2, 3, 4, 0xBB];
        let r = Reader::new(&data);
        let mut sub = r.view(1, 4).unwrap();
        assert_eq!(sub.bytes(4).unwrap(), &[1, 2, 3, 4]);
        assert!(sub.bytes(1).is_err());
    }

    #[test]
    fn view_uses_absolute_offsets_even_from_a_nested_view() {
        let data = [0u8, 1, 2, 3, 4, 5, 6, 7];
        let r = Reader::new(&data);
        let outer = r.view(2, 4).unwrap();
        let mut inner = outer.view(5, 2).unwrap();
        assert_eq!(inner.bytes(2).unwrap(), &[5, 6]);
    }

    #[test]
    fn out_of_range_reads_fail_with_truncation() {
        let data = [0u8; 2];
        let mut r = Reader::new(&data);
        assert!(r.u32().is_err());
    }
}
