//! Fixed-layout records shared across the container: extended GUIDs,
//! CompactIDs, and the five on-disk chunk-reference encodings.
//!
//! Grounded on `examples/original_source/src/onestore/common_types.py`'s
//! `ExtendedGUID`/`CompactID` bit layouts.

use crate::error::Result;
use crate::reader::Reader;
use std::fmt;
use uuid::Uuid;

/// Decodes a `StringInStorageBuffer`-style byte blob (UTF-16LE, no
/// required null terminator) as produced by `StrProperty`/`WzInAtom` data.
pub fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// 16-byte GUID plus a 32-bit counter `n`. The stable identity of revisions,
/// object spaces, contexts, and objects.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExtendedGuid {
    guid: [u8; 16],
    n: u32,
}

impl ExtendedGuid {
    pub const ZERO: ExtendedGuid = ExtendedGuid {
        guid: [0; 16],
        n: 0,
    };

    pub fn new(guid: [u8; 16], n: u32) -> Self {
        Self { guid, n }
    }

    pub fn parse(r: &mut Reader) -> Result<Self> {
        let guid = r.bytes_array::<16>()?;
        let n = r.u32()?;
        Ok(Self { guid, n })
    }

    pub fn guid_bytes(&self) -> &[u8; 16] {
        &self.guid
    }

    pub fn n(&self) -> u32 {
        self.n
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// MS-DTYP GUIDs are little-endian for the first three fields; `uuid`'s
    /// `from_bytes_le` applies the same reordering.
    pub fn to_uuid(&self) -> Uuid {
        Uuid::from_bytes_le(self.guid)
    }
}

impl fmt::Debug for ExtendedGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtendedGuid({}, {})", self.to_uuid(), self.n)
    }
}

impl fmt::Display for ExtendedGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}, {}", self.to_uuid(), self.n)
    }
}

/// `{n: u8, guid_index: u24}` packed into a u32. Resolves to an
/// [`ExtendedGuid`] through a revision's effective GUID table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CompactId {
    pub n: u8,
    pub guid_index: u32,
}

impl CompactId {
    pub fn from_u32(value: u32) -> Self {
        Self {
            n: (value & 0xFF) as u8,
            guid_index: (value >> 8) & 0x00FF_FFFF,
        }
    }

    pub fn parse(r: &mut Reader) -> Result<Self> {
        Ok(Self::from_u32(r.u32()?))
    }
}

/// A polymorphic object/object-space/context id: either already resolved to
/// an [`ExtendedGuid`], or still packed as a [`CompactId`] awaiting
/// resolution through the active revision's GUID table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectId {
    Extended(ExtendedGuid),
    Compact(CompactId),
}

/// `(stp, cb)`: absolute byte offset and size of a referenced structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkReference {
    stp: u64,
    cb: u64,
    stp_is_nil_width: u8,
    cb_is_nil_width: u8,
}

/// The four on-disk widths used to encode `stp`/`cb`, selected by the 4-bit
/// `stp_format`/`cb_format` fields of a file node header. Combined, the
/// container uses five distinct `(stp_format, cb_format)` pairs in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefWidth {
    Zero,
    U32,
    U64,
    U8Scaled,
    U16Scaled,
    U32Scaled,
    U64Scaled,
}

impl RefWidth {
    /// `stp_format` is a 2-bit field on a file node header (see `nodes.rs`).
    pub fn from_stp_format(format: u8) -> Option<Self> {
        match format {
            0x0 => Some(Self::Zero),
            0x1 => Some(Self::U32),
            0x2 => Some(Self::U64),
            0x3 => Some(Self::U32Scaled),
            _ => None,
        }
    }

    /// `cb_format` is a 2-bit field on a file node header (see `nodes.rs`).
    pub fn from_cb_format(format: u8) -> Option<Self> {
        match format {
            0x0 => Some(Self::Zero),
            0x1 => Some(Self::U32),
            0x2 => Some(Self::U64),
            0x3 => Some(Self::U8Scaled),
            _ => None,
        }
    }

    fn byte_width(self) -> usize {
        match self {
            Self::Zero => 0,
            Self::U32 | Self::U32Scaled => 4,
            Self::U64 | Self::U64Scaled => 8,
            Self::U8Scaled => 1,
            Self::U16Scaled => 2,
        }
    }

    fn read(self, r: &mut Reader) -> Result<(u64, u8)> {
        let (raw, nil) = match self {
            Self::Zero => (0u64, 0u64),
            Self::U32 => {
                let v = r.u32()?;
                (v as u64, u32::MAX as u64)
            }
            Self::U64 => (r.u64()?, u64::MAX),
            Self::U32Scaled => {
                let v = r.u32()?;
                (v as u64 * 8, u32::MAX as u64 * 8)
            }
            Self::U64Scaled => {
                let v = r.u64()?;
                (v.saturating_mul(8), u64::MAX)
            }
            Self::U8Scaled => {
                let v = r.u8()?;
                (v as u64 * 8, u8::MAX as u64 * 8)
            }
            Self::U16Scaled => {
                let v = r.u16()?;
                (v as u64 * 8, u16::MAX as u64 * 8)
            }
        };
        let is_nil = raw == nil && self.byte_width() > 0;
        Ok((raw, if is_nil { self.byte_width() as u8 } else { 0 }))
    }
}

impl ChunkReference {
    pub fn parse(r: &mut Reader, stp_width: RefWidth, cb_width: RefWidth) -> Result<Self> {
        let (stp, stp_nil) = stp_width.read(r)?;
        let (cb, cb_nil) = cb_width.read(r)?;
        Ok(Self {
            stp,
            cb,
            stp_is_nil_width: stp_nil,
            cb_is_nil_width: cb_nil,
        })
    }

    pub fn stp(&self) -> u64 {
        self.stp
    }

    pub fn cb(&self) -> u64 {
        self.cb
    }

    pub fn is_zero(&self) -> bool {
        self.stp == 0 && self.cb == 0
    }

    pub fn is_nil(&self) -> bool {
        self.stp_is_nil_width > 0 && self.cb_is_nil_width > 0
    }

    pub fn is_present(&self) -> bool {
        !self.is_zero() && !self.is_nil()
    }

    pub fn fits_within(&self, file_size: usize) -> bool {
        match self.stp.checked_add(self.cb) {
            Some(end) => end <= file_size as u64,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_id_bit_layout_matches_low_byte_n() {
        // n = 0x07, guid_index = 0x00ABCDEF -> value = (guid_index << 8) | n
        let value = (0x00ABCDEFu32 << 8) | 0x07;
        let id = CompactId::from_u32(value);
        assert_eq!(id.n, 0x07);
        assert_eq!(id.guid_index, 0x00ABCDEF);
    }

    #[test]
    fn extended_guid_zero_sentinel() {
        assert!(ExtendedGuid::ZERO.is_zero());
        assert!(!ExtendedGuid::new([1; 16], 0).is_zero());
    }

    #[test]
    fn chunk_reference_sentinels() {
        let data = [0u8; 12];
        let mut r = Reader::new(&data);
        let zero = ChunkReference::parse(&mut r, RefWidth::U64, RefWidth::U32).unwrap();
        assert!(zero.is_zero());
        assert!(!zero.is_nil());

        let mut nil_bytes = vec![0xFFu8; 8];
        nil_bytes.extend_from_slice(&0xFFFFFFFFu32.to_le_bytes());
        let mut r = Reader::new(&nil_bytes);
        let nil = ChunkReference::parse(&mut r, RefWidth::U64, RefWidth::U32).unwrap();
        assert!(nil.is_nil());
        assert!(!nil.is_zero());
    }

    #[test]
    fn chunk_reference_scaled_encoding() {
        // stp scaled by 8 (u32), cb scaled by 8 (u8): stp_raw=5 -> 40, cb_raw=3 -> 24.
        let mut bytes = 5u32.to_le_bytes().to_vec();
        bytes.push(3);
        let mut r = Reader::new(&bytes);
        let cr = ChunkReference::parse(&mut r, RefWidth::U32Scaled, RefWidth::U8Scaled).unwrap();
        assert_eq!(cr.stp(), 40);
        assert_eq!(cr.cb(), 24);
    }
}
