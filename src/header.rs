//! Header and transaction log replay.
//!
//! Grounded on `gbx::header::Header::read`'s magic-validation shape, with the
//! field layout driven by `spec.md` §4.2/§6 (the two real file-type GUIDs
//! below are the public MS-ONESTORE constants for `.one`/`.onetoc2`).

use crate::common::{ChunkReference, RefWidth};
use crate::context::ParseContext;
use crate::error::{FormatError, Result};
use crate::reader::Reader;
use indexmap::IndexMap;

pub const HEADER_SIZE: usize = 1024;

/// `{109ADD3F-911B-49F5-A5D0-1791EDC8AED8}`, little-endian GUID bytes.
const GUID_FILE_FORMAT: [u8; 16] = [
    0x3F, 0xDD, 0x9A, 0x10, 0x1B, 0x91, 0xF5, 0x49, 0xA5, 0xD0, 0x17, 0x91, 0xED, 0xC8, 0xAE, 0xD8,
];

/// `{7B5C52E4-D88C-4DA7-AEB1-5378D02996D3}`.
const GUID_FILE_TYPE_ONE: [u8; 16] = [
    0xE4, 0x52, 0x5C, 0x7B, 0x8C, 0xD8, 0xA7, 0x4D, 0xAE, 0xB1, 0x53, 0x78, 0xD0, 0x29, 0x96, 0xD3,
];

/// `{43FF2FA1-EFD9-4C76-9B98-4C0ED39E7F62}`.
const GUID_FILE_TYPE_ONETOC2: [u8; 16] = [
    0xA1, 0x2F, 0xFF, 0x43, 0xD9, 0xEF, 0x76, 0x4C, 0x9B, 0x98, 0x4C, 0x0E, 0xD3, 0x9E, 0x7F, 0x62,
];

/// Reserved `list_id` marking a transaction-log sentinel.
const SENTINEL_LIST_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Section,
    TocSection,
}

pub struct Header {
    pub file_kind: FileKind,
    pub c_transactions_in_log: u32,
    pub fcr_transaction_log: ChunkReference,
    pub fcr_file_node_list_root: ChunkReference,
}

impl Header {
    pub fn parse(r: &mut Reader, ctx: &ParseContext) -> Result<Self> {
        ctx.require(
            r.file_size() >= HEADER_SIZE,
            format!("header: file MUST be at least {HEADER_SIZE} bytes"),
            Some(0),
        )?;

        let guid_file_format = r.bytes_array::<16>()?;
        if guid_file_format != GUID_FILE_FORMAT {
            return Err(FormatError::at("header: unrecognised file-format GUID", 0));
        }

        let guid_file_type = r.bytes_array::<16>()?;
        let file_kind = if guid_file_type == GUID_FILE_TYPE_ONE {
            FileKind::Section
        } else if guid_file_type == GUID_FILE_TYPE_ONETOC2 {
            FileKind::TocSection
        } else {
            return Err(FormatError::at("header: unrecognised file-type GUID", 16));
        };

        let c_transactions_in_log = r.u32()?;

        let fcr_transaction_log = ChunkReference::parse(r, RefWidth::U64, RefWidth::U32Scaled)?;
        let fcr_file_node_list_root = ChunkReference::parse(r, RefWidth::U64, RefWidth::U32Scaled)?;

        for (label, fcr) in [
            ("fcrTransactionLog", &fcr_transaction_log),
            ("fcrFileNodeListRoot", &fcr_file_node_list_root),
        ] {
            ctx.require(
                fcr.is_nil() || fcr.is_zero() || fcr.fits_within(r.file_size()),
                format!("header: {label} MUST lie within the file"),
                Some(0),
            )?;
        }

        ctx.require(
            !fcr_file_node_list_root.is_nil() && !fcr_file_node_list_root.is_zero(),
            "header: fcrFileNodeListRoot MUST be present",
            Some(0),
        )?;

        Ok(Self {
            file_kind,
            c_transactions_in_log,
            fcr_transaction_log,
            fcr_file_node_list_root,
        })
    }
}

/// Replays the transaction log, returning the "last committed node count"
/// per `list_id`, honoring only the first `header.c_transactions_in_log`
/// sentinels across the fragment chain.
pub fn parse_transaction_log(
    file: &Reader,
    header: &Header,
    ctx: &ParseContext,
) -> Result<IndexMap<u32, u32>> {
    let mut last_count_by_list_id = IndexMap::new();

    if header.fcr_transaction_log.is_nil() || header.fcr_transaction_log.is_zero() {
        return Ok(last_count_by_list_id);
    }

    let mut fcr = header.fcr_transaction_log;
    let mut sentinels_seen = 0u32;
    let mut visited_offsets = std::collections::HashSet::new();

    'fragments: while !fcr.is_nil() && !fcr.is_zero() {
        if sentinels_seen >= header.c_transactions_in_log {
            break;
        }

        if !visited_offsets.insert(fcr.stp()) {
            return Err(FormatError::at(
                "transaction log: cycle in fragment chain",
                fcr.stp() as usize,
            ));
        }

        ctx.require(
            fcr.fits_within(file.file_size()),
            "transaction log: fragment reference out of bounds",
            Some(fcr.stp() as usize),
        )?;

        let mut fragment = file.view(fcr.stp() as usize, fcr.cb() as usize)?;
        let mut pending: Vec<(u32, u32)> = Vec::new();

        loop {
            if fragment.remaining() < 12 {
                return Err(FormatError::at(
                    "transaction log: truncated entry",
                    fragment.absolute_offset(),
                ));
            }

            let list_id = fragment.u32()?;
            let _crc = fragment.u32()?;
            let count = fragment.u32()?;

            if list_id == SENTINEL_LIST_ID {
                sentinels_seen += 1;
                for (id, count) in pending.drain(..) {
                    last_count_by_list_id.insert(id, count);
                }
                if sentinels_seen >= header.c_transactions_in_log {
                    break 'fragments;
                }
            } else {
                pending.push((list_id, count));
            }

            if fragment.remaining() == 16 {
                // Exactly the trailer (nextFragment ref + footer checksum) remains.
                break;
            }

            if fragment.remaining() < 16 {
                return Err(FormatError::at(
                    "transaction log: truncated fragment trailer",
                    fragment.absolute_offset(),
                ));
            }
        }

        let next = ChunkReference::parse(&mut fragment, RefWidth::U64, RefWidth::U32Scaled)?;
        let _footer_crc = fragment.u32()?;

        fcr = next;
    }

    Ok(last_count_by_list_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::SectionFileBuilder;

    #[test]
    fn parses_minimal_header() {
        let bytes = SectionFileBuilder::new().build_header_only();
        let ctx = ParseContext::builder().build(bytes.len());
        let mut r = Reader::new(&bytes);
        let header = Header::parse(&mut r, &ctx).unwrap();
        assert_eq!(header.file_kind, FileKind::Section);
    }

    #[test]
    fn rejects_bad_file_format_guid() {
        let mut bytes = SectionFileBuilder::new().build_header_only();
        bytes[0] = !bytes[0];
        let ctx = ParseContext::builder().build(bytes.len());
        let mut r = Reader::new(&bytes);
        assert!(Header::parse(&mut r, &ctx).is_err());
    }

    #[test]
    fn empty_transaction_log_yields_empty_map() {
        let bytes = SectionFileBuilder::new().build_header_only();
        let ctx = ParseContext::builder().build(bytes.len());
        let mut r = Reader::new(&bytes);
        let header = Header::parse(&mut r, &ctx).unwrap();
        let counts = parse_transaction_log(&Reader::new(&bytes), &header, &ctx).unwrap();
        assert!(counts.is_empty());
    }
}
