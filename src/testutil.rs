//! Synthetic byte-buffer fixtures for unit tests.
//!
//! No real `.one`/`.onetoc2` corpus ships with this crate, so tests build
//! minimal-but-valid containers by hand rather than round-tripping a fixture
//! file. Kept out of the published crate via `#[cfg(test)]` in `lib.rs`.

pub const HEADER_SIZE: usize = crate::header::HEADER_SIZE;

const GUID_FILE_FORMAT: [u8; 16] = [
    0x3F, 0xDD, 0x9A, 0x10, 0x1B, 0x91, 0xF5, 0x49, 0xA5, 0xD0, 0x17, 0x91, 0xED, 0xC8, 0xAE, 0xD8,
];
const GUID_FILE_TYPE_ONE: [u8; 16] = [
    0xE4, 0x52, 0x5C, 0x7B, 0x8C, 0xD8, 0xA7, 0x4D, 0xAE, 0xB1, 0x53, 0x78, 0xD0, 0x29, 0x96, 0xD3,
];
const GUID_FILE_TYPE_ONETOC2: [u8; 16] = [
    0xA1, 0x2F, 0xFF, 0x43, 0xD9, 0xEF, 0x76, 0x4C, 0x9B, 0x98, 0x4C, 0x0E, 0xD3, 0x9E, 0x7F, 0x62,
];

use crate::fnl::{FRAGMENT_FOOTER_MAGIC, FRAGMENT_HEADER_MAGIC};

pub struct SectionFileBuilder {
    toc: bool,
}

impl SectionFileBuilder {
    pub fn new() -> Self {
        Self { toc: false }
    }

    pub fn onetoc2(mut self) -> Self {
        self.toc = true;
        self
    }

    fn header_prefix(&self, fcr_file_node_list_root_stp: u64, fcr_file_node_list_root_cb: u64) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.extend_from_slice(&GUID_FILE_FORMAT);
        bytes.extend_from_slice(if self.toc {
            &GUID_FILE_TYPE_ONETOC2
        } else {
            &GUID_FILE_TYPE_ONE
        });
        bytes.extend_from_slice(&0u32.to_le_bytes()); // c_transactions_in_log
        bytes.extend_from_slice(&0u64.to_le_bytes()); // fcrTransactionLog.stp (nil/zero)
        bytes.extend_from_slice(&0u32.to_le_bytes()); // fcrTransactionLog.cb
        bytes.extend_from_slice(&fcr_file_node_list_root_stp.to_le_bytes());
        bytes.extend_from_slice(&((fcr_file_node_list_root_cb / 8) as u32).to_le_bytes());
        bytes.resize(HEADER_SIZE, 0);
        bytes
    }

    /// A header-only file: `fcrFileNodeListRoot` points at an empty, but
    /// present, zero-length region so `Header::parse`'s presence check passes.
    pub fn build_header_only(&self) -> Vec<u8> {
        self.header_prefix(HEADER_SIZE as u64, 0)
    }

    /// Header followed by a raw file-node-list fragment at offset
    /// `HEADER_SIZE`, with `fcrFileNodeListRoot` pointing at it.
    pub fn build_with_trailer(&self, fragment: &[u8]) -> Vec<u8> {
        let mut bytes = self.header_prefix(HEADER_SIZE as u64, fragment.len() as u64);
        bytes.extend_from_slice(fragment);
        bytes
    }
}

impl Default for SectionFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a single `FileNodeListFragment`: header magic, `list_id`,
/// `fragment_sequence`, the node bytes supplied, the all-zero terminator,
/// a terminal `nextFragment` reference, and the footer magic.
pub fn build_fragment(list_id: u32, fragment_sequence: u32, node_bytes: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&FRAGMENT_HEADER_MAGIC.to_le_bytes());
    bytes.extend_from_slice(&list_id.to_le_bytes());
    bytes.extend_from_slice(&fragment_sequence.to_le_bytes());
    bytes.extend_from_slice(node_bytes);
    bytes.extend_from_slice(&0u32.to_le_bytes()); // terminator
    bytes.extend_from_slice(&u64::MAX.to_le_bytes()); // nextFragment.stp = nil
    bytes.extend_from_slice(&u32::MAX.to_le_bytes()); // nextFragment.cb = nil
    bytes.extend_from_slice(&FRAGMENT_FOOTER_MAGIC.to_le_bytes());
    // fcrFileNodeListRoot.cb is stored scaled by 8; pad so the encoding is lossless.
    while bytes.len() % 8 != 0 {
        bytes.push(0);
    }
    bytes
}

/// Encodes a single file node: header word, no chunk reference (`base_type`
/// 0), and the given `fnd` payload bytes.
pub fn build_simple_node(file_node_id: u16, fnd: &[u8]) -> Vec<u8> {
    let size = 4 + fnd.len();
    let word = (file_node_id as u32) | ((size as u32) << 10);
    let mut bytes = word.to_le_bytes().to_vec();
    bytes.extend_from_slice(fnd);
    bytes
}
