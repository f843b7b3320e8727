//! File node list fragments and the chain that links them.
//!
//! Each object space and revision manifest is stored as a linked list of
//! `FileNodeListFragment`s; this module reads one fragment (header magic,
//! typed nodes, terminator, trailing reference and footer magic) and walks
//! the `nextFragment` chain to flatten a list into its nodes in order.

use crate::common::{ChunkReference, RefWidth};
use crate::context::ParseContext;
use crate::error::{FormatError, Result};
use crate::nodes::{self, TypedNode};
use crate::reader::Reader;
use std::collections::HashSet;

/// `0xA4567AB1F5F7F4C4`, the `FileNodeListFragment` header magic.
pub const FRAGMENT_HEADER_MAGIC: u64 = 0xA456_7AB1_F5F7_F4C4;
/// `0x8BC215C38233BA4B`, the `FileNodeListFragment` footer magic.
pub const FRAGMENT_FOOTER_MAGIC: u64 = 0x8BC2_15C3_8233_BA4B;

pub struct FragmentHeader {
    pub list_id: u32,
    pub fragment_sequence: u32,
}

/// One fragment's nodes plus the reference to the next fragment in its list
/// (nil once this is the last fragment).
pub struct Fragment<'a> {
    pub header: FragmentHeader,
    pub nodes: Vec<TypedNode<'a>>,
    pub next: ChunkReference,
}

pub fn read_fragment<'a>(
    file: &Reader<'a>,
    fcr: ChunkReference,
    ctx: &ParseContext,
) -> Result<Fragment<'a>> {
    ctx.require(
        fcr.fits_within(file.file_size()),
        "file node list fragment: reference out of bounds",
        Some(fcr.stp() as usize),
    )?;

    let mut r = file.view(fcr.stp() as usize, fcr.cb() as usize)?;

    let magic = r.u64()?;
    if magic != FRAGMENT_HEADER_MAGIC {
        return Err(FormatError::at(
            "file node list fragment: bad header magic",
            r.absolute_offset() - 8,
        ));
    }
    let list_id = r.u32()?;
    let fragment_sequence = r.u32()?;

    let mut nodes = Vec::new();
    while let Some(node) = nodes::read_file_node(&mut r, ctx)? {
        nodes.push(nodes::route(node, ctx)?);
    }

    let next = ChunkReference::parse(&mut r, RefWidth::U64, RefWidth::U32Scaled)?;
    let footer = r.u64()?;
    if footer != FRAGMENT_FOOTER_MAGIC {
        return Err(FormatError::at(
            "file node list fragment: bad footer magic",
            r.absolute_offset() - 8,
        ));
    }

    Ok(Fragment {
        header: FragmentHeader {
            list_id,
            fragment_sequence,
        },
        nodes,
        next,
    })
}

/// Flattens an entire file node list, following `nextFragment` references
/// until a nil/zero reference ends the chain.
pub fn walk<'a>(file: &'a Reader<'a>, root: ChunkReference, ctx: &'a ParseContext) -> Result<Vec<TypedNode<'a>>> {
    let mut nodes = Vec::new();
    let mut fcr = root;
    let mut list_id = None;
    let mut last_sequence = None;
    let mut visited = HashSet::new();

    while !fcr.is_nil() && !fcr.is_zero() {
        if !visited.insert(fcr.stp()) {
            return Err(FormatError::at(
                "file node list: cycle in fragment chain",
                fcr.stp() as usize,
            ));
        }

        let fragment = read_fragment(file, fcr, ctx)?;

        match list_id {
            None => list_id = Some(fragment.header.list_id),
            Some(id) => ctx.require(
                id == fragment.header.list_id,
                "file node list: fragment list_id changed mid-chain",
                Some(fcr.stp() as usize),
            )?,
        }
        if let Some(prev) = last_sequence {
            ctx.require(
                fragment.header.fragment_sequence == prev + 1,
                "file node list: fragment_sequence is not contiguous",
                Some(fcr.stp() as usize),
            )?;
        }
        last_sequence = Some(fragment.header.fragment_sequence);

        nodes.extend(fragment.nodes);
        fcr = fragment.next;
    }

    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn walks_a_single_fragment_list() {
        let node_bytes = testutil::build_simple_node(nodes::REVISION_MANIFEST_END, &[]);
        let fragment = testutil::build_fragment(5, 0, &node_bytes);
        let bytes = testutil::SectionFileBuilder::new().build_with_trailer(&fragment);
        let ctx = ParseContext::builder().build(bytes.len());
        let file = Reader::new(&bytes);

        let root = ChunkReference::from(ChunkReferenceForTest {
            stp: testutil::HEADER_SIZE as u64,
            cb: fragment.len() as u64,
        });
        let nodes = walk(&file, root, &ctx).unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(matches!(nodes[0], TypedNode::RevisionManifestEnd));
    }

    #[test]
    fn rejects_bad_header_magic() {
        let mut fragment = testutil::build_fragment(1, 0, &[]);
        fragment[0] = !fragment[0];
        let bytes = testutil::SectionFileBuilder::new().build_with_trailer(&fragment);
        let ctx = ParseContext::builder().build(bytes.len());
        let file = Reader::new(&bytes);
        let manual = ChunkReferenceForTest {
            stp: testutil::HEADER_SIZE as u64,
            cb: fragment.len() as u64,
        };
        assert!(read_fragment(&file, manual.into(), &ctx).is_err());
    }

    struct ChunkReferenceForTest {
        stp: u64,
        cb: u64,
    }

    impl From<ChunkReferenceForTest> for ChunkReference {
        fn from(v: ChunkReferenceForTest) -> Self {
            let mut bytes = v.stp.to_le_bytes().to_vec();
            bytes.extend_from_slice(&((v.cb / 8) as u32).to_le_bytes());
            let mut r = Reader::new(&bytes);
            ChunkReference::parse(&mut r, RefWidth::U64, RefWidth::U32Scaled).unwrap()
        }
    }
}
