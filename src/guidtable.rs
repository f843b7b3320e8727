//! A revision's effective GUID table: resolves a [`CompactId`]'s
//! `guid_index` to the 16-byte GUID it stands for.
//!
//! `GlobalIdTableStartFNDX`/`GlobalIdTableEntryFNDX`/`GlobalIdTableEndFNDX`
//! aren't covered by `original_source/src/onestore/file_node_types.py`
//! (that module only lists the ids this crate threads through `nodes::Raw`);
//! the declare/merge algorithm here follows `SPEC_FULL.md` §4.6 directly.

use crate::common::{CompactId, ExtendedGuid};
use crate::context::ParseContext;
use crate::error::{FormatError, Result};
use crate::nodes::{self, TypedNode};
use crate::reader::Reader;
use indexmap::IndexMap;

/// Maps a `guid_index` to the 16-byte GUID a revision's global id table
/// currently associates with it.
#[derive(Clone, Default)]
pub struct GuidTable {
    entries: IndexMap<u32, [u8; 16]>,
}

impl GuidTable {
    pub fn resolve(&self, id: CompactId) -> Option<ExtendedGuid> {
        self.entries
            .get(&id.guid_index)
            .map(|guid| ExtendedGuid::new(*guid, id.n as u32))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds the effective table for one revision: starts from `base` (the
/// dependency revision's table, if any) when a `GlobalIdTableStartFNDX`
/// payload requests a copy-forward, then applies each
/// `GlobalIdTableEntryFNDX` in order.
pub fn build(nodes: &[TypedNode<'_>], base: Option<&GuidTable>, ctx: &ParseContext) -> Result<GuidTable> {
    let mut table = GuidTable::default();
    let mut started = false;

    for node in nodes {
        let TypedNode::Raw {
            file_node_id, raw, ..
        } = node
        else {
            continue;
        };

        match *file_node_id {
            nodes::GLOBAL_ID_TABLE_START => {
                if !raw.is_empty() {
                    ctx.warn(
                        "GlobalIdTableStartFNDX: ignoring unexpected payload",
                        None,
                    );
                } else if let Some(base) = base {
                    table = base.clone();
                }
                started = true;
            }
            nodes::GLOBAL_ID_TABLE_ENTRY => {
                ctx.require(
                    started,
                    "GlobalIdTableEntryFNDX before GlobalIdTableStartFNDX",
                    None,
                )?;
                let mut r = Reader::new(raw);
                if r.remaining() != 20 {
                    return Err(FormatError::new(
                        "GlobalIdTableEntryFNDX payload MUST be 20 bytes",
                    ));
                }
                let index = r.u32()?;
                let guid = r.bytes_array::<16>()?;
                table.entries.insert(index, guid);
            }
            nodes::GLOBAL_ID_TABLE_END => {
                ctx.require(started, "GlobalIdTableEndFNDX without a matching start", None)?;
            }
            _ => {}
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn entry_node(index: u32, guid: [u8; 16]) -> Vec<u8> {
        let mut fnd = index.to_le_bytes().to_vec();
        fnd.extend_from_slice(&guid);
        testutil::build_simple_node(nodes::GLOBAL_ID_TABLE_ENTRY, &fnd)
    }

    fn parse_all<'a>(bytes: &'a [u8], ctx: &ParseContext) -> Vec<TypedNode<'a>> {
        let mut r = Reader::new(bytes);
        let mut out = Vec::new();
        while let Some(node) = nodes::read_file_node(&mut r, ctx).unwrap() {
            out.push(nodes::route(node, ctx).unwrap());
        }
        out
    }

    #[test]
    fn builds_table_from_start_and_entries() {
        let ctx = ParseContext::builder().build(0);
        let mut bytes = testutil::build_simple_node(nodes::GLOBAL_ID_TABLE_START, &[]);
        bytes.extend(entry_node(1, [0xAA; 16]));
        bytes.extend(entry_node(2, [0xBB; 16]));
        bytes.extend(testutil::build_simple_node(nodes::GLOBAL_ID_TABLE_END, &[]));
        bytes.extend_from_slice(&0u32.to_le_bytes());

        let parsed = parse_all(&bytes, &ctx);
        let table = build(&parsed, None, &ctx).unwrap();
        assert_eq!(table.len(), 2);

        let id = CompactId { n: 3, guid_index: 1 };
        assert_eq!(table.resolve(id).unwrap().guid_bytes(), &[0xAA; 16]);
    }

    #[test]
    fn copies_dependency_table_forward() {
        let ctx = ParseContext::builder().build(0);
        let mut base = GuidTable::default();
        base.entries.insert(7, [0xCC; 16]);

        let mut bytes = testutil::build_simple_node(nodes::GLOBAL_ID_TABLE_START, &[]);
        bytes.extend(entry_node(8, [0xDD; 16]));
        bytes.extend_from_slice(&0u32.to_le_bytes());
        let parsed = parse_all(&bytes, &ctx);

        let table = build(&parsed, Some(&base), &ctx).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.resolve(CompactId { n: 0, guid_index: 7 }).is_some());
        assert!(table.resolve(CompactId { n: 0, guid_index: 8 }).is_some());
    }
}
