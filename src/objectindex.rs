//! Folds object declarations across a revision's dependency chain into one
//! `ExtendedGuid -> ObjectRecord` index.
//!
//! Grounded on `SPEC_FULL.md` §4.8: no `original_source` file builds this
//! index directly, but `object_space.py`'s revision-manifest walk is the
//! model for "oldest dependency first, each later write overrides".

use crate::common::{ChunkReference, ExtendedGuid};
use crate::context::ParseContext;
use crate::error::{FormatError, Result};
use crate::nodes::TypedNode;
use crate::propset::ObjectSpaceObjectPropSet;
use crate::reader::Reader;
use indexmap::IndexMap;

pub struct ObjectRecord {
    pub jcid: u32,
    pub properties: ObjectSpaceObjectPropSet,
}

pub type ObjectIndex = IndexMap<ExtendedGuid, ObjectRecord>;

fn read_propset(file: &Reader, ref_: ChunkReference, ctx: &ParseContext) -> Result<ObjectSpaceObjectPropSet> {
    ctx.require(
        ref_.fits_within(file.file_size()),
        "object declaration: property set reference out of bounds",
        Some(ref_.stp() as usize),
    )?;
    let mut r = file.view(ref_.stp() as usize, ref_.cb() as usize)?;
    ObjectSpaceObjectPropSet::parse(&mut r, ctx)
}

/// Applies one revision's object declarations on top of `index`, in node
/// order, so a later `ObjectDeclarationWithRefCountFNDX` for the same
/// `oid` (a redeclaration in a newer revision) overrides the earlier one.
pub fn fold_into(
    index: &mut ObjectIndex,
    nodes: &[TypedNode<'_>],
    file: &Reader,
    ctx: &ParseContext,
) -> Result<()> {
    for node in nodes {
        if let TypedNode::ObjectDeclarationWithRefCount(decl) = node {
            if decl.oid.is_zero() {
                return Err(FormatError::new(
                    "ObjectDeclarationWithRefCountFNDX.oid MUST NOT be zero",
                ));
            }
            let properties = read_propset(file, decl.ref_, ctx)?;
            index.insert(
                decl.oid,
                ObjectRecord {
                    jcid: decl.jcid,
                    properties,
                },
            );
        }
    }
    Ok(())
}

/// Builds an index from scratch across an ordered chain of revisions
/// (oldest first), each supplying the nodes of its own manifest.
pub fn build<'a>(
    revisions: impl IntoIterator<Item = &'a [TypedNode<'a>]>,
    file: &Reader,
    ctx: &ParseContext,
) -> Result<ObjectIndex> {
    let mut index = ObjectIndex::new();
    for nodes in revisions {
        fold_into(&mut index, nodes, file, ctx)?;
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RefWidth;
    use crate::nodes::{self, ObjectDeclarationWithRefCount};

    fn propset_bytes() -> Vec<u8> {
        // ObjectSpaceObjectStreamHeader: count=0, no osid/context streams,
        // followed by an empty PropertySet (c_properties = 0).
        let mut bytes = 0x8000_0000u32.to_le_bytes().to_vec(); // osid_stream_not_present
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes
    }

    #[test]
    fn later_declaration_overrides_earlier_for_same_oid() {
        let ctx = ParseContext::builder().build(0);
        let mut file_bytes = vec![0u8; 16];
        let propset = propset_bytes();
        file_bytes.extend_from_slice(&propset);
        let ref_offset = 16u64;
        let ref_len = propset.len() as u64;

        let mut ref_bytes = ref_offset.to_le_bytes().to_vec();
        ref_bytes.extend_from_slice(&(ref_len as u32).to_le_bytes());
        let mut ref_reader = Reader::new(&ref_bytes);
        let ref_ = ChunkReference::parse(&mut ref_reader, RefWidth::U64, RefWidth::U32).unwrap();

        let oid = ExtendedGuid::new([1; 16], 0);
        let decl_v1 = TypedNode::ObjectDeclarationWithRefCount(ObjectDeclarationWithRefCount {
            oid,
            jcid: 1,
            ref_,
        });
        let decl_v2 = TypedNode::ObjectDeclarationWithRefCount(ObjectDeclarationWithRefCount {
            oid,
            jcid: 2,
            ref_,
        });

        let file = Reader::new(&file_bytes);
        let mut index = ObjectIndex::new();
        fold_into(&mut index, &[decl_v1], &file, &ctx).unwrap();
        fold_into(&mut index, &[decl_v2], &file, &ctx).unwrap();

        assert_eq!(index.get(&oid).unwrap().jcid, 2);
        let _ = nodes::OBJECT_DECLARATION_WITH_REF_COUNT; // keep import grounded to nodes.rs ids
    }
}
