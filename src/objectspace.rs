//! Bootstraps the root file node list into one summary per object space,
//! and walks an object space's active revision manifest.
//!
//! Grounded on `examples/original_source/src/onestore/object_space.py`
//! (`parse_object_spaces_summary`, `build_root_file_node_list_manifests`):
//! exactly one root, at least one manifest reference, at most one file-data
//! list reference, unique `gosid`s, and "only the last
//! `RevisionManifestListReferenceFND` is the active revision manifest".

use crate::common::{ChunkReference, ExtendedGuid};
use crate::context::ParseContext;
use crate::error::{FormatError, Result};
use crate::fnl;
use crate::header::Header;
use crate::nodes::TypedNode;
use crate::reader::Reader;
use std::collections::{HashMap, HashSet};

pub struct ObjectSpaceSummary {
    pub gosid: ExtendedGuid,
    pub manifest_list_ref: ChunkReference,
    pub revision_manifest_list_ref: ChunkReference,
}

pub struct ObjectSpacesSummary {
    pub root_gosid: ExtendedGuid,
    pub object_spaces: Vec<ObjectSpaceSummary>,
    pub file_data_store_ref: Option<ChunkReference>,
}

struct RootManifests {
    root_gosid: ExtendedGuid,
    refs: Vec<(ExtendedGuid, ChunkReference)>,
    file_data_store_ref: Option<ChunkReference>,
}

fn build_root_file_node_list_manifests(nodes: &[TypedNode<'_>]) -> Result<RootManifests> {
    let mut root_gosid = None;
    let mut refs = Vec::new();
    let mut file_data_store_ref = None;
    let mut seen_gosids = HashSet::new();

    for node in nodes {
        match node {
            TypedNode::ObjectSpaceManifestRoot(root) => {
                if root_gosid.is_some() {
                    return Err(FormatError::new(
                        "root file node list: more than one ObjectSpaceManifestRootFND",
                    ));
                }
                root_gosid = Some(root.gosid_root);
            }
            TypedNode::ObjectSpaceManifestListReference(r) => {
                if !seen_gosids.insert(r.gosid) {
                    return Err(FormatError::new(
                        "root file node list: duplicate gosid across ObjectSpaceManifestListReferenceFND entries",
                    ));
                }
                refs.push((r.gosid, r.ref_));
            }
            TypedNode::FileDataStoreListReference(r) => {
                if file_data_store_ref.is_some() {
                    return Err(FormatError::new(
                        "root file node list: more than one FileDataStoreListReferenceFND",
                    ));
                }
                file_data_store_ref = Some(r.ref_);
            }
            _ => {}
        }
    }

    let root_gosid = root_gosid
        .ok_or_else(|| FormatError::new("root file node list: missing ObjectSpaceManifestRootFND"))?;
    if refs.is_empty() {
        return Err(FormatError::new(
            "root file node list: no ObjectSpaceManifestListReferenceFND entries",
        ));
    }
    if !refs.iter().any(|(gosid, _)| *gosid == root_gosid) {
        return Err(FormatError::new(
            "root file node list: gosidRoot does not match any object space reference",
        ));
    }

    Ok(RootManifests {
        root_gosid,
        refs,
        file_data_store_ref,
    })
}

/// Walks a single object space's manifest list: requires the first node to
/// be an `ObjectSpaceManifestListStartFND` with a matching `gosid`, then
/// returns the reference of the *last* `RevisionManifestListReferenceFND`
/// (the active one — earlier ones are superseded incremental snapshots).
fn active_revision_manifest_ref(
    file: &Reader,
    gosid: ExtendedGuid,
    manifest_ref: ChunkReference,
    ctx: &ParseContext,
) -> Result<ChunkReference> {
    let nodes = fnl::walk(file, manifest_ref, ctx)?;
    match nodes.first() {
        Some(TypedNode::ObjectSpaceManifestListStart(start)) if start.gosid == gosid => {}
        _ => {
            return Err(FormatError::new(
                "object space manifest list: MUST begin with a matching ObjectSpaceManifestListStartFND",
            ))
        }
    }

    nodes
        .iter()
        .filter_map(|n| match n {
            TypedNode::RevisionManifestListReference(r) => Some(r.ref_),
            _ => None,
        })
        .next_back()
        .ok_or_else(|| {
            FormatError::new("object space manifest list: no RevisionManifestListReferenceFND entries")
        })
}

pub fn parse_object_spaces_summary(file: &Reader, ctx: &ParseContext) -> Result<ObjectSpacesSummary> {
    let mut cursor = file.view(0, file.file_size())?;
    let header = Header::parse(&mut cursor, ctx)?;
    let _transaction_log = crate::header::parse_transaction_log(file, &header, ctx)?;

    let root_nodes = fnl::walk(file, header.fcr_file_node_list_root, ctx)?;
    let manifests = build_root_file_node_list_manifests(&root_nodes)?;

    let mut object_spaces = Vec::with_capacity(manifests.refs.len());
    for (gosid, manifest_list_ref) in &manifests.refs {
        let revision_manifest_list_ref =
            active_revision_manifest_ref(file, *gosid, *manifest_list_ref, ctx)?;
        object_spaces.push(ObjectSpaceSummary {
            gosid: *gosid,
            manifest_list_ref: *manifest_list_ref,
            revision_manifest_list_ref,
        });
    }

    Ok(ObjectSpacesSummary {
        root_gosid: manifests.root_gosid,
        object_spaces,
        file_data_store_ref: manifests.file_data_store_ref,
    })
}

/// Walks an object space's active revision manifest list: requires the
/// first node to be a matching `RevisionManifestListStartFND`, then returns
/// every node in order (manifest start/end markers, role declarations, and
/// object declarations alike) for the caller to fold into a guid table and
/// object index.
pub fn walk_revision_manifest<'a>(
    file: &'a Reader,
    gosid: ExtendedGuid,
    revision_manifest_list_ref: ChunkReference,
    ctx: &'a ParseContext,
) -> Result<Vec<TypedNode<'a>>> {
    let nodes = fnl::walk(file, revision_manifest_list_ref, ctx)?;
    match nodes.first() {
        Some(TypedNode::RevisionManifestListStart(start)) if start.gosid == gosid => Ok(nodes),
        _ => Err(FormatError::new(
            "revision manifest list: MUST begin with a matching RevisionManifestListStartFND",
        )),
    }
}

/// One `RevisionManifestStart...RevisionManifestEnd` group from a revision
/// manifest list, with its role/object-declaration nodes in between.
pub struct Revision<'a> {
    pub rid: ExtendedGuid,
    pub rid_dependent: ExtendedGuid,
    pub nodes: Vec<TypedNode<'a>>,
}

fn split_revisions(nodes: Vec<TypedNode<'_>>) -> Vec<Revision<'_>> {
    let mut revisions = Vec::new();
    let mut current: Option<(ExtendedGuid, ExtendedGuid, Vec<TypedNode>)> = None;

    for node in nodes {
        match &node {
            TypedNode::RevisionManifestStart(start) => {
                if let Some((rid, rid_dependent, buf)) = current.take() {
                    revisions.push(Revision {
                        rid,
                        rid_dependent,
                        nodes: buf,
                    });
                }
                current = Some((start.rid, start.rid_dependent, vec![node]));
            }
            TypedNode::RevisionManifestEnd => {
                if let Some((rid, rid_dependent, mut buf)) = current.take() {
                    buf.push(node);
                    revisions.push(Revision {
                        rid,
                        rid_dependent,
                        nodes: buf,
                    });
                }
            }
            _ => {
                if let Some((_, _, buf)) = current.as_mut() {
                    buf.push(node);
                }
            }
        }
    }

    revisions
}

/// Orders the dependency chain ending at a revision manifest list's last
/// revision (the current one), oldest first, by following `rid_dependent`
/// back through the other revisions present in the same list. A dependency
/// not present in the list (already rolled up by a prior compaction) simply
/// ends the chain early rather than erroring.
pub fn active_revision_chain(nodes: Vec<TypedNode<'_>>) -> Result<Vec<Revision<'_>>> {
    let revisions = split_revisions(nodes);
    if revisions.is_empty() {
        return Err(FormatError::new("revision manifest list: no revisions"));
    }

    let by_rid: HashMap<ExtendedGuid, usize> = revisions
        .iter()
        .enumerate()
        .map(|(i, rev)| (rev.rid, i))
        .collect();

    let mut chain_indices = Vec::new();
    let mut visited = HashSet::new();
    let mut cursor = revisions.len() - 1;
    loop {
        if !visited.insert(cursor) {
            return Err(FormatError::new(
                "revision manifest list: cycle in ridDependent chain",
            ));
        }
        chain_indices.push(cursor);
        let dependent = revisions[cursor].rid_dependent;
        if dependent.is_zero() {
            break;
        }
        match by_rid.get(&dependent) {
            Some(&idx) => cursor = idx,
            None => break,
        }
    }
    chain_indices.reverse();

    let mut slots: Vec<Option<Revision<'_>>> = revisions.into_iter().map(Some).collect();
    Ok(chain_indices
        .into_iter()
        .map(|idx| slots[idx].take().expect("each index visited once"))
        .collect())
}

/// An `ObjectDataEncryptionKeyV2FNDX` marks a revision's content as
/// RC4-encrypted (password-protected sections); decoding it is out of
/// scope (see `DESIGN.md`).
pub fn revision_is_encrypted(nodes: &[TypedNode<'_>]) -> bool {
    nodes
        .iter()
        .any(|n| matches!(n, TypedNode::ObjectDataEncryptionKeyV2(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn rejects_empty_root_file_node_list() {
        let fragment = testutil::build_fragment(1, 0, &[]);
        let bytes = testutil::SectionFileBuilder::new().build_with_trailer(&fragment);
        let ctx = ParseContext::builder().build(bytes.len());
        let file = Reader::new(&bytes);
        assert!(parse_object_spaces_summary(&file, &ctx).is_err());
    }

    fn manifest_start(rid: ExtendedGuid, rid_dependent: ExtendedGuid) -> TypedNode<'static> {
        TypedNode::RevisionManifestStart(crate::nodes::RevisionManifestStart {
            rid,
            rid_dependent,
            revision_role: 0,
            odcs_default: 0,
            gctxid: ExtendedGuid::ZERO,
        })
    }

    #[test]
    fn active_chain_follows_rid_dependent_oldest_first() {
        let rid_a = ExtendedGuid::new([1; 16], 0);
        let rid_b = ExtendedGuid::new([2; 16], 0);

        let nodes = vec![
            manifest_start(rid_a, ExtendedGuid::ZERO),
            TypedNode::RevisionManifestEnd,
            manifest_start(rid_b, rid_a),
            TypedNode::RevisionManifestEnd,
        ];

        let chain = active_revision_chain(nodes).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].rid, rid_a);
        assert_eq!(chain[1].rid, rid_b);
    }

    #[test]
    fn active_chain_stops_at_a_dependency_not_present_in_the_list() {
        let rid_b = ExtendedGuid::new([2; 16], 0);
        let missing = ExtendedGuid::new([9; 16], 0);

        let nodes = vec![manifest_start(rid_b, missing), TypedNode::RevisionManifestEnd];

        let chain = active_revision_chain(nodes).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].rid, rid_b);
    }
}
