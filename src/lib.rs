//! A reader for Microsoft OneNote section files (`.one`/`.onetoc2`).
//!
//! Decodes the MS-ONESTORE binary container into a tagged entity tree
//! (`Section` -> `PageSeries` -> `Page` -> ... -> `RichText`), tolerant of
//! unrecognised node and property ids by default; pass a strict
//! [`ParseContextBuilder`] to turn format violations into hard errors
//! instead of warnings.

/// Error handling types.
pub mod error;

mod common;
mod context;
mod entities;
mod filedata;
mod fnl;
mod guidtable;
mod header;
mod jcid;
mod nodes;
mod objectindex;
mod objectspace;
mod propset;
mod reader;
#[cfg(test)]
mod testutil;

pub use common::{CompactId, ExtendedGuid};
pub use context::{ParseContext, ParseContextBuilder, Warning};
pub use entities::{
    EmbeddedFile, EntityNode, Image, NoteTag, Outline, OutlineElement, Page, PageManifest,
    PageSeries, RichText, Section, SectionMetaData, Table, TableCell, TableRow, Title, UnknownNode,
};
pub use error::{FormatError, Result};
pub use header::FileKind;
pub use jcid::Jcid;
pub use propset::{PropertyId, PropertySet, PropertyType, PropertyValue};

use reader::Reader;
use std::fs;
use std::path::Path;

/// The result of decoding a section file: the root entity tree plus every
/// recoverable issue surfaced along the way.
pub struct DecodeOutput {
    pub root: EntityNode,
    pub warnings: Vec<Warning>,
}

/// Decodes a `.one`/`.onetoc2` image already read into memory, tolerant of
/// recoverable format violations (see [`decode_with`] for strict mode).
pub fn decode(bytes: &[u8]) -> Result<DecodeOutput> {
    decode_with(bytes, ParseContext::builder())
}

/// Reads and decodes a section file from disk.
pub fn decode_file(path: impl AsRef<Path>) -> Result<DecodeOutput> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| FormatError::new(format!("{}: {e}", path.display())))?;
    decode_with(&bytes, ParseContext::builder().path(path))
}

/// Decodes with a caller-supplied [`ParseContextBuilder`] (for strict mode
/// or a file path to attach to diagnostics).
pub fn decode_with(bytes: &[u8], ctx_builder: ParseContextBuilder) -> Result<DecodeOutput> {
    let ctx = ctx_builder.build(bytes.len());
    let file = Reader::new(bytes);

    let summary = objectspace::parse_object_spaces_summary(&file, &ctx)?;
    let root_space = summary
        .object_spaces
        .iter()
        .find(|space| space.gosid == summary.root_gosid)
        .ok_or_else(|| {
            FormatError::new("object spaces summary: root gosid has no matching object space")
        })?;

    let nodes = objectspace::walk_revision_manifest(
        &file,
        root_space.gosid,
        root_space.revision_manifest_list_ref,
        &ctx,
    )?;
    let chain = objectspace::active_revision_chain(nodes)?;

    if chain.iter().any(|rev| objectspace::revision_is_encrypted(&rev.nodes)) {
        ctx.warn("root object space: encrypted revision, not decoded", None);
        return Ok(DecodeOutput {
            root: EntityNode::Unknown(UnknownNode {
                jcid: 0,
                properties: PropertySet::default(),
            }),
            warnings: ctx.into_warnings(),
        });
    }

    let mut index = objectindex::ObjectIndex::new();
    let mut guid_table = guidtable::GuidTable::default();
    for revision in &chain {
        guid_table = guidtable::build(&revision.nodes, Some(&guid_table), &ctx)?;
        objectindex::fold_into(&mut index, &revision.nodes, &file, &ctx)?;
    }

    // One independent index/guid-table pair per revision prefix, newest
    // excluded, for Page.history (see `entities::page_history`). Each is
    // folded from scratch rather than cloned off the loop above, since
    // neither ObjectIndex's value type nor GuidTable's predecessor state
    // is meant to be shared across snapshots.
    let mut history_snapshots = Vec::new();
    for end in (1..chain.len()).rev() {
        let prefix = &chain[..end];
        let snapshot_index =
            objectindex::build(prefix.iter().map(|rev| rev.nodes.as_slice()), &file, &ctx)?;
        let mut snapshot_guid_table = guidtable::GuidTable::default();
        for revision in prefix {
            snapshot_guid_table = guidtable::build(&revision.nodes, Some(&snapshot_guid_table), &ctx)?;
        }
        history_snapshots.push((snapshot_index, snapshot_guid_table));
    }
    let history: Vec<entities::HistorySnapshot> = history_snapshots
        .iter()
        .map(|(index, guid_table)| entities::HistorySnapshot { index, guid_table })
        .collect();

    // The root object space's root object shares its identity with the
    // object space itself (see DESIGN.md Open Question 6).
    let root = entities::assemble(root_space.gosid, &index, &guid_table, &history, &ctx);

    Ok(DecodeOutput {
        root,
        warnings: ctx.into_warnings(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_truncated_input() {
        assert!(decode(&[0u8; 4]).is_err());
    }

    #[test]
    fn decode_rejects_a_header_only_file_with_no_manifest_root() {
        let bytes = testutil::SectionFileBuilder::new().build_header_only();
        assert!(decode(&bytes).is_err());
    }
}
