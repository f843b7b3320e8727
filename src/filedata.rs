//! Bounded, best-effort discovery of file-data store GUIDs and original
//! filenames referenced from an object's properties.
//!
//! Grounded on `examples/original_source/src/ms_one/entities/parsers.py`
//! (`_resolve_file_data_store_guids_via_references`,
//! `_resolve_file_names_via_references`: `max_depth=4`, `max_nodes=200`,
//! small fixed-shape text patterns matched with regexes there). This crate
//! has no XML/regex dependency (see `DESIGN.md` Open Questions), so the
//! same patterns are matched with a hand-written scanner instead.

use crate::common::{decode_utf16le as decode_text, CompactId, ExtendedGuid};
use crate::guidtable::GuidTable;
use crate::objectindex::ObjectIndex;
use crate::propset::{PropertySet, PropertyValue};
use std::collections::VecDeque;
use uuid::Uuid;

pub const MAX_DEPTH: usize = 4;
pub const MAX_NODES: usize = 200;

#[derive(Debug, Default, Clone)]
pub struct FileDataRefs {
    pub guids: Vec<Uuid>,
    pub filenames: Vec<String>,
}

/// Walks the object graph reachable from `start` (via `ObjectId`/
/// `ArrayOfObjectIds` properties), bounded by depth and node count, scanning
/// every text-shaped blob it passes for `<ifndf>{GUID}</ifndf>` references
/// and `<file>name</file>`/bare-filename text.
pub fn resolve(
    start: ExtendedGuid,
    index: &ObjectIndex,
    guid_table: &GuidTable,
) -> FileDataRefs {
    let mut refs = FileDataRefs::default();
    let mut visited = std::collections::HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back((start, 0usize));
    visited.insert(start);
    let mut nodes_visited = 0usize;

    while let Some((oid, depth)) = queue.pop_front() {
        if nodes_visited >= MAX_NODES {
            break;
        }
        nodes_visited += 1;

        let Some(record) = index.get(&oid) else {
            continue;
        };

        scan_property_set(&record.properties.properties, &mut refs);

        if depth >= MAX_DEPTH {
            continue;
        }
        for next in referenced_object_ids(&record.properties.properties, guid_table) {
            if visited.insert(next) {
                queue.push_back((next, depth + 1));
            }
        }
    }

    refs
}

fn referenced_object_ids(properties: &PropertySet, guid_table: &GuidTable) -> Vec<ExtendedGuid> {
    let mut out = Vec::new();
    for value in properties.values.values() {
        collect_object_ids(value, guid_table, &mut out);
    }
    out
}

fn collect_object_ids(value: &PropertyValue, guid_table: &GuidTable, out: &mut Vec<ExtendedGuid>) {
    let resolve_one = |id: CompactId| guid_table.resolve(id);
    match value {
        PropertyValue::ObjectId(id) => {
            if let Some(guid) = resolve_one(*id) {
                out.push(guid);
            }
        }
        PropertyValue::ArrayOfObjectIds(ids) => {
            for id in ids {
                if let Some(guid) = resolve_one(*id) {
                    out.push(guid);
                }
            }
        }
        PropertyValue::ArrayOfPropertyValues(values) => {
            for v in values {
                collect_object_ids(v, guid_table, out);
            }
        }
        PropertyValue::PropertySet(nested) => {
            for v in nested.values.values() {
                collect_object_ids(v, guid_table, out);
            }
        }
        _ => {}
    }
}

fn scan_property_set(properties: &PropertySet, refs: &mut FileDataRefs) {
    for value in properties.values.values() {
        scan_value(value, refs);
    }
}

fn scan_value(value: &PropertyValue, refs: &mut FileDataRefs) {
    match value {
        PropertyValue::Blob(bytes) => {
            refs.guids.extend(find_ifndf_guids(bytes));
            refs.filenames.extend(find_filenames(bytes));
        }
        PropertyValue::ArrayOfPropertyValues(values) => {
            for v in values {
                scan_value(v, refs);
            }
        }
        PropertyValue::PropertySet(nested) => scan_property_set(nested, refs),
        _ => {}
    }
}

/// Finds every `<ifndf>{GUID}</ifndf>` occurrence and parses the enclosed
/// GUID text.
pub fn find_ifndf_guids(bytes: &[u8]) -> Vec<Uuid> {
    let text = decode_text(bytes);
    let mut out = Vec::new();
    let mut rest = text.as_str();
    while let Some(start) = rest.find("<ifndf>{") {
        let after = &rest[start + "<ifndf>{".len()..];
        let Some(close) = after.find("}</ifndf>") else {
            break;
        };
        if let Ok(uuid) = Uuid::parse_str(&after[..close]) {
            out.push(uuid);
        }
        rest = &after[close + "}</ifndf>".len()..];
    }
    out
}

/// Finds every `<file>name</file>` occurrence, plus bare filenames carrying
/// a recognised extension, as a fallback when no `<file>` wrapper is present.
pub fn find_filenames(bytes: &[u8]) -> Vec<String> {
    let text = decode_text(bytes);
    let mut out = Vec::new();
    let mut rest = text.as_str();
    while let Some(start) = rest.find("<file>") {
        let after = &rest[start + "<file>".len()..];
        let Some(close) = after.find("</file>") else {
            break;
        };
        out.push(after[..close].to_string());
        rest = &after[close + "</file>".len()..];
    }
    if out.is_empty() {
        out.extend(find_bare_filenames(&text));
    }
    out
}

const KNOWN_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".tif", ".tiff", ".emf", ".wmf", ".docx", ".xlsx",
    ".pdf", ".pptx",
];

fn find_bare_filenames(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for word in text.split(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>')) {
        if word.len() < 3 {
            continue;
        }
        let lower = word.to_ascii_lowercase();
        if KNOWN_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            out.push(word.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_ifndf_guid() {
        let text = "<ifndf>{3F9E2B1A-0000-0000-0000-000000000001}</ifndf>";
        let bytes: Vec<u8> = text.encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
        let guids = find_ifndf_guids(&bytes);
        assert_eq!(guids.len(), 1);
    }

    #[test]
    fn finds_wrapped_and_bare_filenames() {
        let wrapped = "<file>photo.png</file>";
        let bytes: Vec<u8> = wrapped.encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
        assert_eq!(find_filenames(&bytes), vec!["photo.png".to_string()]);

        let bare = "attached report.pdf for review";
        let bytes: Vec<u8> = bare.encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
        assert_eq!(find_filenames(&bytes), vec!["report.pdf".to_string()]);
    }
}
