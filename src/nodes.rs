//! File node header decoding and FileNodeID routing to typed variants.
//!
//! The header bit layout and per-type payload shapes are grounded on
//! `examples/original_source/src/onestore/file_node_types.py`
//! (`FILE_NODE_TYPE_PARSERS`, `_parse_*_fnd`); ids not present there
//! (object groups, object declarations, file-data references) are this
//! crate's own assignment — see `DESIGN.md`.

use crate::common::{ChunkReference, ExtendedGuid, RefWidth};
use crate::context::ParseContext;
use crate::error::{FormatError, Result};
use crate::reader::Reader;

pub const OBJECT_SPACE_MANIFEST_ROOT: u16 = 0x004;
pub const OBJECT_SPACE_MANIFEST_LIST_REFERENCE: u16 = 0x008;
pub const OBJECT_SPACE_MANIFEST_LIST_START: u16 = 0x00C;
pub const REVISION_MANIFEST_LIST_REFERENCE: u16 = 0x010;
pub const REVISION_MANIFEST_LIST_START: u16 = 0x014;
pub const REVISION_MANIFEST_START4: u16 = 0x01B;
pub const REVISION_MANIFEST_END: u16 = 0x01C;
pub const REVISION_MANIFEST_START6: u16 = 0x01E;
pub const REVISION_MANIFEST_START7: u16 = 0x01F;
pub const GLOBAL_ID_TABLE_START: u16 = 0x021;
pub const GLOBAL_ID_TABLE_ENTRY: u16 = 0x024;
pub const GLOBAL_ID_TABLE_END: u16 = 0x028;
pub const OBJECT_DECLARATION_WITH_REF_COUNT: u16 = 0x02D;
pub const OBJECT_DECLARATION_WITH_REF_COUNT2: u16 = 0x02E;
pub const REVISION_ROLE_DECLARATION: u16 = 0x05C;
pub const REVISION_ROLE_AND_CONTEXT_DECLARATION: u16 = 0x05D;
pub const OBJECT_DATA_ENCRYPTION_KEY_V2: u16 = 0x07C;
pub const FILE_DATA_STORE_OBJECT_REFERENCE: u16 = 0x08C;
pub const FILE_DATA_STORE_LIST_REFERENCE: u16 = 0x090;
pub const OBJECT_GROUP_LIST_REFERENCE: u16 = 0x094;
pub const OBJECT_GROUP_START: u16 = 0x095;
pub const OBJECT_GROUP_END: u16 = 0x096;

#[derive(Debug, Clone, Copy)]
pub struct FileNodeHeader {
    pub file_node_id: u16,
    pub size: u32,
    pub base_type: u8,
    pub stp_format: u8,
    pub cb_format: u8,
    pub offset: usize,
}

impl FileNodeHeader {
    const RESERVED_MASK: u32 = 0b111 << 29;

    fn from_u32(word: u32, offset: usize) -> Self {
        Self {
            file_node_id: (word & 0x3FF) as u16,
            size: (word >> 10) & 0x1FFF,
            base_type: ((word >> 23) & 0x3) as u8,
            stp_format: ((word >> 25) & 0x3) as u8,
            cb_format: ((word >> 27) & 0x3) as u8,
            offset,
        }
    }

    fn reserved_bits(word: u32) -> u32 {
        word & Self::RESERVED_MASK
    }
}

/// A file node with its header, optional leading chunk reference, and the
/// raw `fnd` payload bytes that a type-specific parser still has to decode.
pub struct FileNode<'a> {
    pub header: FileNodeHeader,
    pub chunk_ref: Option<ChunkReference>,
    pub fnd: Reader<'a>,
}

/// Reads one file node at the cursor, or `None` if the cursor sits on the
/// all-zero terminator word (which is consumed).
pub fn read_file_node<'a>(r: &mut Reader<'a>, ctx: &ParseContext) -> Result<Option<FileNode<'a>>> {
    let start = r.absolute_offset();
    let word = r.u32()?;
    if word == 0 {
        return Ok(None);
    }

    let header = FileNodeHeader::from_u32(word, start);
    ctx.require(
        FileNodeHeader::reserved_bits(word) == 0,
        "file node header: reserved bits MUST be 0",
        Some(start),
    )?;

    let chunk_ref = match header.base_type {
        0 => None,
        1 | 2 => {
            let stp_width = RefWidth::from_stp_format(header.stp_format)
                .ok_or_else(|| FormatError::at("file node header: invalid stp_format", start))?;
            let cb_width = RefWidth::from_cb_format(header.cb_format)
                .ok_or_else(|| FormatError::at("file node header: invalid cb_format", start))?;
            Some(ChunkReference::parse(r, stp_width, cb_width)?)
        }
        other => {
            return Err(FormatError::at(
                format!("file node header: invalid base_type {other}"),
                start,
            ))
        }
    };

    let consumed = r.absolute_offset() - start;
    let total = header.size as usize;
    if total < consumed {
        return Err(FormatError::at(
            "file node header: size smaller than header + chunk reference",
            start,
        ));
    }
    let fnd_len = total - consumed;
    let fnd = r.view(r.absolute_offset(), fnd_len)?;
    r.skip(fnd_len)?;

    Ok(Some(FileNode {
        header,
        chunk_ref,
        fnd,
    }))
}

macro_rules! require_fnd_len {
    ($node:expr, $len:expr, $name:literal) => {
        if $node.fnd.remaining() != $len {
            return Err(FormatError::at(
                concat!($name, " payload MUST be exactly the expected length"),
                $node.header.offset,
            ));
        }
    };
}

macro_rules! require_base_type {
    ($node:expr, $expected:expr, $ctx:expr, $name:literal) => {
        $ctx.require(
            $node.header.base_type == $expected,
            concat!($name, " MUST have the expected BaseType"),
            Some($node.header.offset),
        )?;
    };
}

pub struct ObjectSpaceManifestRoot {
    pub gosid_root: ExtendedGuid,
}

pub struct ObjectSpaceManifestListReference {
    pub ref_: ChunkReference,
    pub gosid: ExtendedGuid,
}

pub struct FileDataStoreListReference {
    pub ref_: ChunkReference,
}

pub struct ObjectSpaceManifestListStart {
    pub gosid: ExtendedGuid,
}

pub struct RevisionManifestListReference {
    pub ref_: ChunkReference,
}

pub struct RevisionManifestListStart {
    pub gosid: ExtendedGuid,
}

pub struct RevisionManifestStart {
    pub rid: ExtendedGuid,
    pub rid_dependent: ExtendedGuid,
    pub revision_role: u32,
    pub odcs_default: u16,
    pub gctxid: ExtendedGuid,
}

pub struct RevisionRoleDeclaration {
    pub rid: ExtendedGuid,
    pub revision_role: u32,
}

pub struct RevisionRoleAndContextDeclaration {
    pub rid: ExtendedGuid,
    pub revision_role: u32,
    pub gctxid: ExtendedGuid,
}

pub struct ObjectDataEncryptionKeyV2 {
    pub ref_: ChunkReference,
}

pub struct ObjectGroupListReference {
    pub ref_: ChunkReference,
}

pub struct ObjectDeclarationWithRefCount {
    pub oid: ExtendedGuid,
    pub jcid: u32,
    pub ref_: ChunkReference,
}

/// A file node promoted to a typed payload, or `Unknown` when the
/// `file_node_id` isn't recognised (raw bytes retained, one warning per id).
pub enum TypedNode<'a> {
    ObjectSpaceManifestRoot(ObjectSpaceManifestRoot),
    ObjectSpaceManifestListReference(ObjectSpaceManifestListReference),
    FileDataStoreListReference(FileDataStoreListReference),
    ObjectSpaceManifestListStart(ObjectSpaceManifestListStart),
    RevisionManifestListReference(RevisionManifestListReference),
    RevisionManifestListStart(RevisionManifestListStart),
    RevisionManifestStart(RevisionManifestStart),
    RevisionManifestEnd,
    RevisionRoleDeclaration(RevisionRoleDeclaration),
    RevisionRoleAndContextDeclaration(RevisionRoleAndContextDeclaration),
    ObjectDataEncryptionKeyV2(ObjectDataEncryptionKeyV2),
    ObjectGroupListReference(ObjectGroupListReference),
    ObjectGroupStart,
    ObjectGroupEnd,
    ObjectDeclarationWithRefCount(ObjectDeclarationWithRefCount),
    /// A node this layer recognises but defers entirely to another module
    /// (global id table entries go to `guidtable`, file-data references go
    /// to `filedata`) — `file_node_id` lets the caller tell these apart.
    Raw {
        file_node_id: u16,
        chunk_ref: Option<ChunkReference>,
        raw: &'a [u8],
    },
    /// A `file_node_id` no layer recognises at all; warned once via `ctx`.
    Unknown { raw: &'a [u8] },
}

pub fn route<'a>(mut node: FileNode<'a>, ctx: &ParseContext) -> Result<TypedNode<'a>> {
    match node.header.file_node_id {
        OBJECT_SPACE_MANIFEST_ROOT => {
            require_base_type!(node, 0, ctx, "ObjectSpaceManifestRootFND");
            require_fnd_len!(node, 20, "ObjectSpaceManifestRootFND");
            let gosid_root = ExtendedGuid::parse(&mut node.fnd)?;
            Ok(TypedNode::ObjectSpaceManifestRoot(ObjectSpaceManifestRoot {
                gosid_root,
            }))
        }
        OBJECT_SPACE_MANIFEST_LIST_REFERENCE => {
            require_base_type!(node, 2, ctx, "ObjectSpaceManifestListReferenceFND");
            let ref_ = node
                .chunk_ref
                .ok_or_else(|| FormatError::at("ObjectSpaceManifestListReferenceFND MUST carry a chunk reference", node.header.offset))?;
            require_fnd_len!(node, 20, "ObjectSpaceManifestListReferenceFND");
            let gosid = ExtendedGuid::parse(&mut node.fnd)?;
            ctx.require(
                !gosid.is_zero(),
                "ObjectSpaceManifestListReferenceFND.gosid MUST NOT be zero",
                Some(node.header.offset),
            )?;
            Ok(TypedNode::ObjectSpaceManifestListReference(
                ObjectSpaceManifestListReference { ref_, gosid },
            ))
        }
        FILE_DATA_STORE_LIST_REFERENCE => {
            require_base_type!(node, 2, ctx, "FileDataStoreListReferenceFND");
            let ref_ = node
                .chunk_ref
                .ok_or_else(|| FormatError::at("FileDataStoreListReferenceFND MUST carry a chunk reference", node.header.offset))?;
            require_fnd_len!(node, 0, "FileDataStoreListReferenceFND");
            Ok(TypedNode::FileDataStoreListReference(
                FileDataStoreListReference { ref_ },
            ))
        }
        OBJECT_SPACE_MANIFEST_LIST_START => {
            require_base_type!(node, 0, ctx, "ObjectSpaceManifestListStartFND");
            require_fnd_len!(node, 20, "ObjectSpaceManifestListStartFND");
            let gosid = ExtendedGuid::parse(&mut node.fnd)?;
            Ok(TypedNode::ObjectSpaceManifestListStart(
                ObjectSpaceManifestListStart { gosid },
            ))
        }
        REVISION_MANIFEST_LIST_REFERENCE => {
            require_base_type!(node, 2, ctx, "RevisionManifestListReferenceFND");
            let ref_ = node
                .chunk_ref
                .ok_or_else(|| FormatError::at("RevisionManifestListReferenceFND MUST carry a chunk reference", node.header.offset))?;
            require_fnd_len!(node, 0, "RevisionManifestListReferenceFND");
            Ok(TypedNode::RevisionManifestListReference(
                RevisionManifestListReference { ref_ },
            ))
        }
        REVISION_MANIFEST_LIST_START => {
            require_base_type!(node, 0, ctx, "RevisionManifestListStartFND");
            require_fnd_len!(node, 24, "RevisionManifestListStartFND");
            let gosid = ExtendedGuid::parse(&mut node.fnd)?;
            let _n_instance = node.fnd.u32()?; // MUST be ignored
            Ok(TypedNode::RevisionManifestListStart(
                RevisionManifestListStart { gosid },
            ))
        }
        REVISION_MANIFEST_START4 => {
            require_base_type!(node, 0, ctx, "RevisionManifestStart4FND");
            require_fnd_len!(node, 54, "RevisionManifestStart4FND");
            let rid = ExtendedGuid::parse(&mut node.fnd)?;
            let rid_dependent = ExtendedGuid::parse(&mut node.fnd)?;
            let _time_creation = node.fnd.u64()?; // MUST be ignored
            let revision_role = node.fnd.u32()?;
            let odcs_default = node.fnd.u16()?;
            ctx.require(!rid.is_zero(), "RevisionManifestStart4FND.rid MUST NOT be zero", Some(node.header.offset))?;
            ctx.require(
                odcs_default == 0,
                "RevisionManifestStart4FND.odcsDefault MUST be 0",
                Some(node.header.offset),
            )?;
            Ok(TypedNode::RevisionManifestStart(RevisionManifestStart {
                rid,
                rid_dependent,
                revision_role,
                odcs_default,
                gctxid: ExtendedGuid::ZERO,
            }))
        }
        REVISION_MANIFEST_START6 => {
            require_base_type!(node, 0, ctx, "RevisionManifestStart6FND");
            require_fnd_len!(node, 46, "RevisionManifestStart6FND");
            let rid = ExtendedGuid::parse(&mut node.fnd)?;
            let rid_dependent = ExtendedGuid::parse(&mut node.fnd)?;
            let revision_role = node.fnd.u32()?;
            let odcs_default = node.fnd.u16()?;
            ctx.require(!rid.is_zero(), "RevisionManifestStart6FND.rid MUST NOT be zero", Some(node.header.offset))?;
            ctx.require(
                matches!(odcs_default, 0x0000 | 0x0002),
                "RevisionManifestStart6FND.odcsDefault MUST be 0x0000 or 0x0002",
                Some(node.header.offset),
            )?;
            Ok(TypedNode::RevisionManifestStart(RevisionManifestStart {
                rid,
                rid_dependent,
                revision_role,
                odcs_default,
                gctxid: ExtendedGuid::ZERO,
            }))
        }
        REVISION_MANIFEST_START7 => {
            require_base_type!(node, 0, ctx, "RevisionManifestStart7FND");
            require_fnd_len!(node, 66, "RevisionManifestStart7FND");
            let rid = ExtendedGuid::parse(&mut node.fnd)?;
            let rid_dependent = ExtendedGuid::parse(&mut node.fnd)?;
            let revision_role = node.fnd.u32()?;
            let odcs_default = node.fnd.u16()?;
            let gctxid = ExtendedGuid::parse(&mut node.fnd)?;
            ctx.require(!rid.is_zero(), "RevisionManifestStart7FND.rid MUST NOT be zero", Some(node.header.offset))?;
            ctx.require(
                matches!(odcs_default, 0x0000 | 0x0002),
                "RevisionManifestStart7FND.odcsDefault MUST be 0x0000 or 0x0002",
                Some(node.header.offset),
            )?;
            Ok(TypedNode::RevisionManifestStart(RevisionManifestStart {
                rid,
                rid_dependent,
                revision_role,
                odcs_default,
                gctxid,
            }))
        }
        REVISION_MANIFEST_END => {
            require_base_type!(node, 0, ctx, "RevisionManifestEndFND");
            require_fnd_len!(node, 0, "RevisionManifestEndFND");
            Ok(TypedNode::RevisionManifestEnd)
        }
        REVISION_ROLE_DECLARATION => {
            require_base_type!(node, 0, ctx, "RevisionRoleDeclarationFND");
            require_fnd_len!(node, 24, "RevisionRoleDeclarationFND");
            let rid = ExtendedGuid::parse(&mut node.fnd)?;
            let revision_role = node.fnd.u32()?;
            ctx.require(!rid.is_zero(), "RevisionRoleDeclarationFND.rid MUST NOT be zero", Some(node.header.offset))?;
            Ok(TypedNode::RevisionRoleDeclaration(RevisionRoleDeclaration {
                rid,
                revision_role,
            }))
        }
        REVISION_ROLE_AND_CONTEXT_DECLARATION => {
            require_base_type!(node, 0, ctx, "RevisionRoleAndContextDeclarationFND");
            require_fnd_len!(node, 44, "RevisionRoleAndContextDeclarationFND");
            let rid = ExtendedGuid::parse(&mut node.fnd)?;
            let revision_role = node.fnd.u32()?;
            let gctxid = ExtendedGuid::parse(&mut node.fnd)?;
            ctx.require(!rid.is_zero(), "RevisionRoleAndContextDeclarationFND.rid MUST NOT be zero", Some(node.header.offset))?;
            Ok(TypedNode::RevisionRoleAndContextDeclaration(
                RevisionRoleAndContextDeclaration {
                    rid,
                    revision_role,
                    gctxid,
                },
            ))
        }
        OBJECT_DATA_ENCRYPTION_KEY_V2 => {
            require_base_type!(node, 2, ctx, "ObjectDataEncryptionKeyV2FNDX");
            let ref_ = node
                .chunk_ref
                .ok_or_else(|| FormatError::at("ObjectDataEncryptionKeyV2FNDX MUST carry a chunk reference", node.header.offset))?;
            require_fnd_len!(node, 0, "ObjectDataEncryptionKeyV2FNDX");
            Ok(TypedNode::ObjectDataEncryptionKeyV2(
                ObjectDataEncryptionKeyV2 { ref_ },
            ))
        }
        OBJECT_GROUP_LIST_REFERENCE => {
            require_base_type!(node, 2, ctx, "ObjectGroupListReferenceFND");
            let ref_ = node
                .chunk_ref
                .ok_or_else(|| FormatError::at("ObjectGroupListReferenceFND MUST carry a chunk reference", node.header.offset))?;
            Ok(TypedNode::ObjectGroupListReference(ObjectGroupListReference { ref_ }))
        }
        OBJECT_GROUP_START => {
            require_base_type!(node, 0, ctx, "ObjectGroupStartFND");
            Ok(TypedNode::ObjectGroupStart)
        }
        OBJECT_GROUP_END => {
            require_base_type!(node, 0, ctx, "ObjectGroupEndFND");
            Ok(TypedNode::ObjectGroupEnd)
        }
        OBJECT_DECLARATION_WITH_REF_COUNT | OBJECT_DECLARATION_WITH_REF_COUNT2 => {
            require_base_type!(node, 2, ctx, "ObjectDeclarationWithRefCountFNDX");
            let ref_ = node
                .chunk_ref
                .ok_or_else(|| FormatError::at("ObjectDeclarationWithRefCountFNDX MUST carry a chunk reference", node.header.offset))?;
            require_fnd_len!(node, 24, "ObjectDeclarationWithRefCountFNDX");
            let oid = ExtendedGuid::parse(&mut node.fnd)?;
            let jcid = node.fnd.u32()?;
            Ok(TypedNode::ObjectDeclarationWithRefCount(
                ObjectDeclarationWithRefCount { oid, jcid, ref_ },
            ))
        }
        GLOBAL_ID_TABLE_START | GLOBAL_ID_TABLE_ENTRY | GLOBAL_ID_TABLE_END | FILE_DATA_STORE_OBJECT_REFERENCE => {
            let file_node_id = node.header.file_node_id;
            let chunk_ref = node.chunk_ref;
            Ok(TypedNode::Raw {
                file_node_id,
                chunk_ref,
                raw: node.fnd.rest(),
            })
        }
        unknown => {
            ctx.warn_unknown_id(unknown as u32, "FileNodeID", Some(node.header.offset));
            Ok(TypedNode::Unknown { raw: node.fnd.rest() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_decodes_reserved_field() {
        // file_node_id=0x004, base_type=0, stp/cb format=0, size=24 (header+fnd).
        let word: u32 = 0x004 | (24 << 10);
        let header = FileNodeHeader::from_u32(word, 0);
        assert_eq!(header.file_node_id, 0x004);
        assert_eq!(header.size, 24);
        assert_eq!(header.base_type, 0);
    }

    #[test]
    fn zero_word_is_terminator() {
        let data = 0u32.to_le_bytes();
        let ctx = ParseContext::builder().build(data.len());
        let mut r = Reader::new(&data);
        assert!(read_file_node(&mut r, &ctx).unwrap().is_none());
    }
}
