//! `ObjectSpaceObjectPropSet`: an object's OID/OSID/context-id streams plus
//! its typed property set.
//!
//! Stream header and id-stream layout grounded on
//! `examples/original_source/src/onestore/object_data.py`
//! (`ObjectSpaceObjectStreamHeader`, `ObjectSpaceObjectStream`, `PropertyID`,
//! `PropertySet.parse_from_tail`). The property-value type codes (0x01-0x11)
//! are reconstructed from the public MS-ONESTORE property-value-type table;
//! `object_data.py`'s own table wasn't available to cross-check every code
//! (see `DESIGN.md`).

use crate::common::CompactId;
use crate::context::ParseContext;
use crate::error::{FormatError, Result};
use crate::reader::Reader;
use indexmap::IndexMap;
use num_enum::TryFromPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum PropertyType {
    NoData = 0x01,
    Bool = 0x02,
    OneByte = 0x03,
    TwoBytes = 0x04,
    FourBytes = 0x05,
    EightBytes = 0x06,
    FourBytesOfLengthFollowedByData = 0x07,
    ObjectId = 0x08,
    ArrayOfObjectIds = 0x09,
    ObjectSpaceId = 0x0A,
    ArrayOfObjectSpaceIds = 0x0B,
    ContextId = 0x0C,
    ArrayOfContextIds = 0x0D,
    ArrayOfPropertyValues = 0x10,
    PropertySet = 0x11,
}

/// `{prop_id: 26 bits, prop_type: 5 bits, bool_value: 1 bit}` packed into a u32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PropertyId {
    pub prop_id: u32,
    pub prop_type: u8,
    pub bool_value: bool,
}

impl PropertyId {
    pub fn from_u32(value: u32) -> Self {
        Self {
            prop_id: value & 0x03FF_FFFF,
            prop_type: ((value >> 26) & 0x1F) as u8,
            bool_value: (value >> 31) & 1 != 0,
        }
    }

    pub fn parse(r: &mut Reader) -> Result<Self> {
        Ok(Self::from_u32(r.u32()?))
    }

    /// `prop_id` and `prop_type` combined, excluding the data-carrying
    /// `bool_value` bit. The well-known PIDs in `jcid.rs` are published as
    /// full packed words with `bool_value` clear, so they compare equal to
    /// this key directly.
    pub fn key(&self) -> u32 {
        self.prop_id | ((self.prop_type as u32) << 26)
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PropertyValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Blob(Vec<u8>),
    ObjectId(CompactId),
    ArrayOfObjectIds(Vec<CompactId>),
    ObjectSpaceId(CompactId),
    ArrayOfObjectSpaceIds(Vec<CompactId>),
    ContextId(CompactId),
    ArrayOfContextIds(Vec<CompactId>),
    ArrayOfPropertyValues(Vec<PropertyValue>),
    PropertySet(PropertySet),
}

#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    pub values: IndexMap<u32, PropertyValue>,
}

impl PropertySet {
    /// `c_properties: u16`, then that many [`PropertyId`]s, then the packed
    /// value stream they describe, read in declaration order.
    pub fn parse(r: &mut Reader) -> Result<Self> {
        let c_properties = r.u16()?;
        let mut ids = Vec::with_capacity(c_properties as usize);
        for _ in 0..c_properties {
            ids.push(PropertyId::parse(r)?);
        }

        let mut values = IndexMap::new();
        for id in ids {
            let key = id.key();
            let value = decode_value(r, &id)?;
            values.insert(key, value);
        }

        Ok(Self { values })
    }

    /// Looks up a value by a well-known PID from `jcid.rs` (a full packed
    /// PropertyID word with `bool_value` clear).
    pub fn get(&self, pid: u32) -> Option<&PropertyValue> {
        self.values.get(&(pid & 0x7FFF_FFFF))
    }
}

/// Written by hand rather than derived: this crate's `indexmap` version
/// predates a stable `serde` feature flag, so `IndexMap` itself doesn't
/// implement `Serialize` here. Order is preserved either way.
#[cfg(feature = "serde")]
impl serde::Serialize for PropertySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn read_compact_id_array(r: &mut Reader) -> Result<Vec<CompactId>> {
    let count = r.u32()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(CompactId::parse(r)?);
    }
    Ok(out)
}

fn decode_value(r: &mut Reader, id: &PropertyId) -> Result<PropertyValue> {
    let kind = PropertyType::try_from(id.prop_type)
        .map_err(|_| FormatError::at(format!("unknown property type 0x{:02X}", id.prop_type), r.absolute_offset()))?;

    Ok(match kind {
        PropertyType::NoData => PropertyValue::Bool(id.bool_value),
        PropertyType::Bool => PropertyValue::Bool(r.u8()? != 0),
        PropertyType::OneByte => PropertyValue::U8(r.u8()?),
        PropertyType::TwoBytes => PropertyValue::U16(r.u16()?),
        PropertyType::FourBytes => PropertyValue::U32(r.u32()?),
        PropertyType::EightBytes => PropertyValue::U64(r.u64()?),
        PropertyType::FourBytesOfLengthFollowedByData => {
            let cb = r.u32()?;
            if cb >= 0x4000_0000 {
                return Err(FormatError::at(
                    "PrtFourBytesOfLengthFollowedByData.cb too large",
                    r.absolute_offset(),
                ));
            }
            PropertyValue::Blob(r.bytes(cb as usize)?.to_vec())
        }
        PropertyType::ObjectId => PropertyValue::ObjectId(CompactId::parse(r)?),
        PropertyType::ArrayOfObjectIds => PropertyValue::ArrayOfObjectIds(read_compact_id_array(r)?),
        PropertyType::ObjectSpaceId => PropertyValue::ObjectSpaceId(CompactId::parse(r)?),
        PropertyType::ArrayOfObjectSpaceIds => {
            PropertyValue::ArrayOfObjectSpaceIds(read_compact_id_array(r)?)
        }
        PropertyType::ContextId => PropertyValue::ContextId(CompactId::parse(r)?),
        PropertyType::ArrayOfContextIds => PropertyValue::ArrayOfContextIds(read_compact_id_array(r)?),
        PropertyType::ArrayOfPropertyValues => {
            let count = r.u32()?;
            if count == 0 {
                PropertyValue::ArrayOfPropertyValues(Vec::new())
            } else {
                let element_id = PropertyId::parse(r)?;
                let mut values = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    values.push(decode_value(r, &element_id)?);
                }
                PropertyValue::ArrayOfPropertyValues(values)
            }
        }
        PropertyType::PropertySet => PropertyValue::PropertySet(PropertySet::parse(r)?),
    })
}

/// `ObjectSpaceObjectStreamHeader`: `count: 24, reserved: 6, extended_streams_present@30, osid_stream_not_present@31`.
#[derive(Debug, Clone, Copy)]
pub struct ObjectStreamHeader {
    pub count: u32,
    pub extended_streams_present: bool,
    pub osid_stream_not_present: bool,
}

impl ObjectStreamHeader {
    pub fn parse(r: &mut Reader) -> Result<Self> {
        let word = r.u32()?;
        Ok(Self {
            count: word & 0x00FF_FFFF,
            extended_streams_present: (word >> 30) & 1 != 0,
            osid_stream_not_present: (word >> 31) & 1 != 0,
        })
    }
}

fn read_object_stream(r: &mut Reader) -> Result<(ObjectStreamHeader, Vec<CompactId>)> {
    let header = ObjectStreamHeader::parse(r)?;
    let mut ids = Vec::with_capacity(header.count as usize);
    for _ in 0..header.count {
        ids.push(CompactId::parse(r)?);
    }
    Ok((header, ids))
}

pub struct ObjectSpaceObjectPropSet {
    pub oids: Vec<CompactId>,
    pub osids: Vec<CompactId>,
    pub context_ids: Vec<CompactId>,
    pub properties: PropertySet,
}

impl ObjectSpaceObjectPropSet {
    /// Some writers pad the property value stream with up to 7 trailing
    /// zero bytes to realign the next file node. `PropertySet::parse`
    /// consumes exactly its declared fields and naturally leaves any such
    /// padding unread, so this just checks the leftover is small and zero
    /// rather than pre-trimming (which would wrongly eat a legitimate
    /// all-zero `c_properties == 0` tail).
    pub fn parse(r: &mut Reader, ctx: &ParseContext) -> Result<Self> {
        let (oid_header, oids) = read_object_stream(r)?;

        let (osids, context_ids) = if oid_header.osid_stream_not_present {
            (Vec::new(), Vec::new())
        } else {
            let (osid_header, osids) = read_object_stream(r)?;
            let context_ids = if osid_header.extended_streams_present {
                let (_, context_ids) = read_object_stream(r)?;
                context_ids
            } else {
                Vec::new()
            };
            (osids, context_ids)
        };

        let properties = PropertySet::parse(r)?;

        let leftover = r.rest();
        ctx.require(
            leftover.len() <= 7 && leftover.iter().all(|&b| b == 0),
            "object property set: trailing bytes are not zero padding",
            Some(r.absolute_offset()),
        )?;

        Ok(Self {
            oids,
            osids,
            context_ids,
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_id_bit_layout() {
        let value = (1u32 << 31) | (PropertyType::NoData as u32) << 26 | 0x1234;
        let id = PropertyId::from_u32(value);
        assert_eq!(id.prop_id, 0x1234);
        assert_eq!(id.prop_type, PropertyType::NoData as u8);
        assert!(id.bool_value);
    }

    #[test]
    fn decodes_fixed_width_properties() {
        let id_u32 = PropertyId {
            prop_id: 0x01,
            prop_type: PropertyType::FourBytes as u8,
            bool_value: false,
        };
        let mut bytes = 1u16.to_le_bytes().to_vec();
        bytes.extend_from_slice(&encode_property_id(&id_u32).to_le_bytes());
        bytes.extend_from_slice(&42u32.to_le_bytes());
        let mut r = Reader::new(&bytes);
        let set = PropertySet::parse(&mut r).unwrap();
        assert!(matches!(set.get(id_u32.key()), Some(PropertyValue::U32(42))));
    }

    #[test]
    fn object_prop_set_tolerates_zero_padding() {
        let ctx = ParseContext::builder().build(0);
        // count=0, osid_stream_not_present, then an empty PropertySet, then
        // 3 bytes of legitimate trailing padding.
        let mut bytes = 0x8000_0000u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&[0, 0, 0]);
        let mut r = Reader::new(&bytes);
        let parsed = ObjectSpaceObjectPropSet::parse(&mut r, &ctx).unwrap();
        assert!(parsed.properties.values.is_empty());
    }

    #[test]
    fn object_prop_set_with_empty_c_properties_is_not_mistaken_for_padding() {
        let ctx = ParseContext::builder().build(0);
        let mut bytes = 0x8000_0000u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0u16.to_le_bytes());
        let mut r = Reader::new(&bytes);
        assert!(ObjectSpaceObjectPropSet::parse(&mut r, &ctx).is_ok());
    }

    fn encode_property_id(id: &PropertyId) -> u32 {
        (id.prop_id & 0x03FF_FFFF)
            | ((id.prop_type as u32 & 0x1F) << 26)
            | ((id.bool_value as u32) << 31)
    }
}
