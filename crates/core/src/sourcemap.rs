//! Source map decoding.
//!
//! Solc emits one record per instruction, `s:l:f:j:m` (offset, length, source index, jump
//! type, modifier depth), joined by `;`. A record may omit trailing fields or leave any field
//! empty, in which case the value of the previous record is reused. The compile service may
//! instead hand over the already expanded elements as a JSON array.

use crate::error::UnknownJumpType;
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, slice, str::FromStr};

/// How control flow moves at an instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Jump {
    /// A jump into a function.
    In,
    /// A return from a function.
    Out,
    /// An ordinary jump, or none at all.
    Regular,
    /// No record so far has named a jump type.
    #[default]
    Unspecified,
}

impl Jump {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::Regular => "regular",
            Self::Unspecified => "unspecified",
        }
    }
}

impl FromStr for Jump {
    type Err = UnknownJumpType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i" | "in" | "In" => Ok(Self::In),
            "o" | "out" | "Out" => Ok(Self::Out),
            "-" | "regular" | "Regular" => Ok(Self::Regular),
            "" | "unspecified" => Ok(Self::Unspecified),
            _ => Err(UnknownJumpType(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Jump {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Jump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fully resolved source map record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMapEntry {
    /// Instruction counter this record describes.
    #[serde(rename = "index")]
    pub ic: usize,
    /// Byte offset of the source range, `-1` if the compiler gave no location.
    pub offset: i32,
    /// Byte length of the source range, `-1` if the compiler gave no location.
    pub length: i32,
    /// Compiler source id of the file the range lives in.
    pub source_index: u32,
    pub jump: Jump,
    pub modifier_depth: u32,
}

/// A decoded source map, ordered by instruction counter.
///
/// Instructions generated by the compiler without a source counterpart have no entry, so the
/// instruction counters are ascending but not necessarily contiguous.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SourceMap {
    entries: Vec<SourceMapEntry>,
}

impl SourceMap {
    pub fn entries(&self) -> &[SourceMapEntry] {
        &self.entries
    }

    pub fn iter(&self) -> slice::Iter<'_, SourceMapEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry for the given instruction counter.
    pub fn get(&self, ic: usize) -> Option<&SourceMapEntry> {
        self.entries.binary_search_by_key(&ic, |entry| entry.ic).ok().map(|idx| &self.entries[idx])
    }
}

impl<'a> IntoIterator for &'a SourceMap {
    type Item = &'a SourceMapEntry;
    type IntoIter = slice::Iter<'a, SourceMapEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An expanded source element as emitted by the compile service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSourceElement {
    pub offset: i32,
    pub length: i32,
    /// Source id, `-1` for compiler generated code.
    pub index: i32,
    #[serde(default)]
    pub jump_type: Jump,
    #[serde(default)]
    pub modifier_depth: u32,
}

/// A source map in one of the shapes compilers hand out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RawSourceMap {
    /// The solc `s:l:f:j:m;...` string.
    Compressed(String),
    /// One explicit element per instruction.
    Expanded(Vec<RawSourceElement>),
}

impl Default for RawSourceMap {
    fn default() -> Self {
        Self::Compressed(String::new())
    }
}

/// The shapes accepted on the wire. Strings may themselves carry a JSON array.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSourceMapRepr {
    Encoded(String),
    Expanded(Vec<RawSourceElement>),
}

impl<'de> Deserialize<'de> for RawSourceMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawSourceMapRepr::deserialize(deserializer)? {
            RawSourceMapRepr::Encoded(value) => Self::from_compiler_value(&value),
            RawSourceMapRepr::Expanded(elements) => Self::Expanded(elements),
        })
    }
}

impl RawSourceMap {
    /// Interprets a source map value as stored in compiler output.
    ///
    /// A value that is a JSON array is read as expanded elements; anything else is a compressed
    /// solc string. A JSON array that fails to parse yields an empty map.
    pub fn from_compiler_value(value: &str) -> Self {
        if !value.trim_start().starts_with('[') {
            return Self::Compressed(value.to_string());
        }
        match serde_json::from_str(value) {
            Ok(elements) => Self::Expanded(elements),
            Err(err) => {
                debug!(%err, "discarding malformed expanded source map");
                Self::Expanded(Vec::new())
            }
        }
    }

    /// Returns true if the map describes no instructions at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Compressed(map) => map.trim().is_empty(),
            Self::Expanded(elements) => elements.is_empty(),
        }
    }

    /// Decodes the map into per-instruction entries.
    pub fn decode(&self) -> SourceMap {
        match self {
            Self::Compressed(map) => decode_compressed(map),
            Self::Expanded(elements) => decode_expanded(elements),
        }
    }
}

/// The five values carried from one compressed record to the next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Carry {
    offset: i32,
    length: i32,
    index: i32,
    jump: Jump,
    modifier_depth: u32,
}

impl Carry {
    /// Returns the state after applying `record`, keeping every field it omits.
    fn apply(self, ic: usize, record: &str) -> Self {
        let mut fields = record.split(':');
        Self {
            offset: next_field(&mut fields, ic, "offset").unwrap_or(self.offset),
            length: next_field(&mut fields, ic, "length").unwrap_or(self.length),
            index: next_field(&mut fields, ic, "index").unwrap_or(self.index),
            jump: next_field(&mut fields, ic, "jump").unwrap_or(self.jump),
            modifier_depth: next_field(&mut fields, ic, "modifier depth")
                .unwrap_or(self.modifier_depth),
        }
    }

    /// Resolves the state into an entry, or `None` for compiler generated code.
    fn entry(&self, ic: usize) -> Option<SourceMapEntry> {
        let source_index = u32::try_from(self.index).ok()?;
        Some(SourceMapEntry {
            ic,
            offset: self.offset,
            length: self.length,
            source_index,
            jump: self.jump,
            modifier_depth: self.modifier_depth,
        })
    }
}

/// Parses the next field if it is present and non-empty. Unparsable fields count as omitted.
fn next_field<'a, T: FromStr>(
    fields: &mut impl Iterator<Item = &'a str>,
    ic: usize,
    name: &str,
) -> Option<T> {
    let field = fields.next().filter(|field| !field.is_empty())?;
    match field.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            trace!(ic, field, name, "ignoring malformed source map field");
            None
        }
    }
}

/// Decodes a source map of either shape.
pub fn decode(raw: &RawSourceMap) -> SourceMap {
    raw.decode()
}

/// Decodes a compressed solc source map.
pub fn decode_compressed(map: &str) -> SourceMap {
    let map = map.trim();
    if map.is_empty() {
        return SourceMap::default();
    }
    let (_, entries) = map.split(';').enumerate().fold(
        (Carry::default(), Vec::new()),
        |(carry, mut entries), (ic, record)| {
            let carry = carry.apply(ic, record);
            entries.extend(carry.entry(ic));
            (carry, entries)
        },
    );
    SourceMap { entries }
}

/// Converts expanded elements, which need no carrying, into entries.
pub fn decode_expanded(elements: &[RawSourceElement]) -> SourceMap {
    let entries = elements
        .iter()
        .enumerate()
        .filter_map(|(ic, element)| {
            let source_index = u32::try_from(element.index).ok()?;
            Some(SourceMapEntry {
                ic,
                offset: element.offset,
                length: element.length,
                source_index,
                jump: element.jump_type,
                modifier_depth: element.modifier_depth,
            })
        })
        .collect();
    SourceMap { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn entry(
        ic: usize,
        offset: i32,
        length: i32,
        source_index: u32,
        jump: Jump,
        modifier_depth: u32,
    ) -> SourceMapEntry {
        SourceMapEntry { ic, offset, length, source_index, jump, modifier_depth }
    }

    #[test]
    fn carries_omitted_fields() {
        let map = decode_compressed("1:2:3:i:0;4::5:o");
        assert_eq!(
            map.entries(),
            &[entry(0, 1, 2, 3, Jump::In, 0), entry(1, 4, 2, 5, Jump::Out, 0)]
        );
    }

    #[test]
    fn empty_records_repeat_previous() {
        let map = decode_compressed("10:5:1:-:0;;:::2;;");
        assert_eq!(
            map.entries(),
            &[
                entry(0, 10, 5, 1, Jump::Regular, 0),
                entry(1, 10, 5, 1, Jump::Regular, 0),
                entry(2, 10, 5, 1, Jump::Regular, 2),
                entry(3, 10, 5, 1, Jump::Regular, 2),
                entry(4, 10, 5, 1, Jump::Regular, 2),
            ]
        );
    }

    #[test]
    fn skips_compiler_generated_code() {
        let map = decode_compressed("0:10:0:-:0;12:3:-1;:4;20:1:0");
        // The third record only replaces the length and keeps the carried `-1` source.
        assert_eq!(
            map.entries(),
            &[entry(0, 0, 10, 0, Jump::Regular, 0), entry(3, 20, 1, 0, Jump::Regular, 0)]
        );
        assert!(map.get(1).is_none());
        assert_eq!(map.get(3).map(|entry| entry.offset), Some(20));
    }

    #[test]
    fn no_location_marker_updates_carry() {
        // `-1:-1:-1` drops the location, and a record restoring only the file keeps it dropped
        let map = decode_compressed("10:5:0:-:0;-1:-1:-1;::0");
        assert_eq!(
            map.entries(),
            &[entry(0, 10, 5, 0, Jump::Regular, 0), entry(2, -1, -1, 0, Jump::Regular, 0)]
        );
    }

    #[test]
    fn first_record_defaults_to_zero() {
        let map = decode_compressed("::");
        assert_eq!(map.entries(), &[entry(0, 0, 0, 0, Jump::Unspecified, 0)]);
    }

    #[test]
    fn malformed_fields_keep_previous_value() {
        let map = decode_compressed("5:6:0:i:1;x:7:0:?:y");
        assert_eq!(
            map.entries(),
            &[entry(0, 5, 6, 0, Jump::In, 1), entry(1, 5, 7, 0, Jump::In, 1)]
        );
    }

    #[test]
    fn empty_map() {
        assert!(decode_compressed("").is_empty());
        assert!(decode_compressed("  ").is_empty());
        assert!(RawSourceMap::default().decode().is_empty());
        assert!(RawSourceMap::Expanded(vec![]).decode().is_empty());
    }

    #[test]
    fn expanded_elements_map_by_position() {
        let raw = RawSourceMap::from_compiler_value(
            r#"[
                {"offset":0,"length":40,"index":0,"jumpType":"Regular","modifierDepth":0},
                {"offset":0,"length":0,"index":-1,"jumpType":"Regular","modifierDepth":0},
                {"offset":17,"length":4,"index":1,"jumpType":"In","modifierDepth":1}
            ]"#,
        );
        assert!(matches!(raw, RawSourceMap::Expanded(ref elements) if elements.len() == 3));
        assert_eq!(
            raw.decode().entries(),
            &[entry(0, 0, 40, 0, Jump::Regular, 0), entry(2, 17, 4, 1, Jump::In, 1)]
        );
    }

    #[test]
    fn shape_follows_encoding_not_content() {
        // An expanded map whose first offset is zero is still expanded.
        let raw = RawSourceMap::from_compiler_value(r#"[{"offset":0,"length":1,"index":0}]"#);
        assert_eq!(raw.decode().entries(), &[entry(0, 0, 1, 0, Jump::Unspecified, 0)]);

        let raw = RawSourceMap::from_compiler_value("0:1:0:-");
        assert_eq!(raw, RawSourceMap::Compressed("0:1:0:-".to_string()));
    }

    #[test]
    fn malformed_json_degrades_to_empty() {
        let raw = RawSourceMap::from_compiler_value("[{\"offset\":");
        assert!(raw.is_empty());
        assert!(raw.decode().is_empty());
    }

    #[test]
    fn deserializes_all_shapes() {
        let compressed: RawSourceMap = serde_json::from_str(r#""1:2:0:-""#).unwrap();
        assert_eq!(compressed, RawSourceMap::Compressed("1:2:0:-".to_string()));

        let nested: RawSourceMap =
            serde_json::from_str(r#""[{\"offset\":1,\"length\":2,\"index\":0,\"jumpType\":\"o\"}]""#)
                .unwrap();
        assert_eq!(nested.decode().entries(), &[entry(0, 1, 2, 0, Jump::Out, 0)]);

        let structured: RawSourceMap =
            serde_json::from_str(r#"[{"offset":3,"length":4,"index":0,"jumpType":"-"}]"#).unwrap();
        assert_eq!(structured.decode().entries(), &[entry(0, 3, 4, 0, Jump::Regular, 0)]);
    }
}
