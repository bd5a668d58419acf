//! Program counter to source location mapping.

use crate::{
    bytecode::Disassembly,
    sourcemap::{Jump, SourceMap},
    sources::SourceFiles,
};
use serde::Serialize;
use sourcetrace_config::PathStrategy;
use std::collections::{BTreeMap, btree_map};

/// A source map entry resolved against a concrete file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    /// Key of the file in the [`SourceFiles`].
    pub file_path: String,
    /// Zero-based line of `offset`.
    pub line: usize,
    /// Zero-based byte column of `offset`.
    pub column: usize,
    /// Byte offset as given by the compiler, possibly negative or past the end of the file.
    pub offset: i32,
    pub length: i32,
    pub jump: Jump,
    pub modifier_depth: u32,
    /// Set when `offset` lay outside the file and `line`/`column` were clamped.
    ///
    /// Compilers emit such offsets for code positioned in their intermediate representation.
    pub is_out_of_bounds: bool,
}

/// Source locations keyed by program counter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PcSourceMap {
    inner: BTreeMap<usize, SourceLocation>,
}

impl PcSourceMap {
    /// Resolves every entry of `source_map` to a source location of the instruction it
    /// describes.
    ///
    /// Entries whose instruction does not exist, or whose source file cannot be resolved with
    /// `strategies`, are skipped.
    pub fn build(
        disassembly: &Disassembly,
        source_map: &SourceMap,
        files: &SourceFiles,
        strategies: &[PathStrategy],
    ) -> Self {
        let mut resolver = files.resolver(strategies);
        let mut inner = BTreeMap::new();
        let (mut missing_instruction, mut unresolved, mut out_of_bounds) = (0usize, 0usize, 0usize);

        for entry in source_map {
            let Some(inst) = disassembly.get(entry.ic) else {
                trace!(ic = entry.ic, "source map entry has no instruction");
                missing_instruction += 1;
                continue;
            };
            let Some((path, file)) = resolver.file(entry.source_index) else {
                unresolved += 1;
                continue;
            };
            // negative offsets clamp to the start of the file
            let offset = usize::try_from(entry.offset).ok();
            let pos = file.line_column(offset.unwrap_or(0));
            let is_out_of_bounds = pos.clamped || offset.is_none();
            if is_out_of_bounds {
                trace!(
                    pc = inst.pc,
                    offset = entry.offset,
                    len = file.text().len(),
                    path,
                    "clamped source offset"
                );
                out_of_bounds += 1;
            }
            inner.insert(
                inst.pc,
                SourceLocation {
                    file_path: path.to_string(),
                    line: pos.line,
                    column: pos.column,
                    offset: entry.offset,
                    length: entry.length,
                    jump: entry.jump,
                    modifier_depth: entry.modifier_depth,
                    is_out_of_bounds,
                },
            );
        }

        debug!(
            mapped = inner.len(),
            missing_instruction,
            unresolved,
            out_of_bounds,
            "built pc source map"
        );
        Self { inner }
    }

    /// Returns the source location of the instruction at `pc`.
    pub fn get(&self, pc: usize) -> Option<&SourceLocation> {
        self.inner.get(&pc)
    }

    pub fn contains_pc(&self, pc: usize) -> bool {
        self.inner.contains_key(&pc)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, usize, SourceLocation> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<'a> IntoIterator for &'a PcSourceMap {
    type Item = (&'a usize, &'a SourceLocation);
    type IntoIter = btree_map::Iter<'a, usize, SourceLocation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Builds a [`PcSourceMap`] trying every path strategy.
pub fn build_map(
    disassembly: &Disassembly,
    source_map: &SourceMap,
    files: &SourceFiles,
) -> PcSourceMap {
    PcSourceMap::build(disassembly, source_map, files, &PathStrategy::ALL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bytecode::disassemble, sourcemap::decode_compressed};
    use similar_asserts::assert_eq;

    // PUSH1 0x01 PUSH1 0x02 ADD STOP
    const CODE: &[u8] = &[0x60, 0x01, 0x60, 0x02, 0x01, 0x00];

    #[test]
    fn maps_single_entry_to_pc_zero() {
        let files = SourceFiles::from_sources([("A.sol", "uint x = 1 + 2;")]);
        let map = build_map(&disassemble(CODE), &decode_compressed("0:15:0:-:0"), &files);
        assert_eq!(map.len(), 1);
        assert_eq!(
            map.get(0),
            Some(&SourceLocation {
                file_path: "A.sol".into(),
                line: 0,
                column: 0,
                offset: 0,
                length: 15,
                jump: Jump::Regular,
                modifier_depth: 0,
                is_out_of_bounds: false,
            })
        );
        assert!((1..CODE.len()).all(|pc| !map.contains_pc(pc)));
    }

    #[test]
    fn keys_by_pc_not_index() {
        let files = SourceFiles::from_sources([("A.sol", "a\nbb\nccc\n")]);
        let map = build_map(&disassemble(CODE), &decode_compressed("0:1:0;2:2;5:3;"), &files);
        let lines: Vec<_> = map.iter().map(|(pc, loc)| (*pc, loc.line)).collect();
        assert_eq!(lines, vec![(0, 0), (2, 1), (4, 2), (5, 2)]);
    }

    #[test]
    fn clamps_out_of_bounds_offsets() {
        let files = SourceFiles::from_sources([("A.sol", "ab\ncd")]);
        let map = build_map(&disassemble(CODE), &decode_compressed("4:1:0;900:1:0"), &files);
        let inside = map.get(0).unwrap();
        assert_eq!((inside.line, inside.column, inside.is_out_of_bounds), (1, 1, false));
        let clamped = map.get(2).unwrap();
        assert_eq!((clamped.line, clamped.column, clamped.is_out_of_bounds), (1, 2, true));
        assert_eq!(clamped.offset, 900);
    }

    #[test]
    fn flags_entries_without_location() {
        let files = SourceFiles::from_sources([("A.sol", "x = 1;\ny = 2;\nz = 3;")]);
        let source_map = decode_compressed("10:5:0:-:0;-1:-1:-1;::0");
        let map = build_map(&disassemble(&[0x5b; 3]), &source_map, &files);
        assert_eq!(map.len(), 2);
        let dropped = map.get(2).unwrap();
        assert_eq!((dropped.line, dropped.column), (0, 0));
        assert_eq!((dropped.offset, dropped.length), (-1, -1));
        assert!(dropped.is_out_of_bounds);
        let stated = map.get(0).unwrap();
        assert_eq!((stated.line, stated.column, stated.is_out_of_bounds), (1, 3, false));
    }

    #[test]
    fn skips_unresolvable_entries() {
        let files = SourceFiles::from_sources([("src/A.sol", "x")])
            .with_source_list(vec!["src/A.sol".into(), "src/B.sol".into()]);
        // the first entry names an unknown file and those past the fourth have no instruction
        let source_map = decode_compressed("0:1:1;0:1:0;;;;;;;;0:1:0");
        let map =
            PcSourceMap::build(&disassemble(CODE), &source_map, &files, &[PathStrategy::Exact]);
        assert_eq!(map.iter().map(|(pc, _)| *pc).collect::<Vec<_>>(), vec![2, 4, 5]);
    }

    #[test]
    fn empty_inputs() {
        let files = SourceFiles::from_sources([("A.sol", "x")]);
        assert!(build_map(&disassemble(&[]), &decode_compressed("0:1:0"), &files).is_empty());
        assert!(build_map(&disassemble(CODE), &SourceMap::default(), &files).is_empty());
        assert!(
            build_map(&disassemble(CODE), &decode_compressed("0:1:0"), &SourceFiles::new())
                .is_empty()
        );
    }
}
