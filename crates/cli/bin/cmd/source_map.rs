use clap::Parser;
use eyre::Result;
use itertools::Itertools;
use sourcetrace_cli::utils;
use sourcetrace_core::{RawSourceMap, SourceMap};
use std::path::Path;

/// CLI arguments for `sourcetrace source-map`.
#[derive(Clone, Debug, Parser)]
pub struct SourceMapArgs {
    /// The source map, or a file containing it.
    ///
    /// Both the compressed `s:l:f:j:m` form and a JSON array of expanded records are accepted.
    #[arg(value_name = "MAP")]
    map: String,

    /// Print the entries as JSON.
    #[arg(long, short)]
    json: bool,
}

impl SourceMapArgs {
    pub fn run(self) -> Result<()> {
        let value = if Path::new(&self.map).is_file() {
            utils::read_to_string(Path::new(&self.map))?
        } else {
            self.map
        };
        let map = RawSourceMap::from_compiler_value(value.trim()).decode();
        debug!(entries = map.len(), "decoded source map");
        if self.json {
            return utils::write_json(&map, None);
        }
        if !map.is_empty() {
            println!("{}", format_entries(&map));
        }
        Ok(())
    }
}

/// One `ic: offset:length:source jump depth` line per entry.
fn format_entries(map: &SourceMap) -> String {
    map.iter()
        .map(|entry| {
            format!(
                "{}: {}:{}:{} {} {}",
                entry.ic,
                entry.offset,
                entry.length,
                entry.source_index,
                entry.jump,
                entry.modifier_depth
            )
        })
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_carried_entries() {
        let map = RawSourceMap::from_compiler_value("1:2:0:i;:5;0:0:-1;7:1:1:o:1").decode();
        similar_asserts::assert_eq!(
            format_entries(&map),
            "0: 1:2:0 in 0\n1: 1:5:0 in 0\n3: 7:1:1 out 1"
        );
    }

    #[test]
    fn accepts_expanded_form() {
        let map = RawSourceMap::from_compiler_value(
            r#"[{"offset":3,"length":4,"index":0,"jumpType":"Out","modifierDepth":0}]"#,
        )
        .decode();
        assert_eq!(format_entries(&map), "0: 3:4:0 out 0");
    }
}
