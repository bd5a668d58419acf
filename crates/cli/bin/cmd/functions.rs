use clap::{Parser, ValueHint};
use eyre::Result;
use itertools::Itertools;
use sourcetrace_cli::utils;
use sourcetrace_core::{FunctionRange, extract_ranges};
use std::path::PathBuf;
use yansi::Paint;

/// CLI arguments for `sourcetrace functions`.
#[derive(Clone, Debug, Parser)]
pub struct FunctionsArgs {
    /// The Solidity file to scan.
    #[arg(value_hint = ValueHint::FilePath, value_name = "FILE")]
    path: PathBuf,

    /// Print the ranges as JSON.
    #[arg(long, short)]
    json: bool,
}

impl FunctionsArgs {
    pub fn run(self) -> Result<()> {
        let source = utils::read_to_string(&self.path)?;
        let ranges = extract_ranges(&source);
        debug!(path = %self.path.display(), functions = ranges.len(), "extracted functions");
        if self.json {
            return utils::write_json(&ranges, None);
        }
        if !ranges.is_empty() {
            println!("{}", format_ranges(&ranges));
        }
        Ok(())
    }
}

/// One line per function: name, one-based line span and byte span.
fn format_ranges(ranges: &[FunctionRange]) -> String {
    let width = ranges.iter().map(|range| range.name.len()).max().unwrap_or(0);
    ranges
        .iter()
        .map(|range| {
            let name = format!("{:width$}", range.name);
            format!(
                "{}  lines {}-{}  bytes {}..={}",
                name.cyan(),
                range.line + 1,
                range.end_line + 1,
                range.start,
                range.end
            )
        })
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_aligned_ranges() {
        yansi::disable();
        let source = "contract C {\n    function transfer() public {}\n    function a() {}\n}\n";
        let ranges = extract_ranges(source);
        similar_asserts::assert_eq!(
            format_ranges(&ranges),
            "transfer  lines 2-2  bytes 17..=45\na         lines 3-3  bytes 51..=65"
        );
    }
}
