use alloy_primitives::Address;
use clap::{Parser, ValueHint};
use eyre::Result;
use serde::Deserialize;
use sourcetrace_cli::utils;
use sourcetrace_config::Config;
use sourcetrace_core::{
    CallTraceArena, CompilerSourceMaps, Correlation, DebugArtifact, SourceFiles,
};
use std::{collections::BTreeMap, path::PathBuf};
use yansi::Paint;

/// CLI arguments for `sourcetrace correlate`.
#[derive(Clone, Debug, Parser)]
pub struct CorrelateArgs {
    /// JSON file holding the bytecode, source maps, sources and trace to correlate.
    #[arg(value_hint = ValueHint::FilePath, value_name = "BUNDLE")]
    bundle: PathBuf,

    /// The contract whose runtime source map is used.
    ///
    /// May be omitted if the bundle holds a single runtime source map.
    #[arg(long, short, value_name = "NAME")]
    contract: Option<String>,

    /// Write the correlation to this file instead of stdout.
    #[arg(long, short, value_hint = ValueHint::FilePath, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Also print the N source lines that spent the most gas.
    #[arg(long, value_name = "N")]
    top: Option<usize>,
}

/// Everything needed to correlate a single trace.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Hex encoded runtime bytecode.
    pub bytecode: String,
    pub source_maps: CompilerSourceMaps,
    /// Source texts by path.
    pub sources: BTreeMap<String, String>,
    /// Paths by compiler source id.
    #[serde(default)]
    pub source_list: Vec<String>,
    pub trace: CallTraceArena,
    /// Only frames executing at this address are correlated.
    #[serde(default)]
    pub address: Option<Address>,
}

impl Bundle {
    /// Builds the debug artifact of `contract`, or of the only contract with a runtime map.
    pub fn artifact(&self, contract: Option<&str>, config: Config) -> Result<DebugArtifact> {
        let map = self.source_maps.deployed_for(contract).ok_or_else(|| match contract {
            Some(name) => eyre::eyre!("no runtime source map for contract `{name}`"),
            None => eyre::eyre!(
                "bundle holds {} runtime source maps, select one with --contract",
                self.source_maps.deployed().count()
            ),
        })?;
        debug!(path = map.path, contract = map.contract, "selected source map");
        let files = SourceFiles::from_sources(self.sources.clone())
            .with_source_list(self.source_list.clone())
            .with_default_path(map.path);
        Ok(DebugArtifact::from_hex(&self.bytecode, map.map, files, config))
    }
}

impl CorrelateArgs {
    pub fn run(self, config: Config) -> Result<()> {
        let bundle: Bundle = utils::read_json_file(&self.bundle)?;
        let artifact = bundle.artifact(self.contract.as_deref(), config)?;
        let correlation = artifact.correlate_arena(&bundle.trace, bundle.address);
        debug!(
            mapped = correlation.mapped_count(),
            unmapped = correlation.unmapped_count(),
            "correlated trace"
        );

        utils::write_json(&correlation, self.out.as_deref())?;

        if let Some(n) = self.top {
            let table = format_top_lines(&correlation, n);
            // keep stdout valid JSON unless it was redirected to a file
            if self.out.is_some() {
                println!("{table}");
            } else {
                eprintln!("{table}");
            }
        }
        Ok(())
    }
}

/// Renders the `n` most expensive lines as `gas  steps  file:line`.
fn format_top_lines(correlation: &Correlation<'_>, n: usize) -> String {
    let top = correlation.top_lines(n);
    let Some(first) = top.first() else {
        return format!("{}", "No step of the trace maps to a source line".dim());
    };
    let width = first.gas.to_string().len();
    let mut out = format!("{}", "Top gas consumers".bold());
    for line in &top {
        out.push_str(&format!(
            "\n{:>width$}  {:>5}  {}:{}",
            line.gas,
            line.steps,
            line.file_path,
            line.line + 1
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcetrace_core::RawSourceMap;

    // PUSH1 0x01, PUSH1 0x02, ADD, SSTORE
    const BUNDLE: &str = r#"{
        "bytecode": "0x600160020155",
        "sourceMaps": {
            "src/Counter.sol:Counter": "0:0:0:-:0",
            "src/Counter.sol:deployed:Counter": "0:74:0:-:0;60:1:0;;56:9:0"
        },
        "sources": {
            "src/Counter.sol": "contract Counter {\n    function bump() public {\n        x = 1 + 2;\n    }\n}\n"
        },
        "trace": {
            "arena": [{
                "parent": null,
                "children": [],
                "idx": 0,
                "trace": {
                    "depth": 0,
                    "success": true,
                    "address": "0x0000000000000000000000000000000000000001",
                    "kind": "CALL",
                    "steps": [
                        { "pc": 0, "op": "PUSH1", "gasCost": 3 },
                        { "pc": 2, "op": "PUSH1", "gasCost": 3 },
                        { "pc": 4, "op": "ADD", "gasCost": 3 },
                        { "pc": 5, "op": "SSTORE", "gasCost": 20000 }
                    ]
                }
            }]
        }
    }"#;

    fn bundle() -> Bundle {
        serde_json::from_str(BUNDLE).unwrap()
    }

    #[test]
    fn parses_args() {
        let args = CorrelateArgs::try_parse_from([
            "correlate",
            "bundle.json",
            "--contract",
            "Counter",
            "--top",
            "3",
            "-o",
            "out.json",
        ])
        .unwrap();
        assert_eq!(args.contract.as_deref(), Some("Counter"));
        assert_eq!(args.top, Some(3));
        assert_eq!(args.out, Some(PathBuf::from("out.json")));

        assert!(CorrelateArgs::try_parse_from(["correlate", "bundle.json", "--top", "x"]).is_err());
    }

    #[test]
    fn correlates_bundle() {
        let bundle = bundle();
        let artifact = bundle.artifact(None, Config::default()).unwrap();
        let correlation = artifact.correlate_arena(&bundle.trace, bundle.address);
        assert_eq!(correlation.mapped_count(), 4);
        // the contract level step falls back to the adjacent function
        assert_eq!(correlation.function_to_steps["src/Counter.sol:bump"].len(), 4);
        assert_eq!(correlation.function_gas()["src/Counter.sol:bump"], 20009);

        yansi::disable();
        similar_asserts::assert_eq!(
            format_top_lines(&correlation, 2),
            "Top gas consumers\n20006      3  src/Counter.sol:3\n    3      1  src/Counter.sol:1"
        );
    }

    #[test]
    fn empty_source_map_degrades_to_unmapped() {
        let mut bundle = bundle();
        bundle.source_maps = [(
            "src/Counter.sol:deployed:Counter".to_string(),
            RawSourceMap::from_compiler_value(""),
        )]
        .into_iter()
        .collect();
        let artifact = bundle.artifact(None, Config::default()).unwrap();
        let correlation = artifact.correlate_arena(&bundle.trace, bundle.address);
        assert_eq!(correlation.unmapped_count(), 4);

        yansi::disable();
        assert_eq!(
            format_top_lines(&correlation, 3),
            "No step of the trace maps to a source line"
        );

        let dir = tempfile::tempdir().unwrap();
        let bundle_path = dir.path().join("bundle.json");
        std::fs::write(&bundle_path, BUNDLE.replace("0:74:0:-:0;60:1:0;;56:9:0", "")).unwrap();
        let args = CorrelateArgs {
            bundle: bundle_path,
            contract: Some("Counter".to_string()),
            out: Some(dir.path().join("correlation.json")),
            top: Some(3),
        };
        args.run(Config::default()).unwrap();
    }

    #[test]
    fn selects_contract_by_name() {
        let bundle = bundle();
        assert!(bundle.artifact(Some("Counter"), Config::default()).is_ok());
        let err = bundle.artifact(Some("Token"), Config::default()).unwrap_err();
        assert!(err.to_string().contains("`Token`"), "{err}");
    }

    #[test]
    fn writes_correlation_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let bundle_path = dir.path().join("bundle.json");
        std::fs::write(&bundle_path, BUNDLE).unwrap();
        let out = dir.path().join("correlation.json");

        let args = CorrelateArgs {
            bundle: bundle_path,
            contract: None,
            out: Some(out.clone()),
            top: None,
        };
        args.run(Config::default()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
        let steps = json["nodes"][0]["steps"].as_array().unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[3]["opName"], "SSTORE");
        assert_eq!(steps[3]["sourceInfo"]["functionMatch"], "exact");
        assert_eq!(steps[3]["sourceInfo"]["functionName"], "bump");
    }
}
