use crate::cmd::{
    correlate::CorrelateArgs, disassemble::DisassembleArgs, functions::FunctionsArgs,
    source_map::SourceMapArgs,
};
use clap::{Parser, Subcommand, ValueHint};
use eyre::{Result, WrapErr};
use sourcetrace_config::Config;
use std::path::PathBuf;

/// Map EVM execution traces back to the Solidity source that produced them.
#[derive(Debug, Parser)]
#[command(name = "sourcetrace", version, next_display_order = None)]
pub struct Sourcetrace {
    /// Directory containing `sourcetrace.toml`.
    ///
    /// Defaults to the current directory.
    #[arg(long, global = true, value_hint = ValueHint::DirPath, value_name = "DIR")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: SourcetraceSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum SourcetraceSubcommand {
    /// Disassembles hex encoded bytecode.
    #[command(visible_alias = "da")]
    Disassemble(DisassembleArgs),

    /// Lists the functions defined in a Solidity file.
    #[command(visible_alias = "fn")]
    Functions(FunctionsArgs),

    /// Decodes a source map.
    #[command(visible_alias = "sm")]
    SourceMap(SourceMapArgs),

    /// Correlates an execution trace with the contract's sources.
    #[command(visible_alias = "c")]
    Correlate(CorrelateArgs),
}

impl Sourcetrace {
    pub fn run(self) -> Result<()> {
        match self.cmd {
            SourcetraceSubcommand::Disassemble(cmd) => cmd.run(),
            SourcetraceSubcommand::Functions(cmd) => cmd.run(),
            SourcetraceSubcommand::SourceMap(cmd) => cmd.run(),
            SourcetraceSubcommand::Correlate(cmd) => {
                let config = load_config(self.config)?;
                cmd.run(config)
            }
        }
    }
}

fn load_config(dir: Option<PathBuf>) -> Result<Config> {
    match dir {
        Some(dir) => Config::load_from(&dir)
            .wrap_err_with(|| format!("failed to load config from {}", dir.display())),
        None => Ok(Config::load()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Sourcetrace::command().debug_assert();
    }

    #[test]
    fn parses_global_config() {
        let args = Sourcetrace::try_parse_from([
            "sourcetrace",
            "correlate",
            "bundle.json",
            "--config",
            "project",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("project")));
        assert!(matches!(args.cmd, SourcetraceSubcommand::Correlate(_)));
    }

    #[test]
    fn parses_aliases() {
        let args = Sourcetrace::try_parse_from(["sourcetrace", "da", "0x6080"]).unwrap();
        assert!(matches!(args.cmd, SourcetraceSubcommand::Disassemble(_)));
        let args = Sourcetrace::try_parse_from(["sourcetrace", "sm", "0:1:0"]).unwrap();
        assert!(matches!(args.cmd, SourcetraceSubcommand::SourceMap(_)));
    }

    #[test]
    fn requires_subcommand() {
        assert!(Sourcetrace::try_parse_from(["sourcetrace"]).is_err());
        assert!(Sourcetrace::try_parse_from(["sourcetrace", "trace"]).is_err());
    }

    #[test]
    fn loads_config_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sourcetrace.toml"), "nearest_line_fallback = false\n")
            .unwrap();
        let config = load_config(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(config.fallback_padding(), None);
    }
}
