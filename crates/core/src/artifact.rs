use crate::{
    bytecode::{Disassembly, decode_hex},
    correlate::{Correlation, Correlator, FunctionTable},
    error::MalformedBytecode,
    mapper::PcSourceMap,
    sourcemap::{RawSourceMap, SourceMap},
    sources::SourceFiles,
    trace::{CallTraceArena, TraceStep},
};
use alloy_primitives::Address;
use sourcetrace_config::Config;

/// Everything derived from a contract's runtime bytecode, source map and sources that is needed
/// to correlate its traces.
#[derive(Clone, Debug)]
pub struct DebugArtifact {
    disassembly: Disassembly,
    source_map: SourceMap,
    files: SourceFiles,
    pc_map: PcSourceMap,
    functions: FunctionTable,
    config: Config,
}

impl DebugArtifact {
    pub fn new(code: &[u8], source_map: &RawSourceMap, files: SourceFiles, config: Config) -> Self {
        Self::from_disassembly(Disassembly::new(code), source_map, files, config)
    }

    /// Builds the artifact from hex encoded bytecode.
    ///
    /// Undecodable bytecode is treated as empty, so every step of a correlated trace ends up
    /// unmapped. Use [`try_from_hex`](Self::try_from_hex) to reject it instead.
    pub fn from_hex(
        code: &str,
        source_map: &RawSourceMap,
        files: SourceFiles,
        config: Config,
    ) -> Self {
        let disassembly = Disassembly::from_hex(code).unwrap_or_else(|err| {
            warn!(%err, "ignoring malformed bytecode");
            Disassembly::default()
        });
        Self::from_disassembly(disassembly, source_map, files, config)
    }

    pub fn try_from_hex(
        code: &str,
        source_map: &RawSourceMap,
        files: SourceFiles,
        config: Config,
    ) -> Result<Self, MalformedBytecode> {
        let code = decode_hex(code)?;
        Ok(Self::new(&code, source_map, files, config))
    }

    fn from_disassembly(
        disassembly: Disassembly,
        source_map: &RawSourceMap,
        files: SourceFiles,
        config: Config,
    ) -> Self {
        let source_map = source_map.decode();
        let pc_map =
            PcSourceMap::build(&disassembly, &source_map, &files, &config.path_resolution);
        let functions = FunctionTable::from_sources(&files);
        debug!(
            instructions = disassembly.len(),
            source_map_entries = source_map.len(),
            mapped_pcs = pc_map.len(),
            files = files.len(),
            "built debug artifact"
        );
        Self { disassembly, source_map, files, pc_map, functions, config }
    }

    pub fn disassembly(&self) -> &Disassembly {
        &self.disassembly
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    pub fn files(&self) -> &SourceFiles {
        &self.files
    }

    pub fn pc_map(&self) -> &PcSourceMap {
        &self.pc_map
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn correlator(&self) -> Correlator<'_> {
        Correlator::with_config(&self.pc_map, &self.functions, &self.config)
    }

    /// Correlates the steps of a single call frame.
    pub fn correlate<'a>(&'a self, steps: &'a [TraceStep]) -> Correlation<'a> {
        self.correlator().correlate(steps)
    }

    /// Correlates every frame of `arena` running this contract's runtime code.
    pub fn correlate_arena<'a>(
        &'a self,
        arena: &'a CallTraceArena,
        target: Option<Address>,
    ) -> Correlation<'a> {
        self.correlator().correlate_arena(arena, target)
    }
}
