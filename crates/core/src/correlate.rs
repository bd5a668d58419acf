//! Correlation of executed trace steps with source lines and functions.

use crate::{
    functions::{FunctionRange, extract_ranges},
    mapper::{PcSourceMap, SourceLocation},
    opcodes::{self, Category},
    sources::SourceFiles,
    trace::{CallTraceArena, TraceStep},
};
use alloy_primitives::Address;
use serde::{Serialize, Serializer, ser::SerializeStruct};
use sourcetrace_config::Config;
use std::{borrow::Cow, collections::BTreeMap};

/// The functions of every source file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FunctionTable {
    ranges: BTreeMap<String, Vec<FunctionRange>>,
}

impl FunctionTable {
    /// Extracts the functions of every file in `files`.
    pub fn from_sources(files: &SourceFiles) -> Self {
        let mut table = Self::default();
        for (path, file) in files.iter() {
            let ranges = extract_ranges(file.text());
            debug!(path, functions = ranges.len(), "extracted functions");
            table.insert(path, ranges);
        }
        table
    }

    pub fn insert(&mut self, path: impl Into<String>, ranges: Vec<FunctionRange>) {
        self.ranges.insert(path.into(), ranges);
    }

    /// Returns the functions of `path`, in source order.
    pub fn ranges(&self, path: &str) -> &[FunctionRange] {
        self.ranges.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    /// Finds the function a source position belongs to.
    ///
    /// A function whose span contains `offset` is an exact match; the narrowest one wins. Failing
    /// that, and if `padding` is set, the function whose line span widened by `padding` contains
    /// `line` and whose first or last line is closest to it is a nearest-line match.
    pub fn lookup(
        &self,
        path: &str,
        offset: usize,
        line: usize,
        padding: Option<usize>,
    ) -> FunctionMatch<'_> {
        let ranges = self.ranges(path);
        if let Some(range) =
            ranges.iter().filter(|range| range.contains(offset)).min_by_key(|range| range.width())
        {
            return FunctionMatch::Exact { function_name: &range.name };
        }
        let Some(padding) = padding else { return FunctionMatch::NoMatch };
        ranges
            .iter()
            .filter_map(|range| Some((range, range.padded_line_distance(line, padding)?)))
            .min_by_key(|&(_, distance)| distance)
            .map_or(FunctionMatch::NoMatch, |(range, distance)| FunctionMatch::NearestLine {
                function_name: &range.name,
                distance,
            })
    }
}

/// How a mapped step was attributed to a function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "functionMatch", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FunctionMatch<'a> {
    /// The step's offset lies within the function.
    Exact { function_name: &'a str },
    /// The step lies outside every function, but close to this one's lines.
    NearestLine { function_name: &'a str, distance: usize },
    /// The step belongs to no known function.
    NoMatch,
}

impl<'a> FunctionMatch<'a> {
    pub fn function_name(&self) -> Option<&'a str> {
        match *self {
            Self::Exact { function_name } | Self::NearestLine { function_name, .. } => {
                Some(function_name)
            }
            Self::NoMatch => None,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact { .. })
    }
}

/// Source details of a step whose program counter has a source location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedStep<'a> {
    #[serde(flatten)]
    pub location: &'a SourceLocation,
    #[serde(flatten)]
    pub function: FunctionMatch<'a>,
    /// Whether the previous mapped step of the same frame was on the same file and line.
    pub is_duplicate: bool,
}

/// Where a step came from in the source, if anywhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepSource<'a> {
    Mapped(MappedStep<'a>),
    Unmapped { pc: usize },
}

impl<'a> StepSource<'a> {
    pub fn mapped(&self) -> Option<&MappedStep<'a>> {
        match self {
            Self::Mapped(step) => Some(step),
            Self::Unmapped { .. } => None,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

impl Serialize for StepSource<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Mapped(step) => step.serialize(serializer),
            Self::Unmapped { pc } => {
                let mut state = serializer.serialize_struct("Unmapped", 2)?;
                state.serialize_field("unmapped", &true)?;
                state.serialize_field("pc", pc)?;
                state.end()
            }
        }
    }
}

/// A trace step with its opcode and source details.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedStep<'a> {
    #[serde(flatten)]
    pub step: &'a TraceStep,
    pub op_name: Cow<'static, str>,
    pub category: Category,
    pub source_info: StepSource<'a>,
}

/// Identifies a step by call frame and position within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StepRef {
    pub node: usize,
    pub step: usize,
}

/// The correlated steps of one call frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCorrelation<'a> {
    pub idx: usize,
    pub address: Address,
    pub steps: Vec<EnhancedStep<'a>>,
}

/// Gas spent on one source line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineGas<'a> {
    pub file_path: &'a str,
    pub line: usize,
    pub gas: u64,
    pub steps: usize,
}

/// The result of correlating a trace.
///
/// The indexes refer to steps by [`StepRef`] and list them in execution order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlation<'a> {
    pub nodes: Vec<NodeCorrelation<'a>>,
    /// Steps per `file:function` key.
    pub function_to_steps: BTreeMap<String, Vec<StepRef>>,
    /// Steps per file and line.
    pub line_to_steps: BTreeMap<String, BTreeMap<usize, Vec<StepRef>>>,
}

impl<'a> Correlation<'a> {
    pub fn step(&self, step_ref: StepRef) -> Option<&EnhancedStep<'a>> {
        self.nodes.get(step_ref.node)?.steps.get(step_ref.step)
    }

    /// All steps, frame by frame.
    pub fn steps(&self) -> impl Iterator<Item = &EnhancedStep<'a>> {
        self.nodes.iter().flat_map(|node| &node.steps)
    }

    pub fn mapped_count(&self) -> usize {
        self.steps().filter(|step| step.source_info.is_mapped()).count()
    }

    pub fn unmapped_count(&self) -> usize {
        self.steps().filter(|step| !step.source_info.is_mapped()).count()
    }

    fn gas_of(&self, refs: &[StepRef]) -> u64 {
        refs.iter().filter_map(|&step_ref| self.step(step_ref)).map(|step| step.step.gas_cost).sum()
    }

    /// Gas spent per source line, ordered by file and line.
    pub fn line_gas(&self) -> Vec<LineGas<'_>> {
        self.line_to_steps
            .iter()
            .flat_map(|(path, lines)| {
                lines.iter().map(move |(&line, refs)| LineGas {
                    file_path: path,
                    line,
                    gas: self.gas_of(refs),
                    steps: refs.len(),
                })
            })
            .collect()
    }

    /// Gas spent per `file:function` key.
    pub fn function_gas(&self) -> BTreeMap<&str, u64> {
        self.function_to_steps.iter().map(|(key, refs)| (key.as_str(), self.gas_of(refs))).collect()
    }

    /// The `n` lines that spent the most gas, most expensive first.
    pub fn top_lines(&self, n: usize) -> Vec<LineGas<'_>> {
        let mut lines = self.line_gas();
        // stable, so equal gas keeps file and line order
        lines.sort_by(|a, b| b.gas.cmp(&a.gas));
        lines.truncate(n);
        lines
    }

    fn record(
        &mut self,
        location: &SourceLocation,
        function: FunctionMatch<'_>,
        step_ref: StepRef,
    ) {
        if let Some(name) = function.function_name() {
            let key = format!("{}:{name}", location.file_path);
            self.function_to_steps.entry(key).or_default().push(step_ref);
        }
        self.line_to_steps
            .entry(location.file_path.clone())
            .or_default()
            .entry(location.line)
            .or_default()
            .push(step_ref);
    }
}

/// Attributes trace steps to source lines and functions.
#[derive(Clone, Copy, Debug)]
pub struct Correlator<'a> {
    pc_map: &'a PcSourceMap,
    functions: &'a FunctionTable,
    fallback_padding: Option<usize>,
}

impl<'a> Correlator<'a> {
    /// Creates a correlator with the nearest-line fallback enabled and a padding of one line.
    pub fn new(pc_map: &'a PcSourceMap, functions: &'a FunctionTable) -> Self {
        Self::with_config(pc_map, functions, &Config::default())
    }

    pub fn with_config(
        pc_map: &'a PcSourceMap,
        functions: &'a FunctionTable,
        config: &Config,
    ) -> Self {
        Self { pc_map, functions, fallback_padding: config.fallback_padding() }
    }

    /// Sets the nearest-line padding, or disables the fallback with `None`.
    pub fn fallback_padding(mut self, padding: Option<usize>) -> Self {
        self.fallback_padding = padding;
        self
    }

    /// Correlates the steps of a single call frame.
    pub fn correlate(&self, steps: &'a [TraceStep]) -> Correlation<'a> {
        let mut correlation = Correlation::default();
        let steps = self.correlate_steps(0, steps, true, &mut correlation);
        correlation.nodes.push(NodeCorrelation { idx: 0, address: Address::ZERO, steps });
        correlation
    }

    /// Correlates every call frame of `arena`.
    ///
    /// Creation frames run code the source map does not describe and are left unmapped, as are
    /// frames at addresses other than `target` when one is given.
    pub fn correlate_arena(
        &self,
        arena: &'a CallTraceArena,
        target: Option<Address>,
    ) -> Correlation<'a> {
        let mut correlation = Correlation::default();
        for (node_idx, node) in arena.nodes().iter().enumerate() {
            let trace = &node.trace;
            let mapped = !trace.kind.is_any_create()
                && target.is_none_or(|target| target == trace.address);
            if !mapped {
                trace!(
                    node = node_idx,
                    address = %trace.address,
                    kind = ?trace.kind,
                    "skipping frame"
                );
            }
            let steps = self.correlate_steps(node_idx, &trace.steps, mapped, &mut correlation);
            correlation.nodes.push(NodeCorrelation {
                idx: node.idx,
                address: trace.address,
                steps,
            });
        }
        debug!(
            nodes = correlation.nodes.len(),
            mapped = correlation.mapped_count(),
            unmapped = correlation.unmapped_count(),
            "correlated trace"
        );
        correlation
    }

    fn correlate_steps(
        &self,
        node: usize,
        steps: &'a [TraceStep],
        mapped: bool,
        correlation: &mut Correlation<'a>,
    ) -> Vec<EnhancedStep<'a>> {
        let mut previous: Option<(&str, usize)> = None;
        let mut enhanced = Vec::with_capacity(steps.len());

        for (idx, step) in steps.iter().enumerate() {
            let op_name = opcodes::mnemonic(step.op);
            let category = Category::of(&op_name);
            let location = if mapped { self.pc_map.get(step.pc) } else { None };

            let source_info = match location {
                None => StepSource::Unmapped { pc: step.pc },
                Some(location) => {
                    let line = (location.file_path.as_str(), location.line);
                    let is_duplicate = previous == Some(line);
                    previous = Some(line);

                    // a negative offset lies in no function
                    let offset = usize::try_from(location.offset).unwrap_or(usize::MAX);
                    let function = self.functions.lookup(
                        &location.file_path,
                        offset,
                        location.line,
                        self.fallback_padding,
                    );
                    correlation.record(location, function, StepRef { node, step: idx });
                    StepSource::Mapped(MappedStep { location, function, is_duplicate })
                }
            };

            enhanced.push(EnhancedStep { step, op_name, category, source_info });
        }

        enhanced
    }
}
