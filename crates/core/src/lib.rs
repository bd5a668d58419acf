//! # sourcetrace-core
//!
//! Correlates EVM execution traces with the Solidity source that produced them.
//!
//! The pipeline runs, leaves first:
//! - [`bytecode`] disassembles runtime bytecode, recording both the program counter and the
//!   instruction counter of every instruction;
//! - [`sourcemap`] decodes the compiler's source map into one entry per instruction counter;
//! - [`functions`] scans source texts for function spans;
//! - [`mapper`] joins the three into a program counter to source location map;
//! - [`correlate`] walks a trace and attributes every step to a line and function.
//!
//! [`DebugArtifact`] bundles the stages for one contract.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate tracing;

pub mod bytecode;
pub mod compiler;
pub mod correlate;
pub mod error;
pub mod functions;
pub mod lines;
pub mod mapper;
pub mod opcodes;
pub mod sourcemap;
pub mod sources;
pub mod trace;

mod artifact;
pub use artifact::DebugArtifact;

pub use bytecode::{Disassembly, Instruction, disassemble};
pub use compiler::CompilerSourceMaps;
pub use correlate::{
    Correlation, Correlator, EnhancedStep, FunctionMatch, FunctionTable, StepRef, StepSource,
};
pub use error::MalformedBytecode;
pub use functions::{FunctionRange, extract_ranges};
pub use lines::{LineIndex, calculate_line_and_column};
pub use mapper::{PcSourceMap, SourceLocation, build_map};
pub use opcodes::{Category, category, mnemonic};
pub use sourcemap::{RawSourceMap, SourceMap, SourceMapEntry};
pub use sources::SourceFiles;
pub use trace::{CallTraceArena, TraceStep};
