//! `sourcetrace` subcommands.

pub mod correlate;
pub mod disassemble;
pub mod functions;
pub mod source_map;
