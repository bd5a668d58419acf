use clap::Parser;
use eyre::{Result, WrapErr};
use sourcetrace_core::Disassembly;
use std::fmt::Write;

/// CLI arguments for `sourcetrace disassemble`.
#[derive(Clone, Debug, Parser)]
pub struct DisassembleArgs {
    /// The hex encoded bytecode, with or without a `0x` prefix.
    #[arg(value_name = "HEX")]
    bytecode: String,
}

impl DisassembleArgs {
    pub fn run(self) -> Result<()> {
        let disassembly =
            Disassembly::from_hex(&self.bytecode).wrap_err("failed to decode bytecode")?;
        print!("{}", format_disassembly(&disassembly));
        Ok(())
    }
}

/// Renders one `pc: MNEMONIC [immediate]` line per instruction.
fn format_disassembly(disassembly: &Disassembly) -> String {
    let mut out = String::new();
    for inst in disassembly {
        let _ = writeln!(out, "{:08x}: {inst}", inst.pc);
    }
    out
}
