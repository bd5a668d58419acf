#[macro_use]
extern crate tracing;

use clap::Parser;
use eyre::Result;
use sourcetrace_cli::{handler, utils};

mod args;
mod cmd;

use args::Sourcetrace;

fn main() -> Result<()> {
    handler::install();
    utils::subscriber();
    utils::enable_paint();
    let args = Sourcetrace::parse();
    args.run()
}
