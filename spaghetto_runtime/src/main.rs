//! Spaghetto — run a pasta restaurant from the terminal.
//!
//! Every change is an event in a per-game log; the state you see is a
//! replay of that log.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
