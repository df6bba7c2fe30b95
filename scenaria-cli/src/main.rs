//! ## scenaria-cli
//! **Command line host for scenario documents**
//! Validates documents, runs them headless with a choice policy and a
//! replayable digest, or plays them interactively over stdin/stdout.
//!
//! ### Expectations:
//! - Configuration from `config/` and `SCENARIA_*` variables
//! - Structured logs on stderr, results on stdout

use clap::Parser;

mod commands;
mod play;
mod render;

use commands::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::run_command(cli)
}
