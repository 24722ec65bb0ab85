//! Provides the main entry point to the program.
use anyhow::Result;
use clap::Parser;
use human_panic::setup_panic;
use secnet::commands::{Cli, Commands, handle_prepare_command};

fn main() -> Result<()> {
    setup_panic!();

    let cli = Cli::parse();
    match cli.command {
        Commands::Prepare {
            model_dir,
            scenario,
            year,
            output,
        } => handle_prepare_command(&model_dir, scenario.as_deref(), year, output.as_deref()),
    }
}
