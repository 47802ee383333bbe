//! Canopy CLI Binary
//!
//! Command-line interface for browsing and editing a workspace tree.

use anyhow::Context;
use canopy::logging::init_logging;
use canopy::tooling::cli::{load_config, Cli, CliContext};
use clap::Parser;
use std::process;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli).context("loading configuration")?;

    if let Err(e) = init_logging(Some(&config.logging)) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let context = CliContext::new(&config).context("initializing workspace")?;
    let output = context.execute(&cli.command)?;
    println!("{}", output);
    Ok(())
}
