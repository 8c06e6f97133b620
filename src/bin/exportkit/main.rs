//! exportkit CLI - save projects into generated code and native build files

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("exportkit=debug")
    } else {
        EnvFilter::new("exportkit=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Save(args) => commands::save::execute(args),
        Commands::Resources(args) => commands::resources::execute(args),
        Commands::Init(args) => commands::init::execute(args),
    }
}
