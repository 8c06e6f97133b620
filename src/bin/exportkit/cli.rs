//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// exportkit - deterministic project exporter
#[derive(Parser)]
#[command(name = "exportkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save the project: generated code, targets and the project file
    Save(SaveArgs),

    /// Regenerate only the embedded binary data
    Resources(ResourcesArgs),

    /// Create a new project in a directory
    Init(InitArgs),
}

#[derive(Args)]
pub struct SaveArgs {
    /// Project file or a folder inside the project (defaults to current directory)
    pub path: Option<PathBuf>,

    /// Only write the named target
    #[arg(long)]
    pub target: Option<String>,

    /// Write targets one after another on a single thread
    #[arg(long)]
    pub headless: bool,

    /// Number of targets written in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Save the project file under a new path
    #[arg(long, value_name = "FILE")]
    pub save_as: Option<PathBuf>,

    /// Only write the generated code a live build needs
    #[arg(long, conflicts_with_all = ["target", "save_as"])]
    pub live_build: bool,
}

#[derive(Args)]
pub struct ResourcesArgs {
    /// Project file or a folder inside the project (defaults to current directory)
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct InitArgs {
    /// Project name (defaults to directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Directory to initialize (defaults to current directory)
    pub path: Option<PathBuf>,
}
