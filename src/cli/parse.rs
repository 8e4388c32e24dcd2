//! CLI parse: clap types for assetforge. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// assetforge - resumable batch generation of catalog images
#[derive(Parser)]
#[command(name = "assetforge")]
#[command(about = "Resumable, rate-limited batch pipeline for catalog car images")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (replaces <workspace>/assetforge.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,
}

/// Where reference images come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReferenceMode {
    /// Scrape the public listing page of each model
    Web,
    /// Operator-supplied images in a directory
    Dir,
    /// Text-only generation for every item
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate every catalog image that is not done yet
    Generate {
        /// Reference source for the edit endpoint
        #[arg(long, value_enum, default_value = "web")]
        references: ReferenceMode,
        /// Directory of reference images (with --references dir)
        #[arg(long)]
        references_dir: Option<PathBuf>,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Regenerate flagged images, replacing each one only on success
    Regenerate {
        /// Directory holding copies of the flagged images; file names select the items
        flagged_dir: PathBuf,
        /// Reference source for the edit endpoint
        #[arg(long, value_enum, default_value = "web")]
        references: ReferenceMode,
        /// Directory of reference images (with --references dir)
        #[arg(long)]
        references_dir: Option<PathBuf>,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Label which way each generated car faces
    Classify {
        /// Image directory (default: the configured output directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Show manifest progress
    Status {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: StatusFormat,
    },
}
