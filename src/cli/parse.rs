//! CLI parse: clap types for Folio. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Folio CLI - Sectioned document generation
#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Generate multi-section documents in concurrent batches with retry and partial completion")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
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

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the sections a document type offers
    Catalog {
        /// Document type (catalog name)
        #[arg(long, default_value = "business-plan")]
        doc_type: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Start a generation run and wait for it to finish
    Generate {
        /// Document type (catalog name)
        #[arg(long)]
        doc_type: String,
        /// Comma-separated section ids (default: the whole catalog)
        #[arg(long, value_delimiter = ',')]
        sections: Vec<String>,
        /// Use the offline placeholder content service
        #[arg(long)]
        offline: bool,
        /// Requester recorded in the run context
        #[arg(long)]
        requester: Option<String>,
        /// Seconds to wait for the run to finish
        #[arg(long, default_value_t = 600)]
        wait_secs: u64,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show a run's aggregate and per-section state
    Status {
        /// Run id
        #[arg(long)]
        run: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Re-dispatch every failed section of a run
    Retry {
        /// Run id
        #[arg(long)]
        run: String,
        /// Use the offline placeholder content service
        #[arg(long)]
        offline: bool,
        /// Seconds to wait for the retried sections to finish
        #[arg(long, default_value_t = 600)]
        wait_secs: u64,
    },
    /// Compile a run's completed sections into a document
    Compile {
        /// Run id
        #[arg(long)]
        run: String,
        /// Document format (markdown or json)
        #[arg(long, default_value = "markdown")]
        format: String,
    },
    /// List persisted runs, newest first
    History {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

impl Commands {
    /// Stable command name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Catalog { .. } => "catalog",
            Commands::Generate { .. } => "generate",
            Commands::Status { .. } => "status",
            Commands::Retry { .. } => "retry",
            Commands::Compile { .. } => "compile",
            Commands::History { .. } => "history",
        }
    }
}
