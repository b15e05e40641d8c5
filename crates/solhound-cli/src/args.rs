use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "solhound",
    version,
    about = "Heuristic vulnerability scanning over normalized contract models"
)]
pub struct Args {
    /// Path to the contract-model JSON file
    pub model_path: PathBuf,

    /// Output format
    #[arg(long, default_value = "json")]
    pub format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Enable only these rule ids (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub rules: Vec<String>,

    /// Enable only these rule families (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub families: Vec<String>,

    /// Evaluate rules sequentially instead of on the worker pool
    #[arg(long)]
    pub sequential: bool,

    /// Abort the run after this many milliseconds
    #[arg(long)]
    pub deadline_ms: Option<u64>,

    /// Optional git commit hash for tool metadata
    #[arg(long)]
    pub commit: Option<String>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
