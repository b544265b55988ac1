//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Oathkeeper metrics - travel statistics and narratives for group meetups
///
/// Records per-visit travel metrics into an append-only log per plan and
/// reports plan or group statistics with generated narratives. Every
/// command prints a JSON envelope on stdout.
///
/// Examples:
///   oathkeeper-metrics ingest --plan-id 4 --member-id 7 --distance-km 3.2 --travel-minutes 25
///   oathkeeper-metrics report 4
///   oathkeeper-metrics text 4 --mode prompt --seed 42 --names names.json
///   oathkeeper-metrics group 1,2,3 --text --mode rules
///   oathkeeper-metrics init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .oathkeeper.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding the plan logs
    #[arg(long, value_name = "DIR", env = "DATA_ROOT", global = true)]
    pub data_root: Option<PathBuf>,

    /// Ollama API endpoint URL
    #[arg(long, value_name = "URL", env = "OLLAMA_URL", global = true)]
    pub ollama_url: Option<String>,

    /// Model used for llm narratives
    #[arg(long, value_name = "NAME", env = "OLLAMA_MODEL", global = true)]
    pub model: Option<String>,

    /// Backend request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Append one travel record to a plan's log
    Ingest(IngestArgs),

    /// Compute a plan's summary and save a snapshot
    Report {
        /// Plan to summarize
        #[arg(allow_negative_numbers = true)]
        plan_id: i64,
    },

    /// Generate a narrative for one plan
    Text(TextArgs),

    /// Pool several plans into one summary
    Group(GroupArgs),

    /// Send a prompt straight to the backend
    Generate(GenerateArgs),

    /// Generate a default .oathkeeper.toml configuration file
    InitConfig,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long, allow_negative_numbers = true)]
    pub plan_id: i64,

    #[arg(long, allow_negative_numbers = true)]
    pub member_id: i64,

    #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
    pub distance_km: f64,

    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub travel_minutes: i64,

    #[arg(long)]
    pub late_minutes: Option<i64>,

    #[arg(long)]
    pub wait_minutes: Option<i64>,

    /// RFC 3339 timestamp; defaults to now
    #[arg(long, value_name = "TIME")]
    pub created_at: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TextArgs {
    #[arg(allow_negative_numbers = true)]
    pub plan_id: i64,

    /// Narrative mode: rules, prompt or llm
    #[arg(long, default_value = "rules")]
    pub mode: String,

    /// Free-text tone hint
    #[arg(long, default_value = "")]
    pub style: String,

    /// Free-text guidance, never echoed into the output
    #[arg(long, default_value = "")]
    pub notes: String,

    /// Seed for reproducible prompt-mode output
    #[arg(long, allow_negative_numbers = true)]
    pub seed: Option<i64>,

    /// JSON object mapping member ids to display names
    #[arg(long, value_name = "FILE")]
    pub names: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct GroupArgs {
    /// Plans to pool (comma- or space-separated)
    #[arg(required = true, num_args = 1.., value_delimiter = ',', allow_negative_numbers = true)]
    pub plan_ids: Vec<i64>,

    /// Also generate a narrative
    #[arg(long)]
    pub text: bool,

    /// Narrative mode: rules or llm
    #[arg(long, default_value = "llm")]
    pub mode: String,

    #[arg(long, default_value = "")]
    pub style: String,

    #[arg(long, default_value = "")]
    pub notes: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct GenerateArgs {
    /// User prompt
    #[arg(long)]
    pub prompt: String,

    /// System instruction
    #[arg(long, default_value = "Always answer in plain English.")]
    pub system: String,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Command::Group(ref group) = self.command {
            if group.plan_ids.is_empty() {
                return Err("At least one plan id is required".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
