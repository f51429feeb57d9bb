//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::RepoId;

/// autodev - repository automation scheduler
#[derive(Parser)]
#[command(
    name = "autodev",
    about = "Priority task scheduler for repository automation",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/autodev/logs/autodev.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the automation service in the foreground until Ctrl-C
    Run {
        /// Override the observer socket path
        #[arg(long)]
        socket: Option<PathBuf>,
    },

    /// Stream live hub messages from a running service
    Watch {
        /// Only show messages for this repository
        #[arg(short, long)]
        repo: Option<RepoId>,

        /// Observer socket to connect to
        #[arg(long)]
        socket: Option<PathBuf>,
    },

    /// Show recent entries from the activity log
    Activity {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        lines: usize,
    },

    /// Print the effective configuration as YAML
    Config,
}
