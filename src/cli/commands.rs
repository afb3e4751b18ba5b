//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: drive an objective until the oracle says it is done
//! - artifacts: list captured action output
//! - config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// actloop - let a remote assistant drive local commands toward an objective
#[derive(Parser, Debug)]
#[command(name = "actloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit an objective and execute proposed actions until done
    Run {
        /// Objective handed to the oracle as the first turn
        objective: String,

        #[command(flatten)]
        overrides: RunOverrides,
    },

    /// List captured artifacts, oldest first
    Artifacts {
        /// Directory to list (defaults to the configured artifact dir)
        #[arg(short, long)]
        artifact_dir: Option<PathBuf>,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Flags on `run` that override configuration values
#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    /// Directory where artifacts are written
    #[arg(short, long)]
    pub artifact_dir: Option<PathBuf>,

    /// Pause between run status polls
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Give up on a run that stays pending this long
    #[arg(long)]
    pub max_wait_ms: Option<u64>,

    /// Stop after executing this many actions
    #[arg(long)]
    pub max_actions: Option<u32>,

    /// Model used when creating the assistant
    #[arg(short, long)]
    pub model: Option<String>,
}
