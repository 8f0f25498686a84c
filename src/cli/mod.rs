//! Command-line interface for the `repovault` demo binary.
//!
//! This binary exercises [`RepositoryManager`](crate::manager::RepositoryManager)
//! end-to-end against the in-memory provider — it is a manual smoke-testing
//! surface, not a package manager's user-facing CLI (that remains an
//! external collaborator this crate does not build).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// repovault - repository caching and coordination layer.
#[derive(Parser, Debug)]
#[command(name = "repovault", author, version, about = "Repository caching and coordination demo")]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, env = "REPOVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Look up a repository by URL, fetching it if necessary.
    Lookup(LookupArgs),
    /// Remove a repository's clone and catalog entry.
    Remove(RemoveArgs),
    /// Wipe all manager state.
    Reset,
}

/// Arguments for `repovault lookup`.
#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Repository URL to look up.
    pub url: String,

    /// Refresh the clone even if already present.
    #[arg(long)]
    pub always_update: bool,
}

/// Arguments for `repovault remove`.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Repository URL to remove.
    pub url: String,
}
