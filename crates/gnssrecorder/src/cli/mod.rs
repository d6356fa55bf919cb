//! Command-line interface for gnssrecorder.
//!
//! This module provides the CLI structure for the `gnssrec` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, InspectCommand, RecordCommand};

use crate::logging::Verbosity;

/// gnssrec - Record GNSS sessions into GeoPackage files
///
/// Replays location, raw measurement, satellite status and sensor events
/// through a recording session and summarizes finished recordings.
#[derive(Debug, Parser)]
#[command(name = "gnssrec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record a session from a stream of JSON events
    Record(RecordCommand),

    /// Summarize a finished recording
    Inspect(InspectCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
