//! Command-line interface for formrelay.
//!
//! This module provides the CLI structure for the `formrelay` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, ServeCommand};

/// formrelay - serve a static site and log its form submissions
///
/// Runs an HTTP server and a UDP message receiver side by side. Form bodies
/// posted to the server are relayed to the receiver and stored as JSON.
#[derive(Debug, Parser)]
#[command(name = "formrelay")]
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
    /// Run the HTTP server and message receiver until interrupted
    Serve(ServeCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

impl ServeCommand {
    /// Apply command-line overrides to a loaded configuration.
    pub fn apply(&self, config: &mut crate::Config) {
        if let Some(port) = self.http_port {
            config.http.port = port;
        }
        if let Some(port) = self.relay_port {
            config.relay.port = port;
        }
        if let Some(root) = &self.site_root {
            config.http.site_root.clone_from(root);
        }
    }
}
