//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Override the HTTP port
    #[arg(long, value_name = "PORT")]
    pub http_port: Option<u16>,

    /// Override the message receiver port
    #[arg(long, value_name = "PORT")]
    pub relay_port: Option<u16>,

    /// Override the directory static files are served from
    #[arg(long, value_name = "DIR")]
    pub site_root: Option<PathBuf>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print the default configuration file path
    Path,

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file (defaults to the standard location)
        file: Option<PathBuf>,
    },
}
