//! CLI argument definitions using clap
//!
//! Commands:
//! - tickerwatch init --config <path>
//! - tickerwatch serve --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tickerwatch - reason attribution and report revision engine
#[derive(Parser, Debug)]
#[command(name = "tickerwatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default configuration file
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./tickerwatch.json")]
        config: PathBuf,

        /// Store file to record in the new configuration
        #[arg(long)]
        data_path: Option<PathBuf>,
    },

    /// Start the HTTP API and the revision worker
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./tickerwatch.json")]
        config: PathBuf,

        /// Override the configured HTTP port
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
