//! CLI module
//!
//! - init: write a default configuration file
//! - serve: run the HTTP API and the revision worker

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{init, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
