//! tickerwatch entry point
//!
//! Parses arguments, dispatches to the CLI module and exits non-zero on
//! failure. Everything else lives in the library.

use tickerwatch::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
