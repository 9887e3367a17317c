//! Command-line entry point.
//!
//! ```text
//! toolbridge tools define cat --type generic_text --executable /bin/cat
//! toolbridge tools launch cat
//! toolbridge tools send cat "hello"
//! toolbridge tools terminate cat
//! ```

use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use toolbridge::cli::{self, Cli};

fn main() -> ExitCode {
    match cli::run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            writeln!(std::io::stderr(), "error: {err}").ok();
            ExitCode::FAILURE
        }
    }
}
