//! docschema CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. Prints the error to
//! stderr and exits non-zero on failure.

use docschema::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
