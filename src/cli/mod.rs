//! CLI module for docschema
//!
//! Provides command-line access to:
//! - clean: clean a document or modifier against a named schema
//! - validate: validate a document or modifier, with rendered messages
//! - flatten: project a document into `key -> value` form

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{clean, execute, flatten, run_command, validate, CleanDefaults, Config};
pub use errors::{CliError, CliResult};
pub use io::{read_request, write_error, write_response};

use tracing_subscriber::EnvFilter;

/// Parses arguments, installs logging and runs the command. Errors are also
/// reported on stdout as a JSON error object.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let result = run_command(&cli.config, cli.command);
    if let Err(e) = &result {
        write_error(e.code_str(), e.message())?;
    }
    result
}

/// Logs to stderr so stdout stays JSON. `RUST_LOG` overrides `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
