//! CLI argument definitions using clap
//!
//! Commands:
//! - docschema clean --schema <name> [--modifier] [--upsert] ...
//! - docschema validate --schema <name> [--modifier] [--upsert] [--key <k>]
//! - docschema flatten [--keep-arrays]

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// docschema - clean and validate JSON documents and update modifiers
#[derive(Parser, Debug)]
#[command(name = "docschema")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./docschema.json")]
    pub config: PathBuf,

    /// Log more (-v info, -vv debug, -vvv trace); logs go to stderr
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clean the document or modifier read from stdin
    Clean {
        /// Schema name (file <schema_dir>/<name>.json)
        #[arg(long)]
        schema: String,

        /// Input is an update modifier
        #[arg(long)]
        modifier: bool,

        /// Input is an upsert modifier
        #[arg(long)]
        upsert: bool,

        /// Keep keys the schema does not define
        #[arg(long)]
        no_filter: bool,

        /// Do not coerce values toward their declared type
        #[arg(long)]
        no_auto_convert: bool,

        /// Keep empty strings
        #[arg(long)]
        keep_empty_strings: bool,

        /// Do not fill in auto and default values
        #[arg(long)]
        no_auto_values: bool,
    },

    /// Validate the document or modifier read from stdin
    Validate {
        /// Schema name (file <schema_dir>/<name>.json)
        #[arg(long)]
        schema: String,

        /// Input is an update modifier
        #[arg(long)]
        modifier: bool,

        /// Input is an upsert modifier
        #[arg(long)]
        upsert: bool,

        /// Only report errors for this key
        #[arg(long)]
        key: Option<String>,
    },

    /// Print the flat `key -> value` form of the value read from stdin
    Flatten {
        /// Keep arrays whole instead of one entry per element
        #[arg(long)]
        keep_arrays: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
