//! Command line for loading and printing configuration.
//!
//! `dump` loads a single file; `merge` loads several as layers, later files
//! overriding earlier ones. Both print the resulting node as JSON or YAML,
//! optionally keeping only upper-case keys.

use crate::config::Config;
use crate::error::Result;
use crate::node::ConfigNode;
use crate::validate::{KeyFilter, allow_all, allow_upper};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for rendered configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// JSON object (default)
    #[default]
    Json,
    /// YAML mapping
    Yaml,
}

/// Load, merge and print configuration files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load one file and print it
    Dump(DumpArgs),

    /// Load several files as layers (later files win) and print the result
    Merge(MergeArgs),
}

/// Options shared by every subcommand that prints a node.
#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Indent JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Keep only upper-case keys (DEBUG, DB_PORT), at every level
    #[arg(long)]
    pub upper_only: bool,
}

impl RenderArgs {
    pub fn key_filter(&self) -> KeyFilter {
        if self.upper_only {
            allow_upper()
        } else {
            allow_all()
        }
    }
}

/// Arguments for the dump subcommand
#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Configuration file (.json, .yaml/.yml, anything else is a settings script)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[command(flatten)]
    pub render: RenderArgs,
}

/// Arguments for the merge subcommand
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Configuration files, lowest precedence first
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub render: RenderArgs,
}

/// Render `node` as text in the requested format.
pub fn render(node: &ConfigNode, args: &RenderArgs) -> Result<String> {
    match (args.format, args.pretty) {
        (OutputFormat::Json, false) => Config::to_json(node),
        (OutputFormat::Json, true) => Config::to_json_pretty(node),
        (OutputFormat::Yaml, _) => Config::to_yaml(node),
    }
}
