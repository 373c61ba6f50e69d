//! os-config CLI
//!
//! Loads configuration files (JSON, YAML or settings scripts), merges them
//! as layers and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use os_config::cli::{Cli, Command, render};
use os_config::{load_file, load_layers};
use std::fs::OpenOptions;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option; RUST_LOG overrides -v
    let default_directive = if cli.verbose { "os_config=debug" } else { "warn" };
    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter())
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)
                .with_context(|| format!("opening log file {filename}"))?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter())
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    let output = match cli.command {
        Command::Dump(args) => {
            let node = load_file(&args.file, args.render.key_filter())
                .with_context(|| format!("loading {}", args.file.display()))?;
            render(&node, &args.render)?
        }
        Command::Merge(args) => {
            debug!(layers = args.files.len(), "merging configuration files");
            let node = load_layers(&args.files, args.render.key_filter())?;
            render(&node, &args.render)?
        }
    };

    println!("{}", output.trim_end());
    Ok(())
}
