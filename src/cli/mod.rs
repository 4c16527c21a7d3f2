//! Command-line interface for inspecting and watching property files.

mod commands;
pub mod formatting;

#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{diff, get, watch};

use crate::{core::Result, settings::Settings, sources::SourceFormat};

/// Top-level arguments of the `props` binary.
#[derive(Debug, Parser)]
#[command(name = "props")]
#[command(about = "Serve property files through a lock-free snapshot store")]
pub struct Cli {
    /// Settings file. Defaults to `$XDG_CONFIG_HOME/props/settings.toml`.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Format of the property files.
    #[arg(short, long, global = true, default_value = "auto", value_parser = parse_format)]
    pub format: SourceFormat,

    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands of the `props` binary.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve files and print every change until Ctrl+C.
    Watch {
        /// Files layered over the configured `[[sources]]`, later ones winning
        files: Vec<PathBuf>,
        /// Only print keys matching this pattern
        #[arg(short, long, default_value = "*")]
        pattern: String,
    },
    /// Print the changes that turn one file into another.
    Diff {
        /// Current file
        old: PathBuf,
        /// Replacement file
        new: PathBuf,
    },
    /// Print the value of one key.
    Get {
        /// Key to look up
        key: String,
        /// Files layered over the configured `[[sources]]`, later ones winning
        files: Vec<PathBuf>,
    },
}

/// Runs the parsed command and returns its output.
///
/// # Errors
/// Returns the error of the command that failed.
pub async fn run(cli: Cli, settings: &Settings) -> Result<String> {
    match cli.command {
        Commands::Watch { files, pattern } => {
            watch(&files, &pattern, cli.format, settings).await?;
            Ok(String::new())
        }
        Commands::Diff { old, new } => diff(&old, &new, cli.format),
        Commands::Get { key, files } => get(&key, &files, cli.format, settings),
    }
}

fn parse_format(name: &str) -> std::result::Result<SourceFormat, String> {
    match name.to_ascii_lowercase().as_str() {
        "auto" => Ok(SourceFormat::Auto),
        "properties" => Ok(SourceFormat::Properties),
        "toml" => Ok(SourceFormat::Toml),
        _ => Err(format!(
            "unknown format '{name}', expected auto, properties or toml"
        )),
    }
}
