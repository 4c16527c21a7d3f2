//! props - serve, diff and query property files.

use std::{error::Error, process};

use clap::Parser;
use props::{
    cli::{self, Cli, formatting::format_error},
    settings::Settings,
    tracing_config,
};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let settings = Settings::discover(cli.config.as_deref())?;
    let log_guard = tracing_config::init(&settings.logging)?;
    debug!(?settings, "settings loaded");

    match cli::run(cli, &settings).await {
        Ok(output) => {
            if !output.trim().is_empty() {
                println!("{output}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format_error(&e.to_string()));
            drop(log_guard);
            process::exit(1);
        }
    }
}
