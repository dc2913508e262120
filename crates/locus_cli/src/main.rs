//! CLI entry point for locus.codes.

mod cli;
mod commands;
mod output;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let obs_config = locusgraph_observability::ObservabilityConfig::from_env()
        .with_console(true)
        .with_log_level(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));
    if let Err(e) = locusgraph_observability::init(obs_config) {
        eprintln!("warning: observability init failed: {e}");
    }

    let cli = Cli::parse();
    output::init(cli.output);

    if let Err(e) = commands::handle(cli).await {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}
