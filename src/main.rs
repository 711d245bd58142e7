use anyhow::Context;
use clap::Parser;
use tracing::{debug, error};

use linkshortener::cli::Cli;
use linkshortener::config::{get_config, init_config};
use linkshortener::interfaces::cli::run_cli_command;
use linkshortener::system::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_config(&cli.config) {
        eprintln!("{}", e.format_colored());
        std::process::exit(1);
    }
    let config = get_config();

    let _guard = init_logging(&config.logging).context("Failed to initialize logging")?;
    debug!("Configuration loaded from {}", cli.config);

    if let Err(e) = run_cli_command(cli.command, &config).await {
        if e.is_fatal() {
            error!("Aborting on configuration error: {}", e);
        }
        eprintln!("{}", e.format_colored());
        std::process::exit(e.exit_code());
    }
    Ok(())
}
