mod cli;

use std::process::ExitCode;

use sg_services::config::AppConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::from(cli::EXIT_FAILURE);
        }
    };

    init_tracing(config.production);
    info!(production = config.production, "safeguard starting");

    match cli::run(&config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("safeguard exited with error: {:#}", e);
            ExitCode::from(cli::EXIT_FAILURE)
        }
    }
}

/// `RUST_LOG` overrides the level. Production gets JSON at `info`, anything
/// else gets readable output at `debug`. Logs go to stderr; stdout carries
/// the response body.
fn init_tracing(production: bool) {
    let default_level = if production { "info" } else { "debug" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if production {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
