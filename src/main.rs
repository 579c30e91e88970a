use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use symptrack::api::start_api_server;
use symptrack::config::{self, AppConfig, CliArgs};
use symptrack::core_state::CoreState;

#[tokio::main]
async fn main() -> ExitCode {
    let config = AppConfig::from(CliArgs::parse());

    if let Err(e) = init_logging(&config.log_filter) {
        eprintln!("Invalid log filter {:?}: {e}", config.log_filter);
        return ExitCode::FAILURE;
    }

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let bind = config.bind;
    let core = match CoreState::open(config) {
        Ok(core) => Arc::new(core),
        Err(e) => {
            tracing::error!("Failed to open data directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    let server = match start_api_server(core, bind).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    server.stop().await;
    ExitCode::SUCCESS
}

/// RUST_LOG wins over the configured filter.
fn init_logging(filter: &str) -> Result<(), tracing_subscriber::filter::ParseError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
