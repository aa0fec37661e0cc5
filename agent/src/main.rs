//! ISL Client Entry Point

use clap::Parser;
use isl_client_agent::{
    cli::Cli,
    client::TelemetryClient,
    exit::{codes, exit_code_for},
    logging::{self, LogOptions},
    progress::ConsoleProgress,
    scheduler::{RunMode, Scheduler},
    settings,
    shutdown::ShutdownSignal,
};
use isl_client_common::error::AgentError;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mode = cli.mode();

    let base_dir = match settings::resolve_base_dir(cli.config_dir.as_deref()) {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::from(codes::CONFIG_ERROR);
        }
    };

    let log_options = LogOptions {
        base_dir: base_dir.clone(),
        console: mode == RunMode::OneShot,
        verbose: cli.verbose,
    };
    if let Err(err) = logging::init(&log_options) {
        eprintln!("{}", AgentError::Logging(err.to_string()));
        return ExitCode::from(codes::LOGGING_ERROR);
    }

    info!("ISL Client v{}", env!("CARGO_PKG_VERSION"));

    let settings = match settings::load(&base_dir) {
        Ok(settings) => settings,
        Err(err) => {
            error!("{}", err);
            return ExitCode::from(codes::CONFIG_ERROR);
        }
    };

    let client = match TelemetryClient::from_config(&settings.config) {
        Ok(client) => client,
        Err(err) => {
            error!("{}", err);
            return ExitCode::from(codes::CONFIG_ERROR);
        }
    };

    let shutdown = ShutdownSignal::install();
    let scheduler = Scheduler::new(
        settings.measurement_command(),
        settings.config.speedtest.effective_interval(),
        client,
        shutdown,
    );

    match mode {
        RunMode::Daemon => {
            scheduler.run_daemon().await;
            ExitCode::from(codes::SUCCESS)
        }
        RunMode::OneShot => {
            let outcome = scheduler
                .with_progress(Arc::new(ConsoleProgress::default()))
                .run_once()
                .await;
            ExitCode::from(exit_code_for(outcome))
        }
    }
}
