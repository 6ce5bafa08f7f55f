//! Parcel service binary.
//!
//! ```text
//! parcel-server                      # HTTP API + periodic calculation
//! parcel-server calculate            # one calculation pass, then exit
//! parcel-server --config other.yaml  # explicit config file
//! ```
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `--config`, `PARCEL_CONFIG`, or `parcel-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `PostgreSQL` and bootstrap the schema
//! 4. Connect to the Redis rate cache
//! 5. Build the HTTP currency source
//! 6. Assemble the services
//! 7. Run the requested mode

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use parcel_api::AppState;
use parcel_core::config::AppConfig;
use parcel_core::{Backends, CalculationScheduler, HttpRateSource, Services, SystemClock};
use parcel_db::{
    PgCalculationLog, PgPackageRepository, PostgresConfig, PostgresPool, RedisTemporaryStorage,
};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

#[derive(Parser, Debug)]
#[command(name = "parcel-server", version, about = "Parcel delivery-cost service")]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Serve HTTP and run the scheduler (default).
    Serve,
    /// Run one calculation pass and exit.
    Calculate,
}

impl Cli {
    fn mode(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the selected mode fails.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mode = cli.mode();

    // 1. Load configuration.
    let config_path = cli.config.unwrap_or_else(AppConfig::path_from_env);
    let config = AppConfig::load_or_default(&config_path)?;

    // 2. Initialize structured logging. RUST_LOG wins over the config level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        ?mode,
        config = %config_path.display(),
        currency = config.rates.currency,
        source_url = config.rates.source_url,
        "parcel-server starting"
    );

    // 3. PostgreSQL.
    let pg_config = PostgresConfig::new(&config.infrastructure.postgres_url)
        .with_max_connections(config.infrastructure.max_connections);
    let postgres = PostgresPool::connect(&pg_config).await?;
    postgres.ensure_schema().await?;

    // 4. Redis rate cache.
    let cache = RedisTemporaryStorage::connect(&config.infrastructure.redis_url).await?;

    // 5. Currency source.
    let rate_source =
        HttpRateSource::new(&config.rates.source_url, config.rates.request_timeout())?;

    // 6. Assemble.
    let services = Services::assemble(
        Backends {
            repository: Arc::new(PgPackageRepository::new(postgres.pool().clone())),
            calculation_log: Arc::new(PgCalculationLog::new(postgres.pool().clone())),
            storage: Arc::new(cache.clone()),
            rate_source: Arc::new(rate_source),
            clock: Arc::new(SystemClock),
        },
        &config.rates.currency,
    );

    // 7. Run.
    let result = match mode {
        Command::Calculate => calculate_once(&services).await,
        Command::Serve => serve(&config, services).await,
    };

    if let Err(e) = cache.close().await {
        warn!(error = %e, "Failed to close Redis connection");
    }
    postgres.close().await;
    result
}

async fn calculate_once(services: &Services) -> Result<(), AppError> {
    let report = services.calculator.run().await?;
    info!(
        outcome = ?report.outcome,
        costed = report.packages_costed,
        rate = ?report.rate,
        date_code = %report.date_code,
        "One-shot calculation finished"
    );
    Ok(())
}

async fn serve(config: &AppConfig, services: Services) -> Result<(), AppError> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = if config.scheduler.enabled {
        let scheduler = CalculationScheduler::new(
            Arc::clone(&services.calculator),
            config.scheduler.interval(),
        );
        Some(tokio::spawn(scheduler.run(shutdown_rx)))
    } else {
        info!("Calculation scheduler disabled");
        None
    };

    let state = Arc::new(AppState::new(services));
    let shutdown = async move {
        wait_for_ctrl_c().await;
        if shutdown_tx.send(true).is_err() {
            info!("Scheduler already stopped");
        }
    };
    let served = parcel_api::start_server(&config.server, state, shutdown).await;

    if let Some(handle) = scheduler {
        match handle.await {
            Ok(runs) => info!(runs, "Scheduler joined"),
            Err(e) => warn!(error = %e, "Scheduler task panicked or was cancelled"),
        }
    }

    served?;
    Ok(())
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
    }
}
