//! Entry point for the Enclave segregation simulation.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `enclave-config.yaml` (defaults if absent)
//! 3. Validate configuration
//! 4. Connect the configured store backend and its completion channel
//! 5. Build the pipeline task queue
//! 6. Drive the scheduler to completion
//! 7. Log the run report and final populations

use std::path::Path;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use enclave_engine::config::{ConfigError, RunConfig, StorageBackend};
use enclave_engine::pipeline;
use enclave_engine::state::RunState;
use enclave_scheduler::{RunReport, Scheduler};
use enclave_store::{completion_channel, MemoryGateway, PgGateway, PostgresConfig};

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the store connection, or the run
/// itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("enclave-engine starting");

    let config = load_config()?;
    config.validate()?;
    info!(
        output_table = %config.run.output_table,
        radius = config.run.radius,
        groups = config.run.groups,
        tolerance = config.run.tolerance,
        iterations = config.run.iterations,
        seed = config.run.seed,
        backend = ?config.storage.backend,
        "Configuration loaded"
    );

    let (completion_tx, mut completions) = completion_channel();
    let mut state = RunState::new(config.clone());
    let mut scheduler = Scheduler::new();
    scheduler.enqueue_all(pipeline::build_pipeline(&config));

    let report: RunReport = match config.storage.backend {
        StorageBackend::Memory => {
            let cells =
                MemoryGateway::unit_grid(config.storage.grid_width, config.storage.grid_height);
            info!(cells = cells.len(), "memory backend with a synthetic grid");
            let mut gateway = MemoryGateway::new(completion_tx).with_source_cells(
                &config.source.table,
                &config.source.id_column,
                &config.source.geometry_column,
                &cells,
            );
            scheduler
                .run(&mut state, &mut gateway, &mut completions)
                .await?
        }
        StorageBackend::Postgres => {
            let pg_config = PostgresConfig::new(&config.storage.postgres_url)
                .with_max_connections(config.storage.max_connections);
            let mut gateway = PgGateway::connect(&pg_config, completion_tx)
                .await?
                .with_proximity_delay(Duration::from_millis(config.neighbors.dispatch_delay_ms));
            let report = scheduler
                .run(&mut state, &mut gateway, &mut completions)
                .await?;
            gateway.close().await;
            report
        }
    };

    if let Some(final_state) = state.history.last() {
        for (label, count) in final_state.population_counts() {
            info!(%label, count, "final population");
        }
    }
    info!(
        tasks_run = report.tasks_run,
        ops_completed = report.ops_completed,
        steps_recorded = state.history.len(),
        settled = state.settled,
        "enclave-engine shutdown complete"
    );

    Ok(())
}

/// Load the run configuration from `enclave-config.yaml`, falling back to
/// defaults when the file does not exist.
fn load_config() -> Result<RunConfig, ConfigError> {
    let config_path = Path::new("enclave-config.yaml");
    if config_path.exists() {
        RunConfig::from_file(config_path)
    } else {
        info!("Config file not found, using defaults");
        Ok(RunConfig::default())
    }
}
