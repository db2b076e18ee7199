//! Service binary for the lunar calendar.
//!
//! Wires the event cache, the daily refresh scheduler, the static phase
//! table, and the HTTP API together, then runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `lunar-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Load the phase table
//! 4. Build the generator, cache, and scheduler
//! 5. Generate the initial snapshot before accepting requests
//! 6. Start the daily refresh task
//! 7. Start the API server
//! 8. Wait for `Ctrl-C`, then stop the scheduler and the server

mod error;

use std::path::Path;
use std::sync::Arc;

use lunar_api::AppState;
use lunar_core::cache::EventCache;
use lunar_core::clock::{Clock, SystemClock};
use lunar_core::config::{LoggingConfig, LunarConfig};
use lunar_core::generator::EventGenerator;
use lunar_core::illumination::MeanLunation;
use lunar_core::phase_table::PhaseLookupTable;
use lunar_core::scheduler::{RefreshOutcome, RefreshScheduler, SchedulerSettings};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Configuration file looked up in the working directory.
const CONFIG_FILE: &str = "lunar-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the phase table, or the listener
/// cannot be set up.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("lunar-engine starting");
    if from_file {
        info!(path = CONFIG_FILE, "configuration loaded");
    } else {
        info!(path = CONFIG_FILE, "config file not found, using defaults");
    }

    // 3. Load the phase table.
    let phases = Arc::new(PhaseLookupTable::from_config(&config.phases)?);
    let coverage = phases.coverage();
    info!(
        entries = phases.len(),
        first = ?coverage.map(|(first, _)| first),
        last = ?coverage.map(|(_, last)| last),
        "phase table loaded"
    );

    // 4. Build generator, cache, and scheduler.
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let generator = Arc::new(EventGenerator::with_epsilon(
        Arc::new(MeanLunation::new()),
        config.generator.epsilon,
    ));
    let cache = Arc::new(EventCache::new(clock.now()));
    let settings = SchedulerSettings::from_config(&config.scheduler)?;
    let scheduler = Arc::new(RefreshScheduler::new(
        generator,
        cache,
        Arc::clone(&clock),
        settings,
    ));

    // 5. Initial snapshot.
    match scheduler.initialize().await {
        RefreshOutcome::Refreshed { events } => info!(events, "initial event cache ready"),
        outcome => warn!(?outcome, "initial event cache not built, serving empty cache"),
    }

    // 6. Daily refresh task.
    let refresh = scheduler.spawn();

    // 7. API server.
    let state = Arc::new(AppState::new(
        Arc::clone(&scheduler),
        phases,
        config.query.clone(),
        clock,
    ));
    let api = lunar_api::spawn_api(&config.server, state).await?;

    // 8. Run until interrupted.
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    refresh.shutdown().await;
    api.abort();
    info!("lunar-engine stopped");
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load `lunar-config.yaml`, or defaults plus env overrides when absent.
///
/// The flag reports whether the file was found.
fn load_config() -> Result<(LunarConfig, bool), EngineError> {
    let path = Path::new(CONFIG_FILE);
    if path.exists() {
        Ok((LunarConfig::from_file(path)?, true))
    } else {
        Ok((LunarConfig::parse("")?, false))
    }
}
