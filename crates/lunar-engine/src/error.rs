//! Error types for the engine binary.
//!
//! [`EngineError`] covers every startup failure. Once the service is up,
//! nothing is fatal: refresh failures are logged by the scheduler.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: lunar_core::config::ConfigError,
    },

    /// The phase table could not be loaded.
    #[error("phase table error: {source}")]
    PhaseTable {
        /// The underlying dataset error.
        #[from]
        source: lunar_core::phase_table::PhaseTableError,
    },

    /// The API server could not bind.
    #[error("API server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: lunar_api::ServerError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
