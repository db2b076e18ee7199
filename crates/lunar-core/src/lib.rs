//! Event generation, cache refresh, and phase lookup for the lunar calendar.
//!
//! This crate owns the two data paths behind the service: a daily-refreshed
//! cache of new/full moon events derived from an illumination signal, and a
//! static date-indexed table of phase records and moon times.
//!
//! # Modules
//!
//! - [`cache`] -- Single-snapshot event cache with indivisible swap.
//! - [`clock`] -- [`Clock`] trait, [`SystemClock`], and a test [`FixedClock`].
//! - [`config`] -- Configuration loading from `lunar-config.yaml`.
//! - [`generator`] -- Per-day new/full moon classification.
//! - [`illumination`] -- [`IlluminationSource`] trait and implementations.
//! - [`phase_table`] -- Date-indexed phase records with nearest-date fallback.
//! - [`query`] -- Range-bounded reads against the cache.
//! - [`scheduler`] -- Startup generation and the daily refresh loop.
//!
//! [`Clock`]: clock::Clock
//! [`SystemClock`]: clock::SystemClock
//! [`FixedClock`]: clock::FixedClock
//! [`IlluminationSource`]: illumination::IlluminationSource

pub mod cache;
pub mod clock;
pub mod config;
pub mod generator;
pub mod illumination;
pub mod phase_table;
pub mod query;
pub mod scheduler;
