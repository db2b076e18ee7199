//! HTTP API for the lunar calendar service.
//!
//! This crate provides an Axum server exposing:
//!
//! - **Event feed** (`/api/events`) served from the refresh scheduler's
//!   cache, bounded by a clamped day range
//! - **Phase endpoints** (`/api/phase`, `/api/phase/next`,
//!   `/api/moon-times`) served from the static phase table
//! - **Status** (`/api/status`) and a minimal HTML page (`GET /`)
//!
//! All reads are lock-free or pointer-clone reads, so requests never
//! block on a running refresh.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use startup::spawn_api;
pub use state::AppState;
