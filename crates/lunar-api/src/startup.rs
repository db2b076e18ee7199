//! Background startup for embedding the API in the engine binary.
//!
//! [`spawn_api`] binds the listener eagerly, so an address already in use
//! is reported to the caller instead of inside a detached task, then
//! serves on a background Tokio task.

use std::sync::Arc;

use lunar_core::config::ServerSettings;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::server::{ServerError, serve, socket_addr};
use crate::state::AppState;

/// Bind the API listener and serve it on a background task.
///
/// The caller should hold the returned handle and abort it on shutdown.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or cannot be
/// bound.
pub async fn spawn_api(
    config: &ServerSettings,
    state: Arc<AppState>,
) -> Result<JoinHandle<()>, ServerError> {
    let addr = socket_addr(config)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await {
            tracing::error!(error = %e, "lunar API exited with error");
        }
    });

    tracing::info!(%addr, "lunar API spawned on background task");
    Ok(handle)
}
