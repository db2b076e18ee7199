//! HTTP server lifecycle.
//!
//! [`start_server`] binds the configured address and serves the router
//! until the task is aborted or the listener fails.

use std::net::SocketAddr;
use std::sync::Arc;

use lunar_core::config::ServerSettings;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Parse `host:port` from settings.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the pair is not a socket address.
pub fn socket_addr(config: &ServerSettings) -> Result<SocketAddr, ServerError> {
    format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address {}:{}: {e}", config.host, config.port)))
}

/// Bind `config`'s address and serve until the task ends.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or in use, and
/// [`ServerError::Serve`] on a fatal I/O error while serving.
pub async fn start_server(config: &ServerSettings, state: Arc<AppState>) -> Result<(), ServerError> {
    let addr = socket_addr(config)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;
    serve(listener, state).await
}

/// Serve on an already-bound listener.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] on a fatal I/O error.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServerError> {
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("listener has no local address: {e}")))?;
    info!(%addr, "lunar API listening");

    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))
}
