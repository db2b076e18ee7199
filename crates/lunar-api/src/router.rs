//! Axum router construction for the API.
//!
//! Assembles all routes into a single [`Router`] with CORS enabled for
//! cross-origin UI access and request tracing via [`TraceLayer`].

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /api/events` -- cached events within a day range
/// - `GET /api/phase` -- phase record for a date
/// - `GET /api/phase/next` -- next occurrence of a named phase
/// - `GET /api/moon-times` -- moonrise/moonset for a date and location
/// - `GET /api/status` -- cache and scheduler status
///
/// Unknown paths get a JSON 404.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/events", get(handlers::list_events))
        .route("/api/phase", get(handlers::get_phase))
        .route("/api/phase/next", get(handlers::next_phase))
        .route("/api/moon-times", get(handlers::get_moon_times))
        .route("/api/status", get(handlers::get_status))
        .fallback(handlers::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
