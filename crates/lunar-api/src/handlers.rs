//! REST endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/events` | Cached new/full moon events within `range` days |
//! | `GET` | `/api/phase` | Phase record for a date, nearest-date fallback |
//! | `GET` | `/api/phase/next` | Next table date with a named phase |
//! | `GET` | `/api/moon-times` | Moonrise/moonset for a date and location |
//! | `GET` | `/api/status` | Cache, phase table, and scheduler status |
//!
//! Query parameters are taken as strings and parsed here so that a
//! malformed value yields the JSON error body rather than a plain-text
//! extractor rejection.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::Uri;
use axum::response::{Html, IntoResponse};
use chrono::{DateTime, NaiveDate, Utc};
use lunar_core::phase_table::{DEFAULT_LOCATION, DEFAULT_SCAN_DAYS};
use lunar_core::query::clamp_range;
use lunar_core::scheduler::SchedulerStatus;
use lunar_types::{LunarEvent, MoonTimes, NextPhase, PhaseName, ResolvedPhase};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/events`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct EventsQuery {
    /// Days ahead to include; clamped to `[0, max_range_days]`.
    pub range: Option<String>,
}

/// Query parameters for `GET /api/phase`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct PhaseQuery {
    /// `YYYY-MM-DD`; defaults to today (UTC).
    pub date: Option<String>,
}

/// Query parameters for `GET /api/phase/next`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct NextPhaseQuery {
    /// Phase display name (`Полнолуние`) or alias (`full_moon`).
    pub name: Option<String>,
    /// Search origin, `YYYY-MM-DD`; defaults to today (UTC).
    pub from: Option<String>,
    /// Intended look-ahead in days.
    pub max_days: Option<String>,
}

/// Query parameters for `GET /api/moon-times`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct MoonTimesQuery {
    /// `YYYY-MM-DD`; defaults to today (UTC).
    pub date: Option<String>,
    /// Location id; defaults to `default`.
    pub location: Option<String>,
}

// ---------------------------------------------------------------------------
// Response structs
// ---------------------------------------------------------------------------

/// Response body for `GET /api/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// When the live snapshot was generated.
    pub generated_at: DateTime<Utc>,
    /// First day of the live snapshot's horizon.
    pub anchor_date: NaiveDate,
    /// Days covered by the live snapshot.
    pub horizon_days: u32,
    /// Number of events in the live snapshot.
    pub event_count: usize,
    /// Phase table summary.
    pub phase_table: PhaseTableStatus,
    /// Refresh scheduler counters.
    pub scheduler: SchedulerStatus,
}

/// Phase table part of [`StatusResponse`].
#[derive(Debug, Serialize)]
pub struct PhaseTableStatus {
    /// Number of dated records.
    pub entries: usize,
    /// Earliest dated record.
    pub first_date: Option<NaiveDate>,
    /// Latest dated record.
    pub last_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_date(raw: Option<&str>, param: &str, today: NaiveDate) -> Result<NaiveDate, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(today),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
            ApiError::InvalidQuery(format!("{param}={value:?} is not a YYYY-MM-DD date: {e}"))
        }),
    }
}

fn parse_int(raw: Option<&str>, param: &str) -> Result<Option<i64>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<i64>().map(Some).map_err(|e| {
            ApiError::InvalidQuery(format!("{param}={value:?} is not an integer: {e}"))
        }),
    }
}

// ---------------------------------------------------------------------------
// GET /api/events
// ---------------------------------------------------------------------------

/// List cached events that fall within `range` days of now.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<Vec<LunarEvent>>, ApiError> {
    let requested = parse_int(params.range.as_deref(), "range")?;
    let range = clamp_range(
        requested,
        state.query_config.default_range_days,
        state.query_config.max_range_days,
    );
    Ok(Json(state.query.get_events(range)))
}

// ---------------------------------------------------------------------------
// GET /api/phase
// ---------------------------------------------------------------------------

/// Resolve a date to its phase record; `lunarDay` is always filled in.
pub async fn get_phase(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PhaseQuery>,
) -> Result<Json<ResolvedPhase>, ApiError> {
    let date = parse_date(params.date.as_deref(), "date", state.today())?;
    let mut phase = state.phases.lookup(date);
    phase.record.lunar_day = Some(state.phases.lunar_day(date));
    Ok(Json(phase))
}

// ---------------------------------------------------------------------------
// GET /api/phase/next
// ---------------------------------------------------------------------------

/// Find the next table date carrying the named phase.
pub async fn next_phase(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NextPhaseQuery>,
) -> Result<Json<NextPhase>, ApiError> {
    let name = params
        .name
        .as_deref()
        .ok_or_else(|| ApiError::InvalidQuery(String::from("name is required")))?;
    let target: PhaseName = name.parse()?;
    let from = parse_date(params.from.as_deref(), "from", state.today())?;
    let max_days = parse_int(params.max_days.as_deref(), "max_days")?
        .map_or(DEFAULT_SCAN_DAYS, |days| {
            u32::try_from(days.max(0)).unwrap_or(u32::MAX)
        });

    Ok(Json(state.phases.find_next_phase(target, from, max_days)))
}

// ---------------------------------------------------------------------------
// GET /api/moon-times
// ---------------------------------------------------------------------------

/// Moonrise and moonset for a date and location, with fallbacks.
pub async fn get_moon_times(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MoonTimesQuery>,
) -> Result<Json<MoonTimes>, ApiError> {
    let date = parse_date(params.date.as_deref(), "date", state.today())?;
    let location = params
        .location
        .as_deref()
        .map(str::trim)
        .filter(|loc| !loc.is_empty())
        .unwrap_or(DEFAULT_LOCATION);
    Ok(Json(state.phases.moon_times(date, location)))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Cache, phase table, and scheduler status.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let snapshot = state.scheduler.cache().current();
    let coverage = state.phases.coverage();

    Json(StatusResponse {
        generated_at: snapshot.generated_at,
        anchor_date: snapshot.anchor_date,
        horizon_days: snapshot.horizon_days,
        event_count: snapshot.len(),
        phase_table: PhaseTableStatus {
            entries: state.phases.len(),
            first_date: coverage.map(|(first, _)| first),
            last_date: coverage.map(|(_, last)| last),
        },
        scheduler: state.scheduler.status(),
    })
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// JSON 404 for unknown paths.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page with today's phase, upcoming events, and
/// API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let today = state.today();
    let phase = state.phases.lookup(today);
    let lunar_day = state.phases.lunar_day(today);
    let moon = state.phases.moon_times(today, DEFAULT_LOCATION);
    let snapshot = state.scheduler.cache().current();
    let generated_at = snapshot.generated_at.format("%Y-%m-%d %H:%M UTC");

    let upcoming: String = state
        .query
        .get_events(state.query_config.default_range_days)
        .iter()
        .map(|event| format!("        <li>{} {}</li>\n", event.date(), event.title()))
        .collect();
    let upcoming = if upcoming.is_empty() {
        String::from("        <li>нет событий</li>\n")
    } else {
        upcoming
    };

    let emoji = &phase.record.emoji;
    let name = phase.record.phase_name;
    let illumination = phase.record.illumination_percent;

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="ru">
<head>
    <meta charset="utf-8">
    <title>Lunar Calendar</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; }}
        .phase {{ font-size: 3rem; }}
        .muted {{ color: #8b949e; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
    </style>
</head>
<body>
    <h1>Lunar Calendar</h1>
    <p class="phase">{emoji}</p>
    <p>{today}: {name}, {illumination}%, лунный день {lunar_day}</p>
    <p class="muted">Восход {moonrise}, заход {moonset}</p>

    <h2>Ближайшие события</h2>
    <ul>
{upcoming}    </ul>
    <p class="muted">Кэш обновлён {generated_at}</p>

    <h2>API</h2>
    <ul>
        <li><a href="/api/events">/api/events</a></li>
        <li><a href="/api/phase">/api/phase</a></li>
        <li><a href="/api/phase/next?name=full_moon">/api/phase/next</a></li>
        <li><a href="/api/moon-times">/api/moon-times</a></li>
        <li><a href="/api/status">/api/status</a></li>
    </ul>
</body>
</html>"#,
        moonrise = moon.moonrise,
        moonset = moon.moonset,
    ))
}
