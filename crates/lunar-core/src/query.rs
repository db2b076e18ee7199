//! Range-bounded reads against the event cache.
//!
//! [`QueryService::get_events`] filters the current snapshot to events
//! strictly before `now + range_days`. It never triggers a refresh and
//! never validates `range_days`: clamping to `[0, 90]` with a default of
//! 30 is the boundary's job (see [`clamp_range`]).

use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use lunar_types::LunarEvent;

use crate::cache::EventCache;
use crate::clock::Clock;

/// Range applied when the caller does not name one.
pub const DEFAULT_RANGE_DAYS: u32 = 30;

/// Largest range the boundary accepts.
pub const MAX_RANGE_DAYS: u32 = 90;

/// Clamp a caller-supplied range into `[0, max]`, defaulting when absent.
pub fn clamp_range(requested: Option<i64>, default: u32, max: u32) -> u32 {
    requested.map_or(default.min(max), |days| {
        u32::try_from(days.clamp(0, i64::from(max))).unwrap_or(max)
    })
}

/// Read-only view over the event cache.
#[derive(Clone)]
pub struct QueryService {
    cache: Arc<EventCache>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl QueryService {
    /// Create a query service reading `cache` with `clock` as "now".
    pub fn new(cache: Arc<EventCache>, clock: Arc<dyn Clock>) -> Self {
        Self { cache, clock }
    }

    /// Events from the current snapshot within `range_days` of the clock's
    /// current instant.
    pub fn get_events(&self, range_days: u32) -> Vec<LunarEvent> {
        self.get_events_at(range_days, self.clock.now())
    }

    /// Events from the current snapshot with `exact_instant < now + range_days`.
    ///
    /// The result is a subsequence of the snapshot and keeps its ascending
    /// order.
    pub fn get_events_at(&self, range_days: u32, now: DateTime<Utc>) -> Vec<LunarEvent> {
        let snapshot = self.cache.current();
        let Some(limit) = now.checked_add_days(Days::new(u64::from(range_days))) else {
            return snapshot.events.clone();
        };

        snapshot
            .events
            .iter()
            .filter(|event| event.exact_instant() < limit)
            .cloned()
            .collect()
    }
}
