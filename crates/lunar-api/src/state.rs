//! Shared application state for the API server.
//!
//! Every handler reads through [`AppState`]: events come from the
//! scheduler's cache via [`QueryService`], phase data from the immutable
//! [`PhaseLookupTable`]. Neither read path takes a lock that generation
//! holds, so requests never wait on a refresh.

use std::sync::Arc;

use chrono::NaiveDate;
use lunar_core::clock::Clock;
use lunar_core::config::QueryConfig;
use lunar_core::phase_table::PhaseLookupTable;
use lunar_core::query::QueryService;
use lunar_core::scheduler::RefreshScheduler;

/// Shared state for the Axum application, injected as `State<Arc<AppState>>`.
#[derive(Clone)]
pub struct AppState {
    /// Range-bounded event reads.
    pub query: QueryService,
    /// Static phase records and moon times.
    pub phases: Arc<PhaseLookupTable>,
    /// The refresh scheduler, for status reporting.
    pub scheduler: Arc<RefreshScheduler>,
    /// Range defaults and clamp.
    pub query_config: QueryConfig,
    /// Clock used to default missing dates to "today".
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("phases", &self.phases.len())
            .field("query_config", &self.query_config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Assemble state around a scheduler's cache.
    pub fn new(
        scheduler: Arc<RefreshScheduler>,
        phases: Arc<PhaseLookupTable>,
        query_config: QueryConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let query = QueryService::new(Arc::clone(scheduler.cache()), Arc::clone(&clock));
        Self {
            query,
            phases,
            scheduler,
            query_config,
            clock,
        }
    }

    /// Today's UTC date according to the state's clock.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}
