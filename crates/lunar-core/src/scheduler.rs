//! Daily refresh of the event cache.
//!
//! [`RefreshScheduler`] owns the write side of the [`EventCache`]. It runs
//! one generation at startup ([`initialize`](RefreshScheduler::initialize))
//! and then once per day at a fixed UTC wall-clock time from a background
//! task started with [`spawn`](RefreshScheduler::spawn).
//!
//! # Rules
//!
//! - At most one generation run is in flight. A firing that arrives while
//!   a run is still going is dropped, not queued.
//! - Generation runs on the blocking pool under a timeout. A timeout is
//!   treated exactly like a generation error.
//! - On any failure the previous snapshot stays installed. The failure is
//!   logged and the next attempt is the next daily firing.
//! - The background task stops when [`SchedulerHandle::shutdown`] is called.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, Utc};
use lunar_types::EventSnapshot;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::EventCache;
use crate::clock::Clock;
use crate::config::{ConfigError, SchedulerConfig};
use crate::generator::{EventGenerator, GenerationError};

/// Timing parameters of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// UTC time of day of the daily firing.
    pub refresh_at: NaiveTime,
    /// Days covered by each generation run.
    pub horizon_days: u32,
    /// Upper bound on one generation run.
    pub generation_timeout: Duration,
}

impl SchedulerSettings {
    /// Build settings from the `scheduler` config section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `refresh_at_utc` is not `HH:MM`.
    pub fn from_config(config: &SchedulerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            refresh_at: config.refresh_time()?,
            horizon_days: config.cache_horizon_days,
            generation_timeout: Duration::from_millis(config.generation_timeout_ms),
        })
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            refresh_at: NaiveTime::from_hms_opt(3, 5, 0).unwrap_or(NaiveTime::MIN),
            horizon_days: 60,
            generation_timeout: Duration::from_secs(5),
        }
    }
}

/// Why a refresh did not install a new snapshot.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RefreshFailure {
    /// The generator returned an error.
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// The generator did not finish in time.
    #[error("generation timed out after {timeout_ms}ms")]
    Timeout {
        /// The configured bound.
        timeout_ms: u128,
    },

    /// The blocking worker panicked or was cancelled.
    #[error("generation worker failed: {message}")]
    Worker {
        /// Description from the join error.
        message: String,
    },
}

/// Result of one refresh attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// A new snapshot with this many events was installed.
    Refreshed {
        /// Number of events in the new snapshot.
        events: usize,
    },
    /// Another run was in flight; this firing was dropped.
    Skipped,
    /// The run failed; the previous snapshot is still installed.
    Failed(RefreshFailure),
}

/// Counters and timestamps reported by the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshLog {
    /// Runs that installed a snapshot.
    pub succeeded: u64,
    /// Runs that failed or timed out.
    pub failed: u64,
    /// Firings dropped because a run was in flight.
    pub skipped: u64,
    /// When the last successful run finished.
    pub last_success_at: Option<DateTime<Utc>>,
    /// When the last failed run finished.
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Message of the last failure.
    pub last_error: Option<String>,
}

/// Point-in-time view of the scheduler for the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    /// Daily firing time, `HH:MM` UTC.
    pub refresh_at_utc: String,
    /// Days covered by each run.
    pub horizon_days: u32,
    /// Next daily firing after the clock's current instant.
    pub next_refresh_at: DateTime<Utc>,
    /// Whether a run is in flight right now.
    pub in_flight: bool,
    /// Counters.
    #[serde(flatten)]
    pub log: RefreshLog,
}

/// Marks a generation run as in flight until dropped.
struct InFlight {
    flag: Arc<AtomicBool>,
}

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Owner of the cache write path.
pub struct RefreshScheduler {
    generator: Arc<EventGenerator>,
    cache: Arc<EventCache>,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
    in_flight: Arc<AtomicBool>,
    stop_requested: AtomicBool,
    stop_notify: Notify,
    log: Mutex<RefreshLog>,
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("settings", &self.settings)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl RefreshScheduler {
    /// Create a scheduler writing to `cache`.
    pub fn new(
        generator: Arc<EventGenerator>,
        cache: Arc<EventCache>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            generator,
            cache,
            clock,
            settings,
            in_flight: Arc::new(AtomicBool::new(false)),
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
            log: Mutex::new(RefreshLog::default()),
        }
    }

    /// The cache this scheduler writes to.
    pub fn cache(&self) -> &Arc<EventCache> {
        &self.cache
    }

    /// The timing parameters in use.
    pub const fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Run the first generation before the service starts answering.
    ///
    /// On failure the empty snapshot installed at construction stays in
    /// place and the next daily firing tries again.
    pub async fn initialize(&self) -> RefreshOutcome {
        info!(
            horizon_days = self.settings.horizon_days,
            "building initial event cache"
        );
        self.refresh_now().await
    }

    /// Regenerate the snapshot anchored at the clock's current day.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        let Some(guard) = InFlight::acquire(&self.in_flight) else {
            warn!("event cache refresh already in flight, dropping this firing");
            self.with_log(|log| log.skipped = log.skipped.saturating_add(1));
            return RefreshOutcome::Skipped;
        };

        let today = self.clock.today();
        let horizon_days = self.settings.horizon_days;
        let generator = Arc::clone(&self.generator);
        debug!(%today, horizon_days, "event cache refresh started");

        // The guard moves into the worker so a run that outlives the
        // timeout still blocks the next firing until it really ends.
        let worker = tokio::task::spawn_blocking(move || {
            let _in_flight = guard;
            generator.generate(today, horizon_days)
        });

        let outcome = match tokio::time::timeout(self.settings.generation_timeout, worker).await
        {
            Ok(Ok(Ok(events))) => {
                let count = events.len();
                let snapshot = EventSnapshot {
                    events,
                    generated_at: self.clock.now(),
                    anchor_date: today,
                    horizon_days,
                };
                let previous = self.cache.swap(snapshot);
                info!(
                    %today,
                    events = count,
                    previous_events = previous.len(),
                    "event cache refreshed"
                );
                RefreshOutcome::Refreshed { events: count }
            }
            Ok(Ok(Err(e))) => RefreshOutcome::Failed(RefreshFailure::Generation(e)),
            Ok(Err(join_err)) => RefreshOutcome::Failed(RefreshFailure::Worker {
                message: join_err.to_string(),
            }),
            Err(_elapsed) => RefreshOutcome::Failed(RefreshFailure::Timeout {
                timeout_ms: self.settings.generation_timeout.as_millis(),
            }),
        };

        let finished_at = self.clock.now();
        match &outcome {
            RefreshOutcome::Refreshed { .. } => self.with_log(|log| {
                log.succeeded = log.succeeded.saturating_add(1);
                log.last_success_at = Some(finished_at);
            }),
            RefreshOutcome::Failed(failure) => {
                error!(
                    error = %failure,
                    %today,
                    "event cache refresh failed, keeping previous snapshot"
                );
                self.with_log(|log| {
                    log.failed = log.failed.saturating_add(1);
                    log.last_failure_at = Some(finished_at);
                    log.last_error = Some(failure.to_string());
                });
            }
            RefreshOutcome::Skipped => {}
        }

        outcome
    }

    /// Start the daily firing task.
    pub fn spawn(self: &Arc<Self>) -> SchedulerHandle {
        let scheduler = Arc::clone(self);
        let task = tokio::spawn(Arc::clone(self).run());
        info!(
            refresh_at = %self.settings.refresh_at.format("%H:%M"),
            "event cache refresh scheduler started"
        );
        SchedulerHandle { scheduler, task }
    }

    /// Ask the firing task to stop at its next wake-up.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_one();
    }

    /// Current counters and the next firing time.
    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            refresh_at_utc: self.settings.refresh_at.format("%H:%M").to_string(),
            horizon_days: self.settings.horizon_days,
            next_refresh_at: next_firing(self.clock.now(), self.settings.refresh_at),
            in_flight: self.in_flight.load(Ordering::Acquire),
            log: self.log.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }

    async fn run(self: Arc<Self>) {
        let mut last_target: Option<DateTime<Utc>> = None;

        while !self.stop_requested.load(Ordering::Acquire) {
            let now = self.clock.now();
            // Never fire twice for the same target if the wall clock lags
            // the timer.
            let from = last_target.map_or(now, |target| now.max(target));
            let target = next_firing(from, self.settings.refresh_at);
            let wait = target.signed_duration_since(now).to_std().unwrap_or(Duration::ZERO);
            debug!(%target, wait_secs = wait.as_secs(), "next event cache refresh scheduled");

            tokio::select! {
                () = tokio::time::sleep(wait) => {
                    last_target = Some(target);
                    let _outcome = self.refresh_now().await;
                }
                () = self.stop_notify.notified() => {}
            }
        }

        info!("event cache refresh scheduler stopped");
    }

    fn with_log(&self, update: impl FnOnce(&mut RefreshLog)) {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut log);
    }
}

/// Handle to the running firing task.
#[derive(Debug)]
pub struct SchedulerHandle {
    scheduler: Arc<RefreshScheduler>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// The scheduler driven by this task.
    pub const fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.scheduler
    }

    /// Whether the firing task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the firing task and wait for it to exit.
    ///
    /// Generation runs are short, so there is nothing to abort: a run
    /// already in progress finishes and installs its snapshot.
    pub async fn shutdown(self) {
        self.scheduler.request_stop();
        if let Err(e) = self.task.await {
            warn!(error = %e, "event cache refresh task ended abnormally");
        }
    }
}

/// The first instant strictly after `now` whose UTC time of day is `at`.
pub fn next_firing(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        return today;
    }
    today
        .checked_add_days(Days::new(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::{NaiveDate, TimeZone};

    use super::*;
    use crate::clock::FixedClock;
    use crate::illumination::{
        IlluminationError, IlluminationSource, MeanLunation, TabulatedIllumination,
    };

    /// Source that blocks the worker thread before answering.
    struct SlowSource {
        delay: Duration,
    }

    impl IlluminationSource for SlowSource {
        fn phase_fraction(&self, _date: NaiveDate) -> Result<f64, IlluminationError> {
            std::thread::sleep(self.delay);
            Ok(0.5)
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn scheduler_with(
        source: Arc<dyn IlluminationSource>,
        clock: Arc<FixedClock>,
        settings: SchedulerSettings,
    ) -> Arc<RefreshScheduler> {
        let cache = Arc::new(EventCache::new(clock.now()));
        Arc::new(RefreshScheduler::new(
            Arc::new(EventGenerator::new(source)),
            cache,
            clock,
            settings,
        ))
    }

    fn fixed(now: DateTime<Utc>) -> Arc<FixedClock> {
        Arc::new(FixedClock::new(now))
    }

    #[test]
    fn next_firing_later_today() {
        let now = at(2025, 8, 25, 1, 0);
        let t = NaiveTime::from_hms_opt(3, 5, 0).unwrap();
        assert_eq!(next_firing(now, t), at(2025, 8, 25, 3, 5));
    }

    #[test]
    fn next_firing_rolls_to_tomorrow() {
        let t = NaiveTime::from_hms_opt(3, 5, 0).unwrap();
        assert_eq!(next_firing(at(2025, 8, 25, 3, 5), t), at(2025, 8, 26, 3, 5));
        assert_eq!(next_firing(at(2025, 8, 25, 22, 0), t), at(2025, 8, 26, 3, 5));
        assert_eq!(next_firing(at(2025, 12, 31, 4, 0), t), at(2026, 1, 1, 3, 5));
    }

    #[test]
    fn settings_from_config() {
        let settings = SchedulerSettings::from_config(&SchedulerConfig::default()).unwrap();
        assert_eq!(settings, SchedulerSettings::default());
    }

    #[tokio::test]
    async fn initialize_installs_first_snapshot() {
        let clock = fixed(at(2025, 8, 25, 0, 0));
        let sched = scheduler_with(
            Arc::new(MeanLunation::new()),
            Arc::clone(&clock),
            SchedulerSettings::default(),
        );

        let outcome = sched.initialize().await;
        assert!(matches!(outcome, RefreshOutcome::Refreshed { events } if events > 0));

        let snap = sched.cache().current();
        assert_eq!(snap.horizon_days, 60);
        assert_eq!(snap.anchor_date, NaiveDate::from_ymd_opt(2025, 8, 25).unwrap());
        assert!(!snap.is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let clock = fixed(at(2025, 8, 25, 0, 0));
        let good_cache = Arc::new(EventCache::new(clock.now()));
        let good = RefreshScheduler::new(
            Arc::new(EventGenerator::new(Arc::new(MeanLunation::new()))),
            Arc::clone(&good_cache),
            Arc::clone(&clock) as Arc<dyn Clock>,
            SchedulerSettings::default(),
        );
        assert!(matches!(good.refresh_now().await, RefreshOutcome::Refreshed { .. }));
        let before = good_cache.current();

        // Same cache, source that has no data at all.
        let failing = RefreshScheduler::new(
            Arc::new(EventGenerator::new(Arc::new(TabulatedIllumination::new()))),
            Arc::clone(&good_cache),
            clock,
            SchedulerSettings::default(),
        );
        let outcome = failing.refresh_now().await;

        assert!(matches!(
            outcome,
            RefreshOutcome::Failed(RefreshFailure::Generation(_))
        ));
        assert!(Arc::ptr_eq(&before, &good_cache.current()));

        let status = failing.status();
        assert_eq!(status.log.failed, 1);
        assert!(status.log.last_error.is_some());
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let clock = fixed(at(2025, 8, 25, 0, 0));
        let settings = SchedulerSettings {
            horizon_days: 1,
            generation_timeout: Duration::from_millis(50),
            ..SchedulerSettings::default()
        };
        let sched = scheduler_with(
            Arc::new(SlowSource {
                delay: Duration::from_millis(300),
            }),
            clock,
            settings,
        );
        let before = sched.cache().current();

        let outcome = sched.refresh_now().await;

        assert!(matches!(
            outcome,
            RefreshOutcome::Failed(RefreshFailure::Timeout { timeout_ms: 50 })
        ));
        assert!(Arc::ptr_eq(&before, &sched.cache().current()));
    }

    #[tokio::test]
    async fn overlapping_firing_is_dropped() {
        let clock = fixed(at(2025, 8, 25, 0, 0));
        let settings = SchedulerSettings {
            horizon_days: 1,
            ..SchedulerSettings::default()
        };
        let sched = scheduler_with(
            Arc::new(SlowSource {
                delay: Duration::from_millis(200),
            }),
            clock,
            settings,
        );

        let first = {
            let sched = Arc::clone(&sched);
            tokio::spawn(async move { sched.refresh_now().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(sched.refresh_now().await, RefreshOutcome::Skipped);
        assert_eq!(first.await.unwrap(), RefreshOutcome::Refreshed { events: 1 });

        let status = sched.status();
        assert_eq!(status.log.skipped, 1);
        assert_eq!(status.log.succeeded, 1);
        assert!(!status.in_flight);
    }

    #[tokio::test]
    async fn refresh_reanchors_to_new_day() {
        let clock = fixed(at(2025, 8, 25, 0, 0));
        let sched = scheduler_with(
            Arc::new(MeanLunation::new()),
            Arc::clone(&clock),
            SchedulerSettings::default(),
        );
        let _ = sched.initialize().await;

        clock.set(at(2025, 8, 26, 3, 5));
        let _ = sched.refresh_now().await;

        let snap = sched.cache().current();
        assert_eq!(snap.anchor_date, NaiveDate::from_ymd_opt(2025, 8, 26).unwrap());
        assert_eq!(snap.generated_at, at(2025, 8, 26, 3, 5));
    }

    #[tokio::test]
    async fn spawned_task_fires_once_and_stops() {
        // 150ms before the firing time; the frozen clock never reaches it,
        // so only the timer decides when the firing happens.
        let clock = fixed(Utc.with_ymd_and_hms(2025, 8, 25, 3, 4, 59).unwrap());
        clock.set(clock.now() + chrono::Duration::milliseconds(850));
        let sched = scheduler_with(
            Arc::new(MeanLunation::new()),
            clock,
            SchedulerSettings::default(),
        );

        let handle = sched.spawn();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(sched.status().log.succeeded, 1);
        assert!(!sched.cache().current().is_empty());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_before_first_firing() {
        let clock = fixed(at(2025, 8, 25, 4, 0));
        let sched = scheduler_with(
            Arc::new(MeanLunation::new()),
            clock,
            SchedulerSettings::default(),
        );

        let handle = sched.spawn();
        assert!(!handle.is_finished());
        handle.shutdown().await;

        assert_eq!(sched.status().log, RefreshLog::default());
    }

    #[test]
    fn status_reports_next_firing() {
        let clock = fixed(at(2025, 8, 25, 4, 0));
        let sched = scheduler_with(
            Arc::new(MeanLunation::new()),
            clock,
            SchedulerSettings::default(),
        );
        let status = sched.status();
        assert_eq!(status.refresh_at_utc, "03:05");
        assert_eq!(status.next_refresh_at, at(2025, 8, 26, 3, 5));
        assert!(!status.in_flight);
    }
}
