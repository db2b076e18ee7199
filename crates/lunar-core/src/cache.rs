//! The event cache: one immutable snapshot at a time.
//!
//! The cache stores an `Arc<EventSnapshot>` behind a lock that is held only
//! long enough to clone or replace the pointer. Generation happens outside
//! the lock, so readers never wait on it and never see a half-built
//! sequence: they observe either the previous snapshot or the new one.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use lunar_types::EventSnapshot;

/// Holder of the current [`EventSnapshot`].
#[derive(Debug)]
pub struct EventCache {
    current: RwLock<Arc<EventSnapshot>>,
}

impl EventCache {
    /// Create a cache holding an empty snapshot stamped `created_at`.
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self::with_snapshot(EventSnapshot::empty(created_at))
    }

    /// Create a cache holding `snapshot`.
    pub fn with_snapshot(snapshot: EventSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The live snapshot. Treat it as read-only; it is never mutated.
    pub fn current(&self) -> Arc<EventSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the snapshot as one indivisible step, returning the old one.
    ///
    /// Only the refresh scheduler calls this.
    pub(crate) fn swap(&self, snapshot: EventSnapshot) -> Arc<EventSnapshot> {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }
}
