//! Event generation from an illumination signal.
//!
//! [`EventGenerator::generate`] walks the calendar days of a horizon and
//! classifies each one by its phase fraction:
//!
//! - `|p - 0.0| < epsilon` → [`EventType::NewMoon`]
//! - `|p - 0.5| < epsilon` → [`EventType::FullMoon`]
//! - otherwise no event
//!
//! Near an exact new or full moon the fraction moves slowly, so two (rarely
//! three) consecutive days can fall inside the window. Each such day gets
//! its own event; the generator does not deduplicate.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use lunar_types::{EventType, LunarEvent};
use tracing::debug;

use crate::illumination::{IlluminationError, IlluminationSource};

/// Default classification window around 0.0 and 0.5.
pub const DEFAULT_EPSILON: f64 = 0.02;

/// Phase fraction of an exact full moon.
const FULL_MOON_FRACTION: f64 = 0.5;

/// Errors that abort a generation run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    /// The illumination source failed for a day in the horizon.
    #[error("illumination unavailable for {date}: {source}")]
    Illumination {
        /// The day being classified.
        date: NaiveDate,
        /// The underlying source error.
        source: IlluminationError,
    },

    /// The source returned a value outside `[0, 1)` or a non-finite value.
    #[error("illumination source returned invalid fraction {value} for {date}")]
    InvalidFraction {
        /// The day being classified.
        date: NaiveDate,
        /// The offending value.
        value: f64,
    },

    /// The horizon runs past the last representable date.
    #[error("date overflow: {start} + {offset} days")]
    DateOverflow {
        /// First day of the horizon.
        start: NaiveDate,
        /// Offset that could not be represented.
        offset: u32,
    },
}

/// Classifies calendar days into lunar events.
#[derive(Clone)]
pub struct EventGenerator {
    source: Arc<dyn IlluminationSource>,
    epsilon: f64,
}

impl std::fmt::Debug for EventGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventGenerator")
            .field("epsilon", &self.epsilon)
            .finish_non_exhaustive()
    }
}

impl EventGenerator {
    /// Create a generator over `source` with the default epsilon.
    pub fn new(source: Arc<dyn IlluminationSource>) -> Self {
        Self::with_epsilon(source, DEFAULT_EPSILON)
    }

    /// Create a generator with an explicit classification window.
    pub fn with_epsilon(source: Arc<dyn IlluminationSource>, epsilon: f64) -> Self {
        Self { source, epsilon }
    }

    /// The classification window in use.
    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Classify a single phase fraction.
    pub fn classify(&self, fraction: f64) -> Option<EventType> {
        if fraction.abs() < self.epsilon {
            Some(EventType::NewMoon)
        } else if (fraction - FULL_MOON_FRACTION).abs() < self.epsilon {
            Some(EventType::FullMoon)
        } else {
            None
        }
    }

    /// Generate the events for `[today, today + horizon_days)`.
    ///
    /// Output is in day order, which is ascending by instant. The result
    /// depends only on the source, `today`, and `horizon_days`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] if the source fails or misbehaves for
    /// any day, or if the horizon overflows the calendar. No partial
    /// result is returned.
    pub fn generate(
        &self,
        today: NaiveDate,
        horizon_days: u32,
    ) -> Result<Vec<LunarEvent>, GenerationError> {
        let mut events = Vec::new();

        for offset in 0..horizon_days {
            let date = today
                .checked_add_days(Days::new(u64::from(offset)))
                .ok_or(GenerationError::DateOverflow {
                    start: today,
                    offset,
                })?;

            let fraction = self
                .source
                .phase_fraction(date)
                .map_err(|source| GenerationError::Illumination { date, source })?;

            if !fraction.is_finite() || !(0.0..1.0).contains(&fraction) {
                return Err(GenerationError::InvalidFraction {
                    date,
                    value: fraction,
                });
            }

            if let Some(event_type) = self.classify(fraction) {
                debug!(%date, fraction, ?event_type, "classified day");
                events.push(LunarEvent::new(event_type, date));
            }
        }

        Ok(events)
    }
}
