//! Illumination sources.
//!
//! The generator does not compute astronomy itself. It asks an
//! [`IlluminationSource`] for the phase fraction of each calendar day:
//! 0.0 is an exact new moon, 0.5 an exact full moon, and values in between
//! interpolate around the cycle.
//!
//! Two implementations ship with the crate:
//!
//! - [`MeanLunation`] -- mean synodic month from a reference new moon.
//!   Accurate to within roughly half a day, which is enough for a
//!   day-granularity calendar.
//! - [`TabulatedIllumination`] -- explicit date to fraction map, for
//!   precomputed ephemerides and tests.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use lunar_types::SYNODIC_MONTH_DAYS;

/// Seconds in one day.
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Errors an illumination source can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IlluminationError {
    /// The source has no value for the requested date.
    #[error("no illumination data for {date}")]
    Unavailable {
        /// The requested date.
        date: NaiveDate,
    },

    /// The source failed for another reason.
    #[error("illumination source failed: {message}")]
    Source {
        /// Description of the failure.
        message: String,
    },
}

/// Returns the lunar phase fraction for a calendar day.
///
/// Implementations must be callable from a blocking worker thread.
pub trait IlluminationSource: Send + Sync {
    /// Phase fraction in `[0, 1)` for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`IlluminationError`] if the source cannot answer for `date`.
    fn phase_fraction(&self, date: NaiveDate) -> Result<f64, IlluminationError>;
}

/// Mean-lunation model anchored at the new moon of 2000-01-06 18:14 UTC.
///
/// The fraction is evaluated at the start of the UTC day, the same instant
/// the generated event carries.
#[derive(Debug, Clone, Copy)]
pub struct MeanLunation {
    epoch: DateTime<Utc>,
    synodic_days: f64,
}

impl MeanLunation {
    /// Create the model with the standard epoch and mean synodic month.
    pub fn new() -> Self {
        Self {
            epoch: Utc
                .with_ymd_and_hms(2000, 1, 6, 18, 14, 0)
                .single()
                .unwrap_or_default(),
            synodic_days: SYNODIC_MONTH_DAYS,
        }
    }

    /// Phase fraction at an arbitrary instant.
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction_at(&self, instant: DateTime<Utc>) -> f64 {
        let elapsed_days = instant.signed_duration_since(self.epoch).num_seconds() as f64
            / SECONDS_PER_DAY;
        let fraction = elapsed_days.rem_euclid(self.synodic_days) / self.synodic_days;
        // rem_euclid can round up to exactly the modulus.
        if fraction >= 1.0 { 0.0 } else { fraction }
    }
}

impl Default for MeanLunation {
    fn default() -> Self {
        Self::new()
    }
}

impl IlluminationSource for MeanLunation {
    fn phase_fraction(&self, date: NaiveDate) -> Result<f64, IlluminationError> {
        Ok(self.fraction_at(date.and_time(NaiveTime::MIN).and_utc()))
    }
}

/// Illumination source backed by an explicit date to fraction map.
///
/// Dates missing from the map answer with `fallback` when one is set and
/// with [`IlluminationError::Unavailable`] otherwise.
#[derive(Debug, Clone, Default)]
pub struct TabulatedIllumination {
    fractions: BTreeMap<NaiveDate, f64>,
    fallback: Option<f64>,
}

impl TabulatedIllumination {
    /// Create an empty table with no fallback.
    pub const fn new() -> Self {
        Self {
            fractions: BTreeMap::new(),
            fallback: None,
        }
    }

    /// Answer `fraction` for dates not in the table.
    #[must_use]
    pub fn with_fallback(mut self, fraction: f64) -> Self {
        self.fallback = Some(fraction);
        self
    }

    /// Set the fraction for one date.
    #[must_use]
    pub fn with(mut self, date: NaiveDate, fraction: f64) -> Self {
        self.fractions.insert(date, fraction);
        self
    }
}

impl IlluminationSource for TabulatedIllumination {
    fn phase_fraction(&self, date: NaiveDate) -> Result<f64, IlluminationError> {
        self.fractions
            .get(&date)
            .copied()
            .or(self.fallback)
            .ok_or(IlluminationError::Unavailable { date })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn mean_lunation_is_near_zero_just_after_epoch() {
        let source = MeanLunation::new();
        let p = source.phase_fraction(day(2000, 1, 7)).unwrap();
        assert!(p > 0.0 && p < 0.02, "got {p}");
    }

    #[test]
    fn mean_lunation_wraps_just_before_epoch() {
        let source = MeanLunation::new();
        let p = source.phase_fraction(day(2000, 1, 6)).unwrap();
        assert!(p > 0.95 && p < 1.0, "got {p}");
    }

    #[test]
    fn mean_lunation_reaches_half_two_weeks_later() {
        let source = MeanLunation::new();
        let p = source.phase_fraction(day(2000, 1, 21)).unwrap();
        assert!((p - 0.5).abs() < 0.05, "got {p}");
    }

    #[test]
    fn mean_lunation_stays_in_unit_interval() {
        let source = MeanLunation::new();
        let mut date = day(1990, 1, 1);
        for _ in 0..2_000 {
            let p = source.phase_fraction(date).unwrap();
            assert!((0.0..1.0).contains(&p), "{date}: {p}");
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn tabulated_answers_known_dates() {
        let source = TabulatedIllumination::new().with(day(2025, 9, 7), 0.5);
        assert!((source.phase_fraction(day(2025, 9, 7)).unwrap() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn tabulated_without_fallback_reports_unavailable() {
        let source = TabulatedIllumination::new();
        let err = source.phase_fraction(day(2025, 9, 8)).unwrap_err();
        assert_eq!(err, IlluminationError::Unavailable { date: day(2025, 9, 8) });
    }

    #[test]
    fn tabulated_uses_fallback() {
        let source = TabulatedIllumination::new().with_fallback(0.25);
        assert!((source.phase_fraction(day(2025, 9, 8)).unwrap() - 0.25).abs() < f64::EPSILON);
    }
}
