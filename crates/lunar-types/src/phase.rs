//! Precomputed phase-table records and the values derived from them.
//!
//! These types mirror the bundled dataset (`camelCase` keys) and are the
//! in-process and wire shapes of phase-table lookups.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::PhaseName;

/// Mean synodic month in days.
pub const SYNODIC_MONTH_DAYS: f64 = 29.530_588_853;

/// Age in days below which the moon counts as waxing (half a synodic month).
pub const WAXING_AGE_LIMIT_DAYS: f64 = 14.7;

/// Precomputed descriptor for one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PhaseRecord {
    /// Named phase for the date.
    pub phase_name: PhaseName,
    /// Display emoji.
    pub emoji: String,
    /// Lit fraction of the disc, 0 to 100.
    pub illumination_percent: u8,
    /// Days since the last new moon, `0 <= age < 29.53`.
    pub age_days: f64,
    /// Traditional lunar day, 1 to 30, when the dataset carries it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lunar_day: Option<u8>,
}

impl PhaseRecord {
    /// Whether the moon is waxing at this age.
    pub fn is_waxing(&self) -> bool {
        self.age_days < WAXING_AGE_LIMIT_DAYS
    }
}

/// Result of a phase-table lookup, augmented with derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ResolvedPhase {
    /// The date the caller asked for.
    pub requested_date: NaiveDate,
    /// The table date whose record was used.
    pub resolved_date: NaiveDate,
    /// `true` when `resolved_date == requested_date`.
    pub exact: bool,
    /// The table record.
    #[serde(flatten)]
    pub record: PhaseRecord,
    /// `age_days < 14.7`.
    pub is_waxing: bool,
}

/// Local moonrise and moonset for one (date, location) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MoonTimes {
    /// Local moonrise, `HH:MM`.
    pub moonrise: String,
    /// Local moonset, `HH:MM`.
    pub moonset: String,
}

impl MoonTimes {
    /// Fixed times returned when the date is absent from the table.
    pub fn sentinel() -> Self {
        Self {
            moonrise: String::from("08:00"),
            moonset: String::from("20:00"),
        }
    }
}

/// Result of a "find next occurrence of phase X" scan.
///
/// When nothing matched, `date` and `record` are `None`, `days_until` is
/// zero and `label` holds a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct NextPhase {
    /// The phase that was searched for.
    pub phase_name: PhaseName,
    /// Matched table date.
    pub date: Option<NaiveDate>,
    /// Human-readable date, for example `7 сентября`.
    pub label: String,
    /// Whole days from the search origin to the match, rounded up.
    pub days_until: i64,
    /// The matched record.
    pub record: Option<PhaseRecord>,
}

impl NextPhase {
    /// Placeholder label used when no match exists.
    pub const NOT_FOUND_LABEL: &'static str = "нет данных";

    /// The "not found" result for `phase_name`.
    pub fn not_found(phase_name: PhaseName) -> Self {
        Self {
            phase_name,
            date: None,
            label: String::from(Self::NOT_FOUND_LABEL),
            days_until: 0,
            record: None,
        }
    }

    /// Whether the scan found a match.
    pub const fn is_found(&self) -> bool {
        self.date.is_some()
    }
}
