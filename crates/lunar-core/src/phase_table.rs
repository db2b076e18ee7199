//! Static date-indexed phase table.
//!
//! [`PhaseLookupTable`] maps calendar dates to precomputed [`PhaseRecord`]s
//! and (date, location) pairs to [`MoonTimes`]. Coverage is partial by
//! design: only some dates in the supported span have an entry. Every
//! query still answers:
//!
//! - [`lookup`](PhaseLookupTable::lookup) falls back to the nearest dated
//!   entry. Ties between an earlier and a later entry at the same distance
//!   go to the earlier one.
//! - [`moon_times`](PhaseLookupTable::moon_times) falls back to the date's
//!   `default` location, then to a fixed `08:00`/`20:00` sentinel.
//! - [`find_next_phase`](PhaseLookupTable::find_next_phase) returns a
//!   "not found" sentinel when the table runs out.
//!
//! The table is immutable after load and is read without locks.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use lunar_types::{
    MoonTimes, NextPhase, PhaseName, PhaseRecord, ResolvedPhase, SYNODIC_MONTH_DAYS,
};
use tracing::debug;

use crate::config::PhaseTableConfig;

/// Location key used when a specific location has no entry.
pub const DEFAULT_LOCATION: &str = "default";

/// Default look-ahead for [`PhaseLookupTable::find_next_phase`].
pub const DEFAULT_SCAN_DAYS: u32 = 35;

/// Bundled phase dataset.
const BUNDLED_PHASES: &str = include_str!("../data/phases.json");

/// Bundled moonrise/moonset dataset.
const BUNDLED_MOON_TIMES: &str = include_str!("../data/moon_times.json");

/// Genitive month names for day-month labels.
const MONTHS_GENITIVE: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

/// Errors that can occur when loading a phase table.
#[derive(Debug, thiserror::Error)]
pub enum PhaseTableError {
    /// A dataset file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A dataset is not valid JSON of the expected shape.
    #[error("failed to parse {dataset} dataset: {source}")]
    Json {
        /// Which dataset failed (`phases` or `moon times`).
        dataset: &'static str,
        /// The underlying parse error.
        source: serde_json::Error,
    },

    /// A key is not an ISO `YYYY-MM-DD` date.
    #[error("invalid date key {key:?}: {source}")]
    InvalidDate {
        /// The offending key.
        key: String,
        /// The underlying parse error.
        source: chrono::ParseError,
    },

    /// A record parsed but holds out-of-range values.
    #[error("invalid record for {date}: {reason}")]
    InvalidRecord {
        /// Date of the record.
        date: NaiveDate,
        /// What is wrong with it.
        reason: String,
    },
}

/// Date-indexed phase records and moon times.
#[derive(Debug, Clone, Default)]
pub struct PhaseLookupTable {
    phases: BTreeMap<NaiveDate, PhaseRecord>,
    moon_times: BTreeMap<NaiveDate, BTreeMap<String, MoonTimes>>,
}

impl PhaseLookupTable {
    /// Build a table from already-parsed maps, validating every record.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseTableError::InvalidRecord`] for the first record with
    /// an out-of-range illumination, age, or lunar day.
    pub fn new(
        phases: BTreeMap<NaiveDate, PhaseRecord>,
        moon_times: BTreeMap<NaiveDate, BTreeMap<String, MoonTimes>>,
    ) -> Result<Self, PhaseTableError> {
        for (date, record) in &phases {
            validate_record(*date, record)?;
        }
        Ok(Self { phases, moon_times })
    }

    /// The dataset compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseTableError`] if the bundled dataset is malformed.
    pub fn bundled() -> Result<Self, PhaseTableError> {
        Self::from_json(BUNDLED_PHASES, BUNDLED_MOON_TIMES)
    }

    /// Parse both datasets from JSON text.
    ///
    /// `phases_json` maps ISO dates to records; `moon_times_json` maps ISO
    /// dates to objects keyed by location id.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseTableError`] on malformed JSON, bad date keys, or
    /// out-of-range records.
    pub fn from_json(phases_json: &str, moon_times_json: &str) -> Result<Self, PhaseTableError> {
        let raw_phases: BTreeMap<String, PhaseRecord> = serde_json::from_str(phases_json)
            .map_err(|source| PhaseTableError::Json {
                dataset: "phases",
                source,
            })?;
        let raw_times: BTreeMap<String, BTreeMap<String, MoonTimes>> =
            serde_json::from_str(moon_times_json).map_err(|source| PhaseTableError::Json {
                dataset: "moon times",
                source,
            })?;

        Self::new(rekey(raw_phases)?, rekey(raw_times)?)
    }

    /// Load the datasets named in config, using the bundled data for any
    /// path that is not set.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseTableError`] if a file cannot be read or parsed.
    pub fn from_config(config: &PhaseTableConfig) -> Result<Self, PhaseTableError> {
        let phases = match &config.table_path {
            Some(path) => read_dataset(path)?,
            None => BUNDLED_PHASES.to_owned(),
        };
        let times = match &config.moon_times_path {
            Some(path) => read_dataset(path)?,
            None => BUNDLED_MOON_TIMES.to_owned(),
        };
        Self::from_json(&phases, &times)
    }

    /// Number of dated phase records.
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Whether the table has no phase records.
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// First and last dated entries.
    pub fn coverage(&self) -> Option<(NaiveDate, NaiveDate)> {
        let (first, _) = self.phases.first_key_value()?;
        let (last, _) = self.phases.last_key_value()?;
        Some((*first, *last))
    }

    /// The record stored for exactly `date`, without fallback.
    pub fn record(&self, date: NaiveDate) -> Option<&PhaseRecord> {
        self.phases.get(&date)
    }

    /// Resolve `date` to a record, falling back to the nearest dated entry.
    ///
    /// Never fails. An empty table yields a new-moon placeholder.
    pub fn lookup(&self, date: NaiveDate) -> ResolvedPhase {
        let (resolved_date, record) = match self.phases.get(&date) {
            Some(record) => (date, record.clone()),
            None => match self.nearest(date) {
                Some((near, record)) => {
                    debug!(requested = %date, resolved = %near, "phase table miss, using nearest date");
                    (near, record.clone())
                }
                None => (date, placeholder_record()),
            },
        };

        ResolvedPhase {
            requested_date: date,
            resolved_date,
            exact: resolved_date == date && self.phases.contains_key(&date),
            is_waxing: record.is_waxing(),
            record,
        }
    }

    /// Whether the moon is waxing on `date` (via [`lookup`](Self::lookup)).
    pub fn is_waxing(&self, date: NaiveDate) -> bool {
        self.lookup(date).is_waxing
    }

    /// Lunar day for `date`: the stored value, else `floor(age_days) + 1`.
    pub fn lunar_day(&self, date: NaiveDate) -> u8 {
        let record = self.lookup(date).record;
        record
            .lunar_day
            .unwrap_or_else(|| lunar_day_from_age(record.age_days))
    }

    /// Moonrise and moonset for `date` at `location_id`.
    ///
    /// Falls back to the date's `default` entry, then to the fixed sentinel.
    pub fn moon_times(&self, date: NaiveDate, location_id: &str) -> MoonTimes {
        self.moon_times
            .get(&date)
            .and_then(|by_location| {
                by_location
                    .get(location_id)
                    .or_else(|| by_location.get(DEFAULT_LOCATION))
            })
            .cloned()
            .unwrap_or_else(MoonTimes::sentinel)
    }

    /// The first table date strictly after `from` whose phase is `target`.
    ///
    /// The scan covers every later date in the table. `max_days` states the
    /// caller's intended look-ahead: a match beyond it is still returned
    /// and only noted in the debug log. When the table runs out, the
    /// [`NextPhase::not_found`] sentinel is returned.
    pub fn find_next_phase(&self, target: PhaseName, from: NaiveDate, max_days: u32) -> NextPhase {
        let hit = self
            .phases
            .range((Bound::Excluded(from), Bound::Unbounded))
            .find(|(_, record)| record.phase_name == target);

        let Some((date, record)) = hit else {
            debug!(%target, %from, "no later table entry with this phase");
            return NextPhase::not_found(target);
        };

        let days_until = date.signed_duration_since(from).num_days();
        if days_until > i64::from(max_days) {
            debug!(%target, %from, %date, days_until, max_days, "next phase lies beyond look-ahead");
        }

        NextPhase {
            phase_name: target,
            date: Some(*date),
            label: format_day_month(*date),
            days_until,
            record: Some(record.clone()),
        }
    }

    /// Closest dated entry to `date`; the earlier one wins a tie.
    ///
    /// Only the immediate neighbours can be closest, so this inspects the
    /// last key before `date` and the first key after it.
    fn nearest(&self, date: NaiveDate) -> Option<(NaiveDate, &PhaseRecord)> {
        let before = self.phases.range(..date).next_back();
        let after = self
            .phases
            .range((Bound::Excluded(date), Bound::Unbounded))
            .next();

        match (before, after) {
            (Some((b, rb)), Some((a, ra))) => {
                let to_before = date.signed_duration_since(*b).num_days();
                let to_after = a.signed_duration_since(date).num_days();
                if to_after < to_before {
                    Some((*a, ra))
                } else {
                    Some((*b, rb))
                }
            }
            (Some((b, rb)), None) => Some((*b, rb)),
            (None, Some((a, ra))) => Some((*a, ra)),
            (None, None) => None,
        }
    }
}

/// `"7 сентября"` style label.
pub fn format_day_month(date: NaiveDate) -> String {
    let month = usize::try_from(date.month0())
        .ok()
        .and_then(|idx| MONTHS_GENITIVE.get(idx))
        .copied()
        .unwrap_or_default();
    format!("{} {month}", date.day())
}

/// `floor(age_days) + 1`, clamped into `1..=30`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lunar_day_from_age(age_days: f64) -> u8 {
    // Validated records keep age in [0, 29.53), so the cast cannot wrap.
    let day = age_days.floor().clamp(0.0, 29.0) as u8;
    day.saturating_add(1)
}

fn placeholder_record() -> PhaseRecord {
    PhaseRecord {
        phase_name: PhaseName::NewMoon,
        emoji: PhaseName::NewMoon.emoji().to_owned(),
        illumination_percent: 0,
        age_days: 0.0,
        lunar_day: None,
    }
}

fn validate_record(date: NaiveDate, record: &PhaseRecord) -> Result<(), PhaseTableError> {
    let invalid = |reason: String| PhaseTableError::InvalidRecord { date, reason };

    if record.illumination_percent > 100 {
        return Err(invalid(format!(
            "illuminationPercent {} exceeds 100",
            record.illumination_percent
        )));
    }
    if !record.age_days.is_finite() || record.age_days < 0.0 || record.age_days >= SYNODIC_MONTH_DAYS
    {
        return Err(invalid(format!(
            "ageDays {} outside [0, {SYNODIC_MONTH_DAYS})",
            record.age_days
        )));
    }
    if let Some(day) = record.lunar_day
        && !(1..=30).contains(&day)
    {
        return Err(invalid(format!("lunarDay {day} outside 1..=30")));
    }
    Ok(())
}

fn rekey<V>(raw: BTreeMap<String, V>) -> Result<BTreeMap<NaiveDate, V>, PhaseTableError> {
    raw.into_iter()
        .map(|(key, value)| {
            NaiveDate::parse_from_str(&key, "%Y-%m-%d")
                .map(|date| (date, value))
                .map_err(|source| PhaseTableError::InvalidDate { key, source })
        })
        .collect()
}

fn read_dataset(path: &Path) -> Result<String, PhaseTableError> {
    std::fs::read_to_string(path).map_err(|source| PhaseTableError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rec(phase_name: PhaseName, age_days: f64, lunar_day: Option<u8>) -> PhaseRecord {
        PhaseRecord {
            phase_name,
            emoji: phase_name.emoji().to_owned(),
            illumination_percent: 50,
            age_days,
            lunar_day,
        }
    }

    fn table(entries: &[(NaiveDate, PhaseRecord)]) -> PhaseLookupTable {
        PhaseLookupTable::new(entries.iter().cloned().collect(), BTreeMap::new()).unwrap()
    }

    #[test]
    fn exact_match_wins() {
        let t = table(&[
            (day(2025, 8, 11), rec(PhaseName::WaningGibbous, 17.7, Some(18))),
            (day(2025, 8, 12), rec(PhaseName::WaningGibbous, 18.7, None)),
        ]);
        let r = t.lookup(day(2025, 8, 12));
        assert!(r.exact);
        assert_eq!(r.resolved_date, day(2025, 8, 12));
        assert!((r.record.age_days - 18.7).abs() < f64::EPSILON);
    }

    #[test]
    fn nearest_date_fallback_picks_smaller_distance() {
        let t = table(&[
            (day(2025, 8, 11), rec(PhaseName::WaningGibbous, 17.7, None)),
            (day(2025, 8, 23), rec(PhaseName::NewMoon, 0.25, None)),
        ]);
        let r = t.lookup(day(2025, 8, 15));
        assert!(!r.exact);
        assert_eq!(r.requested_date, day(2025, 8, 15));
        assert_eq!(r.resolved_date, day(2025, 8, 11));
        assert_eq!(r.record.phase_name, PhaseName::WaningGibbous);

        let r = t.lookup(day(2025, 8, 20));
        assert_eq!(r.resolved_date, day(2025, 8, 23));
    }

    #[test]
    fn equidistant_tie_goes_to_earlier_date() {
        let t = table(&[
            (day(2025, 8, 11), rec(PhaseName::WaningGibbous, 17.7, None)),
            (day(2025, 8, 15), rec(PhaseName::LastQuarter, 21.7, None)),
        ]);
        assert_eq!(t.lookup(day(2025, 8, 13)).resolved_date, day(2025, 8, 11));
    }

    #[test]
    fn fallback_outside_coverage_uses_edge() {
        let t = table(&[
            (day(2025, 8, 11), rec(PhaseName::WaningGibbous, 17.7, None)),
            (day(2025, 8, 23), rec(PhaseName::NewMoon, 0.25, None)),
        ]);
        assert_eq!(t.lookup(day(2020, 1, 1)).resolved_date, day(2025, 8, 11));
        assert_eq!(t.lookup(day(2099, 1, 1)).resolved_date, day(2025, 8, 23));
    }

    #[test]
    fn empty_table_still_answers() {
        let t = PhaseLookupTable::default();
        let r = t.lookup(day(2025, 8, 15));
        assert_eq!(r.record.phase_name, PhaseName::NewMoon);
        assert!(!r.exact);
        assert!(r.is_waxing);
        assert_eq!(t.lunar_day(day(2025, 8, 15)), 1);
    }

    #[test]
    fn waxing_is_derived_from_age() {
        let t = table(&[
            (day(2025, 8, 1), rec(PhaseName::FirstQuarter, 7.7, None)),
            (day(2025, 8, 16), rec(PhaseName::LastQuarter, 22.7, None)),
        ]);
        assert!(t.lookup(day(2025, 8, 1)).is_waxing);
        assert!(t.is_waxing(day(2025, 8, 1)));
        assert!(!t.is_waxing(day(2025, 8, 16)));
    }

    #[test]
    fn lunar_day_prefers_stored_value() {
        let t = table(&[
            (day(2025, 8, 1), rec(PhaseName::FirstQuarter, 7.7, Some(9))),
            (day(2025, 8, 2), rec(PhaseName::WaxingGibbous, 8.7, None)),
        ]);
        assert_eq!(t.lunar_day(day(2025, 8, 1)), 9);
        assert_eq!(t.lunar_day(day(2025, 8, 2)), 9);
    }

    #[test]
    fn lunar_day_from_age_bounds() {
        assert_eq!(lunar_day_from_age(0.0), 1);
        assert_eq!(lunar_day_from_age(0.99), 1);
        assert_eq!(lunar_day_from_age(14.2), 15);
        assert_eq!(lunar_day_from_age(29.5), 30);
    }

    #[test]
    fn find_next_phase_counts_days() {
        let t = table(&[
            (day(2025, 8, 25), rec(PhaseName::WaxingCrescent, 2.25, None)),
            (day(2025, 8, 31), rec(PhaseName::FirstQuarter, 8.25, None)),
            (day(2025, 9, 7), rec(PhaseName::FullMoon, 15.25, None)),
            (day(2025, 10, 7), rec(PhaseName::FullMoon, 15.5, None)),
        ]);
        let next = t.find_next_phase(PhaseName::FullMoon, day(2025, 8, 25), DEFAULT_SCAN_DAYS);
        assert!(next.is_found());
        assert_eq!(next.date, Some(day(2025, 9, 7)));
        assert_eq!(next.days_until, 13);
        assert_eq!(next.label, "7 сентября");
    }

    #[test]
    fn find_next_phase_is_strictly_after_origin() {
        let t = table(&[
            (day(2025, 9, 7), rec(PhaseName::FullMoon, 15.25, None)),
            (day(2025, 10, 7), rec(PhaseName::FullMoon, 15.5, None)),
        ]);
        let next = t.find_next_phase(PhaseName::FullMoon, day(2025, 9, 7), DEFAULT_SCAN_DAYS);
        assert_eq!(next.date, Some(day(2025, 10, 7)));
        assert_eq!(next.days_until, 30);
    }

    #[test]
    fn find_next_phase_beyond_max_days_still_matches() {
        let t = table(&[(day(2025, 12, 4), rec(PhaseName::FullMoon, 14.9, None))]);
        let next = t.find_next_phase(PhaseName::FullMoon, day(2025, 8, 25), 35);
        assert_eq!(next.date, Some(day(2025, 12, 4)));
        assert_eq!(next.days_until, 101);
    }

    #[test]
    fn find_next_phase_not_found_is_sentinel() {
        let t = table(&[(day(2025, 9, 7), rec(PhaseName::FullMoon, 15.25, None))]);
        let next = t.find_next_phase(PhaseName::NewMoon, day(2025, 8, 25), DEFAULT_SCAN_DAYS);
        assert!(!next.is_found());
        assert_eq!(next.days_until, 0);
        assert_eq!(next.label, NextPhase::NOT_FOUND_LABEL);
        assert_eq!(next.phase_name, PhaseName::NewMoon);
    }

    #[test]
    fn moon_times_fallback_chain() {
        let mut by_location = BTreeMap::new();
        by_location.insert(
            String::from(DEFAULT_LOCATION),
            MoonTimes {
                moonrise: String::from("07:53"),
                moonset: String::from("20:18"),
            },
        );
        by_location.insert(
            String::from("moscow"),
            MoonTimes {
                moonrise: String::from("08:00"),
                moonset: String::from("20:34"),
            },
        );
        let mut times = BTreeMap::new();
        times.insert(day(2025, 8, 25), by_location);
        let t = PhaseLookupTable::new(BTreeMap::new(), times).unwrap();

        assert_eq!(t.moon_times(day(2025, 8, 25), "moscow").moonset, "20:34");
        assert_eq!(t.moon_times(day(2025, 8, 25), "unknown-city").moonrise, "07:53");
        assert_eq!(t.moon_times(day(2099, 1, 1), "moscow"), MoonTimes::sentinel());
    }

    #[test]
    fn rejects_out_of_range_records() {
        let mut phases = BTreeMap::new();
        phases.insert(day(2025, 8, 1), rec(PhaseName::FullMoon, 30.0, None));
        let err = PhaseLookupTable::new(phases, BTreeMap::new()).unwrap_err();
        assert!(matches!(err, PhaseTableError::InvalidRecord { .. }));

        let mut phases = BTreeMap::new();
        let mut bad = rec(PhaseName::FullMoon, 14.0, None);
        bad.illumination_percent = 101;
        phases.insert(day(2025, 8, 1), bad);
        assert!(PhaseLookupTable::new(phases, BTreeMap::new()).is_err());

        let mut phases = BTreeMap::new();
        phases.insert(day(2025, 8, 1), rec(PhaseName::FullMoon, 14.0, Some(0)));
        assert!(PhaseLookupTable::new(phases, BTreeMap::new()).is_err());
    }

    #[test]
    fn rejects_bad_date_key() {
        let json = r#"{"25-08-2025":{"phaseName":"Полнолуние","emoji":"🌕","illuminationPercent":100,"ageDays":14.8}}"#;
        let err = PhaseLookupTable::from_json(json, "{}").unwrap_err();
        assert!(matches!(err, PhaseTableError::InvalidDate { .. }));
    }

    #[test]
    fn rejects_unknown_phase_name() {
        let json = r#"{"2025-08-25":{"phaseName":"Blue moon","emoji":"🌕","illuminationPercent":100,"ageDays":14.8}}"#;
        let err = PhaseLookupTable::from_json(json, "{}").unwrap_err();
        assert!(matches!(err, PhaseTableError::Json { dataset: "phases", .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let config = PhaseTableConfig {
            table_path: Some(PathBuf::from("/nonexistent/phases.json")),
            moon_times_path: None,
        };
        let err = PhaseLookupTable::from_config(&config).unwrap_err();
        assert!(matches!(err, PhaseTableError::Io { .. }));
    }

    #[test]
    fn format_day_month_uses_genitive() {
        assert_eq!(format_day_month(day(2025, 9, 7)), "7 сентября");
        assert_eq!(format_day_month(day(2026, 1, 18)), "18 января");
        assert_eq!(format_day_month(day(2025, 12, 31)), "31 декабря");
    }

    // -- bundled dataset ----------------------------------------------------

    #[test]
    fn bundled_dataset_loads() {
        let t = PhaseLookupTable::bundled().unwrap();
        assert!(!t.is_empty());
        let (first, last) = t.coverage().unwrap();
        assert_eq!(first, day(2025, 8, 1));
        assert_eq!(last, day(2025, 12, 31));
    }

    #[test]
    fn bundled_next_full_moon_after_late_august() {
        let t = PhaseLookupTable::bundled().unwrap();
        let next = t.find_next_phase(
            "Полнолуние".parse().unwrap(),
            day(2025, 8, 25),
            DEFAULT_SCAN_DAYS,
        );
        assert_eq!(next.date, Some(day(2025, 9, 7)));
        assert_eq!(next.days_until, 13);
    }

    #[test]
    fn bundled_gap_falls_back_to_neighbour() {
        let t = PhaseLookupTable::bundled().unwrap();
        assert!(t.record(day(2025, 8, 13)).is_none());
        let r = t.lookup(day(2025, 8, 13));
        assert_eq!(r.resolved_date, day(2025, 8, 11));

        // 2025-09-02 is missing and both neighbours are one day away.
        assert!(t.record(day(2025, 9, 2)).is_none());
        assert_eq!(t.lookup(day(2025, 9, 2)).resolved_date, day(2025, 9, 1));
    }

    #[test]
    fn bundled_moon_times_fallbacks() {
        let t = PhaseLookupTable::bundled().unwrap();
        let default = t.moon_times(day(2025, 8, 25), DEFAULT_LOCATION);
        assert_eq!(t.moon_times(day(2025, 8, 25), "unknown-city"), default);
        assert_ne!(t.moon_times(day(2025, 8, 25), "moscow"), default);
        assert_eq!(t.moon_times(day(2099, 1, 1), "moscow"), MoonTimes::sentinel());
    }
}
