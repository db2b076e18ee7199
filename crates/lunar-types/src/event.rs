//! Generated lunar events and the snapshot that groups one generation run.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::EventType;

/// One classified calendar-day occurrence.
///
/// Fields are private: an event never changes after construction. A new
/// generation run produces fresh values instead of mutating old ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LunarEvent {
    /// Stable key, `"<prefix>-<ISO date>"`.
    id: String,
    /// New or full moon.
    #[serde(rename = "type")]
    event_type: EventType,
    /// Start of the classified UTC day.
    #[serde(rename = "exactDateUTC")]
    exact_instant: DateTime<Utc>,
    /// Display title, opaque to the core.
    title: String,
    /// Short display text, opaque to the core.
    short_text: String,
}

impl LunarEvent {
    /// Build the event for `event_type` on the UTC calendar day `date`.
    pub fn new(event_type: EventType, date: NaiveDate) -> Self {
        Self {
            id: format!("{}-{date}", event_type.id_prefix()),
            event_type,
            exact_instant: date.and_time(NaiveTime::MIN).and_utc(),
            title: event_type.title().to_owned(),
            short_text: event_type.short_text().to_owned(),
        }
    }

    /// Stable identifier derived from type and date.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Event classification.
    pub const fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Start of the classified day in UTC.
    pub const fn exact_instant(&self) -> DateTime<Utc> {
        self.exact_instant
    }

    /// The classified calendar day.
    pub fn date(&self) -> NaiveDate {
        self.exact_instant.date_naive()
    }

    /// Display title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Short display text.
    pub fn short_text(&self) -> &str {
        &self.short_text
    }
}

/// One immutable generation of the event cache.
///
/// Events are ascending by [`LunarEvent::exact_instant`]. A snapshot is
/// replaced wholesale and never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventSnapshot {
    /// Generated events, ascending by instant.
    pub events: Vec<LunarEvent>,
    /// When the run that produced this snapshot finished.
    pub generated_at: DateTime<Utc>,
    /// First calendar day covered by the run.
    pub anchor_date: NaiveDate,
    /// Number of days covered, starting at `anchor_date`.
    pub horizon_days: u32,
}

impl EventSnapshot {
    /// An empty snapshot, installed when no generation has succeeded yet.
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            events: Vec::new(),
            generated_at,
            anchor_date: generated_at.date_naive(),
            horizon_days: 0,
        }
    }

    /// Number of events in the snapshot.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the snapshot holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
