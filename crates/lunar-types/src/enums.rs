//! Enumeration types for the lunar calendar service.
//!
//! [`EventType`] classifies generated calendar events. [`PhaseName`] is the
//! fixed vocabulary of named phases carried by the static phase table; its
//! wire form is the Russian display name used by the dataset and the UI.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// The kind of lunar event emitted by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum EventType {
    /// Phase fraction within epsilon of 0.0.
    NewMoon,
    /// Phase fraction within epsilon of 0.5.
    FullMoon,
}

impl EventType {
    /// Prefix used when building stable event identifiers.
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::NewMoon => "new",
            Self::FullMoon => "full",
        }
    }

    /// Display title attached to events of this type.
    pub const fn title(self) -> &'static str {
        match self {
            Self::NewMoon => "Новолуние",
            Self::FullMoon => "Полнолуние",
        }
    }

    /// Short display text attached to events of this type.
    pub const fn short_text(self) -> &'static str {
        match self {
            Self::NewMoon => "🌑 Луна не видна, начинается новый цикл",
            Self::FullMoon => "🌕 Луна полностью освещена",
        }
    }

    /// The named phase that corresponds to this event type.
    pub const fn phase_name(self) -> PhaseName {
        match self {
            Self::NewMoon => PhaseName::NewMoon,
            Self::FullMoon => PhaseName::FullMoon,
        }
    }
}

// ---------------------------------------------------------------------------
// Phase names
// ---------------------------------------------------------------------------

/// One of the eight named phases of the synodic cycle.
///
/// Serialized by Russian display name (`"Полнолуние"`), which is also the
/// key format of the bundled dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum PhaseName {
    /// The moon is not visible.
    #[serde(rename = "Новолуние")]
    NewMoon,
    /// Thin lit crescent after the new moon.
    #[serde(rename = "Растущий серп")]
    WaxingCrescent,
    /// Half of the disc lit, waxing.
    #[serde(rename = "Первая четверть")]
    FirstQuarter,
    /// More than half lit, waxing.
    #[serde(rename = "Растущая луна")]
    WaxingGibbous,
    /// Fully lit disc.
    #[serde(rename = "Полнолуние")]
    FullMoon,
    /// More than half lit, waning.
    #[serde(rename = "Убывающая луна")]
    WaningGibbous,
    /// Half of the disc lit, waning.
    #[serde(rename = "Последняя четверть")]
    LastQuarter,
    /// Thin lit crescent before the new moon.
    #[serde(rename = "Убывающий серп")]
    WaningCrescent,
}

impl PhaseName {
    /// All phases in cycle order, starting at the new moon.
    pub const ALL: [Self; 8] = [
        Self::NewMoon,
        Self::WaxingCrescent,
        Self::FirstQuarter,
        Self::WaxingGibbous,
        Self::FullMoon,
        Self::WaningGibbous,
        Self::LastQuarter,
        Self::WaningCrescent,
    ];

    /// Russian display name, identical to the serialized form.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::NewMoon => "Новолуние",
            Self::WaxingCrescent => "Растущий серп",
            Self::FirstQuarter => "Первая четверть",
            Self::WaxingGibbous => "Растущая луна",
            Self::FullMoon => "Полнолуние",
            Self::WaningGibbous => "Убывающая луна",
            Self::LastQuarter => "Последняя четверть",
            Self::WaningCrescent => "Убывающий серп",
        }
    }

    /// English `snake_case` alias, accepted by [`FromStr`] for query strings.
    pub const fn alias(self) -> &'static str {
        match self {
            Self::NewMoon => "new_moon",
            Self::WaxingCrescent => "waxing_crescent",
            Self::FirstQuarter => "first_quarter",
            Self::WaxingGibbous => "waxing_gibbous",
            Self::FullMoon => "full_moon",
            Self::WaningGibbous => "waning_gibbous",
            Self::LastQuarter => "last_quarter",
            Self::WaningCrescent => "waning_crescent",
        }
    }

    /// Conventional emoji for the phase.
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::NewMoon => "🌑",
            Self::WaxingCrescent => "🌒",
            Self::FirstQuarter => "🌓",
            Self::WaxingGibbous => "🌔",
            Self::FullMoon => "🌕",
            Self::WaningGibbous => "🌖",
            Self::LastQuarter => "🌗",
            Self::WaningCrescent => "🌘",
        }
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Returned when a string names no known phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase name: {0}")]
pub struct UnknownPhaseName(pub String);

impl FromStr for PhaseName {
    type Err = UnknownPhaseName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|phase| {
                phase.display_name() == trimmed || phase.alias().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| UnknownPhaseName(trimmed.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn event_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&EventType::FullMoon).unwrap();
        assert_eq!(json, "\"FULL_MOON\"");
        let json = serde_json::to_string(&EventType::NewMoon).unwrap();
        assert_eq!(json, "\"NEW_MOON\"");
    }

    #[test]
    fn phase_name_uses_display_name_on_the_wire() {
        let json = serde_json::to_string(&PhaseName::FullMoon).unwrap();
        assert_eq!(json, "\"Полнолуние\"");
        let back: PhaseName = serde_json::from_str("\"Последняя четверть\"").unwrap();
        assert_eq!(back, PhaseName::LastQuarter);
    }

    #[test]
    fn display_name_matches_serde_rename_for_every_phase() {
        for phase in PhaseName::ALL {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{}\"", phase.display_name()));
        }
    }

    #[test]
    fn parse_accepts_display_name_and_alias() {
        assert_eq!("Полнолуние".parse::<PhaseName>().unwrap(), PhaseName::FullMoon);
        assert_eq!("FULL_MOON".parse::<PhaseName>().unwrap(), PhaseName::FullMoon);
        assert_eq!(" new_moon ".parse::<PhaseName>().unwrap(), PhaseName::NewMoon);
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = "Blue moon".parse::<PhaseName>().unwrap_err();
        assert_eq!(err, UnknownPhaseName(String::from("Blue moon")));
    }

    #[test]
    fn event_type_maps_to_phase() {
        assert_eq!(EventType::NewMoon.phase_name(), PhaseName::NewMoon);
        assert_eq!(EventType::FullMoon.phase_name(), PhaseName::FullMoon);
    }
}
