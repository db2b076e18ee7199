//! Shared type definitions for the lunar calendar service.
//!
//! Types defined here are used by the core, the HTTP boundary, and
//! (through `ts-rs` bindings) by UI collaborators.
//!
//! # Modules
//!
//! - [`enums`] -- Event classification and named phases
//! - [`event`] -- Generated lunar events and cache snapshots
//! - [`phase`] -- Phase-table records, moon times, and lookup results

pub mod enums;
pub mod event;
pub mod phase;

pub use enums::{EventType, PhaseName, UnknownPhaseName};
pub use event::{EventSnapshot, LunarEvent};
pub use phase::{
    MoonTimes, NextPhase, PhaseRecord, ResolvedPhase, SYNODIC_MONTH_DAYS, WAXING_AGE_LIMIT_DAYS,
};
