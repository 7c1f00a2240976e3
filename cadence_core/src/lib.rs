#![forbid(unsafe_code)]

//! Core domain model and scheduling engine for Cadence.
//!
//! This crate provides:
//! - Domain types (schedules, duration policies, sessions, patients)
//! - The session engine (occurrence generation, makeup sessions, regeneration)
//! - Holiday-driven cancellation
//! - The roster orchestration layer
//! - Persistence (versioned JSON document, legacy migration, CSV export)

pub mod types;
pub mod error;
pub mod ids;
pub mod generator;
pub mod makeup;
pub mod regenerate;
pub mod holidays;
pub mod roster;
pub mod migrate;
pub mod store;
pub mod export;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use ids::{IdAllocator, SequentialIds, UuidIds};
pub use generator::{generate, MAX_GENERATION_DAYS};
pub use makeup::{append_makeup, MAKEUP_NOTE, MAX_MAKEUP_SEARCH_DAYS};
pub use regenerate::regenerate;
pub use holidays::{apply_holidays, HolidayMap, HolidaySync};
pub use roster::{EditOutcome, PatientDraft, Progress, Roster};
pub use store::RosterStore;
pub use config::Config;
