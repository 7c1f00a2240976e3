//! Core domain types for the Cadence scheduler.
//!
//! This module defines the fundamental types used throughout the system:
//! - Weekly schedule entries and clock times
//! - Duration policies and start configurations
//! - Sessions and their lifecycle status
//! - Patients and per-day statistics
//!
//! Field names serialize in camelCase and enums in SCREAMING_SNAKE_CASE so
//! that previously stored documents keep loading unchanged.

use crate::{Error, Result};
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Calendar Primitives
// ============================================================================

/// Weekday index of a date, 0 = Sunday through 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// A 24-hour wall clock time with minute precision, written `HH:MM`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Time `minutes` past midnight, wrapping at 24 hours
    pub fn from_minutes(minutes: u32) -> Self {
        let minutes = i64::from(minutes % (24 * 60));
        Self(NaiveTime::default() + chrono::Duration::minutes(minutes))
    }

    /// 12:00, the default slot when nothing better is known
    pub fn noon() -> Self {
        Self::from_minutes(12 * 60)
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Self)
            .map_err(|e| Error::Validation(format!("Invalid time '{}': {}", s, e)))
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Schedule Configuration
// ============================================================================

/// One weekly slot: a weekday (0 = Sunday) and the time the session starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub day: u8,
    pub time: ClockTime,
}

impl ScheduleConfig {
    pub fn new(day: u8, time: ClockTime) -> Result<Self> {
        if day > 6 {
            return Err(Error::Validation(format!(
                "Weekday must be between 0 (Sunday) and 6 (Saturday), got {}",
                day
            )));
        }
        Ok(Self { day, time })
    }
}

/// When a course of sessions ends
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "durationType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DurationPolicy {
    /// A contracted number of sessions
    SessionCount {
        #[serde(rename = "totalSessions")]
        total: u32,
    },
    /// Every matching weekday up to and including `end_date`
    DateRange {
        #[serde(rename = "endDate")]
        end_date: NaiveDate,
    },
}

/// The cadence a patient's sessions are generated from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartConfig {
    pub start_date: NaiveDate,
    pub schedule: Vec<ScheduleConfig>,
    #[serde(flatten)]
    pub duration: DurationPolicy,
}

impl StartConfig {
    /// Check the configuration is well formed before it reaches the engine.
    pub fn validate(&self) -> Result<()> {
        if self.schedule.is_empty() {
            return Err(Error::Validation(
                "Select at least one weekday for the schedule".into(),
            ));
        }

        let mut seen = [false; 7];
        for entry in &self.schedule {
            let idx = usize::from(entry.day);
            if idx > 6 {
                return Err(Error::Validation(format!(
                    "Weekday must be between 0 and 6, got {}",
                    entry.day
                )));
            }
            if seen[idx] {
                return Err(Error::Validation(format!(
                    "Weekday {} appears more than once in the schedule",
                    entry.day
                )));
            }
            seen[idx] = true;
        }

        match self.duration {
            DurationPolicy::SessionCount { total } if total == 0 => Err(Error::Validation(
                "Total sessions must be at least 1".into(),
            )),
            DurationPolicy::DateRange { end_date } if end_date < self.start_date => {
                Err(Error::Validation(format!(
                    "End date {} is before start date {}",
                    end_date, self.start_date
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn is_count_bounded(&self) -> bool {
        matches!(self.duration, DurationPolicy::SessionCount { .. })
    }
}

// ============================================================================
// Session and Patient Types
// ============================================================================

/// Lifecycle state of a session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    Scheduled,
    /// The session took place
    Completed,
    /// Patient missed or cancelled it
    Absent,
    /// Removed from the calendar, kept for audit
    Cancelled,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Completed => "completed",
            SessionStatus::Absent => "absent",
            SessionStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

impl FromStr for SessionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(SessionStatus::Scheduled),
            "completed" | "done" => Ok(SessionStatus::Completed),
            "absent" => Ok(SessionStatus::Absent),
            "cancelled" | "canceled" => Ok(SessionStatus::Cancelled),
            other => Err(Error::Validation(format!("Unknown session status: {}", other))),
        }
    }
}

/// One dated occurrence of a patient's weekly cadence
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub patient_id: String,
    pub date: NaiveDate,
    pub time: ClockTime,
    pub status: SessionStatus,
    /// Validated sessions are final and never touched by the engine
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Session {
    /// A fresh, unlocked session in the `Scheduled` state
    pub fn scheduled(
        id: impl Into<String>,
        patient_id: impl Into<String>,
        date: NaiveDate,
        time: ClockTime,
    ) -> Self {
        Self {
            id: id.into(),
            patient_id: patient_id.into(),
            date,
            time,
            status: SessionStatus::Scheduled,
            is_locked: false,
            notes: None,
        }
    }

    /// Locked sessions count as completed whatever their nominal status.
    pub fn counts_as_completed(&self) -> bool {
        self.is_locked || self.status == SessionStatus::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == SessionStatus::Cancelled
    }

    /// Sort key: date, then time of day
    pub fn slot(&self) -> (NaiveDate, ClockTime) {
        (self.date, self.time)
    }
}

/// Stable in-place sort of sessions by date then time.
pub fn sort_chronologically(sessions: &mut [Session]) {
    sessions.sort_by_key(Session::slot);
}

/// Where the sessions take place
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Location {
    #[default]
    Cabinet,
    Home,
}

/// A patient, their cadence, and every session generated for them
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub nomenclature: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub start_config: StartConfig,
    /// Ascending by (date, time)
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl Patient {
    pub fn is_count_bounded(&self) -> bool {
        self.start_config.is_count_bounded()
    }

    /// Sessions that count against a session budget (completed or locked)
    pub fn consumed(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.counts_as_completed())
            .count()
    }

    /// The chronologically last session, whatever its status
    pub fn last_session(&self) -> Option<&Session> {
        self.sessions.iter().max_by_key(|s| s.slot())
    }

    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == session_id)
    }
}

/// Per-day counts shown in the calendar views
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStats {
    pub date: NaiveDate,
    pub total_scheduled: usize,
    pub total_completed: usize,
    pub total_locked: usize,
}
