//! Occurrence generator: expands a weekly cadence into dated sessions.
//!
//! The cursor walks forward one calendar day at a time from the start date
//! and emits a session on every day whose weekday has a schedule entry.
//!
//! ## Safety bound
//!
//! The cursor never visits more than [`MAX_GENERATION_DAYS`] days. A schedule
//! with no entries therefore yields zero sessions instead of looping forever,
//! and a very long date range is cut short at the bound. Callers that need at
//! least one session must check for an empty result themselves.

use crate::{weekday_index, ClockTime, DurationPolicy, IdAllocator, ScheduleConfig, Session, StartConfig};
use chrono::NaiveDate;

/// Maximum number of calendar days the generation cursor may visit
pub const MAX_GENERATION_DAYS: usize = 500;

/// Time of the schedule entry matching `date`'s weekday, if there is one.
pub fn slot_time(schedule: &[ScheduleConfig], date: NaiveDate) -> Option<ClockTime> {
    let day = weekday_index(date);
    schedule.iter().find(|s| s.day == day).map(|s| s.time)
}

/// Generate the sessions described by `config`.
///
/// `already_counted` seeds the running count for `SessionCount` policies, so
/// a budget of `total` yields at most `total - already_counted` sessions.
/// It has no effect on `DateRange` policies.
///
/// Output is ordered by date. The function is pure apart from id allocation.
pub fn generate<A>(
    patient_id: &str,
    config: &StartConfig,
    already_counted: usize,
    ids: &mut A,
) -> Vec<Session>
where
    A: IdAllocator + ?Sized,
{
    let end_date = match config.duration {
        DurationPolicy::DateRange { end_date } => Some(end_date),
        DurationPolicy::SessionCount { .. } => None,
    };

    let remaining = match config.duration {
        DurationPolicy::SessionCount { total } => (total as usize).saturating_sub(already_counted),
        DurationPolicy::DateRange { .. } => usize::MAX,
    };

    let sessions: Vec<Session> = config
        .start_date
        .iter_days()
        .take(MAX_GENERATION_DAYS)
        .take_while(|date| end_date.map_or(true, |end| *date <= end))
        .filter_map(|date| slot_time(&config.schedule, date).map(|time| (date, time)))
        .take(remaining)
        .map(|(date, time)| Session::scheduled(ids.next_id(), patient_id, date, time))
        .collect();

    if hit_safety_bound(config, remaining, sessions.len()) {
        tracing::warn!(
            "Generation for patient {} stopped at the {}-day safety bound with {} sessions",
            patient_id,
            MAX_GENERATION_DAYS,
            sessions.len()
        );
    }

    tracing::debug!(
        "Generated {} sessions for patient {} from {} (already counted: {})",
        sessions.len(),
        patient_id,
        config.start_date,
        already_counted
    );

    sessions
}

fn hit_safety_bound(config: &StartConfig, remaining: usize, produced: usize) -> bool {
    match config.duration {
        DurationPolicy::SessionCount { .. } => produced < remaining,
        DurationPolicy::DateRange { end_date } => {
            let span = (end_date - config.start_date).num_days();
            span >= MAX_GENERATION_DAYS as i64
        }
    }
}
