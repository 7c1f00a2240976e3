//! Makeup sessions for count-bounded patients.
//!
//! When a session of a `SessionCount` patient turns `Absent`, one replacement
//! is appended after the patient's last session so the contracted total stays
//! reachable. Absences move the end of the course later in time; they never
//! shrink it.

use crate::generator::slot_time;
use crate::{ClockTime, IdAllocator, Patient, Session};
use chrono::NaiveDate;

/// Maximum number of days searched for a matching weekday
pub const MAX_MAKEUP_SEARCH_DAYS: usize = 365;

/// Note attached to every makeup session
pub const MAKEUP_NOTE: &str = "Rescheduled (Makeup)";

/// Build the next makeup session for `patient`.
///
/// The search starts the day after the chronologically last session (or at
/// `today` when the patient has none) and takes the first day whose weekday
/// has a schedule entry.
///
/// ## Degraded result
///
/// If no weekday matches within [`MAX_MAKEUP_SEARCH_DAYS`] (only possible with
/// an empty schedule) the session is dated `today` at 12:00 instead of
/// failing. The caller can spot it by its date.
pub fn append_makeup<A>(patient: &Patient, today: NaiveDate, ids: &mut A) -> Session
where
    A: IdAllocator + ?Sized,
{
    let search_start = match patient.last_session() {
        Some(last) => last.date.succ_opt().unwrap_or(last.date),
        None => today,
    };

    let found = search_start
        .iter_days()
        .take(MAX_MAKEUP_SEARCH_DAYS)
        .find_map(|date| {
            slot_time(&patient.start_config.schedule, date).map(|time| (date, time))
        });

    let (date, time) = match found {
        Some(slot) => slot,
        None => {
            tracing::warn!(
                "No schedule slot within {} days for patient {}, falling back to {} at noon",
                MAX_MAKEUP_SEARCH_DAYS,
                patient.id,
                today
            );
            (today, ClockTime::noon())
        }
    };

    let mut session = Session::scheduled(ids.next_id(), patient.id.as_str(), date, time);
    session.notes = Some(MAKEUP_NOTE.to_string());

    tracing::info!(
        "Makeup session for patient {} on {} at {}",
        patient.id,
        session.date,
        session.time
    );

    session
}
