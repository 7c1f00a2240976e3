//! Regeneration of a patient's future sessions after a cadence change.
//!
//! History is frozen: every session dated today or earlier, and every session
//! already interacted with (not `Scheduled`, or locked) whatever its date, is
//! carried over untouched. Only future, still-scheduled, unlocked sessions are
//! discarded and rebuilt from the new configuration.

use crate::generator::generate;
use crate::{sort_chronologically, IdAllocator, Patient, Session, SessionStatus, StartConfig};
use chrono::NaiveDate;

/// Compute the replacement session list for `patient` under `new_config`.
///
/// Completed and locked sessions in the frozen past consume budget for
/// `SessionCount` policies; absences do not. New sessions start tomorrow, or
/// at `new_config.start_date` when that is later. The result is sorted by
/// date then time.
pub fn regenerate<A>(
    patient: &Patient,
    new_config: &StartConfig,
    today: NaiveDate,
    ids: &mut A,
) -> Vec<Session>
where
    A: IdAllocator + ?Sized,
{
    let (past, discarded): (Vec<Session>, Vec<Session>) = patient
        .sessions
        .iter()
        .cloned()
        .partition(|s| is_frozen(s, today));

    let consumed = past.iter().filter(|s| s.counts_as_completed()).count();

    let tomorrow = today.succ_opt().unwrap_or(today);
    let effective = StartConfig {
        start_date: new_config.start_date.max(tomorrow),
        ..new_config.clone()
    };

    let generated = generate(&patient.id, &effective, consumed, ids);

    tracing::info!(
        "Regenerated patient {}: kept {}, discarded {}, generated {} from {} ({} consumed)",
        patient.id,
        past.len(),
        discarded.len(),
        generated.len(),
        effective.start_date,
        consumed
    );

    let mut sessions = past;
    sessions.extend(generated);
    sort_chronologically(&mut sessions);
    sessions
}

/// Whether a session belongs to the history regeneration must preserve.
fn is_frozen(session: &Session, today: NaiveDate) -> bool {
    session.status != SessionStatus::Scheduled || session.is_locked || session.date <= today
}
