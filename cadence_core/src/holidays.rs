//! Holiday-driven cancellation.
//!
//! Holiday maps come from an external provider as JSON objects keyed by ISO
//! date (`{"2024-05-01": "Fête du Travail"}`), one per year. They are merged
//! and then applied to each patient: every scheduled session on a holiday is
//! marked absent, and count-bounded patients receive one makeup per absence.

use crate::makeup::{append_makeup, MAX_MAKEUP_SEARCH_DAYS};
use crate::{IdAllocator, Patient, Result, Session, SessionStatus};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;

/// Holiday display names keyed by date
pub type HolidayMap = BTreeMap<NaiveDate, String>;

/// Outcome of applying a holiday map to one patient
#[derive(Clone, Debug, PartialEq)]
pub struct HolidaySync {
    /// The patient's full replacement session list
    pub sessions: Vec<Session>,
    pub marked_absent: usize,
    pub makeups: usize,
}

/// Note recorded on a session that fell on a holiday
pub fn holiday_note(name: &str) -> String {
    format!("Holiday: {}", name)
}

/// Load a holiday map from a JSON file
pub fn load_holiday_file(path: &Path) -> Result<HolidayMap> {
    let contents = std::fs::read_to_string(path)?;
    let map: HolidayMap = serde_json::from_str(&contents)?;
    tracing::info!("Loaded {} holidays from {:?}", map.len(), path);
    Ok(map)
}

/// Apply `holidays` to `patient`'s sessions.
///
/// Sessions are visited in list order. Scheduled, unlocked sessions dated on a
/// holiday become `Absent`. For `SessionCount` patients one makeup is then
/// appended per absence, one after another, so each new session anchors the
/// next. A makeup that itself lands on a holiday is marked absent and replaced
/// in turn. Running the same map again is a no-op.
pub fn apply_holidays<A>(
    patient: &Patient,
    holidays: &HolidayMap,
    today: NaiveDate,
    ids: &mut A,
) -> HolidaySync
where
    A: IdAllocator + ?Sized,
{
    let mut working = patient.clone();
    let mut marked_absent = 0;

    for session in working.sessions.iter_mut() {
        if session.status != SessionStatus::Scheduled || session.is_locked {
            continue;
        }
        if let Some(name) = holidays.get(&session.date) {
            session.status = SessionStatus::Absent;
            session.notes = Some(holiday_note(name));
            marked_absent += 1;
            tracing::debug!(
                "Session {} of patient {} falls on {} ({})",
                session.id,
                patient.id,
                session.date,
                name
            );
        }
    }

    let mut makeups = 0;
    if working.is_count_bounded() {
        let mut pending = marked_absent;
        let mut hops = 0;
        while pending > 0 {
            let mut makeup = append_makeup(&working, today, ids);
            pending -= 1;
            match holidays.get(&makeup.date) {
                Some(name) if hops < MAX_MAKEUP_SEARCH_DAYS => {
                    makeup.status = SessionStatus::Absent;
                    makeup.notes = Some(holiday_note(name));
                    marked_absent += 1;
                    pending += 1;
                    hops += 1;
                }
                Some(name) => tracing::warn!(
                    "Makeup for patient {} left on {} ({}): holiday chain too long",
                    patient.id,
                    makeup.date,
                    name
                ),
                None => {}
            }
            working.sessions.push(makeup);
            makeups += 1;
        }
    }

    if marked_absent > 0 {
        tracing::info!(
            "Patient {}: {} sessions on holidays, {} makeups added",
            patient.id,
            marked_absent,
            makeups
        );
    }

    HolidaySync {
        sessions: working.sessions,
        marked_absent,
        makeups,
    }
}
