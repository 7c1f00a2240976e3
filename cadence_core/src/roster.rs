//! The roster: the patient collection and the operations that change it.
//!
//! Every mutation computes a patient's complete new session list first and
//! then swaps it in, so a failed operation never leaves a half-updated list.
//! Session lists are re-sorted by date and time after every insert or move,
//! which keeps the "last session" anchor used for makeups well defined.

use crate::holidays::apply_holidays;
use crate::makeup::append_makeup;
use crate::regenerate::regenerate;
use crate::{
    generate, sort_chronologically, ClockTime, DayStats, Error, HolidayMap, IdAllocator,
    Location, Patient, Result, Session, SessionStatus, StartConfig,
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Everything needed to create a patient
#[derive(Clone, Debug)]
pub struct PatientDraft {
    pub name: String,
    pub nomenclature: String,
    pub location: Location,
    pub address: Option<String>,
    pub start_config: StartConfig,
}

/// Result of a start configuration edit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    /// New configuration equals the current one
    Unchanged,
    /// The caller declined; configuration and sessions are untouched
    Declined,
    Regenerated { discarded: usize, generated: usize },
}

/// Completed (or validated) sessions over all non-cancelled sessions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn of(patient: &Patient) -> Self {
        let active: Vec<_> = patient.sessions.iter().filter(|s| !s.is_cancelled()).collect();
        Self {
            completed: active.iter().filter(|s| s.counts_as_completed()).count(),
            total: active.len(),
        }
    }

    /// Rounded percentage, 0 when there is nothing to count
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            0
        } else {
            ((self.completed as f64 / self.total as f64) * 100.0).round() as u32
        }
    }
}

/// All patients and the merged holiday map
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub holidays: HolidayMap,
}

impl Roster {
    /// Create a patient and generate their initial sessions.
    ///
    /// A configuration that yields no sessions at all is rejected as invalid
    /// input rather than stored as an empty course.
    pub fn create_patient<A>(&mut self, draft: PatientDraft, ids: &mut A) -> Result<&Patient>
    where
        A: IdAllocator + ?Sized,
    {
        if draft.name.trim().is_empty() {
            return Err(Error::Validation("Patient name cannot be empty".into()));
        }
        draft.start_config.validate()?;

        let id = ids.next_id();
        let mut start_config = draft.start_config;
        start_config.schedule.sort_by_key(|s| s.day);

        let sessions = generate(&id, &start_config, 0, ids);
        if sessions.is_empty() {
            return Err(Error::Validation(
                "This schedule produces zero sessions; check the weekdays and dates".into(),
            ));
        }

        tracing::info!(
            "Created patient {} ({}) with {} sessions",
            id,
            draft.name,
            sessions.len()
        );

        self.patients.push(Patient {
            id,
            name: draft.name,
            nomenclature: draft.nomenclature,
            location: draft.location,
            address: draft.address,
            start_config,
            sessions,
        });

        let idx = self.patients.len() - 1;
        Ok(&self.patients[idx])
    }

    pub fn patient(&self, patient_id: &str) -> Result<&Patient> {
        self.patients
            .iter()
            .find(|p| p.id == patient_id)
            .ok_or_else(|| Error::PatientNotFound(patient_id.to_string()))
    }

    fn patient_mut(&mut self, patient_id: &str) -> Result<&mut Patient> {
        self.patients
            .iter_mut()
            .find(|p| p.id == patient_id)
            .ok_or_else(|| Error::PatientNotFound(patient_id.to_string()))
    }

    /// Change a session's status.
    ///
    /// Moving a session of a count-bounded patient into `Absent` appends
    /// exactly one makeup session, which is returned. Locked sessions cannot
    /// change status.
    pub fn update_session_status<A>(
        &mut self,
        patient_id: &str,
        session_id: &str,
        status: SessionStatus,
        today: NaiveDate,
        ids: &mut A,
    ) -> Result<Option<Session>>
    where
        A: IdAllocator + ?Sized,
    {
        let patient = self.patient_mut(patient_id)?;
        let idx = editable_session_index(patient, session_id)?;
        let previous = patient.sessions[idx].status;

        let mut sessions = patient.sessions.clone();
        sessions[idx].status = status;

        let makeup = if status == SessionStatus::Absent
            && previous != SessionStatus::Absent
            && patient.is_count_bounded()
        {
            let staged = Patient {
                sessions: sessions.clone(),
                ..patient.clone()
            };
            Some(append_makeup(&staged, today, ids))
        } else {
            None
        };

        if let Some(ref m) = makeup {
            sessions.push(m.clone());
        }
        sort_chronologically(&mut sessions);
        patient.sessions = sessions;

        tracing::info!(
            "Session {} of patient {}: {} -> {}",
            session_id,
            patient_id,
            previous,
            status
        );

        Ok(makeup)
    }

    /// Validate (lock) or unvalidate a session
    pub fn set_session_locked(
        &mut self,
        patient_id: &str,
        session_id: &str,
        locked: bool,
    ) -> Result<()> {
        let patient = self.patient_mut(patient_id)?;
        let idx = session_index(patient, session_id)?;
        patient.sessions[idx].is_locked = locked;
        tracing::info!(
            "Session {} of patient {} {}",
            session_id,
            patient_id,
            if locked { "locked" } else { "unlocked" }
        );
        Ok(())
    }

    /// Move an unlocked session to another date and time
    pub fn reschedule_session(
        &mut self,
        patient_id: &str,
        session_id: &str,
        date: NaiveDate,
        time: ClockTime,
    ) -> Result<()> {
        let patient = self.patient_mut(patient_id)?;
        let idx = editable_session_index(patient, session_id)?;

        let mut sessions = patient.sessions.clone();
        sessions[idx].date = date;
        sessions[idx].time = time;
        sort_chronologically(&mut sessions);
        patient.sessions = sessions;

        tracing::info!(
            "Moved session {} of patient {} to {} {}",
            session_id,
            patient_id,
            date,
            time
        );
        Ok(())
    }

    /// Replace a patient's start configuration and regenerate the future.
    ///
    /// `confirm` is asked before anything is discarded; declining leaves the
    /// patient exactly as it was.
    pub fn edit_start_config<A, F>(
        &mut self,
        patient_id: &str,
        new_config: StartConfig,
        today: NaiveDate,
        ids: &mut A,
        confirm: F,
    ) -> Result<EditOutcome>
    where
        A: IdAllocator + ?Sized,
        F: FnOnce(&Patient) -> bool,
    {
        new_config.validate()?;
        let mut new_config = new_config;
        new_config.schedule.sort_by_key(|s| s.day);

        let patient = self.patient_mut(patient_id)?;
        if patient.start_config == new_config {
            return Ok(EditOutcome::Unchanged);
        }

        if !confirm(&*patient) {
            tracing::info!("Regeneration for patient {} declined", patient_id);
            return Ok(EditOutcome::Declined);
        }

        let sessions = regenerate(patient, &new_config, today, ids);

        let old_ids: HashSet<&str> = patient.sessions.iter().map(|s| s.id.as_str()).collect();
        let kept = sessions
            .iter()
            .filter(|s| old_ids.contains(s.id.as_str()))
            .count();
        let outcome = EditOutcome::Regenerated {
            discarded: patient.sessions.len() - kept,
            generated: sessions.len() - kept,
        };

        patient.start_config = new_config;
        patient.sessions = sessions;
        Ok(outcome)
    }

    /// Merge `holidays` into the roster and apply the merged map to everyone.
    ///
    /// Returns the number of sessions marked absent and makeups added.
    pub fn sync_holidays<A>(
        &mut self,
        holidays: HolidayMap,
        today: NaiveDate,
        ids: &mut A,
    ) -> (usize, usize)
    where
        A: IdAllocator + ?Sized,
    {
        self.holidays.extend(holidays);

        let mut marked = 0;
        let mut makeups = 0;
        for patient in self.patients.iter_mut() {
            let sync = apply_holidays(patient, &self.holidays, today, ids);
            if sync.marked_absent == 0 {
                continue;
            }
            marked += sync.marked_absent;
            makeups += sync.makeups;

            let mut sessions = sync.sessions;
            sort_chronologically(&mut sessions);
            patient.sessions = sessions;
        }

        tracing::info!(
            "Holiday sync: {} known holidays, {} sessions marked absent, {} makeups",
            self.holidays.len(),
            marked,
            makeups
        );
        (marked, makeups)
    }

    /// Non-cancelled sessions on `date`, ordered by time
    pub fn sessions_on(&self, date: NaiveDate) -> Vec<(&Patient, &Session)> {
        let mut day: Vec<_> = self
            .patients
            .iter()
            .flat_map(|p| p.sessions.iter().map(move |s| (p, s)))
            .filter(|(_, s)| s.date == date && !s.is_cancelled())
            .collect();
        day.sort_by_key(|(_, s)| s.time);
        day
    }

    pub fn day_stats(&self, date: NaiveDate) -> DayStats {
        let day = self.sessions_on(date);
        DayStats {
            date,
            total_scheduled: day.len(),
            total_completed: day.iter().filter(|(_, s)| s.counts_as_completed()).count(),
            total_locked: day.iter().filter(|(_, s)| s.is_locked).count(),
        }
    }

    /// Patients whose last non-cancelled session falls within the next
    /// `window_days` days (exclusive of today)
    pub fn expiring(&self, today: NaiveDate, window_days: i64) -> Vec<&Patient> {
        let horizon = today + Duration::days(window_days);
        self.patients
            .iter()
            .filter(|p| {
                p.sessions
                    .iter()
                    .filter(|s| !s.is_cancelled())
                    .map(|s| s.date)
                    .max()
                    .is_some_and(|last| last > today && last <= horizon)
            })
            .collect()
    }

    /// Case-insensitive name search
    pub fn search(&self, term: &str) -> Vec<&Patient> {
        let needle = term.to_lowercase();
        self.patients
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .collect()
    }
}

fn session_index(patient: &Patient, session_id: &str) -> Result<usize> {
    patient
        .sessions
        .iter()
        .position(|s| s.id == session_id)
        .ok_or_else(|| Error::SessionNotFound {
            patient_id: patient.id.clone(),
            session_id: session_id.to_string(),
        })
}

/// Like `session_index`, but refuses validated sessions
fn editable_session_index(patient: &Patient, session_id: &str) -> Result<usize> {
    let idx = session_index(patient, session_id)?;
    if patient.sessions[idx].is_locked {
        return Err(Error::SessionLocked(session_id.to_string()));
    }
    Ok(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DurationPolicy, ScheduleConfig, SequentialIds};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn draft(name: &str, duration: DurationPolicy) -> PatientDraft {
        PatientDraft {
            name: name.into(),
            nomenclature: "AMK 10".into(),
            location: Location::Cabinet,
            address: None,
            start_config: StartConfig {
                start_date: date("2024-01-01"),
                schedule: vec![
                    ScheduleConfig::new(3, "14:00".parse().unwrap()).unwrap(),
                    ScheduleConfig::new(1, "09:00".parse().unwrap()).unwrap(),
                ],
                duration,
            },
        }
    }

    fn roster_with(duration: DurationPolicy) -> (Roster, String, SequentialIds) {
        crate::logging::init_test();
        let mut roster = Roster::default();
        let mut ids = SequentialIds::new("id");
        let id = roster
            .create_patient(draft("Alice Martin", duration), &mut ids)
            .unwrap()
            .id
            .clone();
        (roster, id, ids)
    }

    #[test]
    fn test_create_patient_generates_sessions() {
        let (roster, id, _) = roster_with(DurationPolicy::SessionCount { total: 4 });
        let patient = roster.patient(&id).unwrap();

        assert_eq!(patient.sessions.len(), 4);
        assert_eq!(patient.start_config.schedule[0].day, 1);
        assert_eq!(patient.sessions[0].date, date("2024-01-01"));
    }

    #[test]
    fn test_create_patient_rejects_zero_sessions() {
        let mut roster = Roster::default();
        let mut d = draft("Bob", DurationPolicy::DateRange {
            end_date: date("2024-01-02"),
        });
        d.start_config.start_date = date("2024-01-02"); // Tuesday, range ends same day

        let result = roster.create_patient(d, &mut SequentialIds::default());
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(roster.patients.is_empty());
    }

    #[test]
    fn test_create_patient_rejects_blank_name() {
        let mut roster = Roster::default();
        let result = roster.create_patient(
            draft("  ", DurationPolicy::SessionCount { total: 4 }),
            &mut SequentialIds::default(),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_absence_adds_one_makeup() {
        let (mut roster, id, mut ids) = roster_with(DurationPolicy::SessionCount { total: 4 });
        let second = roster.patient(&id).unwrap().sessions[1].id.clone();

        let makeup = roster
            .update_session_status(&id, &second, SessionStatus::Absent, date("2024-01-01"), &mut ids)
            .unwrap()
            .expect("count-bounded absence yields a makeup");

        assert_eq!(makeup.date, date("2024-01-15"));
        assert_eq!(roster.patient(&id).unwrap().sessions.len(), 5);

        // Marking absent again is not a new transition
        let again = roster
            .update_session_status(&id, &second, SessionStatus::Absent, date("2024-01-01"), &mut ids)
            .unwrap();
        assert!(again.is_none());
        assert_eq!(roster.patient(&id).unwrap().sessions.len(), 5);
    }

    #[test]
    fn test_absence_on_date_range_patient_adds_nothing() {
        let (mut roster, id, mut ids) = roster_with(DurationPolicy::DateRange {
            end_date: date("2024-01-31"),
        });
        let first = roster.patient(&id).unwrap().sessions[0].id.clone();
        let before = roster.patient(&id).unwrap().sessions.len();

        let makeup = roster
            .update_session_status(&id, &first, SessionStatus::Absent, date("2024-01-01"), &mut ids)
            .unwrap();

        assert!(makeup.is_none());
        assert_eq!(roster.patient(&id).unwrap().sessions.len(), before);
    }

    #[test]
    fn test_locked_session_rejects_edits() {
        let (mut roster, id, mut ids) = roster_with(DurationPolicy::SessionCount { total: 4 });
        let first = roster.patient(&id).unwrap().sessions[0].id.clone();

        roster.set_session_locked(&id, &first, true).unwrap();

        let status = roster.update_session_status(
            &id,
            &first,
            SessionStatus::Absent,
            date("2024-01-01"),
            &mut ids,
        );
        assert!(matches!(status, Err(Error::SessionLocked(_))));

        let moved = roster.reschedule_session(&id, &first, date("2024-01-02"), "10:00".parse().unwrap());
        assert!(matches!(moved, Err(Error::SessionLocked(_))));

        roster.set_session_locked(&id, &first, false).unwrap();
        roster
            .update_session_status(&id, &first, SessionStatus::Completed, date("2024-01-01"), &mut ids)
            .unwrap();
    }

    #[test]
    fn test_reschedule_keeps_list_sorted() {
        let (mut roster, id, _) = roster_with(DurationPolicy::SessionCount { total: 4 });
        let first = roster.patient(&id).unwrap().sessions[0].id.clone();

        roster
            .reschedule_session(&id, &first, date("2024-02-01"), "08:00".parse().unwrap())
            .unwrap();

        let sessions = &roster.patient(&id).unwrap().sessions;
        assert_eq!(sessions.last().unwrap().id, first);
        for pair in sessions.windows(2) {
            assert!(pair[0].slot() <= pair[1].slot());
        }
    }

    #[test]
    fn test_edit_start_config_outcomes() {
        let (mut roster, id, mut ids) = roster_with(DurationPolicy::SessionCount { total: 4 });
        let current = roster.patient(&id).unwrap().start_config.clone();
        let today = date("2024-01-02");

        let unchanged = roster
            .edit_start_config(&id, current.clone(), today, &mut ids, |_| panic!("not asked"))
            .unwrap();
        assert_eq!(unchanged, EditOutcome::Unchanged);

        let mut longer = current.clone();
        longer.duration = DurationPolicy::SessionCount { total: 6 };

        let declined = roster
            .edit_start_config(&id, longer.clone(), today, &mut ids, |_| false)
            .unwrap();
        assert_eq!(declined, EditOutcome::Declined);
        assert_eq!(roster.patient(&id).unwrap().start_config, current);

        let outcome = roster
            .edit_start_config(&id, longer.clone(), today, &mut ids, |_| true)
            .unwrap();
        // 01-01 is kept (past); 01-03, 01-08, 01-10 are rebuilt; none consumed
        assert_eq!(
            outcome,
            EditOutcome::Regenerated {
                discarded: 3,
                generated: 6
            }
        );
        let patient = roster.patient(&id).unwrap();
        assert_eq!(patient.start_config, longer);
        assert_eq!(patient.sessions.len(), 7);
    }

    #[test]
    fn test_sync_holidays_merges_and_applies() {
        let (mut roster, id, mut ids) = roster_with(DurationPolicy::SessionCount { total: 4 });
        let mut map = HolidayMap::new();
        map.insert(date("2024-01-01"), "Jour de l'an".into());

        let (marked, makeups) = roster.sync_holidays(map.clone(), date("2023-12-01"), &mut ids);
        assert_eq!((marked, makeups), (1, 1));
        assert_eq!(roster.holidays.len(), 1);

        let patient = roster.patient(&id).unwrap();
        assert_eq!(patient.sessions[0].status, SessionStatus::Absent);
        assert_eq!(patient.sessions.last().unwrap().date, date("2024-01-15"));

        let (marked, makeups) = roster.sync_holidays(map, date("2023-12-01"), &mut ids);
        assert_eq!((marked, makeups), (0, 0));
    }

    #[test]
    fn test_day_views_skip_cancelled() {
        let (mut roster, id, mut ids) = roster_with(DurationPolicy::SessionCount { total: 4 });
        let first = roster.patient(&id).unwrap().sessions[0].id.clone();
        let third = roster.patient(&id).unwrap().sessions[2].id.clone();

        roster
            .update_session_status(&id, &third, SessionStatus::Cancelled, date("2024-01-01"), &mut ids)
            .unwrap();
        roster
            .update_session_status(&id, &first, SessionStatus::Completed, date("2024-01-01"), &mut ids)
            .unwrap();
        roster.set_session_locked(&id, &first, true).unwrap();

        assert!(roster.sessions_on(date("2024-01-08")).is_empty());

        let stats = roster.day_stats(date("2024-01-01"));
        assert_eq!(stats.total_scheduled, 1);
        assert_eq!(stats.total_completed, 1);
        assert_eq!(stats.total_locked, 1);

        let progress = Progress::of(roster.patient(&id).unwrap());
        assert_eq!(progress, Progress { completed: 1, total: 3 });
        assert_eq!(progress.percent(), 33);
    }

    #[test]
    fn test_expiring_and_search() {
        let (roster, _, _) = roster_with(DurationPolicy::SessionCount { total: 4 });

        // Last session is 2024-01-10
        assert_eq!(roster.expiring(date("2024-01-01"), 30).len(), 1);
        assert!(roster.expiring(date("2024-01-10"), 30).is_empty());
        assert!(roster.expiring(date("2023-11-01"), 30).is_empty());

        assert_eq!(roster.search("alice").len(), 1);
        assert!(roster.search("zoe").is_empty());
    }

    #[test]
    fn test_unknown_ids_are_reported() {
        let (mut roster, id, mut ids) = roster_with(DurationPolicy::SessionCount { total: 4 });

        assert!(matches!(roster.patient("nope"), Err(Error::PatientNotFound(_))));
        let missing = roster.update_session_status(
            &id,
            "nope",
            SessionStatus::Completed,
            date("2024-01-01"),
            &mut ids,
        );
        assert!(matches!(missing, Err(Error::SessionNotFound { .. })));
    }
}
