//! Versioned-schema loading for stored rosters.
//!
//! Schema history:
//! - v1: a bare JSON array of patients. Older patients may carry
//!   `startConfig.selectedDays: [int]` instead of `schedule`, and their
//!   sessions may have no `time`.
//! - v2: `{"version": 2, "patients": [...], "holidays": {...}}`.
//!
//! Migration runs once, at load time. Everything past this module only ever
//! sees the current shape.

use crate::{ClockTime, Error, Result, Roster};
use serde_json::{json, Map, Value};

/// Schema version written by this build
pub const CURRENT_VERSION: u64 = 2;

/// Bring a stored document of any known version to the current [`Roster`].
///
/// `legacy_time` is used for schedule entries and sessions that predate
/// per-slot times.
pub fn migrate_document(value: Value, legacy_time: ClockTime) -> Result<Roster> {
    let (version, mut body) = match value {
        Value::Array(patients) => (1, json!({ "patients": patients })),
        Value::Object(map) => {
            let version = map.get("version").and_then(Value::as_u64).unwrap_or(1);
            (version, Value::Object(map))
        }
        other => {
            return Err(Error::Migration(format!(
                "Expected an object or array at the document root, found {}",
                type_name(&other)
            )))
        }
    };

    if version > CURRENT_VERSION {
        return Err(Error::Migration(format!(
            "Document version {} is newer than supported version {}",
            version, CURRENT_VERSION
        )));
    }

    if version < 2 {
        let legacy = legacy_time.to_string();
        let mut upgraded = 0;
        if let Some(patients) = body.get_mut("patients").and_then(Value::as_array_mut) {
            for patient in patients.iter_mut() {
                if upgrade_v1_patient(patient, &legacy) {
                    upgraded += 1;
                }
            }
        }
        tracing::info!(
            "Migrated document from v{} to v{} ({} patients upgraded)",
            version,
            CURRENT_VERSION,
            upgraded
        );
    }

    let roster: Roster = serde_json::from_value(body)?;
    Ok(roster)
}

/// Rewrite one v1 patient in place. Returns whether anything changed.
fn upgrade_v1_patient(patient: &mut Value, legacy_time: &str) -> bool {
    let mut changed = false;

    if let Some(config) = patient.get_mut("startConfig").and_then(Value::as_object_mut) {
        if let Some(days) = config.remove("selectedDays") {
            let schedule: Vec<Value> = days
                .as_array()
                .map(|days| {
                    days.iter()
                        .filter_map(Value::as_u64)
                        .map(|day| json!({ "day": day, "time": legacy_time }))
                        .collect()
                })
                .unwrap_or_default();
            config.insert("schedule".into(), Value::Array(schedule));
            changed = true;
        }
    }

    if let Some(sessions) = patient.get_mut("sessions").and_then(Value::as_array_mut) {
        for session in sessions.iter_mut().filter_map(Value::as_object_mut) {
            if fill_missing_time(session, legacy_time) {
                changed = true;
            }
        }
    }

    changed
}

fn fill_missing_time(session: &mut Map<String, Value>, legacy_time: &str) -> bool {
    let missing = match session.get("time") {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    };
    if missing {
        session.insert("time".into(), Value::String(legacy_time.to_string()));
    }
    missing
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DurationPolicy, SessionStatus};

    fn nine() -> ClockTime {
        "09:00".parse().unwrap()
    }

    #[test]
    fn test_legacy_selected_days_become_schedule() {
        let legacy = json!([{
            "id": "p1",
            "name": "Legacy Patient",
            "nomenclature": "AMK 7",
            "location": "HOME",
            "startConfig": {
                "startDate": "2023-09-04",
                "selectedDays": [1, 4],
                "durationType": "SESSION_COUNT",
                "totalSessions": 20
            },
            "sessions": [
                {"id": "s1", "patientId": "p1", "date": "2023-09-04", "status": "COMPLETED", "isLocked": true},
                {"id": "s2", "patientId": "p1", "date": "2023-09-07", "time": "", "status": "SCHEDULED", "isLocked": false}
            ]
        }]);

        let roster = migrate_document(legacy, nine()).unwrap();
        let patient = &roster.patients[0];

        assert_eq!(patient.start_config.schedule.len(), 2);
        assert_eq!(patient.start_config.schedule[1].day, 4);
        assert_eq!(patient.start_config.schedule[1].time, nine());
        assert_eq!(
            patient.start_config.duration,
            DurationPolicy::SessionCount { total: 20 }
        );
        assert!(patient.sessions.iter().all(|s| s.time == nine()));
        assert_eq!(patient.sessions[0].status, SessionStatus::Completed);
        assert!(roster.holidays.is_empty());
    }

    #[test]
    fn test_legacy_array_in_current_shape_loads() {
        let legacy = json!([{
            "id": "p1",
            "name": "Already Current",
            "startConfig": {
                "startDate": "2024-01-01",
                "schedule": [{"day": 2, "time": "11:15"}],
                "durationType": "DATE_RANGE",
                "endDate": "2024-02-01"
            },
            "sessions": []
        }]);

        let roster = migrate_document(legacy, nine()).unwrap();
        assert_eq!(roster.patients[0].start_config.schedule[0].time.to_string(), "11:15");
    }

    #[test]
    fn test_current_document_passes_through() {
        let doc = json!({
            "version": 2,
            "patients": [],
            "holidays": {"2024-05-01": "Fête du Travail"}
        });

        let roster = migrate_document(doc, nine()).unwrap();
        assert!(roster.patients.is_empty());
        assert_eq!(roster.holidays.len(), 1);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let doc = json!({ "version": 99, "patients": [] });
        assert!(matches!(
            migrate_document(doc, nine()),
            Err(Error::Migration(_))
        ));
    }

    #[test]
    fn test_scalar_root_is_rejected() {
        assert!(matches!(
            migrate_document(json!("patients"), nine()),
            Err(Error::Migration(_))
        ));
    }
}
