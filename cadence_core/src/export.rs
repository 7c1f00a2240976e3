//! CSV export of session lists.
//!
//! One row per session, patients in roster order and sessions in date order.

use crate::{Patient, Result, Session};
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    patient_id: &'a str,
    patient_name: &'a str,
    session_id: &'a str,
    date: String,
    time: String,
    status: String,
    locked: bool,
    notes: &'a str,
}

impl<'a> CsvRow<'a> {
    fn new(patient: &'a Patient, session: &'a Session) -> Self {
        CsvRow {
            patient_id: &patient.id,
            patient_name: &patient.name,
            session_id: &session.id,
            date: session.date.to_string(),
            time: session.time.to_string(),
            status: session.status.to_string(),
            locked: session.is_locked,
            notes: session.notes.as_deref().unwrap_or(""),
        }
    }
}

/// Write every session of `patients` to a CSV file at `path`.
///
/// The file is replaced if it exists. Returns the number of rows written.
pub fn export_sessions_csv<'a, I>(patients: I, path: &Path) -> Result<usize>
where
    I: IntoIterator<Item = &'a Patient>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    let mut count = 0;

    for patient in patients {
        for session in &patient.sessions {
            writer.serialize(CsvRow::new(patient, session))?;
            count += 1;
        }
    }

    writer.flush()?;
    tracing::info!("Exported {} sessions to {:?}", count, path);
    Ok(count)
}
