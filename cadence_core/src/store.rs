//! Roster persistence with file locking.
//!
//! The roster is stored as a single versioned JSON document. Reads take a
//! shared lock on the document. Writes go to a temp file in the same
//! directory which is synced and then renamed over the original. `update`
//! holds an exclusive lock on a sidecar `.lock` file from load to save, so
//! concurrent writers run one after another.

use crate::migrate::{migrate_document, CURRENT_VERSION};
use crate::{ClockTime, Error, HolidayMap, Patient, Result, Roster};
use fs2::FileExt;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// On-disk shape of the current schema version
#[derive(Serialize)]
struct StoredDocument<'a> {
    version: u64,
    patients: &'a [Patient],
    holidays: &'a HolidayMap,
}

/// JSON-file backed roster storage
#[derive(Clone, Debug)]
pub struct RosterStore {
    path: PathBuf,
    legacy_time: ClockTime,
}

impl RosterStore {
    /// `legacy_time` fills in slot times missing from v1 documents
    pub fn new(path: impl Into<PathBuf>, legacy_time: ClockTime) -> Self {
        Self {
            path: path.into(),
            legacy_time,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the roster, migrating older documents.
    ///
    /// A missing file is an empty roster. An unreadable or corrupted file is
    /// an error: patient history is never silently replaced with defaults.
    pub fn load(&self) -> Result<Roster> {
        if !self.path.exists() {
            tracing::info!("No roster file at {:?}, starting empty", self.path);
            return Ok(Roster::default());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        let value: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
            tracing::error!("Roster file {:?} is corrupted: {}", self.path, e);
            Error::Json(e)
        })?;

        let roster = migrate_document(value, self.legacy_time)?;
        tracing::debug!(
            "Loaded {} patients and {} holidays from {:?}",
            roster.patients.len(),
            roster.holidays.len(),
            self.path
        );
        Ok(roster)
    }

    /// Save the roster atomically
    pub fn save(&self, roster: &Roster) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;

        {
            let document = StoredDocument {
                version: CURRENT_VERSION,
                patients: &roster.patients,
                holidays: &roster.holidays,
            };
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, &document)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(
            "Saved {} patients to {:?}",
            roster.patients.len(),
            self.path
        );
        Ok(())
    }

    /// Path of the sidecar file writers lock
    pub fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Load the roster, modify it, and save it back.
    ///
    /// Runs under the writer lock. Nothing is written if `f` fails.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Roster) -> Result<T>,
    {
        let lock = self.lock_writers()?;

        let result = self.load().and_then(|mut roster| {
            let out = f(&mut roster)?;
            self.save(&roster)?;
            Ok(out)
        });

        lock.unlock()?;
        result
    }

    fn lock_writers(&self) -> Result<File> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;
        file.lock_exclusive()?;
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DurationPolicy, Location, PatientDraft, ScheduleConfig, SequentialIds, StartConfig};
    use chrono::NaiveDate;

    fn store_in(dir: &Path) -> RosterStore {
        RosterStore::new(dir.join("roster.json"), "09:00".parse().unwrap())
    }

    fn sample_roster() -> Roster {
        let mut roster = Roster::default();
        roster
            .create_patient(
                PatientDraft {
                    name: "Claire Dubois".into(),
                    nomenclature: "AMK 8".into(),
                    location: Location::Home,
                    address: Some("12 rue des Lilas".into()),
                    start_config: StartConfig {
                        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                        schedule: vec![ScheduleConfig::new(2, "10:30".parse().unwrap()).unwrap()],
                        duration: DurationPolicy::SessionCount { total: 3 },
                    },
                },
                &mut SequentialIds::new("t"),
            )
            .unwrap();
        roster.holidays.insert(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            "Fête du Travail".into(),
        );
        roster
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store_in(temp_dir.path());
        let roster = sample_roster();

        store.save(&roster).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, roster);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], CURRENT_VERSION);
        assert_eq!(raw["patients"][0]["startConfig"]["durationType"], "SESSION_COUNT");
    }

    #[test]
    fn test_load_nonexistent_returns_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let roster = store_in(temp_dir.path()).load().unwrap();

        assert!(roster.patients.is_empty());
        assert!(roster.holidays.is_empty());
    }

    #[test]
    fn test_corrupted_roster_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store_in(temp_dir.path());
        std::fs::write(store.path(), "{ invalid json }").unwrap();

        assert!(matches!(store.load(), Err(Error::Json(_))));
    }

    #[test]
    fn test_update_skips_save_on_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store_in(temp_dir.path());
        store.save(&sample_roster()).unwrap();

        let result: Result<()> = store.update(|roster| {
            roster.patients.clear();
            Err(Error::Other("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.load().unwrap().patients.len(), 1);

        let count = store
            .update(|roster| {
                roster.holidays.clear();
                Ok(roster.patients.len())
            })
            .unwrap();
        assert_eq!(count, 1);
        assert!(store.load().unwrap().holidays.is_empty());
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store_in(temp_dir.path());
        store.save(&Roster::default()).unwrap();

        let handles: Vec<_> = (1..=8)
            .map(|day| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .update(|roster| {
                            roster.holidays.insert(
                                NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                                format!("Day {}", day),
                            );
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.load().unwrap().holidays.len(), 8);
        assert!(store.lock_path().exists());
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store_in(temp_dir.path());
        store.save(&Roster::default()).unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "roster.json")
            .collect();
        assert!(
            extras.is_empty(),
            "Expected only roster.json, found extras: {:?}",
            extras
        );
    }
}
