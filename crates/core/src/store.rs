//! Profile, intake and snapshot stores.
//!
//! The stores are keyed by an already-authenticated patient identity. They are
//! synchronous and object safe so services can hold them as `Arc<dyn ...>`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use crate::error::{StoreError, StoreResult};
use crate::profile::{Intake, PatientProfile};
use crate::snapshot::{NewSnapshot, SnapshotRecord};
use crate::validation::validate_patient_id;

pub trait ProfileStore: Send + Sync {
    fn get_profile(&self, patient_id: &str) -> StoreResult<Option<PatientProfile>>;

    /// Validates `profile` as of `today` and replaces any existing one.
    fn upsert_profile(
        &self,
        patient_id: &str,
        profile: PatientProfile,
        today: NaiveDate,
    ) -> StoreResult<()>;
}

pub trait IntakeStore: Send + Sync {
    fn get_intake(&self, patient_id: &str) -> StoreResult<Option<Intake>>;

    /// Range-checks `intake` and replaces any existing one.
    fn upsert_intake(&self, patient_id: &str, intake: Intake) -> StoreResult<()>;
}

/// Insert-only snapshot storage.
pub trait SnapshotStore: Send + Sync {
    fn insert(&self, patient_id: &str, snapshot: NewSnapshot) -> StoreResult<SnapshotRecord>;

    /// Snapshots for a patient, oldest first.
    fn list(&self, patient_id: &str) -> StoreResult<Vec<SnapshotRecord>>;
}

/// An empty identity means the caller never authenticated.
fn check_identity(patient_id: &str) -> StoreResult<()> {
    if patient_id.trim().is_empty() {
        return Err(StoreError::Unauthenticated);
    }
    validate_patient_id(patient_id)
}

fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| StoreError::Poisoned)
}

/// Process-local store implementing all three store traits.
///
/// Intake and snapshot writes require an existing profile.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    profiles: Mutex<HashMap<String, PatientProfile>>,
    intakes: Mutex<HashMap<String, Intake>>,
    snapshots: Mutex<HashMap<String, Vec<SnapshotRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_profile(&self, patient_id: &str) -> StoreResult<()> {
        if lock(&self.profiles)?.contains_key(patient_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound("patient profile"))
        }
    }
}

impl ProfileStore for InMemoryStore {
    fn get_profile(&self, patient_id: &str) -> StoreResult<Option<PatientProfile>> {
        check_identity(patient_id)?;
        Ok(lock(&self.profiles)?.get(patient_id).cloned())
    }

    fn upsert_profile(
        &self,
        patient_id: &str,
        profile: PatientProfile,
        today: NaiveDate,
    ) -> StoreResult<()> {
        check_identity(patient_id)?;
        profile.validate(today)?;

        let normalized = PatientProfile {
            first_name: profile.first_name.trim().to_string(),
            last_name: profile.last_name.trim().to_string(),
            date_of_birth: profile.date_of_birth.trim().to_string(),
            ..profile
        };
        lock(&self.profiles)?.insert(patient_id.to_string(), normalized);
        Ok(())
    }
}

impl IntakeStore for InMemoryStore {
    fn get_intake(&self, patient_id: &str) -> StoreResult<Option<Intake>> {
        check_identity(patient_id)?;
        Ok(lock(&self.intakes)?.get(patient_id).cloned())
    }

    fn upsert_intake(&self, patient_id: &str, intake: Intake) -> StoreResult<()> {
        check_identity(patient_id)?;
        self.require_profile(patient_id)?;
        intake.validate()?;

        lock(&self.intakes)?.insert(patient_id.to_string(), intake);
        Ok(())
    }
}

impl SnapshotStore for InMemoryStore {
    fn insert(&self, patient_id: &str, snapshot: NewSnapshot) -> StoreResult<SnapshotRecord> {
        check_identity(patient_id)?;
        self.require_profile(patient_id)?;

        let record = SnapshotRecord::new(patient_id, snapshot);
        lock(&self.snapshots)?
            .entry(patient_id.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    fn list(&self, patient_id: &str) -> StoreResult<Vec<SnapshotRecord>> {
        check_identity(patient_id)?;
        Ok(lock(&self.snapshots)?
            .get(patient_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Snapshot store writing one JSON file per snapshot.
///
/// Layout: `<root>/<patient_id>/<snapshot_id>.json`.
#[derive(Clone, Debug)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn patient_dir(&self, patient_id: &str) -> PathBuf {
        self.root.join(patient_id)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn insert(&self, patient_id: &str, snapshot: NewSnapshot) -> StoreResult<SnapshotRecord> {
        check_identity(patient_id)?;

        let dir = self.patient_dir(patient_id);
        fs::create_dir_all(&dir).map_err(StoreError::StorageDirCreation)?;

        let record = SnapshotRecord::new(patient_id, snapshot);
        let json = serde_json::to_string_pretty(&record).map_err(StoreError::Serialization)?;
        let filename = dir.join(format!("{}.json", record.id));
        fs::write(&filename, json).map_err(StoreError::FileWrite)?;

        tracing::debug!(path = %filename.display(), "wrote snapshot file");
        Ok(record)
    }

    fn list(&self, patient_id: &str) -> StoreResult<Vec<SnapshotRecord>> {
        check_identity(patient_id)?;

        let dir = self.patient_dir(patient_id);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::FileRead(e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry.map_err(StoreError::FileRead)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = fs::read_to_string(&path).map_err(StoreError::FileRead)?;
            let record: SnapshotRecord =
                serde_json::from_str(&contents).map_err(StoreError::Deserialization)?;
            records.push(record);
        }

        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}
