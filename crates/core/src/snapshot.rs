//! Audit snapshots of resolved assessment attempts.

use api_shared::{
    ClinCalcContribution, ClinCalcPreventRequest, MdCalcAssessment, MdCalcPreventRequest,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregator::{AggregationState, AssessmentStatus};
use crate::constants::{SNAPSHOT_MODEL, SNAPSHOT_MODEL_VERSION};
use crate::payload::ProviderPayloads;
use crate::profile::{Intake, PatientProfile};
use crate::store::SnapshotStore;

/// Inputs as they were when the attempt resolved.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSnapshot {
    pub profile: Option<PatientProfile>,
    pub intake: Option<Intake>,
    pub age: Option<i32>,
    pub mdcalc_payload: Option<MdCalcPreventRequest>,
    pub clincalc_payload: Option<ClinCalcPreventRequest>,
}

impl InputSnapshot {
    pub fn new(
        profile: Option<PatientProfile>,
        intake: Option<Intake>,
        age: Option<i32>,
        payloads: Option<ProviderPayloads>,
    ) -> Self {
        let (mdcalc_payload, clincalc_payload) = match payloads {
            Some(p) => (Some(p.mdcalc), Some(p.clincalc)),
            None => (None, None),
        };

        Self {
            profile,
            intake,
            age,
            mdcalc_payload,
            clincalc_payload,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResults {
    pub status: AssessmentStatus,
    pub errors: Vec<String>,
    pub mdcalc: Option<MdCalcAssessment>,
    pub clincalc: Option<Vec<ClinCalcContribution>>,
}

impl SnapshotResults {
    /// A profile validation message replaces the provider errors.
    pub fn from_state(state: &AggregationState, validation_error: Option<&str>) -> Self {
        let errors = match validation_error {
            Some(message) => vec![message.to_string()],
            None => state.errors.clone(),
        };

        Self {
            status: state.status,
            errors,
            mdcalc: state.mdcalc.clone(),
            clincalc: state.clincalc.clone(),
        }
    }
}

/// Snapshot contents before the store assigns identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSnapshot {
    pub input_snapshot: InputSnapshot,
    pub results: SnapshotResults,
}

/// A stored snapshot. Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub id: Uuid,
    pub patient_id: String,
    pub model: String,
    pub model_version: String,
    pub created_at: DateTime<Utc>,
    pub input_snapshot: InputSnapshot,
    pub results: SnapshotResults,
}

impl SnapshotRecord {
    pub fn new(patient_id: &str, snapshot: NewSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id: patient_id.to_string(),
            model: SNAPSHOT_MODEL.to_string(),
            model_version: SNAPSHOT_MODEL_VERSION.to_string(),
            created_at: Utc::now(),
            input_snapshot: snapshot.input_snapshot,
            results: snapshot.results,
        }
    }
}

/// Inputs to the recorder's trigger condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordTrigger {
    /// Profile and intake lookups have both returned (with or without data).
    pub query_resolved: bool,
    pub status: AssessmentStatus,
    pub payloads_present: bool,
}

impl RecordTrigger {
    /// True once there is something final to record: either no attempt will
    /// run (incomplete or invalid profile) or an attempt has resolved.
    pub fn is_met(&self) -> bool {
        self.query_resolved
            && self.status != AssessmentStatus::Loading
            && !(self.status == AssessmentStatus::Idle && self.payloads_present)
    }
}

/// Writes at most one snapshot over its lifetime.
///
/// Create one per assessment session; the latch is never reset.
#[derive(Debug, Default)]
pub struct SnapshotRecorder {
    recorded: bool,
}

impl SnapshotRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_recorded(&self) -> bool {
        self.recorded
    }

    /// Records `snapshot` if the trigger is met and nothing has been recorded yet.
    ///
    /// The latch closes before the write, so a failed write is not retried.
    /// Store failures are logged and otherwise ignored. Returns whether this
    /// call closed the latch.
    pub fn observe(
        &mut self,
        trigger: RecordTrigger,
        store: &dyn SnapshotStore,
        patient_id: &str,
        snapshot: impl FnOnce() -> NewSnapshot,
    ) -> bool {
        if self.recorded || !trigger.is_met() {
            return false;
        }
        self.recorded = true;

        match store.insert(patient_id, snapshot()) {
            Ok(record) => {
                tracing::info!(snapshot_id = %record.id, status = ?record.results.status, "recorded risk assessment snapshot");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to record risk assessment snapshot");
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, StoreResult};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingStore {
        inserted: Mutex<Vec<NewSnapshot>>,
        fail: bool,
    }

    impl SnapshotStore for CountingStore {
        fn insert(&self, patient_id: &str, snapshot: NewSnapshot) -> StoreResult<SnapshotRecord> {
            if self.fail {
                return Err(StoreError::Unauthenticated);
            }
            self.inserted
                .lock()
                .expect("store lock")
                .push(snapshot.clone());
            Ok(SnapshotRecord::new(patient_id, snapshot))
        }

        fn list(&self, _patient_id: &str) -> StoreResult<Vec<SnapshotRecord>> {
            Ok(Vec::new())
        }
    }

    fn empty_snapshot(status: AssessmentStatus) -> NewSnapshot {
        NewSnapshot {
            input_snapshot: InputSnapshot::default(),
            results: SnapshotResults {
                status,
                errors: Vec::new(),
                mdcalc: None,
                clincalc: None,
            },
        }
    }

    fn trigger(query_resolved: bool, status: AssessmentStatus, payloads_present: bool) -> RecordTrigger {
        RecordTrigger {
            query_resolved,
            status,
            payloads_present,
        }
    }

    #[test]
    fn test_trigger_condition() {
        use AssessmentStatus::*;

        assert!(!trigger(false, Success, true).is_met());
        assert!(!trigger(true, Loading, true).is_met());
        assert!(!trigger(true, Idle, true).is_met(), "attempt not started yet");
        assert!(trigger(true, Idle, false).is_met(), "incomplete profile is final");
        assert!(trigger(true, Success, true).is_met());
        assert!(trigger(true, Partial, true).is_met());
        assert!(trigger(true, Error, true).is_met());
    }

    #[test]
    fn test_recorder_writes_exactly_once() {
        let store = CountingStore::default();
        let mut recorder = SnapshotRecorder::new();

        assert!(!recorder.observe(trigger(true, AssessmentStatus::Loading, true), &store, "p1", || {
            empty_snapshot(AssessmentStatus::Loading)
        }));

        for _ in 0..3 {
            recorder.observe(trigger(true, AssessmentStatus::Success, true), &store, "p1", || {
                empty_snapshot(AssessmentStatus::Success)
            });
        }

        assert!(recorder.has_recorded());
        let inserted = store.inserted.lock().expect("store lock");
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].results.status, AssessmentStatus::Success);
    }

    #[test]
    fn test_recorder_swallows_store_failures() {
        let store = CountingStore {
            fail: true,
            ..CountingStore::default()
        };
        let mut recorder = SnapshotRecorder::new();

        let closed = recorder.observe(trigger(true, AssessmentStatus::Error, true), &store, "p1", || {
            empty_snapshot(AssessmentStatus::Error)
        });
        assert!(closed);
        assert!(recorder.has_recorded());
    }

    #[test]
    fn test_results_prefer_validation_error() {
        let state = AggregationState {
            errors: vec!["MdCalc is unreachable right now.".into()],
            ..AggregationState::default()
        };

        let results = SnapshotResults::from_state(&state, Some("Date of birth is invalid."));
        assert_eq!(results.errors, vec!["Date of birth is invalid.".to_string()]);

        let results = SnapshotResults::from_state(&state, None);
        assert_eq!(results.errors, state.errors);
    }

    #[test]
    fn test_record_carries_model_identity() {
        let record = SnapshotRecord::new("p1", empty_snapshot(AssessmentStatus::Idle));
        assert_eq!(record.model, "PREVENT");
        assert_eq!(record.model_version, "2023");
        assert_eq!(record.patient_id, "p1");

        let json = serde_json::to_value(&record).expect("serialise record");
        assert!(json.get("inputSnapshot").is_some());
        assert_eq!(json["results"]["status"], "idle");
    }
}
