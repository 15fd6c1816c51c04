//! One patient's assessment: profile in, interpreted results and one snapshot out.

use std::sync::Arc;

use api_shared::{
    ClinCalcContribution, ClinCalcPreventRequest, MdCalcAssessment, MdCalcPreventRequest,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregator::{AggregationState, Aggregator, AssessmentStatus};
use crate::error::StoreResult;
use crate::interpretation::RiskSummary;
use crate::payload::{build_payloads, ProviderPayloads};
use crate::profile::{profile_validation_error, ClinicalProfile, Intake, PatientProfile};
use crate::provider::RiskCalculator;
use crate::snapshot::{InputSnapshot, NewSnapshot, RecordTrigger, SnapshotRecorder, SnapshotResults};
use crate::store::{IntakeStore, ProfileStore, SnapshotStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeTone {
    /// Prompt to finish the intake.
    Info,
    Destructive,
}

/// Banner shown above the results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusNotice {
    pub title: String,
    pub description: String,
    pub messages: Vec<String>,
    pub tone: NoticeTone,
}

impl StatusNotice {
    fn build(missing_data: bool, errors: &[String]) -> Option<Self> {
        if missing_data {
            return Some(Self {
                title: "More information needed".into(),
                description: "Complete your intake to generate a risk assessment.".into(),
                messages: errors.to_vec(),
                tone: NoticeTone::Info,
            });
        }
        if errors.is_empty() {
            return None;
        }
        Some(Self {
            title: "Assessment unavailable".into(),
            description: "We couldn't retrieve results from the server.".into(),
            messages: errors.to_vec(),
            tone: NoticeTone::Destructive,
        })
    }
}

/// What the results page renders after one assessment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentView {
    pub status: AssessmentStatus,
    /// Profile or intake record is absent.
    pub missing_data: bool,
    pub age: Option<i32>,
    /// Validation message when present, otherwise the provider errors.
    pub errors: Vec<String>,
    pub notice: Option<StatusNotice>,
    pub mdcalc_payload: Option<MdCalcPreventRequest>,
    pub clincalc_payload: Option<ClinCalcPreventRequest>,
    pub mdcalc: Option<MdCalcAssessment>,
    pub clincalc: Option<Vec<ClinCalcContribution>>,
    pub summary: RiskSummary,
    pub snapshot_recorded: bool,
}

/// Owns one aggregator and one snapshot latch for a single patient.
pub struct AssessmentSession<A, B> {
    patient_id: String,
    aggregator: Aggregator<A, B>,
    snapshots: Arc<dyn SnapshotStore>,
    recorder: SnapshotRecorder,
}

impl<A, B> AssessmentSession<A, B>
where
    A: RiskCalculator<Request = MdCalcPreventRequest, Output = MdCalcAssessment>,
    B: RiskCalculator<Request = ClinCalcPreventRequest, Output = Vec<ClinCalcContribution>>,
{
    pub fn new(
        patient_id: impl Into<String>,
        aggregator: Aggregator<A, B>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            aggregator,
            snapshots,
            recorder: SnapshotRecorder::new(),
        }
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    /// Loads the patient's records and assesses them.
    pub async fn assess_from_stores(
        &mut self,
        profiles: &dyn ProfileStore,
        intakes: &dyn IntakeStore,
        today: NaiveDate,
    ) -> StoreResult<AssessmentView> {
        let profile = profiles.get_profile(&self.patient_id)?;
        let intake = intakes.get_intake(&self.patient_id)?;
        Ok(self.assess(profile, intake, today).await)
    }

    /// Runs one attempt for the given records and waits for it to resolve.
    ///
    /// An incomplete profile resolves immediately to `idle` without calling
    /// either provider.
    pub async fn assess(
        &mut self,
        profile: Option<PatientProfile>,
        intake: Option<Intake>,
        today: NaiveDate,
    ) -> AssessmentView {
        let clinical = ClinicalProfile::from_records(profile.as_ref(), intake.as_ref(), today);
        let validation_error = profile_validation_error(profile.as_ref(), intake.as_ref(), today);
        let payloads = build_payloads(&clinical);
        if let Err(reason) = clinical.check_complete() {
            tracing::debug!(patient_id = %self.patient_id, %reason, "profile incomplete, skipping providers");
        }

        self.aggregator.set_payloads(payloads.clone());
        let state = if payloads.is_some() {
            self.aggregator.settled().await
        } else {
            self.aggregator.state()
        };

        let trigger = RecordTrigger {
            query_resolved: true,
            status: state.status,
            payloads_present: payloads.is_some(),
        };
        let missing_data = profile.is_none() || intake.is_none();
        let age = clinical.age;

        self.recorder.observe(trigger, self.snapshots.as_ref(), &self.patient_id, || {
            NewSnapshot {
                input_snapshot: InputSnapshot::new(profile, intake, age, payloads.clone()),
                results: SnapshotResults::from_state(&state, validation_error.as_deref()),
            }
        });

        build_view(
            &state,
            payloads,
            age,
            missing_data,
            validation_error,
            self.recorder.has_recorded(),
        )
    }
}

fn build_view(
    state: &AggregationState,
    payloads: Option<ProviderPayloads>,
    age: Option<i32>,
    missing_data: bool,
    validation_error: Option<String>,
    snapshot_recorded: bool,
) -> AssessmentView {
    let displayable = payloads.is_some() && state.is_resolved();
    let mdcalc = state.mdcalc.clone().filter(|_| displayable);
    let clincalc = state.clincalc.clone().filter(|_| displayable);

    let errors = match validation_error {
        Some(message) => vec![message],
        None => state.errors.clone(),
    };

    let (mdcalc_payload, clincalc_payload) = match payloads {
        Some(p) => (Some(p.mdcalc), Some(p.clincalc)),
        None => (None, None),
    };

    AssessmentView {
        status: state.status,
        missing_data,
        age,
        notice: StatusNotice::build(missing_data, &errors),
        errors,
        mdcalc_payload,
        clincalc_payload,
        summary: RiskSummary::from_results(mdcalc.as_ref(), clincalc.as_deref()),
        mdcalc,
        clincalc,
        snapshot_recorded,
    }
}
