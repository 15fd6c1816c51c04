//! # PREVENT Core
//!
//! Core domain logic for the PREVENT cardiovascular risk pipeline.
//!
//! This crate contains the pure and orchestration parts of an assessment:
//! - Patient profile, intake and clinical-profile derivation (including age)
//! - Provider payload builders for MdCalc and ClinCalc
//! - The provider trait, error taxonomy and dual-provider aggregator
//! - Interpretation of provider results (risk category, events, factors)
//! - Snapshot records, stores and the record-once recorder
//! - The per-patient assessment session
//!
//! **No transport concerns**: HTTP clients live in `prevent-providers`, the HTTP
//! server in `api-rest`.

#![warn(rust_2018_idioms)]

pub mod aggregator;
pub mod cancellation;
pub mod config;
pub mod constants;
pub mod error;
pub mod interpretation;
pub mod payload;
pub mod profile;
pub mod provider;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod validation;

pub use aggregator::{apply_outcome, AggregationState, Aggregator, AssessmentStatus, AttemptOutcome};
pub use cancellation::CancellationToken;
pub use config::{core_config_from_env_values, CoreConfig};
pub use error::{
    ConfigError, ConfigResult, FieldError, Provider, ProviderError, ProviderResult, ShapeError,
    StoreError, StoreResult, ValidationError,
};
pub use interpretation::{
    EventBreakdown, Impact, InterpretationLevel, RiskCategory, RiskFactor, RiskSummary,
};
pub use payload::{build_payloads, ProviderPayloads};
pub use profile::{age_in_years, ClinicalProfile, Intake, PatientProfile, ProfileIncomplete, Sex};
pub use provider::RiskCalculator;
pub use session::{AssessmentSession, AssessmentView, NoticeTone, StatusNotice};
pub use snapshot::{
    InputSnapshot, NewSnapshot, RecordTrigger, SnapshotRecord, SnapshotRecorder, SnapshotResults,
};
pub use store::{FileSnapshotStore, InMemoryStore, IntakeStore, ProfileStore, SnapshotStore};
pub use validation::{validate_clincalc_request, validate_mdcalc_request};
