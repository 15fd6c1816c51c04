//! # API Shared
//!
//! Shared wire contracts for the PREVENT risk-assessment APIs.
//!
//! Contains:
//! - Versioned request/response DTOs for both upstream calculators (`v1` module)
//! - The JSON error body returned by every REST route
//! - Shared services like `HealthService`
//! - API-key checking (usable by the REST layer and by clients)
//!
//! Used by `prevent-core`, `prevent-providers`, `api-rest` and the CLI.

#![warn(rust_2018_idioms)]

pub mod auth;
pub mod error;
pub mod health;
pub mod v1;

pub use error::{ErrorBody, FieldIssue};
pub use health::{HealthRes, HealthService};
pub use v1::clincalc::{
    ClinCalcContribution, ClinCalcGender, ClinCalcPreventRequest, ClinCalcPreventResponse,
};
pub use v1::mdcalc::{
    BinaryFlag, MdCalcAssessment, MdCalcOutput, MdCalcPreventRequest, MdCalcPreventResponse,
};
pub use v1::{ClinCalcPreventEnvelope, MdCalcPreventEnvelope, RequestEnvelope};
