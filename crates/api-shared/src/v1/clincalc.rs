//! ClinCalc PREVENT calculator contract.
//!
//! ClinCalc has no public API. The request here is this system's own
//! human-readable shape; the providers crate maps it onto the legacy form's
//! control names before submitting.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClinCalcGender {
    Male,
    Female,
}

/// Request body of `POST /api/v1/clincalc/prevent-assessments`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClinCalcPreventRequest {
    pub age: i32,
    pub gender: ClinCalcGender,
    pub total_cholesterol: f64,
    pub hdl_cholesterol: f64,
    #[serde(rename = "systolicBP")]
    pub systolic_bp: f64,
    pub bmi: f64,
    #[serde(rename = "eGFR")]
    pub egfr: f64,
    pub diabetes: bool,
    pub smoker: bool,
    pub taking_antihypertensive: bool,
    pub taking_statin: bool,
}

/// A single risk-factor contribution scraped from the calculator's chart.
///
/// `value` is the signed effect size in percentage points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClinCalcContribution {
    pub factor: String,
    pub value: f64,
    pub annotation: String,
}

/// Response of `POST /api/v1/clincalc/prevent-assessments`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClinCalcPreventResponse {
    pub contributions: Vec<ClinCalcContribution>,
}
