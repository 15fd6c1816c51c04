//! MdCalc PREVENT calculator contract.
//!
//! The request mirrors the upstream JSON calculator's own field names verbatim
//! (`UOMSYSTEM`, `htn_med`, ...), with yes/no inputs encoded as `0`/`1`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A yes/no flag encoded as the integers `0` and `1`.
///
/// Any other number is rejected during deserialisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum BinaryFlag {
    No,
    Yes,
}

impl From<bool> for BinaryFlag {
    fn from(value: bool) -> Self {
        if value {
            BinaryFlag::Yes
        } else {
            BinaryFlag::No
        }
    }
}

impl From<BinaryFlag> for u8 {
    fn from(flag: BinaryFlag) -> Self {
        match flag {
            BinaryFlag::No => 0,
            BinaryFlag::Yes => 1,
        }
    }
}

impl TryFrom<u8> for BinaryFlag {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(BinaryFlag::No),
            1 => Ok(BinaryFlag::Yes),
            other => Err(format!("expected 0 or 1, got {other}")),
        }
    }
}

impl BinaryFlag {
    pub fn is_set(self) -> bool {
        matches!(self, BinaryFlag::Yes)
    }
}

/// Request body forwarded to the MdCalc calculate endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MdCalcPreventRequest {
    /// `true` selects US units (mg/dL).
    #[serde(rename = "UOMSYSTEM")]
    pub uom_system: bool,
    /// Model selector, `0` for the base PREVENT model.
    pub model: i32,
    /// `1` for male, `0` for female.
    #[schema(value_type = u8)]
    pub sex: BinaryFlag,
    pub age: i32,
    /// Total cholesterol.
    pub tc: f64,
    pub hdl: f64,
    /// Systolic blood pressure.
    pub sbp: f64,
    #[schema(value_type = u8)]
    pub diabetes: BinaryFlag,
    #[schema(value_type = u8)]
    pub smoker: BinaryFlag,
    pub egfr: f64,
    /// On anti-hypertensive medication.
    #[schema(value_type = u8)]
    pub htn_med: BinaryFlag,
    #[schema(value_type = u8)]
    pub statin: BinaryFlag,
    pub bmi: f64,
}

/// One named calculator output.
///
/// `value` is the raw number as text, `value_text` the pre-formatted display
/// string and `message` an HTML fragment that may embed a per-event breakdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MdCalcOutput {
    pub name: String,
    pub value: String,
    pub value_text: String,
    pub message: String,
}

/// Upstream response body of the MdCalc calculate endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MdCalcAssessment {
    pub output: Vec<MdCalcOutput>,
}

/// Response of `POST /api/v1/mdcalc/prevent-assessments`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MdCalcPreventResponse {
    pub assessment: MdCalcAssessment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_upstream_field_names() {
        let req = MdCalcPreventRequest {
            uom_system: true,
            model: 0,
            sex: BinaryFlag::Yes,
            age: 55,
            tc: 200.0,
            hdl: 45.0,
            sbp: 130.0,
            diabetes: BinaryFlag::No,
            smoker: BinaryFlag::Yes,
            egfr: 90.0,
            htn_med: BinaryFlag::No,
            statin: BinaryFlag::No,
            bmi: 27.5,
        };

        let json = serde_json::to_value(&req).expect("serialise request");
        assert_eq!(json["UOMSYSTEM"], serde_json::json!(true));
        assert_eq!(json["sex"], serde_json::json!(1));
        assert_eq!(json["smoker"], serde_json::json!(1));
        assert_eq!(json["htn_med"], serde_json::json!(0));
        assert_eq!(json["bmi"], serde_json::json!(27.5));
    }

    #[test]
    fn test_binary_flag_rejects_values_other_than_zero_and_one() {
        let err = serde_json::from_str::<BinaryFlag>("2");
        assert!(err.is_err(), "2 is not a valid flag");

        let flag: BinaryFlag = serde_json::from_str("1").expect("1 is a valid flag");
        assert!(flag.is_set());
    }

    #[test]
    fn test_assessment_requires_string_values() {
        let body = r#"{"output":[{"name":"Total CVD","value":7.1,"value_text":"7.1%","message":""}]}"#;
        assert!(serde_json::from_str::<MdCalcAssessment>(body).is_err());
    }
}
