//! Input validation utilities.
//!
//! This module contains functions for validating clinical inputs and identities
//! before they are used to call an upstream calculator or touch storage.

use api_shared::{ClinCalcPreventRequest, MdCalcPreventRequest};

use crate::constants::{
    FieldRange, AGE_RANGE, BMI_RANGE, EGFR_RANGE, HDL_CHOLESTEROL_RANGE, SYSTOLIC_BP_RANGE,
    TOTAL_CHOLESTEROL_RANGE,
};
use crate::error::{FieldError, StoreError, StoreResult, ValidationError};

/// Appends a field error when `value` falls outside the closed `range`.
///
/// The message reads `"<label> must be between <min> and <max>"`.
pub fn validate_range(
    errors: &mut Vec<FieldError>,
    field: &str,
    label: &str,
    value: f64,
    range: FieldRange,
) {
    if !range.contains(value) {
        errors.push(FieldError::new(
            field,
            format!("{label} must be between {} and {}", range.min, range.max),
        ));
    }
}

fn validate_age(errors: &mut Vec<FieldError>, age: i32) {
    validate_range(errors, "age", "Age", f64::from(age), AGE_RANGE);
}

fn into_result(errors: Vec<FieldError>) -> Result<(), ValidationError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError(errors))
    }
}

/// Range-checks an inbound MdCalc payload. Field names are the wire names.
pub fn validate_mdcalc_request(request: &MdCalcPreventRequest) -> Result<(), ValidationError> {
    let mut errors = Vec::new();
    validate_age(&mut errors, request.age);
    validate_range(&mut errors, "tc", "Total cholesterol", request.tc, TOTAL_CHOLESTEROL_RANGE);
    validate_range(&mut errors, "hdl", "HDL cholesterol", request.hdl, HDL_CHOLESTEROL_RANGE);
    validate_range(&mut errors, "sbp", "Systolic BP", request.sbp, SYSTOLIC_BP_RANGE);
    validate_range(&mut errors, "bmi", "BMI", request.bmi, BMI_RANGE);
    validate_range(&mut errors, "egfr", "eGFR", request.egfr, EGFR_RANGE);
    into_result(errors)
}

/// Range-checks an inbound ClinCalc payload.
pub fn validate_clincalc_request(request: &ClinCalcPreventRequest) -> Result<(), ValidationError> {
    let mut errors = Vec::new();
    validate_age(&mut errors, request.age);
    validate_range(
        &mut errors,
        "totalCholesterol",
        "Total cholesterol",
        request.total_cholesterol,
        TOTAL_CHOLESTEROL_RANGE,
    );
    validate_range(
        &mut errors,
        "hdlCholesterol",
        "HDL cholesterol",
        request.hdl_cholesterol,
        HDL_CHOLESTEROL_RANGE,
    );
    validate_range(&mut errors, "systolicBP", "Systolic BP", request.systolic_bp, SYSTOLIC_BP_RANGE);
    validate_range(&mut errors, "bmi", "BMI", request.bmi, BMI_RANGE);
    validate_range(&mut errors, "eGFR", "eGFR", request.egfr, EGFR_RANGE);
    into_result(errors)
}

/// Validates a trimmed personal name against length bounds.
pub fn validate_name(
    errors: &mut Vec<FieldError>,
    field: &str,
    label: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.trim().chars().count();
    if len == 0 {
        errors.push(FieldError::new(field, format!("{label} is required")));
    } else if len < min {
        errors.push(FieldError::new(
            field,
            format!("{label} must be at least {min} characters"),
        ));
    } else if len > max {
        errors.push(FieldError::new(
            field,
            format!("{label} must be at most {max} characters"),
        ));
    }
}

/// Validates that a patient identity is safe to use as a storage path segment.
///
/// - Rejects empty or whitespace-only strings
/// - Bounds the length
/// - Restricts characters to ASCII alphanumerics, `.`, `-` and `_`, and rejects
///   the `.`/`..` path components
///
/// # Errors
///
/// Returns `StoreError::InvalidPatientId` if the id is unusable.
pub fn validate_patient_id(patient_id: &str) -> StoreResult<()> {
    const MAX_PATIENT_ID_LEN: usize = 128;

    if patient_id.trim().is_empty() {
        return Err(StoreError::InvalidPatientId(
            "patient id cannot be empty".into(),
        ));
    }

    if patient_id.len() > MAX_PATIENT_ID_LEN {
        return Err(StoreError::InvalidPatientId(format!(
            "patient id exceeds maximum length of {} characters",
            MAX_PATIENT_ID_LEN
        )));
    }

    let ok = patient_id
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_'));

    if !ok || patient_id == "." || patient_id == ".." {
        return Err(StoreError::InvalidPatientId(
            "patient id contains invalid characters (only alphanumeric, '.', '-', '_' allowed)"
                .into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{BMI_RANGE, TOTAL_CHOLESTEROL_RANGE};

    #[test]
    fn test_validate_range_is_inclusive() {
        let mut errors = Vec::new();
        validate_range(&mut errors, "totalCholesterol", "Total cholesterol", 130.0, TOTAL_CHOLESTEROL_RANGE);
        validate_range(&mut errors, "totalCholesterol", "Total cholesterol", 320.0, TOTAL_CHOLESTEROL_RANGE);
        assert!(errors.is_empty(), "bounds are inside the range");

        validate_range(&mut errors, "totalCholesterol", "Total cholesterol", 129.9, TOTAL_CHOLESTEROL_RANGE);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "totalCholesterol");
        assert_eq!(
            errors[0].message,
            "Total cholesterol must be between 130 and 320"
        );
    }

    #[test]
    fn test_validate_range_rejects_nan() {
        let mut errors = Vec::new();
        validate_range(&mut errors, "bmi", "BMI", f64::NAN, BMI_RANGE);
        assert_eq!(errors[0].message, "BMI must be between 18.5 and 39.9");
    }

    #[test]
    fn test_validate_name_reports_length_problems() {
        let mut errors = Vec::new();
        validate_name(&mut errors, "firstName", "First Name", "  ", 2, 255);
        validate_name(&mut errors, "lastName", "Last Name", "X", 2, 255);
        validate_name(&mut errors, "lastName", "Last Name", "Ng", 2, 255);

        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "First Name is required",
                "Last Name must be at least 2 characters"
            ]
        );
    }

    #[test]
    fn test_request_validation_uses_wire_field_names() {
        let mut request = MdCalcPreventRequest {
            uom_system: true,
            model: 0,
            sex: true.into(),
            age: 29,
            tc: 200.0,
            hdl: 50.0,
            sbp: 250.0,
            diabetes: false.into(),
            smoker: false.into(),
            egfr: 90.0,
            htn_med: false.into(),
            statin: false.into(),
            bmi: 25.0,
        };
        let err = validate_mdcalc_request(&request).expect_err("age and sbp out of range");
        let fields: Vec<_> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["age", "sbp"]);
        assert_eq!(err.field_errors()[0].message, "Age must be between 30 and 79");

        request.age = 79;
        request.sbp = 200.0;
        assert!(validate_mdcalc_request(&request).is_ok());
    }

    #[test]
    fn test_clincalc_request_validation() {
        let request = ClinCalcPreventRequest {
            age: 50,
            gender: api_shared::ClinCalcGender::Female,
            total_cholesterol: 180.0,
            hdl_cholesterol: 55.0,
            systolic_bp: 120.0,
            bmi: 40.0,
            egfr: 14.0,
            diabetes: false,
            smoker: false,
            taking_antihypertensive: false,
            taking_statin: false,
        };
        let err = validate_clincalc_request(&request).expect_err("bmi and egfr out of range");
        let fields: Vec<_> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["bmi", "eGFR"]);
    }

    #[test]
    fn test_validate_patient_id() {
        assert!(validate_patient_id("user_123.example-a").is_ok());
        assert!(validate_patient_id("").is_err());
        assert!(validate_patient_id("..").is_err());
        assert!(validate_patient_id("../etc").is_err());
        assert!(validate_patient_id(&"a".repeat(129)).is_err());
    }
}
