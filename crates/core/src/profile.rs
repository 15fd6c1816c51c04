//! Patient profile, intake measurements and the normalised clinical profile.
//!
//! The profile and intake records belong to external stores; this module only
//! defines their shape, their field-level validation and how the two combine
//! into a [`ClinicalProfile`] for a given day.

use crate::constants::{
    AGE_RANGE, BMI_RANGE, EGFR_RANGE, HDL_CHOLESTEROL_RANGE, NAME_MAX_LEN, NAME_MIN_LEN,
    SYSTOLIC_BP_RANGE, TOTAL_CHOLESTEROL_RANGE,
};
use crate::error::{FieldError, ValidationError};
use crate::validation::{validate_name, validate_range};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Biological sex recorded at birth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sex {
    Female,
    Male,
}

/// Demographic profile as held by the profile store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    pub first_name: String,
    pub last_name: String,
    pub sex_at_birth: Sex,
    /// `YYYY-MM-DD`.
    pub date_of_birth: String,
}

impl PatientProfile {
    /// Field-level validation applied on upsert.
    ///
    /// # Errors
    ///
    /// Returns every problem found, not just the first.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        validate_name(&mut errors, "firstName", "First Name", &self.first_name, NAME_MIN_LEN, NAME_MAX_LEN);
        validate_name(&mut errors, "lastName", "Last Name", &self.last_name, NAME_MIN_LEN, NAME_MAX_LEN);

        let dob = self.date_of_birth.trim();
        if dob.is_empty() {
            errors.push(FieldError::new("dateOfBirth", "Date of Birth is required"));
        } else {
            match parse_date_of_birth(dob) {
                None => errors.push(FieldError::new(
                    "dateOfBirth",
                    "Date of Birth must be a valid date in YYYY-MM-DD format",
                )),
                Some(date) => {
                    let age = age_in_years(date, today);
                    if !AGE_RANGE.contains(f64::from(age)) {
                        errors.push(FieldError::new(
                            "dateOfBirth",
                            format!("Age must be between {} and {}", AGE_RANGE.min, AGE_RANGE.max),
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError(errors))
        }
    }
}

/// Intake measurements and treatment flags as held by the intake store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Intake {
    pub total_cholesterol: f64,
    pub hdl_cholesterol: f64,
    #[serde(rename = "systolicBP")]
    pub systolic_bp: f64,
    pub bmi: f64,
    #[serde(rename = "eGFR")]
    pub egfr: f64,
    pub is_diabetes: bool,
    pub is_smoker: bool,
    pub is_taking_antihypertensive: bool,
    pub is_taking_statin: bool,
}

impl Intake {
    /// Range validation applied on upsert.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        validate_measurements(
            &mut errors,
            self.total_cholesterol,
            self.hdl_cholesterol,
            self.systolic_bp,
            self.bmi,
            self.egfr,
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError(errors))
        }
    }
}

/// Range-checks the five numeric clinical fields, appending one error per violation.
pub fn validate_measurements(
    errors: &mut Vec<FieldError>,
    total_cholesterol: f64,
    hdl_cholesterol: f64,
    systolic_bp: f64,
    bmi: f64,
    egfr: f64,
) {
    validate_range(errors, "totalCholesterol", "Total cholesterol", total_cholesterol, TOTAL_CHOLESTEROL_RANGE);
    validate_range(errors, "hdlCholesterol", "HDL cholesterol", hdl_cholesterol, HDL_CHOLESTEROL_RANGE);
    validate_range(errors, "systolicBP", "Systolic BP", systolic_bp, SYSTOLIC_BP_RANGE);
    validate_range(errors, "bmi", "BMI", bmi, BMI_RANGE);
    validate_range(errors, "eGFR", "eGFR", egfr, EGFR_RANGE);
}

/// Parses a strict `YYYY-MM-DD` date.
pub fn parse_date_of_birth(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let bytes = value.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Whole years between `date_of_birth` and `today`.
///
/// One less than the calendar-year difference when today's month/day falls
/// before the birthday.
pub fn age_in_years(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

/// Message shown when the records exist but no usable age can be derived.
///
/// Missing records are not an error: the caller prompts the user to complete
/// their intake instead.
pub fn profile_validation_error(
    profile: Option<&PatientProfile>,
    intake: Option<&Intake>,
    today: NaiveDate,
) -> Option<String> {
    let (Some(profile), Some(_)) = (profile, intake) else {
        return None;
    };

    let Some(date_of_birth) = parse_date_of_birth(&profile.date_of_birth) else {
        return Some("Date of birth is invalid.".into());
    };

    if age_in_years(date_of_birth, today) <= 0 {
        return Some("Age could not be calculated from the profile.".into());
    }

    None
}

/// Why a [`ClinicalProfile`] cannot be sent upstream.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileIncomplete {
    #[error("sex is not set")]
    MissingSex,
    #[error("age could not be derived")]
    MissingAge,
    #[error("age {0} is not a positive number of years")]
    NonPositiveAge(i32),
    #[error("{0} is not set")]
    MissingField(&'static str),
    #[error("{0} is not a finite number")]
    NonFiniteField(&'static str),
}

/// Normalised clinical inputs for one assessment.
///
/// Every numeric field is optional so that partially filled intake forms can be
/// represented; only a complete profile produces provider payloads.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalProfile {
    pub age: Option<i32>,
    pub sex: Option<Sex>,
    pub total_cholesterol: Option<f64>,
    pub hdl_cholesterol: Option<f64>,
    pub systolic_bp: Option<f64>,
    pub bmi: Option<f64>,
    pub egfr: Option<f64>,
    pub diabetes: bool,
    pub smoker: bool,
    pub antihypertensive: bool,
    pub statin: bool,
}

impl ClinicalProfile {
    /// Combines the stored records as of `today`.
    ///
    /// Missing records leave the corresponding fields unset.
    pub fn from_records(
        profile: Option<&PatientProfile>,
        intake: Option<&Intake>,
        today: NaiveDate,
    ) -> Self {
        let mut clinical = ClinicalProfile::default();

        if let Some(profile) = profile {
            clinical.sex = Some(profile.sex_at_birth);
            clinical.age = parse_date_of_birth(&profile.date_of_birth)
                .map(|dob| age_in_years(dob, today));
        }

        if let Some(intake) = intake {
            clinical.total_cholesterol = Some(intake.total_cholesterol);
            clinical.hdl_cholesterol = Some(intake.hdl_cholesterol);
            clinical.systolic_bp = Some(intake.systolic_bp);
            clinical.bmi = Some(intake.bmi);
            clinical.egfr = Some(intake.egfr);
            clinical.diabetes = intake.is_diabetes;
            clinical.smoker = intake.is_smoker;
            clinical.antihypertensive = intake.is_taking_antihypertensive;
            clinical.statin = intake.is_taking_statin;
        }

        clinical
    }

    /// Checks every field a payload needs.
    ///
    /// # Errors
    ///
    /// Returns the first missing or unusable field.
    pub fn check_complete(&self) -> Result<(), ProfileIncomplete> {
        let age = self.age.ok_or(ProfileIncomplete::MissingAge)?;
        if age <= 0 {
            return Err(ProfileIncomplete::NonPositiveAge(age));
        }
        if self.sex.is_none() {
            return Err(ProfileIncomplete::MissingSex);
        }

        let numeric = [
            ("totalCholesterol", self.total_cholesterol),
            ("hdlCholesterol", self.hdl_cholesterol),
            ("systolicBP", self.systolic_bp),
            ("bmi", self.bmi),
            ("eGFR", self.egfr),
        ];
        for (name, value) in numeric {
            match value {
                None => return Err(ProfileIncomplete::MissingField(name)),
                Some(v) if !v.is_finite() => return Err(ProfileIncomplete::NonFiniteField(name)),
                Some(_) => {}
            }
        }

        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.check_complete().is_ok()
    }
}
