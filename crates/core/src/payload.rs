//! Mapping from a [`ClinicalProfile`] to the two upstream request bodies.

use crate::profile::{ClinicalProfile, Sex};
use api_shared::{BinaryFlag, ClinCalcGender, ClinCalcPreventRequest, MdCalcPreventRequest};
use serde::{Deserialize, Serialize};

/// MdCalc's PREVENT model selector; `0` is the base model.
const MDCALC_BASE_MODEL: i32 = 0;

/// The pair of request bodies derived from one clinical profile.
///
/// Both are present or neither is: [`build_payloads`] never produces half a pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPayloads {
    pub mdcalc: MdCalcPreventRequest,
    pub clincalc: ClinCalcPreventRequest,
}

/// Builds both payloads, or `None` when the profile is incomplete.
pub fn build_payloads(profile: &ClinicalProfile) -> Option<ProviderPayloads> {
    Some(ProviderPayloads {
        mdcalc: build_mdcalc_payload(profile)?,
        clincalc: build_clincalc_payload(profile)?,
    })
}

/// MdCalc body: US units, base model, sex `1` for male, flags as `0`/`1`.
pub fn build_mdcalc_payload(profile: &ClinicalProfile) -> Option<MdCalcPreventRequest> {
    let c = Complete::from_profile(profile)?;
    Some(MdCalcPreventRequest {
        uom_system: true,
        model: MDCALC_BASE_MODEL,
        sex: BinaryFlag::from(c.sex == Sex::Male),
        age: c.age,
        tc: c.total_cholesterol,
        hdl: c.hdl_cholesterol,
        sbp: c.systolic_bp,
        diabetes: profile.diabetes.into(),
        smoker: profile.smoker.into(),
        egfr: c.egfr,
        htn_med: profile.antihypertensive.into(),
        statin: profile.statin.into(),
        bmi: c.bmi,
    })
}

pub fn build_clincalc_payload(profile: &ClinicalProfile) -> Option<ClinCalcPreventRequest> {
    let c = Complete::from_profile(profile)?;
    Some(ClinCalcPreventRequest {
        age: c.age,
        gender: match c.sex {
            Sex::Male => ClinCalcGender::Male,
            Sex::Female => ClinCalcGender::Female,
        },
        total_cholesterol: c.total_cholesterol,
        hdl_cholesterol: c.hdl_cholesterol,
        systolic_bp: c.systolic_bp,
        bmi: c.bmi,
        egfr: c.egfr,
        diabetes: profile.diabetes,
        smoker: profile.smoker,
        taking_antihypertensive: profile.antihypertensive,
        taking_statin: profile.statin,
    })
}

/// The required fields of a profile once they are known to be usable.
struct Complete {
    age: i32,
    sex: Sex,
    total_cholesterol: f64,
    hdl_cholesterol: f64,
    systolic_bp: f64,
    bmi: f64,
    egfr: f64,
}

impl Complete {
    fn from_profile(profile: &ClinicalProfile) -> Option<Self> {
        profile.check_complete().ok()?;
        Some(Self {
            age: profile.age?,
            sex: profile.sex?,
            total_cholesterol: profile.total_cholesterol?,
            hdl_cholesterol: profile.hdl_cholesterol?,
            systolic_bp: profile.systolic_bp?,
            bmi: profile.bmi?,
            egfr: profile.egfr?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_profile() -> ClinicalProfile {
        ClinicalProfile {
            age: Some(55),
            sex: Some(Sex::Male),
            total_cholesterol: Some(210.0),
            hdl_cholesterol: Some(45.0),
            systolic_bp: Some(142.0),
            bmi: Some(28.4),
            egfr: Some(88.0),
            diabetes: true,
            smoker: false,
            antihypertensive: true,
            statin: false,
        }
    }

    #[test]
    fn test_mdcalc_payload_encodes_flags_and_units() {
        let payload = build_mdcalc_payload(&complete_profile()).expect("profile is complete");
        assert!(payload.uom_system);
        assert_eq!(payload.model, 0);
        assert_eq!(payload.sex, BinaryFlag::Yes);
        assert_eq!(payload.diabetes, BinaryFlag::Yes);
        assert_eq!(payload.smoker, BinaryFlag::No);
        assert_eq!(payload.htn_med, BinaryFlag::Yes);
        assert_eq!(payload.statin, BinaryFlag::No);
        assert_eq!(payload.tc, 210.0);

        let json = serde_json::to_value(&payload).expect("serialise payload");
        assert_eq!(json["UOMSYSTEM"], true);
        assert_eq!(json["sex"], 1);
    }

    #[test]
    fn test_same_profile_builds_equal_payloads() {
        let profile = complete_profile();
        let first = build_payloads(&profile).expect("profile is complete");
        let second = build_payloads(&profile.clone()).expect("profile is complete");
        assert_eq!(first, second);

        let mut changed = profile;
        changed.egfr = Some(60.0);
        let third = build_payloads(&changed).expect("profile is complete");
        assert_ne!(first, third);
        assert_eq!(third.mdcalc.egfr, 60.0);
        assert_eq!(third.clincalc.egfr, 60.0);
    }

    #[test]
    fn test_female_maps_to_zero_and_female_gender() {
        let mut profile = complete_profile();
        profile.sex = Some(Sex::Female);

        let payloads = build_payloads(&profile).expect("profile is complete");
        assert_eq!(payloads.mdcalc.sex, BinaryFlag::No);
        assert_eq!(payloads.clincalc.gender, ClinCalcGender::Female);
        assert!(payloads.clincalc.diabetes);
        assert!(payloads.clincalc.taking_antihypertensive);
    }

    #[test]
    fn test_any_missing_field_yields_no_payloads() {
        let mut cases = Vec::new();
        for i in 0..7 {
            let mut p = complete_profile();
            match i {
                0 => p.age = None,
                1 => p.sex = None,
                2 => p.total_cholesterol = None,
                3 => p.hdl_cholesterol = None,
                4 => p.systolic_bp = None,
                5 => p.bmi = None,
                _ => p.egfr = None,
            }
            cases.push(p);
        }

        for profile in cases {
            assert_eq!(build_payloads(&profile), None, "{profile:?}");
            assert_eq!(build_mdcalc_payload(&profile), None);
            assert_eq!(build_clincalc_payload(&profile), None);
        }
    }

    #[test]
    fn test_non_positive_age_yields_no_payloads() {
        let mut profile = complete_profile();
        profile.age = Some(0);
        assert_eq!(build_payloads(&profile), None);
    }
}
