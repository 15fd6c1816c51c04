//! Constants used throughout the PREVENT core crate.
//!
//! Upstream endpoints, clinical field limits and persisted model identifiers live
//! here so every crate agrees on them.

/// Default upstream JSON calculator endpoint (MdCalc PREVENT).
pub const DEFAULT_MDCALC_URL: &str = "https://www.mdcalc.com/api/v1/calc/10491/calculate";

/// Default upstream HTML calculator page (ClinCalc PREVENT).
pub const DEFAULT_CLINCALC_URL: &str = "https://clincalc.com/Cardiology/PREVENT/";

/// Default directory for assessment snapshot storage.
pub const DEFAULT_ASSESSMENT_DATA_DIR: &str = "assessment_data";

/// Model identifier stored on every snapshot.
pub const SNAPSHOT_MODEL: &str = "PREVENT";

/// Model version stored on every snapshot.
pub const SNAPSHOT_MODEL_VERSION: &str = "2023";

/// Inclusive bounds for one numeric clinical field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldRange {
    pub min: f64,
    pub max: f64,
}

impl FieldRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Closed-interval check. Non-finite values are never in range.
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

pub const TOTAL_CHOLESTEROL_RANGE: FieldRange = FieldRange::new(130.0, 320.0);
pub const HDL_CHOLESTEROL_RANGE: FieldRange = FieldRange::new(20.0, 100.0);
pub const SYSTOLIC_BP_RANGE: FieldRange = FieldRange::new(90.0, 200.0);
pub const BMI_RANGE: FieldRange = FieldRange::new(18.5, 39.9);
pub const EGFR_RANGE: FieldRange = FieldRange::new(15.0, 150.0);

/// Ages the PREVENT equations are defined for.
pub const AGE_RANGE: FieldRange = FieldRange::new(30.0, 79.0);

/// Bounds on first/last name length after trimming.
pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 255;

/// Maximum number of ranked risk factors shown per assessment.
pub const TOP_RISK_FACTORS: usize = 5;

/// Percent at which the risk progress bar is full.
pub const RISK_PROGRESS_CEILING: f64 = 40.0;
