//! Turns raw provider results into the values shown to the patient.
//!
//! Everything here is pure and synchronous. MdCalc outputs are free text, so
//! percentages are pulled out with first-match numeric regexes; ClinCalc
//! contributions are ranked and labelled.

use std::sync::LazyLock;

use api_shared::{ClinCalcContribution, MdCalcAssessment, MdCalcOutput};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::{RISK_PROGRESS_CEILING, TOP_RISK_FACTORS};

static TEN_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)10\s?-?\s?(year|yr)").expect("valid regex"));
static CARDIOVASCULAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)cvd|cardiovascular").expect("valid regex"));
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(\.\d+)?").expect("valid regex"));
static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static DETAILED_OUTPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)10-?year ascvd risk").expect("valid regex"));

static ASCVD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)10-?Year ASCVD Risk:\s*([0-9.]+)%").expect("valid regex")
});
static HEART_FAILURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)10-?Year Heart Failure Risk:\s*([0-9.]+)%").expect("valid regex")
});
static CHD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)10-?Year Coronary Heart Disease Risk:\s*([0-9.]+)%").expect("valid regex")
});
static STROKE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)10-?Year Stroke Risk:\s*([0-9.]+)%").expect("valid regex")
});

static CHD_KEYWORDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(?i)coronary", r"(?i)\bchd\b", r"(?i)myocard"]
        .into_iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
});
static STROKE_KEYWORDS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| vec![Regex::new(r"(?i)stroke").expect("valid regex")]);
static HEART_FAILURE_KEYWORDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(?i)heart failure", r"(?i)\bhf\b"]
        .into_iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
});

fn search_text(output: &MdCalcOutput) -> String {
    format!("{} {}", output.name, output.message)
}

/// Outputs whose name or message mention a 10-year horizon, or all of them when none do.
pub fn ten_year_outputs(outputs: &[MdCalcOutput]) -> Vec<&MdCalcOutput> {
    let filtered: Vec<_> = outputs
        .iter()
        .filter(|o| TEN_YEAR_RE.is_match(&search_text(o)))
        .collect();

    if filtered.is_empty() {
        outputs.iter().collect()
    } else {
        filtered
    }
}

/// First signed decimal number in `value`.
pub fn parse_percent_value(value: &str) -> Option<f64> {
    NUMBER_RE
        .find(value)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Percentage of an output, preferring its display text over the raw value.
pub fn percent_from_output(output: Option<&MdCalcOutput>) -> Option<f64> {
    let output = output?;
    parse_percent_value(&output.value_text).or_else(|| parse_percent_value(&output.value))
}

/// Canonical 10-year cardiovascular risk percentage.
pub fn total_risk_percent(outputs: &[MdCalcOutput]) -> Option<f64> {
    let candidates = ten_year_outputs(outputs);
    let total = candidates
        .iter()
        .find(|o| CARDIOVASCULAR_RE.is_match(&search_text(o)))
        .or_else(|| candidates.first())
        .copied();

    percent_from_output(total)
}

/// Qualitative band for a 10-year risk percentage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Borderline,
    Intermediate,
    High,
    Unknown,
}

impl RiskCategory {
    pub fn from_percent(percent: Option<f64>) -> Self {
        match percent {
            None => RiskCategory::Unknown,
            Some(p) if p < 5.0 => RiskCategory::Low,
            Some(p) if p < 7.5 => RiskCategory::Borderline,
            Some(p) if p < 20.0 => RiskCategory::Intermediate,
            Some(_) => RiskCategory::High,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskCategory::Low => "Low",
            RiskCategory::Borderline => "Borderline",
            RiskCategory::Intermediate => "Intermediate",
            RiskCategory::High => "High",
            RiskCategory::Unknown => "Unknown",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RiskCategory::Low => {
                "Your 10-year risk is low. Keep up healthy habits and routine checkups."
            }
            RiskCategory::Borderline => {
                "Your 10-year risk is borderline. Consider lifestyle changes and discuss options with your care team."
            }
            RiskCategory::Intermediate => {
                "Your 10-year risk is intermediate. Review preventive therapy and lifestyle changes with your care team."
            }
            RiskCategory::High => {
                "Your 10-year risk is high. Discuss preventive therapy and follow up with your care team."
            }
            RiskCategory::Unknown => "Complete your intake to see your risk category.",
        }
    }
}

/// Legend rows for the category scale.
pub const INTERPRETATION_LEVELS: [(RiskCategory, &str); 4] = [
    (RiskCategory::Low, "0-5%"),
    (RiskCategory::Borderline, "5-7.5%"),
    (RiskCategory::Intermediate, "7.5-20%"),
    (RiskCategory::High, "20%+"),
];

/// One row of the category legend, flagged when it matches the current result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretationLevel {
    pub category: RiskCategory,
    pub label: String,
    pub range: String,
    pub active: bool,
}

pub fn interpretation_levels(current: RiskCategory) -> Vec<InterpretationLevel> {
    INTERPRETATION_LEVELS
        .iter()
        .map(|&(category, range)| InterpretationLevel {
            category,
            label: category.label().to_string(),
            range: range.to_string(),
            active: category == current,
        })
        .collect()
}

/// Replaces every tag with a single space.
pub fn strip_html(value: &str) -> String {
    HTML_TAG_RE.replace_all(value, " ").into_owned()
}

/// Per-event percentages embedded in MdCalc's detailed message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PreventBreakdown {
    pub ascvd: Option<f64>,
    pub heart_failure: Option<f64>,
    pub chd: Option<f64>,
    pub stroke: Option<f64>,
}

pub fn parse_prevent_breakdown(message: &str) -> PreventBreakdown {
    let cleaned = strip_html(message);
    let capture = |re: &Regex| {
        re.captures(&cleaned)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    };

    PreventBreakdown {
        ascvd: capture(&ASCVD_RE),
        heart_failure: capture(&HEART_FAILURE_RE),
        chd: capture(&CHD_RE),
        stroke: capture(&STROKE_RE),
    }
}

/// Breakdown from the first output whose message carries the detailed ASCVD text.
pub fn breakdown_from_outputs(outputs: &[MdCalcOutput]) -> Option<PreventBreakdown> {
    outputs
        .iter()
        .find(|o| DETAILED_OUTPUT_RE.is_match(&strip_html(&o.message)))
        .map(|o| parse_prevent_breakdown(&o.message))
}

/// The three cardiovascular events shown in the breakdown, in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    CoronaryHeartDisease,
    Stroke,
    HeartFailure,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::CoronaryHeartDisease,
        EventKind::Stroke,
        EventKind::HeartFailure,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EventKind::CoronaryHeartDisease => "CHD",
            EventKind::Stroke => "Stroke",
            EventKind::HeartFailure => "HF",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            EventKind::CoronaryHeartDisease => "Coronary heart disease",
            EventKind::Stroke => "Ischemic or hemorrhagic",
            EventKind::HeartFailure => "Heart failure",
        }
    }

    fn keywords(self) -> &'static [Regex] {
        match self {
            EventKind::CoronaryHeartDisease => &CHD_KEYWORDS,
            EventKind::Stroke => &STROKE_KEYWORDS,
            EventKind::HeartFailure => &HEART_FAILURE_KEYWORDS,
        }
    }

    fn from_breakdown(self, breakdown: &PreventBreakdown) -> Option<f64> {
        match self {
            EventKind::CoronaryHeartDisease => breakdown.chd,
            EventKind::Stroke => breakdown.stroke,
            EventKind::HeartFailure => breakdown.heart_failure,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBreakdown {
    pub kind: EventKind,
    pub label: String,
    pub description: String,
    /// Formatted percentage, `"N/A"` when unknown.
    pub value: String,
    pub numeric_value: Option<f64>,
}

/// One row per [`EventKind`], highest risk first.
///
/// Values come from the detailed breakdown message when present, otherwise from
/// the first 10-year output whose text matches the event's keywords. Missing
/// values sort last; ties keep declaration order.
pub fn event_breakdown(outputs: &[MdCalcOutput]) -> Vec<EventBreakdown> {
    let breakdown = breakdown_from_outputs(outputs);
    let candidates = ten_year_outputs(outputs);

    let mut rows: Vec<(usize, EventBreakdown)> = EventKind::ALL
        .into_iter()
        .enumerate()
        .map(|(index, kind)| {
            let numeric_value = breakdown
                .as_ref()
                .and_then(|b| kind.from_breakdown(b))
                .or_else(|| {
                    let output = candidates.iter().copied().find(|o| {
                        let text = search_text(o);
                        kind.keywords().iter().any(|k| k.is_match(&text))
                    });
                    percent_from_output(output)
                });

            (
                index,
                EventBreakdown {
                    kind,
                    label: kind.label().to_string(),
                    description: kind.description().to_string(),
                    value: format_percent(numeric_value),
                    numeric_value,
                },
            )
        })
        .collect();

    rows.sort_by(|(ai, a), (bi, b)| {
        let av = a.numeric_value.unwrap_or(-1.0);
        let bv = b.numeric_value.unwrap_or(-1.0);
        bv.total_cmp(&av).then(ai.cmp(bi))
    });

    rows.into_iter().map(|(_, row)| row).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Impact {
    Harmful,
    Protective,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub label: String,
    pub impact: Impact,
    /// Signed percentage with one decimal, e.g. `+4.2%`.
    pub delta: String,
    /// 0 to 100, relative to the largest effect shown.
    pub strength: u32,
}

/// Top contributions by absolute effect, labelled and normalised.
pub fn rank_risk_factors(contributions: &[ClinCalcContribution]) -> Vec<RiskFactor> {
    let mut sorted: Vec<&ClinCalcContribution> = contributions.iter().collect();
    // Stable, so equal magnitudes keep upstream order.
    sorted.sort_by(|a, b| b.value.abs().total_cmp(&a.value.abs()));
    sorted.truncate(TOP_RISK_FACTORS);

    let max_abs = sorted.iter().map(|c| c.value.abs()).fold(0.0_f64, f64::max);

    sorted
        .into_iter()
        .map(|c| {
            let strength = if max_abs == 0.0 {
                0
            } else {
                ((c.value.abs() / max_abs) * 100.0).round() as u32
            };

            RiskFactor {
                label: canonical_factor_label(&c.factor),
                impact: if c.value >= 0.0 {
                    Impact::Harmful
                } else {
                    Impact::Protective
                },
                delta: format_signed_percent(c.value),
                strength,
            }
        })
        .collect()
}

/// Maps a raw ClinCalc factor name onto a short display label.
///
/// Checked most specific first; unknown names are returned unchanged.
pub fn canonical_factor_label(raw: &str) -> String {
    let normalized = raw.to_lowercase();
    let has = |needle: &str| normalized.contains(needle);

    let label = if has("total cholesterol") {
        "Total cholesterol"
    } else if has("hdl") {
        "HDL"
    } else if has("systolic") || has("sbp") {
        "Systolic BP"
    } else if has("egfr") {
        "eGFR"
    } else if has("body mass") || has("bmi") {
        "BMI"
    } else if has("diabetes") {
        "Diabetes"
    } else if has("smoker") {
        "Smoking"
    } else if has("statin") {
        "Statin"
    } else if has("bp treatment") || has("anti-hypertensive") || has("antihypertensive") {
        "Antihypertensive"
    } else if has("age") {
        "Age"
    } else {
        return raw.to_string();
    };

    label.to_string()
}

/// Up to two decimals with trailing zeros dropped, e.g. `6.1%`; `N/A` when absent.
pub fn format_percent(value: Option<f64>) -> String {
    let Some(value) = value else {
        return "N/A".into();
    };

    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    let trimmed = if trimmed == "-0" { "0" } else { trimmed };
    format!("{trimmed}%")
}

pub fn format_signed_percent(value: f64) -> String {
    // -0.0 would otherwise print as "+-0.0".
    let value = if value == 0.0 { 0.0 } else { value };
    let sign = if value >= 0.0 { "+" } else { "" };
    format!("{sign}{value:.1}%")
}

/// Position on the risk gauge, 0 to 100, saturating at the ceiling percentage.
pub fn risk_progress(percent: Option<f64>) -> f64 {
    percent
        .map(|p| (p / RISK_PROGRESS_CEILING * 100.0).clamp(0.0, 100.0))
        .unwrap_or(0.0)
}

/// Everything the results view renders for one resolved attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    pub total_risk_percent: Option<f64>,
    pub absolute_risk_display: String,
    pub risk_progress: f64,
    pub category: RiskCategory,
    pub category_description: String,
    pub events: Vec<EventBreakdown>,
    pub risk_factors: Vec<RiskFactor>,
    pub levels: Vec<InterpretationLevel>,
}

impl RiskSummary {
    pub fn from_results(
        mdcalc: Option<&MdCalcAssessment>,
        clincalc: Option<&[ClinCalcContribution]>,
    ) -> Self {
        let outputs = mdcalc.map(|a| a.output.as_slice()).unwrap_or_default();
        let total = total_risk_percent(outputs);
        let category = RiskCategory::from_percent(total);

        Self {
            total_risk_percent: total,
            absolute_risk_display: format_percent(total),
            risk_progress: risk_progress(total),
            category,
            category_description: category.description().to_string(),
            events: event_breakdown(outputs),
            risk_factors: clincalc.map(rank_risk_factors).unwrap_or_default(),
            levels: interpretation_levels(category),
        }
    }
}
