//! Pattern-based extraction from ClinCalc's server-rendered page.
//!
//! The page is an unversioned contract. Extraction is deliberately regex based
//! and lives behind [`ContributionExtractor`] so a different strategy can be
//! dropped in without touching the client or the aggregator.

use std::sync::LazyLock;

use api_shared::ClinCalcContribution;
use prevent_core::ShapeError;
use regex::Regex;

pub const VIEW_STATE: &str = "__VIEWSTATE";
pub const VIEW_STATE_GENERATOR: &str = "__VIEWSTATEGENERATOR";
pub const EVENT_VALIDATION: &str = "__EVENTVALIDATION";

fn hidden_input_regex(name: &str) -> Regex {
    let pattern = format!(
        r#"(?i)<input[^>]+name=["']{}["'][^>]*value=["']([^"']*)["']"#,
        regex::escape(name)
    );
    Regex::new(&pattern).expect("valid regex")
}

static VIEW_STATE_RE: LazyLock<Regex> = LazyLock::new(|| hidden_input_regex(VIEW_STATE));
static VIEW_STATE_GENERATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| hidden_input_regex(VIEW_STATE_GENERATOR));
static EVENT_VALIDATION_RE: LazyLock<Regex> =
    LazyLock::new(|| hidden_input_regex(EVENT_VALIDATION));

static DATA_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"google\.visualization\.arrayToDataTable\([^)]*?\)").expect("valid regex")
});
static CONTRIBUTION_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[\s*"([^"]+)"\s*,\s*(-?\d+(?:\.\d+)?)\s*,\s*"[^"]*"\s*,\s*"([^"]+)"\s*]"#)
        .expect("valid regex")
});

/// The ASP.NET session fields the form POST must echo back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HiddenFields {
    pub view_state: String,
    pub view_state_generator: String,
    pub event_validation: String,
}

impl HiddenFields {
    /// Reads all three fields from the form page.
    ///
    /// # Errors
    ///
    /// `ShapeError::MissingHiddenField` naming the first field that is absent or empty.
    pub fn from_html(html: &str) -> Result<Self, ShapeError> {
        Ok(Self {
            view_state: hidden_value(html, VIEW_STATE, &VIEW_STATE_RE)?,
            view_state_generator: hidden_value(html, VIEW_STATE_GENERATOR, &VIEW_STATE_GENERATOR_RE)?,
            event_validation: hidden_value(html, EVENT_VALIDATION, &EVENT_VALIDATION_RE)?,
        })
    }
}

fn hidden_value(html: &str, name: &'static str, re: &Regex) -> Result<String, ShapeError> {
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ShapeError::MissingHiddenField(name))
}

/// Strategy for turning the result page into contributions.
pub trait ContributionExtractor: Send + Sync + 'static {
    /// # Errors
    ///
    /// A `ShapeError` when the page no longer carries recognisable data.
    fn extract(&self, html: &str) -> Result<Vec<ClinCalcContribution>, ShapeError>;
}

/// Reads rows of the `google.visualization.arrayToDataTable(...)` literal.
///
/// Rows look like `["Age", 4.2, "", "annotation"]`; the third column is
/// ignored. When the page holds several data tables the first one wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChartDataTableExtractor;

impl ContributionExtractor for ChartDataTableExtractor {
    fn extract(&self, html: &str) -> Result<Vec<ClinCalcContribution>, ShapeError> {
        let table = DATA_TABLE_RE
            .find(html)
            .ok_or(ShapeError::MissingDataTable)?
            .as_str();

        let contributions: Vec<ClinCalcContribution> = CONTRIBUTION_ROW_RE
            .captures_iter(table)
            .filter_map(|row| {
                let value = row[2].parse::<f64>().ok()?;
                Some(ClinCalcContribution {
                    factor: row[1].to_string(),
                    value,
                    annotation: row[3].to_string(),
                })
            })
            .collect();

        if contributions.is_empty() {
            return Err(ShapeError::NoContributionRows);
        }

        tracing::debug!(rows = contributions.len(), "extracted ClinCalc contributions");
        Ok(contributions)
    }
}
