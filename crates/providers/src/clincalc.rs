//! Client B: the ClinCalc PREVENT web form.
//!
//! Two phases, both required: GET the page to harvest the hidden session
//! fields, then POST the filled-in form and scrape the contribution chart out
//! of the returned HTML.

use std::future::Future;

use api_shared::{ClinCalcContribution, ClinCalcGender, ClinCalcPreventRequest};
use prevent_core::{Provider, ProviderError, ProviderResult, RiskCalculator, ShapeError};

use crate::scrape::{
    ChartDataTableExtractor, ContributionExtractor, HiddenFields, EVENT_VALIDATION, VIEW_STATE,
    VIEW_STATE_GENERATOR,
};
use crate::transport_error;

const PROVIDER: Provider = Provider::ClinCalc;

/// Prefix of every control inside the calculator's content placeholder.
const MAIN: &str = "ctl00$cphMainContent$";

#[derive(Clone, Debug)]
pub struct ClinCalcClient<E = ChartDataTableExtractor> {
    http: reqwest::Client,
    url: String,
    extractor: E,
}

impl ClinCalcClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self::with_extractor(http, url, ChartDataTableExtractor)
    }
}

impl<E: ContributionExtractor> ClinCalcClient<E> {
    pub fn with_extractor(http: reqwest::Client, url: impl Into<String>, extractor: E) -> Self {
        Self {
            http,
            url: url.into(),
            extractor,
        }
    }

    /// Phase 1: fetch the form page and read its hidden fields.
    ///
    /// # Errors
    ///
    /// Any failure is wrapped in `ProviderError::SessionInit`.
    pub async fn fetch_hidden_fields(&self) -> ProviderResult<HiddenFields> {
        self.try_fetch_hidden_fields()
            .await
            .map_err(ProviderError::session_init)
    }

    async fn try_fetch_hidden_fields(&self) -> ProviderResult<HiddenFields> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::status(PROVIDER, status.as_u16()));
        }

        let html = response.text().await.map_err(|e| {
            ProviderError::shape(PROVIDER, ShapeError::UnreadableBody(e.to_string()))
        })?;

        HiddenFields::from_html(&html).map_err(|e| ProviderError::shape(PROVIDER, e))
    }

    /// Runs both phases and returns the parsed contributions.
    ///
    /// # Errors
    ///
    /// - `SessionInit` if phase 1 fails
    /// - `Unreachable` / `UpstreamStatus` if the form POST fails
    /// - `Shape` if the result page has no usable contribution data
    pub async fn assess(
        &self,
        request: &ClinCalcPreventRequest,
    ) -> ProviderResult<Vec<ClinCalcContribution>> {
        let hidden = self.fetch_hidden_fields().await?;
        let form = build_form(request, &hidden);
        tracing::debug!(url = %self.url, fields = form.len(), "submitting ClinCalc form");

        let response = self
            .http
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::status(PROVIDER, status.as_u16()));
        }

        let html = response.text().await.map_err(|e| {
            ProviderError::shape(PROVIDER, ShapeError::UnreadableBody(e.to_string()))
        })?;

        let contributions = self
            .extractor
            .extract(&html)
            .map_err(|e| ProviderError::shape(PROVIDER, e))?;

        check_contributions(&contributions).map_err(|e| ProviderError::shape(PROVIDER, e))?;
        Ok(contributions)
    }
}

/// Every row needs a named factor and a finite value, whichever extractor produced it.
fn check_contributions(contributions: &[ClinCalcContribution]) -> Result<(), ShapeError> {
    match contributions
        .iter()
        .find(|c| c.factor.trim().is_empty() || !c.value.is_finite())
    {
        Some(bad) => Err(ShapeError::InvalidContribution {
            factor: bad.factor.clone(),
        }),
        None => Ok(()),
    }
}

fn main_field(name: &str) -> String {
    format!("{MAIN}{name}")
}

fn choice(flag: bool, yes: &str, no: &str) -> String {
    let picked = if flag { yes } else { no };
    picked.to_string()
}

/// The URL-encoded form body, in the order the page itself submits it.
///
/// Control names and sentinel values are the legacy form's own and must be
/// reproduced verbatim.
pub fn build_form(request: &ClinCalcPreventRequest, hidden: &HiddenFields) -> Vec<(String, String)> {
    let gender = match request.gender {
        ClinCalcGender::Male => "rdoMale",
        ClinCalcGender::Female => "rdoFemale",
    };

    let mut form = vec![
        (VIEW_STATE.to_string(), hidden.view_state.clone()),
        (VIEW_STATE_GENERATOR.to_string(), hidden.view_state_generator.clone()),
        (EVENT_VALIDATION.to_string(), hidden.event_validation.clone()),
    ];

    let main = [
        ("txtAge", request.age.to_string()),
        ("rdoGender", gender.to_string()),
        ("txtTC", request.total_cholesterol.to_string()),
        ("drpTotalCholesterol", "1".to_string()),
        ("txtHDL", request.hdl_cholesterol.to_string()),
        ("drpHdlCholesterol", "1".to_string()),
        ("txtSBP", request.systolic_bp.to_string()),
        ("hiddenBmi", "divBmiManual".to_string()),
        ("txtBMI", request.bmi.to_string()),
        ("txtHeight", String::new()),
        ("rdoHeight", "rdoIn".to_string()),
        ("txtWeight", String::new()),
        ("rdoWeight", "kg".to_string()),
        ("hiddenEgfr", "divEgfrManual".to_string()),
        ("txteGFR", request.egfr.to_string()),
        ("txtCreatinine", String::new()),
        ("drpCreatinineUnits", "1".to_string()),
        ("rdoDM", choice(request.diabetes, "rdoDMYes", "rdoDMNo")),
        ("rdoSmoker", choice(request.smoker, "rdoSmokerYes", "rdoSmokerNo")),
        (
            "rdoBPTreatment",
            choice(request.taking_antihypertensive, "rdoBPTreatmentYes", "rdoBPTreatmentNo"),
        ),
        (
            "rdoStatinTreatment",
            choice(request.taking_statin, "rdoStatinYes", "rdoStatinNo"),
        ),
        ("rdoSdiType", "rdoSdiZip".to_string()),
        ("hiddenSdi", "rdoSdiZip".to_string()),
        ("txtZIP", String::new()),
        ("drpSDI", String::new()),
        ("txtA1C", String::new()),
        ("txtUACR", String::new()),
        ("cmdCalculate", "Calculate".to_string()),
        ("ChangeSIUS_Unit", "0".to_string()),
    ];
    form.extend(main.into_iter().map(|(name, value)| (main_field(name), value)));

    form.push(("ctl00$txtSearch".to_string(), String::new()));
    form.push(("ctl00$txtOffcanvasSearch".to_string(), String::new()));
    form
}

impl<E: ContributionExtractor> RiskCalculator for ClinCalcClient<E> {
    type Request = ClinCalcPreventRequest;
    type Output = Vec<ClinCalcContribution>;

    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn calculate(
        &self,
        request: &ClinCalcPreventRequest,
    ) -> impl Future<Output = ProviderResult<Vec<ClinCalcContribution>>> + Send {
        self.assess(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{clincalc_request, dead_url, spawn_server};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::sync::{Arc, Mutex};

    const FORM_PAGE: &str = r#"<input type="hidden" name="__VIEWSTATE" value="vs1" />
        <input type="hidden" name="__VIEWSTATEGENERATOR" value="gen2" />
        <input type="hidden" name="__EVENTVALIDATION" value="ev3" />"#;

    const RESULT_PAGE: &str = r#"<script>
        var data = google.visualization.arrayToDataTable([
            ["Factor", "Effect", { role: "style" }, { role: "annotation" }],
            ["Age",4.2,"","+4.2%"],
            ["Statin",-0.8,"","-0.8%"]
        ]);</script>"#;

    fn hidden() -> HiddenFields {
        HiddenFields {
            view_state: "vs1".into(),
            view_state_generator: "gen2".into(),
            event_validation: "ev3".into(),
        }
    }

    fn page_router(result_page: &'static str, post_status: StatusCode) -> (Router, Arc<Mutex<Option<String>>>) {
        let received = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&received);
        let router = Router::new().route(
            "/prevent/",
            get(|| async { FORM_PAGE }).post(move |body: String| {
                let sink = Arc::clone(&sink);
                async move {
                    *sink.lock().expect("sink lock") = Some(body);
                    (post_status, result_page)
                }
            }),
        );
        (router, received)
    }

    #[test]
    fn test_build_form_order_and_sentinels() {
        let form = build_form(&clincalc_request(), &hidden());
        let names: Vec<&str> = form.iter().map(|(n, _)| n.as_str()).collect();

        assert_eq!(form.len(), 34);
        assert_eq!(&names[..4], &["__VIEWSTATE", "__VIEWSTATEGENERATOR", "__EVENTVALIDATION", "ctl00$cphMainContent$txtAge"]);
        assert_eq!(&names[32..], &["ctl00$txtSearch", "ctl00$txtOffcanvasSearch"]);

        let value = |name: &str| {
            form.iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
                .expect("field present")
        };
        assert_eq!(value("ctl00$cphMainContent$rdoGender"), "rdoMale");
        assert_eq!(value("ctl00$cphMainContent$txtTC"), "213");
        assert_eq!(value("ctl00$cphMainContent$txtBMI"), "27.5");
        assert_eq!(value("ctl00$cphMainContent$rdoSmoker"), "rdoSmokerYes");
        assert_eq!(value("ctl00$cphMainContent$rdoDM"), "rdoDMNo");
        assert_eq!(value("ctl00$cphMainContent$rdoBPTreatment"), "rdoBPTreatmentYes");
        assert_eq!(value("ctl00$cphMainContent$rdoStatinTreatment"), "rdoStatinNo");
        assert_eq!(value("ctl00$cphMainContent$ChangeSIUS_Unit"), "0");
    }

    #[tokio::test]
    async fn test_assess_runs_both_phases() {
        let (router, received) = page_router(RESULT_PAGE, StatusCode::OK);
        let base = spawn_server(router).await;
        let client = ClinCalcClient::new(reqwest::Client::new(), format!("{base}/prevent/"));

        let contributions = client
            .calculate(&clincalc_request())
            .await
            .expect("contributions should parse");
        assert_eq!(contributions.len(), 2);
        assert_eq!(contributions[1].factor, "Statin");
        assert_eq!(contributions[1].value, -0.8);

        let body = received
            .lock()
            .expect("sink lock")
            .clone()
            .expect("form was posted");
        assert!(body.starts_with("__VIEWSTATE=vs1&__VIEWSTATEGENERATOR=gen2&__EVENTVALIDATION=ev3&"));
        assert!(body.contains("ctl00%24cphMainContent%24txtAge=55"));
        assert!(body.ends_with("ctl00%24txtSearch=&ctl00%24txtOffcanvasSearch="));
    }

    #[tokio::test]
    async fn test_missing_hidden_field_fails_session_init() {
        let router = Router::new().route("/prevent/", get(|| async { "<html></html>" }));
        let base = spawn_server(router).await;
        let client = ClinCalcClient::new(reqwest::Client::new(), format!("{base}/prevent/"));

        let err = client
            .assess(&clincalc_request())
            .await
            .expect_err("page has no hidden fields");
        assert!(matches!(err, ProviderError::SessionInit { .. }));
        assert_eq!(err.user_message(), "Missing __VIEWSTATE in ClinCalc response.");
    }

    #[tokio::test]
    async fn test_form_post_status_is_reported() {
        let (router, _) = page_router(RESULT_PAGE, StatusCode::SERVICE_UNAVAILABLE);
        let base = spawn_server(router).await;
        let client = ClinCalcClient::new(reqwest::Client::new(), format!("{base}/prevent/"));

        let err = client
            .assess(&clincalc_request())
            .await
            .expect_err("POST answered 503");
        assert_eq!(err.upstream_status(), Some(503));
    }

    #[tokio::test]
    async fn test_result_without_chart_is_shape_error() {
        let (router, _) = page_router("<html>changed layout</html>", StatusCode::OK);
        let base = spawn_server(router).await;
        let client = ClinCalcClient::new(reqwest::Client::new(), format!("{base}/prevent/"));

        let err = client
            .assess(&clincalc_request())
            .await
            .expect_err("no data table");
        assert_eq!(
            err,
            ProviderError::shape(Provider::ClinCalc, ShapeError::MissingDataTable)
        );
    }

    #[tokio::test]
    async fn test_blank_factor_is_shape_error() {
        const BLANK_FACTOR: &str = r#"google.visualization.arrayToDataTable([
            ["Age",4.2,"","+4.2%"],
            ["   ",1.0,"","+1.0%"]
        ]);"#;
        let (router, _) = page_router(BLANK_FACTOR, StatusCode::OK);
        let base = spawn_server(router).await;
        let client = ClinCalcClient::new(reqwest::Client::new(), format!("{base}/prevent/"));

        let err = client
            .assess(&clincalc_request())
            .await
            .expect_err("blank factor name");
        assert_eq!(
            err,
            ProviderError::shape(
                Provider::ClinCalc,
                ShapeError::InvalidContribution { factor: "   ".into() }
            )
        );
    }

    #[test]
    fn test_check_contributions_rejects_non_finite_values() {
        let row = |factor: &str, value: f64| ClinCalcContribution {
            factor: factor.into(),
            value,
            annotation: String::new(),
        };
        assert!(check_contributions(&[row("Age", 4.2), row("Statin", -0.8)]).is_ok());
        assert_eq!(
            check_contributions(&[row("Age", 4.2), row("BMI", f64::NAN)]),
            Err(ShapeError::InvalidContribution { factor: "BMI".into() })
        );
    }

    #[tokio::test]
    async fn test_unreachable_page_fails_session_init() {
        let client = ClinCalcClient::new(reqwest::Client::new(), dead_url().await);

        let err = client
            .assess(&clincalc_request())
            .await
            .expect_err("nothing is listening");
        assert!(matches!(err, ProviderError::SessionInit { .. }));
        assert_eq!(err.user_message(), "ClinCalc is unreachable right now.");
    }
}
