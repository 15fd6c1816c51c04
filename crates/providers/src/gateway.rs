//! Client for this system's own REST gateway.
//!
//! Sends each payload wrapped in the `{"body": ...}` envelope to
//! `/api/v1/{mdcalc,clincalc}/prevent-assessments` and unwraps the 201 answer.

use std::future::Future;

use api_shared::auth::API_KEY_HEADER;
use api_shared::{
    ClinCalcContribution, ClinCalcPreventRequest, ClinCalcPreventResponse, MdCalcAssessment,
    MdCalcPreventRequest, MdCalcPreventResponse, RequestEnvelope,
};
use prevent_core::{Provider, ProviderError, ProviderResult, RiskCalculator, ShapeError};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::transport_error;

pub const MDCALC_PATH: &str = "/api/v1/mdcalc/prevent-assessments";
pub const CLINCALC_PATH: &str = "/api/v1/clincalc/prevent-assessments";

#[derive(Clone, Debug)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GatewayClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Sends `x-api-key` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// One calculator handle per provider, sharing this client.
    pub fn split(self) -> (GatewayMdCalc, GatewayClinCalc) {
        (GatewayMdCalc(self.clone()), GatewayClinCalc(self))
    }

    async fn post<Req, Resp>(&self, provider: Provider, path: &str, body: &Req) -> ProviderResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.post(&url).json(&RequestEnvelope { body });
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(provider, e))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            ProviderError::shape(provider, ShapeError::UnreadableBody(e.to_string()))
        })?;

        if !status.is_success() {
            let message = serde_json::from_slice::<serde_json::Value>(&bytes)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| format!("{provider} request failed."));
            return Err(ProviderError::UpstreamStatus {
                provider,
                status: status.as_u16(),
                message: Some(message),
            });
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::shape(provider, ShapeError::Schema(e.to_string())))
    }
}

/// MdCalc through the gateway.
#[derive(Clone, Debug)]
pub struct GatewayMdCalc(GatewayClient);

/// ClinCalc through the gateway.
#[derive(Clone, Debug)]
pub struct GatewayClinCalc(GatewayClient);

impl RiskCalculator for GatewayMdCalc {
    type Request = MdCalcPreventRequest;
    type Output = MdCalcAssessment;

    fn provider(&self) -> Provider {
        Provider::MdCalc
    }

    fn calculate(
        &self,
        request: &MdCalcPreventRequest,
    ) -> impl Future<Output = ProviderResult<MdCalcAssessment>> + Send {
        async move {
            let response: MdCalcPreventResponse =
                self.0.post(Provider::MdCalc, MDCALC_PATH, request).await?;
            Ok(response.assessment)
        }
    }
}

impl RiskCalculator for GatewayClinCalc {
    type Request = ClinCalcPreventRequest;
    type Output = Vec<ClinCalcContribution>;

    fn provider(&self) -> Provider {
        Provider::ClinCalc
    }

    fn calculate(
        &self,
        request: &ClinCalcPreventRequest,
    ) -> impl Future<Output = ProviderResult<Vec<ClinCalcContribution>>> + Send {
        async move {
            let response: ClinCalcPreventResponse =
                self.0.post(Provider::ClinCalc, CLINCALC_PATH, request).await?;
            Ok(response.contributions)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{clincalc_request, dead_url, mdcalc_request, spawn_server};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_gateway_wraps_payload_in_envelope() {
        let router = Router::new().route(
            MDCALC_PATH,
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(body["body"]["age"], json!(55));
                assert_eq!(
                    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()),
                    Some("secret")
                );
                (
                    StatusCode::CREATED,
                    Json(json!({"assessment": {"output": [
                        {"name": "10-year CVD", "value": "6", "value_text": "6%", "message": ""}
                    ]}})),
                )
            }),
        );
        let base = spawn_server(router).await;
        let (mdcalc, _) = GatewayClient::new(reqwest::Client::new(), format!("{base}/"))
            .with_api_key("secret")
            .split();

        let assessment = mdcalc
            .calculate(&mdcalc_request())
            .await
            .expect("gateway answered 201");
        assert_eq!(assessment.output[0].value_text, "6%");
    }

    #[tokio::test]
    async fn test_gateway_error_body_becomes_message() {
        let router = Router::new()
            .route(
                MDCALC_PATH,
                post(|| async {
                    (
                        StatusCode::BAD_GATEWAY,
                        Json(json!({"error": "Failed to reach MdCalc."})),
                    )
                }),
            )
            .route(
                CLINCALC_PATH,
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "oops") }),
            );
        let base = spawn_server(router).await;
        let (mdcalc, clincalc) = GatewayClient::new(reqwest::Client::new(), base).split();

        let err = mdcalc
            .calculate(&mdcalc_request())
            .await
            .expect_err("502 from gateway");
        assert_eq!(err.upstream_status(), Some(502));
        assert_eq!(err.user_message(), "Failed to reach MdCalc.");

        let err = clincalc
            .calculate(&clincalc_request())
            .await
            .expect_err("500 from gateway");
        assert_eq!(err.user_message(), "ClinCalc request failed.");
    }

    #[tokio::test]
    async fn test_gateway_unreachable() {
        let (_, clincalc) = GatewayClient::new(reqwest::Client::new(), dead_url().await).split();
        let err = clincalc
            .calculate(&clincalc_request())
            .await
            .expect_err("nothing is listening");
        assert_eq!(err.user_message(), "ClinCalc is unreachable right now.");
    }
}
