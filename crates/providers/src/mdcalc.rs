//! Client A: the MdCalc PREVENT JSON calculator.

use std::future::Future;

use api_shared::{MdCalcAssessment, MdCalcPreventRequest};
use prevent_core::{Provider, ProviderError, ProviderResult, RiskCalculator, ShapeError};

use crate::transport_error;

const PROVIDER: Provider = Provider::MdCalc;

#[derive(Clone, Debug)]
pub struct MdCalcClient {
    http: reqwest::Client,
    url: String,
}

impl MdCalcClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    /// POSTs `request` as JSON and validates the `{output: [...]}` answer.
    ///
    /// # Errors
    ///
    /// - `Unreachable` if the request could not be sent
    /// - `UpstreamStatus` for any non-2xx answer
    /// - `Shape` if the body is unreadable, not JSON, or not the expected schema
    pub async fn assess(&self, request: &MdCalcPreventRequest) -> ProviderResult<MdCalcAssessment> {
        tracing::debug!(url = %self.url, age = request.age, "posting MdCalc assessment");

        let response = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::status(PROVIDER, status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(|e| {
            ProviderError::shape(PROVIDER, ShapeError::UnreadableBody(e.to_string()))
        })?;

        parse_assessment(&bytes)
    }
}

/// Parses raw bytes first as JSON, then as an assessment, so the two failure
/// kinds stay distinct.
pub fn parse_assessment(bytes: &[u8]) -> ProviderResult<MdCalcAssessment> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| ProviderError::shape(PROVIDER, ShapeError::InvalidJson(e.to_string())))?;

    serde_json::from_value(value)
        .map_err(|e| ProviderError::shape(PROVIDER, ShapeError::Schema(e.to_string())))
}

impl RiskCalculator for MdCalcClient {
    type Request = MdCalcPreventRequest;
    type Output = MdCalcAssessment;

    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn calculate(
        &self,
        request: &MdCalcPreventRequest,
    ) -> impl Future<Output = ProviderResult<MdCalcAssessment>> + Send {
        self.assess(request)
    }
}
