//! # PREVENT Providers
//!
//! HTTP adapters for the two upstream PREVENT calculators, plus a client for
//! this system's own REST gateway.
//!
//! - [`MdCalcClient`]: one JSON POST per assessment
//! - [`ClinCalcClient`]: GET the form page for its hidden session fields, POST
//!   the filled-in form, then scrape the contribution chart data
//! - [`GatewayClient`]: calls `/api/v1/.../prevent-assessments` on a running
//!   `api-rest` instance
//!
//! Every client implements [`prevent_core::RiskCalculator`] and performs a
//! single round trip with no retries.

#![warn(rust_2018_idioms)]

pub mod clincalc;
pub mod gateway;
pub mod mdcalc;
pub mod scrape;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clincalc::ClinCalcClient;
pub use gateway::{GatewayClient, GatewayClinCalc, GatewayMdCalc};
pub use mdcalc::MdCalcClient;
pub use scrape::{ChartDataTableExtractor, ContributionExtractor, HiddenFields};

use prevent_core::{Provider, ProviderError};

const USER_AGENT: &str = concat!("prevent/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for all adapters.
///
/// No request timeout is set; a hung upstream is abandoned by cancelling the attempt.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().user_agent(USER_AGENT).build()
}

/// Maps a failed send to the provider's "unreachable" error.
pub(crate) fn transport_error(provider: Provider, e: reqwest::Error) -> ProviderError {
    let detail = if e.is_connect() {
        format!("connection failed: {e}")
    } else if e.is_timeout() {
        format!("request timed out: {e}")
    } else {
        e.to_string()
    };
    tracing::debug!(%provider, %detail, "upstream request failed");
    ProviderError::unreachable(provider, detail)
}
