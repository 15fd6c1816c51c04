//! The seam between the aggregator and the upstream calculator clients.

use std::future::Future;

use crate::error::{Provider, ProviderError};

/// One upstream risk calculator.
///
/// Implementations perform a single round trip per call with no retries.
/// Dropping the returned future abandons the call.
pub trait RiskCalculator: Send + Sync + 'static {
    type Request: Send + Sync;
    type Output: Clone + Send + 'static;

    fn provider(&self) -> Provider;

    fn calculate(
        &self,
        request: &Self::Request,
    ) -> impl Future<Output = Result<Self::Output, ProviderError>> + Send;
}
