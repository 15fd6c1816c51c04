//! HTTP error mapping.
//!
//! Every failure leaves the REST layer as an [`ErrorBody`] with a status code:
//! 400 for request problems, 401 for identity and API-key problems, 404 for
//! missing records, 502 for provider failures and 500 for everything else.

use api_shared::auth::AuthError;
use api_shared::{ErrorBody, FieldIssue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use prevent_core::{ProviderError, ShapeError, StoreError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid JSON payload.")]
    InvalidJson,
    #[error("Invalid request body.")]
    InvalidBody(Vec<FieldIssue>),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0} not found.")]
    NotFound(&'static str),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidJson | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::InvalidBody(issues) => {
                ErrorBody::new(self.to_string()).with_issues(issues.clone())
            }
            ApiError::NotFound(what) => ErrorBody::new(format!("{} not found.", upper_first(what))),
            ApiError::Provider(err) => provider_error_body(err),
            ApiError::Internal(_) => ErrorBody::new("Internal server error."),
            _ => ErrorBody::new(self.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::Internal(detail) => tracing::error!(%detail, "request failed"),
            ApiError::Provider(err) => {
                tracing::warn!(provider = %err.provider(), error = %err, "provider request failed")
            }
            _ => {}
        }
        (status, Json(self.body())).into_response()
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Maps a provider failure to the 502 body.
///
/// Upstream status codes are echoed in `status`; scrape and schema problems
/// carry their detail.
pub fn provider_error_body(err: &ProviderError) -> ErrorBody {
    let provider = err.provider();
    match err {
        ProviderError::Unreachable { .. } => ErrorBody::new(format!("Failed to reach {provider}.")),
        ProviderError::UpstreamStatus { status, .. } => {
            ErrorBody::new(format!("{provider} responded with an error.")).with_status(*status)
        }
        ProviderError::Shape { source, .. } => match source {
            ShapeError::UnreadableBody(_) => {
                ErrorBody::new(format!("{provider} returned unreadable content."))
            }
            ShapeError::InvalidJson(_) => ErrorBody::new(format!("{provider} returned invalid JSON.")),
            ShapeError::MissingDataTable | ShapeError::NoContributionRows => ErrorBody::new(format!(
                "{provider} response did not include contribution data."
            ))
            .with_details(source.to_string()),
            ShapeError::MissingHiddenField(_) => {
                ErrorBody::new(format!("Failed to initialize {provider} request."))
                    .with_details(source.to_string())
            }
            ShapeError::Schema(_) | ShapeError::InvalidContribution { .. } => {
                ErrorBody::new(format!("{provider} response shape was unexpected."))
                    .with_details(source.to_string())
            }
        },
        ProviderError::SessionInit { source, .. } => {
            ErrorBody::new(err.to_string()).with_details(source.user_message())
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::InvalidBody(err.into_field_errors().into_iter().map(Into::into).collect())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthenticated => {
                ApiError::Unauthorized("Missing x-patient-id header".into())
            }
            StoreError::InvalidPatientId(reason) => ApiError::Unauthorized(reason),
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::Validation(v) => v.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prevent_core::{FieldError, Provider};

    #[test]
    fn test_upstream_status_is_echoed() {
        let body = provider_error_body(&ProviderError::status(Provider::MdCalc, 503));
        assert_eq!(body.error, "MdCalc responded with an error.");
        assert_eq!(body.status, Some(503));
    }

    #[test]
    fn test_scrape_failures_carry_details() {
        let err = ProviderError::shape(Provider::ClinCalc, ShapeError::MissingDataTable);
        let body = provider_error_body(&err);
        assert_eq!(body.error, "ClinCalc response did not include contribution data.");
        assert!(body.details.is_some());
        assert_eq!(body.status, None);

        let err = ProviderError::session_init(ProviderError::shape(
            Provider::ClinCalc,
            ShapeError::MissingHiddenField("__VIEWSTATE"),
        ));
        let body = provider_error_body(&err);
        assert_eq!(body.error, "Failed to initialize ClinCalc request.");
        assert_eq!(
            body.details.as_deref(),
            Some("Missing __VIEWSTATE in ClinCalc response.")
        );
    }

    #[test]
    fn test_unreachable_hides_transport_detail() {
        let err = ProviderError::unreachable(Provider::ClinCalc, "connection refused");
        let body = provider_error_body(&err);
        assert_eq!(body.error, "Failed to reach ClinCalc.");
        assert_eq!(body.details, None);
    }

    #[test]
    fn test_store_errors_map_to_status_codes() {
        let cases = [
            (StoreError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (StoreError::InvalidPatientId("bad".into()), StatusCode::UNAUTHORIZED),
            (StoreError::NotFound("patient profile"), StatusCode::NOT_FOUND),
            (
                StoreError::Validation(ValidationError(vec![FieldError::new("bmi", "BMI must be between 18.5 and 39.9")])),
                StatusCode::BAD_REQUEST,
            ),
            (StoreError::Poisoned, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_not_found_message_is_capitalised() {
        let body = ApiError::NotFound("patient profile").body();
        assert_eq!(body.error, "Patient profile not found.");
    }
}
