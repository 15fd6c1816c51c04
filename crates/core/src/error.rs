use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two upstream risk calculators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    MdCalc,
    ClinCalc,
}

impl Provider {
    pub fn label(self) -> &'static str {
        match self {
            Provider::MdCalc => "MdCalc",
            Provider::ClinCalc => "ClinCalc",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The upstream answered, but not in the shape we expect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("response body could not be read: {0}")]
    UnreadableBody(String),
    #[error("response was not valid JSON: {0}")]
    InvalidJson(String),
    #[error("response did not match the expected schema: {0}")]
    Schema(String),
    #[error("Missing {0} in ClinCalc response.")]
    MissingHiddenField(&'static str),
    #[error("Missing ASCVD risk factors contribution data table.")]
    MissingDataTable,
    #[error("ClinCalc returned no ASCVD risk factor contributions.")]
    NoContributionRows,
    #[error("contribution {factor:?} has no name or a non-finite value")]
    InvalidContribution { factor: String },
}

/// Failure of a single upstream call.
///
/// All variants are surfaced to the aggregator as one "provider failed" signal;
/// [`ProviderError::user_message`] is what ends up in the error list.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} is unreachable right now.")]
    Unreachable { provider: Provider, detail: String },
    #[error("{provider} responded with status {status}.")]
    UpstreamStatus {
        provider: Provider,
        status: u16,
        message: Option<String>,
    },
    #[error("{provider} response shape was unexpected: {source}")]
    Shape {
        provider: Provider,
        #[source]
        source: ShapeError,
    },
    /// A preliminary request that sets up the real submission failed.
    #[error("Failed to initialize {provider} request.")]
    SessionInit {
        provider: Provider,
        #[source]
        source: Box<ProviderError>,
    },
}

impl ProviderError {
    pub fn unreachable(provider: Provider, detail: impl Into<String>) -> Self {
        ProviderError::Unreachable {
            provider,
            detail: detail.into(),
        }
    }

    pub fn status(provider: Provider, status: u16) -> Self {
        ProviderError::UpstreamStatus {
            provider,
            status,
            message: None,
        }
    }

    pub fn shape(provider: Provider, source: ShapeError) -> Self {
        ProviderError::Shape { provider, source }
    }

    pub fn session_init(source: ProviderError) -> Self {
        ProviderError::SessionInit {
            provider: source.provider(),
            source: Box::new(source),
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            ProviderError::Unreachable { provider, .. }
            | ProviderError::UpstreamStatus { provider, .. }
            | ProviderError::Shape { provider, .. }
            | ProviderError::SessionInit { provider, .. } => *provider,
        }
    }

    /// Upstream HTTP status, when the failure was a non-2xx answer.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ProviderError::UpstreamStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message recorded in the assessment error list.
    ///
    /// A status error carrying a message from the far side (for example the
    /// `error` member of a gateway response) reports that message verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ProviderError::UpstreamStatus {
                message: Some(message),
                ..
            } => message.clone(),
            ProviderError::Shape { source, .. } => match source {
                ShapeError::MissingHiddenField(_)
                | ShapeError::MissingDataTable
                | ShapeError::NoContributionRows => source.to_string(),
                _ => self.to_string(),
            },
            ProviderError::SessionInit { source, .. } => source.user_message(),
            _ => self.to_string(),
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// A field-level validation problem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<FieldError> for api_shared::FieldIssue {
    fn from(err: FieldError) -> Self {
        api_shared::FieldIssue {
            field: err.field,
            message: err.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("validation failed: {}", summarise(.0))]
pub struct ValidationError(pub Vec<FieldError>);

impl ValidationError {
    pub fn field_errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn into_field_errors(self) -> Vec<FieldError> {
        self.0
    }
}

fn summarise(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from the profile, intake and snapshot stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("invalid patient id: {0}")]
    InvalidPatientId(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write snapshot file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read snapshot file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize snapshot: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize snapshot: {0}")]
    Deserialization(serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {name} URL {value:?}: must start with http:// or https://")]
    InvalidUrl { name: &'static str, value: String },
    #[error("assessment data directory cannot be empty")]
    EmptyDataDir,
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_message_names_provider() {
        let err = ProviderError::unreachable(Provider::ClinCalc, "connection refused");
        assert_eq!(err.user_message(), "ClinCalc is unreachable right now.");
        assert_eq!(err.provider(), Provider::ClinCalc);
        assert_eq!(err.upstream_status(), None);
    }

    #[test]
    fn test_status_error_prefers_remote_message() {
        let err = ProviderError::status(Provider::MdCalc, 500);
        assert_eq!(err.user_message(), "MdCalc responded with status 500.");
        assert_eq!(err.upstream_status(), Some(500));

        let err = ProviderError::UpstreamStatus {
            provider: Provider::MdCalc,
            status: 502,
            message: Some("Failed to reach MdCalc.".into()),
        };
        assert_eq!(err.user_message(), "Failed to reach MdCalc.");
    }

    #[test]
    fn test_scrape_shape_errors_report_their_own_text() {
        let err = ProviderError::shape(
            Provider::ClinCalc,
            ShapeError::MissingHiddenField("__VIEWSTATE"),
        );
        assert_eq!(err.user_message(), "Missing __VIEWSTATE in ClinCalc response.");

        let err = ProviderError::session_init(ProviderError::shape(
            Provider::ClinCalc,
            ShapeError::MissingHiddenField("__EVENTVALIDATION"),
        ));
        assert_eq!(err.user_message(), "Missing __EVENTVALIDATION in ClinCalc response.");
        assert_eq!(err.to_string(), "Failed to initialize ClinCalc request.");

        let err = ProviderError::shape(Provider::MdCalc, ShapeError::InvalidJson("eof".into()));
        assert!(err.user_message().starts_with("MdCalc response shape was unexpected"));
    }

    #[test]
    fn test_validation_error_display_joins_messages() {
        let err = ValidationError(vec![
            FieldError::new("bmi", "BMI must be between 18.5 and 39.9"),
            FieldError::new("eGFR", "eGFR must be between 15 and 150"),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: BMI must be between 18.5 and 39.9; eGFR must be between 15 and 150"
        );
    }
}
