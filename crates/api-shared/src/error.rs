//! JSON error body shared by every REST route.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A single field-level validation problem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

/// Error body: `{ error, status?, details?, issues? }`.
///
/// `status` carries the upstream HTTP status when a provider answered with a
/// non-2xx code. `issues` carries field-level validation problems.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<FieldIssue>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status: None,
            details: None,
            issues: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_issues(mut self, issues: Vec<FieldIssue>) -> Self {
        self.issues = issues;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_members_are_omitted() {
        let json = serde_json::to_value(ErrorBody::new("MdCalc responded with an error."))
            .expect("serialise error body");
        assert_eq!(json, serde_json::json!({ "error": "MdCalc responded with an error." }));

        let json = serde_json::to_value(ErrorBody::new("x").with_status(503))
            .expect("serialise error body");
        assert_eq!(json["status"], 503);
    }
}
