//! API-key checking.
//!
//! The expected key is resolved once at startup and passed in; this module never
//! reads the process environment.

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the already-authenticated patient identity.
pub const PATIENT_ID_HEADER: &str = "x-patient-id";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing x-api-key header")]
    MissingApiKey,
    #[error("Invalid API key")]
    InvalidApiKey,
}

/// Validates the provided API key against the expected one.
///
/// Returns `Ok(())` if the key matches, or an error if it is missing or wrong.
pub fn validate_api_key(provided_key: Option<&str>, expected_key: &str) -> Result<(), AuthError> {
    let provided_key = provided_key.ok_or(AuthError::MissingApiKey)?;

    if constant_time_eq(provided_key.as_bytes(), expected_key.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::InvalidApiKey)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
