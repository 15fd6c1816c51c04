//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into services. Request handling never reads process-wide environment variables.

use crate::constants::{DEFAULT_ASSESSMENT_DATA_DIR, DEFAULT_CLINCALC_URL, DEFAULT_MDCALC_URL};
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    mdcalc_url: String,
    clincalc_url: String,
    assessment_data_dir: PathBuf,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if either upstream URL is not http(s) or the data directory is empty.
    pub fn new(
        mdcalc_url: String,
        clincalc_url: String,
        assessment_data_dir: PathBuf,
    ) -> ConfigResult<Self> {
        check_url("MDCALC_URL", &mdcalc_url)?;
        check_url("CLINCALC_URL", &clincalc_url)?;

        if assessment_data_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }

        Ok(Self {
            mdcalc_url,
            clincalc_url,
            assessment_data_dir,
        })
    }

    pub fn mdcalc_url(&self) -> &str {
        &self.mdcalc_url
    }

    pub fn clincalc_url(&self) -> &str {
        &self.clincalc_url
    }

    pub fn assessment_data_dir(&self) -> &Path {
        &self.assessment_data_dir
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            mdcalc_url: DEFAULT_MDCALC_URL.into(),
            clincalc_url: DEFAULT_CLINCALC_URL.into(),
            assessment_data_dir: PathBuf::from(DEFAULT_ASSESSMENT_DATA_DIR),
        }
    }
}

/// Build a `CoreConfig` from optional raw values, falling back to the defaults.
///
/// Empty or whitespace-only values count as unset. Intended to be fed from
/// `std::env::var(..).ok()` once at startup.
pub fn core_config_from_env_values(
    mdcalc_url: Option<String>,
    clincalc_url: Option<String>,
    assessment_data_dir: Option<String>,
) -> ConfigResult<CoreConfig> {
    fn non_empty(value: Option<String>) -> Option<String> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    CoreConfig::new(
        non_empty(mdcalc_url).unwrap_or_else(|| DEFAULT_MDCALC_URL.into()),
        non_empty(clincalc_url).unwrap_or_else(|| DEFAULT_CLINCALC_URL.into()),
        non_empty(assessment_data_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSESSMENT_DATA_DIR)),
    )
}

fn check_url(name: &'static str, value: &str) -> ConfigResult<()> {
    let lower = value.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));

    match rest {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(ConfigError::InvalidUrl {
            name,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_used_for_missing_values() {
        let cfg = core_config_from_env_values(None, Some("  ".into()), None)
            .expect("defaults should be valid");
        assert_eq!(cfg.mdcalc_url(), DEFAULT_MDCALC_URL);
        assert_eq!(cfg.clincalc_url(), DEFAULT_CLINCALC_URL);
        assert_eq!(cfg.assessment_data_dir(), Path::new(DEFAULT_ASSESSMENT_DATA_DIR));
    }

    #[test]
    fn test_overrides_are_respected() {
        let cfg = core_config_from_env_values(
            Some("http://127.0.0.1:9000/calc".into()),
            Some("HTTPS://example.test/prevent/".into()),
            Some("/tmp/snapshots".into()),
        )
        .expect("overrides should be valid");
        assert_eq!(cfg.mdcalc_url(), "http://127.0.0.1:9000/calc");
        assert_eq!(cfg.clincalc_url(), "HTTPS://example.test/prevent/");
        assert_eq!(cfg.assessment_data_dir(), Path::new("/tmp/snapshots"));
    }

    #[test]
    fn test_rejects_non_http_urls() {
        let err = core_config_from_env_values(Some("ftp://example.test".into()), None, None)
            .expect_err("ftp is not allowed");
        assert!(matches!(err, ConfigError::InvalidUrl { name: "MDCALC_URL", .. }));

        let err = CoreConfig::new("http://".into(), DEFAULT_CLINCALC_URL.into(), "x".into())
            .expect_err("empty host is not allowed");
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }
}
