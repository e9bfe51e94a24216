use serde::Deserialize;
use serde::Serialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::Result;
use crate::error::SessionError;

pub const DEFAULT_BASE_URL: &str = "https://icebrg.mehanik.me/api";
pub const BASE_URL_ENV_VAR: &str = "ICEBRG_BASE_URL";

/// Quiescence window before keystrokes turn into a search request.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(300);
/// How long before expiry an access token is proactively refreshed.
pub const REFRESH_LEAD_TIME: Duration = Duration::from_secs(60);
/// Period of the background session check.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);
/// Minimum trimmed query length, in characters.
pub const MIN_QUERY_LEN: usize = 2;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client configuration shared by the session and search crates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL every endpoint path is appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Debounce window for autocomplete input
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Refresh lead time before access token expiry
    #[serde(default = "default_refresh_lead_ms")]
    pub refresh_lead_ms: u64,

    /// Background session check period
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Minimum trimmed query length before suggestions open
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_debounce_ms() -> u64 {
    DEBOUNCE_INTERVAL.as_millis() as u64
}

fn default_refresh_lead_ms() -> u64 {
    REFRESH_LEAD_TIME.as_millis() as u64
}

fn default_refresh_interval_ms() -> u64 {
    REFRESH_INTERVAL.as_millis() as u64
}

fn default_min_query_len() -> usize {
    MIN_QUERY_LEN
}

fn default_request_timeout_ms() -> u64 {
    REQUEST_TIMEOUT.as_millis() as u64
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            debounce_ms: default_debounce_ms(),
            refresh_lead_ms: default_refresh_lead_ms(),
            refresh_interval_ms: default_refresh_interval_ms(),
            min_query_len: default_min_query_len(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

pub fn read_base_url_from_env() -> Option<String> {
    env::var(BASE_URL_ENV_VAR)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ClientConfig =
            toml::from_str(contents).map_err(|err| SessionError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file, then lets `ICEBRG_BASE_URL` override the base URL.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| SessionError::Config(format!("{}: {err}", path.display())))?;
        let mut config = Self::from_toml_str(&contents)?;
        if let Some(base_url) = read_base_url_from_env() {
            config.base_url = base_url;
            config.validate()?;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)
            .map_err(|err| SessionError::Config(format!("invalid base_url {:?}: {err}", self.base_url)))?;
        if url.cannot_be_a_base() {
            return Err(SessionError::Config(format!(
                "base_url {:?} cannot be a base",
                self.base_url
            )));
        }
        if self.debounce_ms == 0 {
            return Err(SessionError::Config("debounce_ms must be > 0".to_string()));
        }
        if self.refresh_interval_ms == 0 {
            return Err(SessionError::Config(
                "refresh_interval_ms must be > 0".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(SessionError::Config(
                "request_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.min_query_len == 0 {
            return Err(SessionError::Config("min_query_len must be > 0".to_string()));
        }
        Ok(())
    }

    /// Joins an endpoint path such as `/login` onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn refresh_lead(&self) -> Duration {
        Duration::from_millis(self.refresh_lead_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_named_constants() {
        let config = ClientConfig::default();
        assert_eq!(DEFAULT_BASE_URL, config.base_url);
        assert_eq!(DEBOUNCE_INTERVAL, config.debounce());
        assert_eq!(REFRESH_LEAD_TIME, config.refresh_lead());
        assert_eq!(REFRESH_INTERVAL, config.refresh_interval());
        assert_eq!(MIN_QUERY_LEN, config.min_query_len);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
base_url = "http://localhost:8080/api/"
debounce_ms = 150
"#,
        )
        .unwrap();
        assert_eq!(150, config.debounce_ms);
        assert_eq!(MIN_QUERY_LEN, config.min_query_len);
        assert_eq!("http://localhost:8080/api/login", config.endpoint("/login"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ClientConfig::with_base_url("not a url").validate().is_err());

        let mut config = ClientConfig::default();
        config.debounce_ms = 0;
        assert!(config.validate().is_err());

        let result = ClientConfig::from_toml_str("request_timeout_ms = 0");
        assert!(matches!(result, Err(SessionError::Config(_))));

        let result = ClientConfig::from_toml_str("min_query_len = 0");
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icebrg.toml");
        std::fs::write(&path, "refresh_interval_ms = 5000\n").unwrap();
        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(Duration::from_secs(5), config.refresh_interval());
    }
}
