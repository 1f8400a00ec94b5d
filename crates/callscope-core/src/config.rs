//! Configuration management for callscope

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Hosted backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Client session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hosted backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend project
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Public (anon) API key sent with every request
    #[serde(default)]
    pub anon_key: String,

    /// Access token of the signed-in user, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// Client session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding the durable session file
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Default number of calls per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Days before a new invitation expires
    #[serde(default = "default_invitation_ttl_days")]
    pub invitation_ttl_days: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_backend_url() -> String {
    "http://localhost:54321".to_string()
}

const fn default_request_timeout() -> u64 {
    30
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./.callscope")
}

const fn default_page_size() -> u32 {
    10
}

const fn default_invitation_ttl_days() -> i64 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            page_size: default_page_size(),
            invitation_ttl_days: default_invitation_ttl_days(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl BackendConfig {
    /// Request timeout as a [`Duration`]
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl Config {
    /// Load configuration from an optional `callscope` file and `CALLSCOPE_*` environment variables
    ///
    /// Nested keys use `__`, e.g. `CALLSCOPE_BACKEND__ANON_KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded, parsed or validated.
    pub fn load() -> crate::Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, reading an explicit file when one is given
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded, parsed or validated.
    pub fn load_from(path: Option<&std::path::Path>) -> crate::Result<Self> {
        let file = path.map_or_else(
            || config::File::with_name("callscope").required(false),
            |p| config::File::from(p).required(true),
        );

        let config: Self = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("CALLSCOPE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check values that serde defaults cannot guard
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first invalid value.
    pub fn validate(&self) -> crate::Result<()> {
        if self.backend.url.trim().is_empty() {
            return Err(crate::Error::configuration("backend.url must not be empty"));
        }
        if self.session.page_size == 0 {
            return Err(crate::Error::configuration(
                "session.page_size must be greater than zero",
            ));
        }
        if self.session.invitation_ttl_days <= 0 {
            return Err(crate::Error::configuration(
                "session.invitation_ttl_days must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            anon_key: String::new(),
            access_token: None,
            request_timeout: default_request_timeout(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.backend.url, "http://localhost:54321");
        assert_eq!(config.backend.request_timeout, 30);
        assert!(config.backend.access_token.is_none());

        assert_eq!(config.session.storage_dir, PathBuf::from("./.callscope"));
        assert_eq!(config.session.page_size, 10);
        assert_eq!(config.session.invitation_ttl_days, 7);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_deserialization() {
        let json_str = r#"{
            "backend": {"url": "https://project.example.co"}
        }"#;

        let config: Config = serde_json::from_str(json_str).unwrap();

        assert_eq!(config.backend.url, "https://project.example.co");
        assert_eq!(config.backend.anon_key, "");
        assert_eq!(config.backend.timeout(), Duration::from_secs(30));
        assert_eq!(config.session.page_size, 10);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let mut config = Config::default();
        config.backend.url = "   ".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backend.url"));
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let mut config = Config::default();
        config.session.page_size = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_ttl() {
        let mut config = Config::default();
        config.session.invitation_ttl_days = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization_skips_missing_token() {
        let config = Config::default();

        let serialized = serde_json::to_string(&config).unwrap();
        assert!(!serialized.contains("access_token"));

        let deserialized: Config = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.backend.url, config.backend.url);
        assert_eq!(deserialized.session.page_size, config.session.page_size);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.backend.url, "http://localhost:54321");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let result = Config::load_from(Some(std::path::Path::new(
            "/nonexistent/callscope-config.toml",
        )));
        assert!(result.is_err());
    }
}
