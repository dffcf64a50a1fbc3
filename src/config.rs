use crate::error::{config_error, CalendarResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default Google Calendar v3 REST endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// OAuth scope granting read/write access to calendars
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Configuration for the calendar client.
///
/// Paths are explicit; resolving them from the environment is left to the
/// calling application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarConfig {
    /// OAuth client secret file (`credentials.json` from the Google console)
    pub client_secret_path: PathBuf,
    /// Where the OAuth token is cached
    pub token_path: PathBuf,
    /// Base URL of the calendar REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// OAuth scope requested by the interactive flow
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Loopback port for the OAuth redirect; 0 picks a free port
    #[serde(default)]
    pub redirect_port: u16,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

impl CalendarConfig {
    /// Create a configuration with default endpoint, scope and redirect port
    pub fn new(client_secret_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            client_secret_path: client_secret_path.into(),
            token_path: token_path.into(),
            api_base_url: default_api_base_url(),
            scope: default_scope(),
            redirect_port: 0,
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> CalendarResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| config_error(&format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> CalendarResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_redirect_port(mut self, redirect_port: u16) -> Self {
        self.redirect_port = redirect_port;
        self
    }

    /// Check that the configured endpoint is a usable base URL
    pub fn validate(&self) -> CalendarResult<()> {
        let url = url::Url::parse(&self.api_base_url)
            .map_err(|e| config_error(&format!("Invalid api_base_url '{}': {}", self.api_base_url, e)))?;
        if url.cannot_be_a_base() {
            return Err(config_error(&format!(
                "api_base_url '{}' cannot be used as a base URL",
                self.api_base_url
            )));
        }
        if self.scope.trim().is_empty() {
            return Err(config_error("scope must not be empty"));
        }
        Ok(())
    }
}
