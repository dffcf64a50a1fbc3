use crate::error::{auth_error, config_error, CalendarResult};
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Tokens expiring within this many seconds are treated as expired
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the token endpoint does not report one
const DEFAULT_EXPIRES_IN: i64 = 3600;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth token as cached on disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as a UNIX timestamp
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl StoredToken {
    /// Whether the access token can still be used at `now`
    pub fn is_valid(&self, now: i64) -> bool {
        !self.access_token.is_empty() && now < self.expires_at - EXPIRY_MARGIN_SECS
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    fn from_response(response: TokenResponse, now: i64, previous_refresh: Option<String>) -> Self {
        // Google usually omits the refresh token on refresh
        let refresh_token = response
            .refresh_token
            .filter(|token| !token.is_empty())
            .or(previous_refresh);

        Self {
            access_token: response.access_token,
            refresh_token,
            expires_at: now + response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
            scope: response.scope,
            token_type: response.token_type,
        }
    }
}

/// Token endpoint response body
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

/// OAuth application credentials (the `credentials.json` downloaded from the Google console)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    pub fn from_file(path: impl AsRef<Path>) -> CalendarResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            config_error(&format!("Failed to read client secret {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    /// Parse a client secret file; both "installed" and "web" applications are accepted
    pub fn from_json_str(content: &str) -> CalendarResult<Self> {
        let file: ClientSecretFile = serde_json::from_str(content)?;
        file.installed
            .or(file.web)
            .ok_or_else(|| config_error("Client secret file has neither an 'installed' nor a 'web' section"))
    }
}

/// Reads and writes the cached token file
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached token; a missing or unreadable cache yields `None`
    pub fn load(&self) -> CalendarResult<Option<StoredToken>> {
        if !self.path.exists() {
            debug!("No cached token at {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!("Ignoring unreadable token cache {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    /// Write the token, creating parent directories as needed
    pub fn save(&self, token: &StoredToken) -> CalendarResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(token)?;
        fs::write(&self.path, content)?;

        // Owner-only, the file holds OAuth tokens
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        debug!("Saved token to {}", self.path.display());
        Ok(())
    }
}

/// Talks to the OAuth token endpoint
#[derive(Clone)]
pub struct TokenManager {
    secret: ClientSecret,
    client: Client,
}

impl TokenManager {
    pub fn new(secret: ClientSecret) -> Self {
        Self {
            secret,
            client: Client::new(),
        }
    }

    pub fn secret(&self) -> &ClientSecret {
        &self.secret
    }

    /// Obtain a fresh access token using the refresh token
    pub async fn refresh(&self, token: &StoredToken) -> CalendarResult<StoredToken> {
        let refresh_token = token
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| auth_error("No refresh token in cached token"))?;

        info!("Refreshing Google Calendar access token");
        let params = [
            ("client_id", self.secret.client_id.clone()),
            ("client_secret", self.secret.client_secret.clone()),
            ("refresh_token", refresh_token.clone()),
            ("grant_type", "refresh_token".to_string()),
        ];

        let response = self.request_token(&params, "refresh token").await?;
        Ok(StoredToken::from_response(response, Utc::now().timestamp(), Some(refresh_token)))
    }

    /// Exchange an authorization code from the consent redirect for a token
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> CalendarResult<StoredToken> {
        let params = [
            ("client_id", self.secret.client_id.clone()),
            ("client_secret", self.secret.client_secret.clone()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
            ("grant_type", "authorization_code".to_string()),
        ];

        let response = self.request_token(&params, "get token").await?;
        Ok(StoredToken::from_response(response, Utc::now().timestamp(), None))
    }

    async fn request_token(&self, params: &[(&str, String)], action: &str) -> CalendarResult<TokenResponse> {
        let response = self
            .client
            .post(&self.secret.token_uri)
            .form(params)
            .send()
            .await
            .map_err(|e| auth_error(&format!("Failed to {}: {}", action, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(auth_error(&format!(
                "Failed to {}: HTTP {} - {}",
                action, status, error_body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| auth_error(&format!("Failed to parse token response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn token(expires_at: i64, refresh_token: Option<&str>) -> StoredToken {
        StoredToken {
            access_token: "access".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_at,
            scope: None,
            token_type: Some("Bearer".to_string()),
        }
    }

    #[test]
    fn test_is_valid_applies_margin() {
        let now = 1_000_000;
        assert!(token(now + 3600, None).is_valid(now));
        assert!(!token(now + EXPIRY_MARGIN_SECS, None).is_valid(now));
        assert!(!token(now - 1, None).is_valid(now));

        let mut empty = token(now + 3600, None);
        empty.access_token.clear();
        assert!(!empty.is_valid(now));
    }

    #[test]
    fn test_can_refresh() {
        assert!(token(0, Some("refresh")).can_refresh());
        assert!(!token(0, Some("")).can_refresh());
        assert!(!token(0, None).can_refresh());
    }

    #[test]
    fn test_from_response_keeps_previous_refresh_token() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"new","expires_in":120,"token_type":"Bearer"}"#).unwrap();
        let stored = StoredToken::from_response(response, 1000, Some("old-refresh".to_string()));

        assert_eq!(stored.access_token, "new");
        assert_eq!(stored.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(stored.expires_at, 1120);
    }

    #[test]
    fn test_from_response_defaults_lifetime() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"new","refresh_token":"fresh"}"#).unwrap();
        let stored = StoredToken::from_response(response, 0, Some("old".to_string()));

        assert_eq!(stored.refresh_token.as_deref(), Some("fresh"));
        assert_eq!(stored.expires_at, DEFAULT_EXPIRES_IN);
    }

    #[test]
    fn test_client_secret_installed() {
        let secret = ClientSecret::from_json_str(
            r#"{"installed":{"client_id":"id","client_secret":"secret","project_id":"p",
                "auth_uri":"https://accounts.google.com/o/oauth2/auth",
                "token_uri":"https://oauth2.googleapis.com/token",
                "redirect_uris":["http://localhost"]}}"#,
        )
        .unwrap();

        assert_eq!(secret.client_id, "id");
        assert_eq!(secret.client_secret, "secret");
        assert_eq!(secret.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_client_secret_web_with_defaults() {
        let secret =
            ClientSecret::from_json_str(r#"{"web":{"client_id":"id","client_secret":"secret"}}"#).unwrap();
        assert_eq!(secret.auth_uri, DEFAULT_AUTH_URI);
        assert_eq!(secret.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_client_secret_errors() {
        assert!(matches!(ClientSecret::from_json_str("{}"), Err(Error::Config(_))));
        assert!(matches!(ClientSecret::from_json_str("not json"), Err(Error::Serialization(_))));
        assert!(matches!(
            ClientSecret::from_file("/nonexistent/credentials.json"),
            Err(Error::Config(_))
        ));
    }
}
