use super::token::{ClientSecret, StoredToken, TokenManager, TokenStore};
use crate::config::CalendarConfig;
use crate::error::{auth_error, CalendarResult};
use chrono::Utc;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

const CALLBACK_SUCCESS: &str = "Authorization successful! You can close this window.";
const CALLBACK_FAILURE: &str = "Authorization failed. You can close this window.";

/// Return a usable token, authenticating as needed.
///
/// A valid cached token is used as is. An expired one is refreshed when it
/// carries a refresh token; otherwise, or when refreshing fails, the
/// interactive flow runs. New tokens are written back to the cache.
pub async fn authorize(config: &CalendarConfig) -> CalendarResult<StoredToken> {
    let store = TokenStore::new(&config.token_path);
    let cached = store.load()?;

    if let Some(token) = &cached {
        if token.is_valid(Utc::now().timestamp()) {
            debug!("Using cached token from {}", store.path().display());
            return Ok(token.clone());
        }
    }

    let manager = TokenManager::new(ClientSecret::from_file(&config.client_secret_path)?);

    if let Some(token) = cached.filter(StoredToken::can_refresh) {
        match manager.refresh(&token).await {
            Ok(refreshed) => {
                store.save(&refreshed)?;
                return Ok(refreshed);
            }
            Err(e) => warn!("Token refresh failed, falling back to interactive authorization: {}", e),
        }
    }

    let token = InstalledAppFlow::new(&manager, &config.scope, config.redirect_port)
        .run()
        .await?;
    store.save(&token)?;
    info!("Saved new token to {}", store.path().display());
    Ok(token)
}

/// Installed-application OAuth flow with a loopback redirect
pub struct InstalledAppFlow<'a> {
    manager: &'a TokenManager,
    scope: String,
    port: u16,
}

impl<'a> InstalledAppFlow<'a> {
    pub fn new(manager: &'a TokenManager, scope: &str, port: u16) -> Self {
        Self {
            manager,
            scope: scope.to_string(),
            port,
        }
    }

    /// Consent page URL for the given redirect target and anti-forgery state
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> CalendarResult<Url> {
        let secret = self.manager.secret();
        let mut url = Url::parse(&secret.auth_uri)
            .map_err(|e| auth_error(&format!("Invalid auth_uri '{}': {}", secret.auth_uri, e)))?;

        url.query_pairs_mut()
            .append_pair("client_id", &secret.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scope)
            .append_pair("state", state)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        Ok(url)
    }

    /// Open the consent page, wait for the redirect and exchange the code
    pub async fn run(&self) -> CalendarResult<StoredToken> {
        let server = tiny_http::Server::http(format!("127.0.0.1:{}", self.port))
            .map_err(|e| auth_error(&format!("Failed to start callback server: {}", e)))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| auth_error("Callback server has no TCP address"))?;

        let redirect_uri = format!("http://localhost:{}/", port);
        let state = Uuid::new_v4().to_string();
        let auth_url = self.authorization_url(&redirect_uri, &state)?;

        info!("Opening browser for Google Calendar authorization");
        info!("If the browser does not open, visit: {}", auth_url);
        if let Err(e) = webbrowser::open(auth_url.as_str()) {
            warn!("Failed to open browser: {}", e);
        }

        let code = tokio::task::spawn_blocking(move || wait_for_code(server, &state))
            .await
            .map_err(|e| auth_error(&format!("Callback listener failed: {}", e)))??;

        self.manager.exchange_code(&code, &redirect_uri).await
    }
}

/// Serve the loopback server until the consent redirect arrives
fn wait_for_code(server: tiny_http::Server, expected_state: &str) -> CalendarResult<String> {
    loop {
        let request = server.recv()?;
        match parse_callback(request.url(), expected_state) {
            Ok(None) => {
                // favicon and other stray requests
                let path = request.url().to_string();
                if let Err(e) = request.respond(tiny_http::Response::empty(tiny_http::StatusCode(404))) {
                    debug!("Failed to answer stray request {}: {}", path, e);
                }
            }
            Ok(Some(code)) => {
                request.respond(tiny_http::Response::from_string(CALLBACK_SUCCESS))?;
                return Ok(code);
            }
            Err(e) => {
                request.respond(tiny_http::Response::from_string(CALLBACK_FAILURE))?;
                return Err(e);
            }
        }
    }
}

/// Extract the authorization code from a redirect request path.
///
/// `Ok(None)` means the request is not the OAuth redirect.
fn parse_callback(request_url: &str, expected_state: &str) -> CalendarResult<Option<String>> {
    let url = Url::parse(&format!("http://localhost{}", request_url))
        .map_err(|e| auth_error(&format!("Malformed callback '{}': {}", request_url, e)))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => return Err(auth_error(&format!("Authorization denied: {}", value))),
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    let Some(code) = code else {
        return Ok(None);
    };
    if state.as_deref() != Some(expected_state) {
        return Err(auth_error("State mismatch in authorization callback"));
    }
    Ok(Some(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};

    fn manager() -> TokenManager {
        TokenManager::new(
            ClientSecret::from_json_str(r#"{"installed":{"client_id":"my-client","client_secret":"s"}}"#)
                .unwrap(),
        )
    }

    #[test]
    fn test_authorization_url() {
        let manager = manager();
        let flow = InstalledAppFlow::new(&manager, "https://www.googleapis.com/auth/calendar", 0);
        let url = flow
            .authorization_url("http://localhost:8080/", "state-1")
            .unwrap();

        assert!(url.as_str().starts_with("https://accounts.google.com/o/oauth2/auth?"));
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "my-client");
        assert_eq!(params["redirect_uri"], "http://localhost:8080/");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "https://www.googleapis.com/auth/calendar");
        assert_eq!(params["state"], "state-1");
        assert_eq!(params["access_type"], "offline");
    }

    #[test]
    fn test_parse_callback_code() {
        let code = parse_callback("/?state=abc&code=4%2Fxyz&scope=calendar", "abc").unwrap();
        assert_eq!(code.as_deref(), Some("4/xyz"));
    }

    #[test]
    fn test_parse_callback_ignores_other_requests() {
        assert_eq!(parse_callback("/favicon.ico", "abc").unwrap(), None);
    }

    #[test]
    fn test_parse_callback_rejects_state_mismatch() {
        let result = parse_callback("/?state=evil&code=xyz", "abc");
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[test]
    fn test_parse_callback_reports_denial() {
        let result = parse_callback("/?error=access_denied&state=abc", "abc");
        match result {
            Err(Error::Auth(message)) => assert!(message.contains("access_denied")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    fn send_raw(addr: SocketAddr, path: &str, read_reply: bool) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(
            stream,
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        )
        .unwrap();
        let mut reply = String::new();
        if read_reply {
            stream.read_to_string(&mut reply).unwrap();
        }
        reply
    }

    #[test]
    fn test_wait_for_code_skips_stray_requests() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();

        let client = std::thread::spawn(move || {
            // Hangs up without reading the 404
            send_raw(addr, "/favicon.ico", false);
            send_raw(addr, "/?state=abc&code=the-code", true)
        });

        assert_eq!(wait_for_code(server, "abc").unwrap(), "the-code");
        let reply = client.join().unwrap();
        assert!(reply.starts_with("HTTP/1.1 200"));
    }
}
