#![allow(dead_code)]

use google_calendar_utils::config::CalendarConfig;
use google_calendar_utils::google_calendar::{GoogleCalendar, StoredToken};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use tiny_http::{Header, Response, Server, StatusCode};
use url::Url;

/// A request as seen by the mock server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn path(&self) -> String {
        self.url.split('?').next().unwrap_or("").to_string()
    }

    /// Decoded query parameters
    pub fn query(&self) -> HashMap<String, String> {
        let url = Url::parse(&format!("http://localhost{}", self.url)).unwrap();
        url.query_pairs().into_owned().collect()
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Canned reply for one request
pub struct MockResponse {
    pub status: u16,
    pub body: String,
}

impl MockResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }
}

/// Loopback HTTP server answering requests with canned responses, in order
pub struct MockServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    pub fn start(responses: Vec<MockResponse>) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        thread::spawn(move || {
            for reply in responses {
                let Ok(mut request) = server.recv() else {
                    return;
                };

                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let authorization = request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv("Authorization"))
                    .map(|header| header.value.as_str().to_string());

                recorded.lock().unwrap().push(RecordedRequest {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    authorization,
                    body,
                });

                let content_type =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                let response = Response::from_string(reply.body)
                    .with_status_code(StatusCode(reply.status))
                    .with_header(content_type);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            requests,
        }
    }

    pub fn api_base_url(&self) -> String {
        format!("{}/calendar/v3", self.base_url)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Fresh directory under the system temp dir
pub fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gcal-utils-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn valid_token(access_token: &str) -> StoredToken {
    StoredToken {
        access_token: access_token.to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: chrono::Utc::now().timestamp() + 3600,
        scope: Some("https://www.googleapis.com/auth/calendar".to_string()),
        token_type: Some("Bearer".to_string()),
    }
}

/// Client pointed at the mock server, authenticated with a fixed token
pub fn calendar_for(server: &MockServer) -> GoogleCalendar {
    let dir = temp_dir();
    let config = CalendarConfig::new(dir.join("credentials.json"), dir.join("token.json"))
        .with_api_base_url(server.api_base_url());
    GoogleCalendar::with_token(config, valid_token("test-access"))
}
