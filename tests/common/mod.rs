//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use runtime_shield::cloud::types::{CloudConfig, ConfigVersion, FirewallLists};
use runtime_shield::cloud::{CloudError, ControlPlane, Event};
use runtime_shield::{AttackKind, Detection, Detector, DetectorError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A request seen by the mock control plane.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// Canned responses keyed by path, plus a log of every request.
#[derive(Default)]
pub struct MockState {
    pub responses: Mutex<HashMap<String, (u16, String)>>,
    pub requests: Mutex<Vec<RecordedRequest>>,
}

impl MockState {
    pub fn respond(&self, path: &str, status: u16, body: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.into()));
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

/// Start a programmable mock control plane on an ephemeral port.
///
/// Paths without a canned response answer `404`.
pub async fn start_mock_control_plane() -> (SocketAddr, Arc<MockState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(MockState::default());

    let shared = Arc::clone(&state);
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let state = Arc::clone(&shared);
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = state
                            .responses
                            .lock()
                            .unwrap()
                            .get(&request.path)
                            .cloned()
                            .unwrap_or((404, String::new()));
                        state.requests.lock().unwrap().push(request);

                        let status_text = match status {
                            200 => "200 OK",
                            401 => "401 Unauthorized",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, state)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let mut content_length = 0usize;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            if name == "content-length" {
                content_length = value.trim().parse().unwrap_or(0);
            } else if name == "authorization" {
                authorization = Some(value.trim().to_string());
            }
        }
    }

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(RecordedRequest {
        method,
        path,
        authorization,
        body,
    })
}

/// In-memory control plane with scripted answers.
#[derive(Default)]
pub struct FakeControlPlane {
    pub version: Mutex<i64>,
    pub config: Mutex<Option<CloudConfig>>,
    pub lists: Mutex<Option<FirewallLists>>,
    /// Answer to `started` and heartbeat events.
    pub event_response: Mutex<Option<CloudConfig>>,
    pub fail: Mutex<bool>,
    pub events: Mutex<Vec<Event>>,
}

impl FakeControlPlane {
    pub fn set_config(&self, config: CloudConfig) {
        *self.version.lock().unwrap() = config.config_updated_at;
        *self.config.lock().unwrap() = Some(config);
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(Event::name).collect()
    }

    fn check(&self) -> Result<(), CloudError> {
        if *self.fail.lock().unwrap() {
            return Err(CloudError::Status(503));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn fetch_config_version(&self) -> Result<ConfigVersion, CloudError> {
        self.check()?;
        Ok(ConfigVersion {
            config_updated_at: *self.version.lock().unwrap(),
        })
    }

    async fn fetch_config(&self) -> Result<CloudConfig, CloudError> {
        self.check()?;
        self.config
            .lock()
            .unwrap()
            .clone()
            .ok_or(CloudError::Status(404))
    }

    async fn fetch_firewall_lists(&self) -> Result<FirewallLists, CloudError> {
        self.check()?;
        self.lists
            .lock()
            .unwrap()
            .clone()
            .ok_or(CloudError::Status(404))
    }

    async fn send_event(&self, event: &Event) -> Result<Option<CloudConfig>, CloudError> {
        self.check()?;
        self.events.lock().unwrap().push(event.clone());
        Ok(self.event_response.lock().unwrap().clone())
    }
}

/// Flags a file path that contains a user input with `../`.
pub struct PathTraversalDetector;

impl Detector<str> for PathTraversalDetector {
    fn kind(&self) -> AttackKind {
        AttackKind::PathTraversal
    }

    fn scan(&self, user_input: &str, path: &str) -> Result<Option<Detection>, DetectorError> {
        if user_input.contains("../") && path.contains(user_input) {
            return Ok(Some(Detection::new().with("filename", path)));
        }
        Ok(None)
    }
}
