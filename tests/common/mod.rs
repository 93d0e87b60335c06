//! Shared harness for the integration tests: an in-memory gateway with two
//! static-token users, request helpers, and an SSE frame reader.

#![allow(dead_code, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, BodyDataStream};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use futures_util::StreamExt;
use serde_json::Value;
use tower::ServiceExt;

use neon_gateway::api;
use neon_gateway::app_state::AppState;
use neon_gateway::auth::AuthGate;
use neon_gateway::config::GatewayConfig;
use neon_gateway::domain::EventBus;
use neon_gateway::store::{DocumentStore, MemoryStore};

/// Token and phone number of the first test user.
pub const ALICE: (&str, &str) = ("alice-token", "+15550100");
/// Token and phone number of the second test user.
pub const BOB: (&str, &str) = ("bob-token", "+15550200");
/// Origin allowed by the test configuration.
pub const ORIGIN: &str = "http://localhost:5173";

/// A running gateway and handles on its internals.
pub struct TestApp {
    /// The full axum application.
    pub router: Router,
    /// Backing store.
    pub store: Arc<MemoryStore>,
    /// Event bus shared with the app.
    pub bus: EventBus,
}

/// Builds a gateway over a fresh in-memory store.
pub fn app() -> TestApp {
    let Ok(config) = GatewayConfig::from_lookup(|key| match key {
        "AUTH_STATIC_TOKENS" => Some(format!("{}={},{}={}", ALICE.0, ALICE.1, BOB.0, BOB.1)),
        "CORS_ALLOWED_ORIGINS" => Some(format!("https://neon.estate,{ORIGIN}")),
        "SSE_KEEP_ALIVE_SECS" => Some("60".to_string()),
        _ => None,
    }) else {
        panic!("test configuration should load");
    };
    let store = Arc::new(MemoryStore::default());
    let shared: Arc<dyn DocumentStore> = Arc::clone(&store) as Arc<dyn DocumentStore>;
    let bus = EventBus::new();
    let auth = AuthGate::from_config(&config);
    let router = api::build_app(AppState::new(config, shared, auth, bus.clone()));
    TestApp { router, store, bus }
}

impl TestApp {
    /// Sends a request and returns the raw response.
    pub async fn raw(&self, request: Request<Body>) -> Response {
        match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    /// Sends a JSON request as `token` and returns status and JSON body.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.raw(request(method, uri, token, body)).await;
        let status = response.status();
        (status, json_body(response).await)
    }
}

/// Builds a request with an optional bearer token and JSON body.
pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let Ok(request) = builder.body(body) else {
        panic!("valid request");
    };
    request
}

/// Reads a JSON body; an empty body reads as `null`.
pub async fn json_body(response: Response) -> Value {
    let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
        panic!("body should be readable");
    };
    if bytes.is_empty() {
        return Value::Null;
    }
    let Ok(value) = serde_json::from_slice(&bytes) else {
        panic!("body should be JSON: {}", String::from_utf8_lossy(&bytes));
    };
    value
}

/// Registers `user` with `username` and returns the profile.
pub async fn register(app: &TestApp, user: (&str, &str), username: &str) -> Value {
    let (status, profile) = app
        .call(
            Method::POST,
            "/profile",
            Some(user.0),
            Some(serde_json::json!({ "username": username, "avatarPath": "avatars/a.png" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "registration failed: {profile}");
    profile
}

/// Splits an SSE body into frames.
pub struct FrameReader {
    data: BodyDataStream,
    buffer: String,
}

impl FrameReader {
    /// Wraps a streaming response body.
    pub fn new(response: Response) -> Self {
        Self {
            data: response.into_body().into_data_stream(),
            buffer: String::new(),
        }
    }

    /// Next event frame as `(type, payload)`, skipping keep-alive comments.
    /// `None` if the stream ends or nothing arrives within `wait`.
    pub async fn next_within(&mut self, wait: Duration) -> Option<(String, Value)> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let frame: String = self.buffer.drain(..end + 2).collect();
                if let Some(parsed) = parse_frame(&frame) {
                    return Some(parsed);
                }
                continue;
            }
            match tokio::time::timeout(wait, self.data.next()).await {
                Ok(Some(Ok(chunk))) => self.buffer.push_str(&String::from_utf8_lossy(&chunk)),
                _ => return None,
            }
        }
    }

    /// Next event frame, waiting up to five seconds.
    pub async fn next(&mut self) -> Option<(String, Value)> {
        self.next_within(Duration::from_secs(5)).await
    }

    /// Whether the body has ended (as opposed to being idle).
    pub async fn is_finished(&mut self) -> bool {
        matches!(
            tokio::time::timeout(Duration::from_secs(5), self.data.next()).await,
            Ok(None)
        )
    }
}

/// Parses `event: <type>\ndata: <json>\n\n`; `None` for comment frames.
fn parse_frame(frame: &str) -> Option<(String, Value)> {
    let mut kind = None;
    let mut data = None;
    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("event: ") {
            kind = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("data: ") {
            data = serde_json::from_str(rest).ok();
        }
    }
    Some((kind?, data?))
}
