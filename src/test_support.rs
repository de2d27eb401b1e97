//! Shared fixtures for unit and router tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::config::{AppConfig, SessionConfig};
use crate::db;
use crate::provider::{GeneratedImage, ImageProvider};
use crate::state::AppState;

/// Returns a fixed URL and counts calls.
pub struct StubProvider {
    url: String,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProvider for StubProvider {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<GeneratedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedImage {
            url: self.url.clone(),
            revised_prompt: None,
        })
    }
}

/// Always fails, like an unreachable provider.
pub struct FailingProvider;

#[async_trait]
impl ImageProvider for FailingProvider {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<GeneratedImage> {
        anyhow::bail!("provider unavailable")
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        allowed_origin: "http://localhost:5174".into(),
        session: SessionConfig {
            secret: "test-secret-of-at-least-thirty-two-bytes".into(),
            ttl_days: 7,
            cookie_name: "gella.sid".into(),
            cookie_secure: false,
        },
        provider: None,
        admin_emails: vec!["root@x.com".into()],
    }
}

pub async fn test_state(provider: Option<Arc<dyn ImageProvider>>) -> AppState {
    AppState::from_parts(db::memory().await, Arc::new(test_config()), provider).unwrap()
}

/// Response as seen by a client: status, `Set-Cookie` session pair, JSON body.
pub struct TestResponse {
    pub status: StatusCode,
    pub cookie: Option<String>,
    pub json: serde_json::Value,
}

/// Send one request through the router, optionally carrying a session cookie.
pub async fn send(
    app: &Router,
    method: &str,
    path: &str,
    cookie: Option<&str>,
    body: Option<serde_json::Value>,
) -> TestResponse {
    let mut req = Request::builder().method(method).uri(path);
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    let req = match body {
        Some(b) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&b).unwrap()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    TestResponse { status, cookie, json }
}
