//! Test utilities for end-to-end HTTP tests
//!
//! [`TestApp`] wires the real router to a temporary SQLite file, in-memory
//! photo storage and a mailer that records instead of sending.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use pageant_api::auth::{Blake3Hasher, SessionSigner};
use pageant_api::build_router;
use pageant_api::config::AdminBootstrap;
use pageant_api::mailer::{MailError, MailMessage, Mailer};
use pageant_api::media::MemoryPhotoStorage;
use pageant_api::state::AppState;
use pageant_core::ContestStore;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@pageant.test";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const PASSWORD: &str = "correct-horse";

/// Mailer that keeps every message it is asked to send
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, email: &str) -> Vec<MailMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.to == email)
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Raw HTTP response parts
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub photos: Arc<MemoryPhotoStorage>,
    pub mailer: Arc<RecordingMailer>,
    pub admin_token: String,
    db_path: PathBuf,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_path = std::env::temp_dir().join(format!("pageant_http_{}.db", Uuid::new_v4()));
        let store = ContestStore::open_path(&db_path).unwrap();

        let photos = Arc::new(MemoryPhotoStorage::new());
        let mailer = Arc::new(RecordingMailer::default());
        let state = Arc::new(AppState::new(
            store,
            SessionSigner::ephemeral(Duration::from_secs(3600)),
            Arc::new(Blake3Hasher::new(10)),
            mailer.clone(),
            photos.clone(),
        ));

        state
            .bootstrap_admin(&AdminBootstrap {
                email: ADMIN_EMAIL.to_string(),
                password: ADMIN_PASSWORD.to_string(),
            })
            .await
            .unwrap();

        let router = build_router(state.clone(), None).unwrap();

        let mut app = Self {
            router,
            state,
            photos,
            mailer,
            admin_token: String::new(),
            db_path,
        };
        app.admin_token = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        app
    }

    pub async fn send(&self, request: Request<Body>) -> RawResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        RawResponse {
            status,
            headers,
            body,
        }
    }

    /// JSON request; returns status and parsed body
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self.send(builder.body(body).unwrap()).await;
        (response.status, response.json())
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/login",
                None,
                json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Register a plain user; returns (token, id)
    pub async fn register(&self, name: &str, email: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({ "name": name, "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        (
            body["data"]["token"].as_str().unwrap().to_string(),
            body["data"]["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    pub async fn approve_payment(&self, user_id: &str) {
        let (status, body) = self
            .patch(
                &format!("/api/users/payment-status/{user_id}"),
                Some(&self.admin_token),
                json!({ "paymentStatus": "approved" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "approval failed: {body}");
    }

    /// Register, approve, complete the competition registration and
    /// optionally publish; returns (token, id)
    pub async fn contestant(
        &self,
        name: &str,
        email: &str,
        category: &str,
        visible: bool,
    ) -> (String, String) {
        let (token, id) = self.register(name, email).await;
        self.approve_payment(&id).await;

        let (status, body) = self
            .post(
                "/api/competition/register",
                Some(&token),
                json!({ "category": category, "age": 24, "biography": format!("{name} bio") }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "competition register failed: {body}");

        if visible {
            let (status, body) = self
                .patch(
                    &format!("/api/admin/contestants/{id}"),
                    Some(&self.admin_token),
                    json!({ "isPubliclyVisible": true }),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "publish failed: {body}");
        }

        (token, id)
    }

    /// Wait for spawned mail sends to land
    pub async fn wait_for_mail(&self, count: usize) -> Vec<MailMessage> {
        for _ in 0..100 {
            let sent = self.mailer.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.mailer.sent()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_file(self.db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(self.db_path.with_extension("db-shm"));
    }
}

/// One part of a hand-built multipart body
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: Vec<u8>,
}

impl<'a> Part<'a> {
    pub fn file(name: &'a str, file_name: &'a str, content_type: &'a str, data: Vec<u8>) -> Self {
        Self {
            name,
            file_name: Some(file_name),
            content_type: Some(content_type),
            data,
        }
    }

    pub fn text(name: &'a str, value: &str) -> Self {
        Self {
            name,
            file_name: None,
            content_type: None,
            data: value.as_bytes().to_vec(),
        }
    }
}

const BOUNDARY: &str = "pageant-test-boundary";

/// Multipart/form-data request carrying `parts`
pub fn multipart_request(method: Method, uri: &str, token: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match part.file_name {
            Some(file) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{file}\"\r\n",
                part.name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name),
        };
        body.extend_from_slice(disposition.as_bytes());
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
