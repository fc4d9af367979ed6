#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use notedeck::app::App;
use notedeck::client::{Backend, ByteStream, ClientError};
use notedeck::config::ClientConfig;
use notedeck::models::*;
use notedeck::storage::MemoryStore;
use reqwest::StatusCode;
use serde_json::{json, Value};

/// What the fake backend does with an upload.
#[derive(Clone)]
pub enum Upload {
    /// Send these lines, then end the body.
    Frames(Vec<String>),
    /// Send these lines, then fail the connection.
    Interrupted(Vec<String>),
    /// Send these lines, then never send anything again.
    Stalled(Vec<String>),
    /// Reject the request outright.
    Rejected(StatusCode, String),
}

/// Scripted in-process [`Backend`] that records how it was called.
pub struct FakeBackend {
    /// `None` makes issuance fail.
    pub issued: Option<String>,
    pub issue_delay: Duration,
    pub upload: Upload,
    /// `Err(body)` makes generation fail with a 500 carrying `body`.
    pub generated: Result<Value, String>,
    pub issue_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    pub uploaded_sessions: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            issued: Some("issued-session".to_string()),
            issue_delay: Duration::ZERO,
            upload: Upload::Frames(Vec::new()),
            generated: Ok(json!({ "saved_count": 0 })),
            issue_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            uploaded_sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn issue_count(&self) -> usize {
        self.issue_calls.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn generate_count(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

fn lines(frames: Vec<String>) -> stream::BoxStream<'static, Result<Vec<u8>, ClientError>> {
    stream::iter(frames.into_iter().map(|frame| Ok(frame.into_bytes()))).boxed()
}

#[async_trait]
impl Backend for FakeBackend {
    async fn issue_session(&self) -> Result<String, ClientError> {
        self.issue_calls.fetch_add(1, Ordering::SeqCst);
        if !self.issue_delay.is_zero() {
            tokio::time::sleep(self.issue_delay).await;
        }
        self.issued.clone().ok_or_else(|| ClientError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "unavailable".to_string(),
        })
    }

    async fn upload_files(
        &self,
        session_id: &str,
        _documents: &[Document],
    ) -> Result<ByteStream, ClientError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.uploaded_sessions
            .lock()
            .unwrap()
            .push(session_id.to_string());

        match self.upload.clone() {
            Upload::Frames(frames) => Ok(lines(frames)),
            Upload::Interrupted(frames) => Ok(lines(frames)
                .chain(stream::once(async {
                    Err(ClientError::InvalidResponse("connection reset".to_string()))
                }))
                .boxed()),
            Upload::Stalled(frames) => Ok(lines(frames).chain(stream::pending()).boxed()),
            Upload::Rejected(status, body) => Err(ClientError::Status { status, body }),
        }
    }

    async fn generate(&self, _session_id: &str) -> Result<GenerateResponse, ClientError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        match self.generated.clone() {
            Ok(value) => serde_json::from_value(value)
                .map_err(|e| ClientError::InvalidResponse(e.to_string())),
            Err(body) => Err(ClientError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body,
            }),
        }
    }

    async fn list_files(&self, _session_id: &str) -> Result<Vec<StoredFile>, ClientError> {
        Ok(Vec::new())
    }

    async fn list_flashcards(&self, _session_id: &str) -> Result<Vec<Flashcard>, ClientError> {
        Ok(Vec::new())
    }
}

/// One progress line as the backend writes it.
pub fn frame(payload: Value) -> String {
    format!("data: {}\n\n", payload)
}

pub fn embedded(filename: &str) -> String {
    frame(json!({ "status": "embedded", "filename": filename }))
}

pub fn skipped(filename: &str) -> String {
    frame(json!({ "status": "skipped", "filename": filename }))
}

pub fn failed(filename: &str, detail: &str) -> String {
    frame(json!({ "status": "error", "filename": filename, "detail": detail }))
}

pub fn fatal(detail: &str) -> String {
    frame(json!({ "status": "error", "detail": detail }))
}

pub fn documents(names: &[&str]) -> Vec<Document> {
    names
        .iter()
        .map(|name| Document::new(*name, format!("# {}\n", name)))
        .collect()
}

/// Wire an [`App`] over an in-memory store and `backend`.
pub fn app_with(backend: Arc<FakeBackend>, store: Arc<MemoryStore>) -> App {
    App::with_parts(ClientConfig::new("http://backend.test"), store, backend)
}
