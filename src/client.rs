//! HTTP client for the processing backend.
//!
//! The ingestion pipeline talks to the backend through the [`Backend`] trait;
//! [`BackendClient`] is the reqwest implementation. Every call except session
//! issuance is scoped by a `session_id` query parameter.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::ClientConfig;
use crate::models::*;

/// Raw chunks of a streamed response body, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ClientError>>;

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// The response body of a rejected request, if there was one.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } if !body.trim().is_empty() => Some(body),
            _ => None,
        }
    }

    /// The `detail` field of a JSON error body, if the backend sent one.
    pub fn detail(&self) -> Option<String> {
        let body = self.body()?;
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        value
            .get("detail")
            .and_then(|detail| detail.as_str())
            .filter(|detail| !detail.trim().is_empty())
            .map(str::to_string)
    }
}

/// Operations the client needs from the processing backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Ask the backend for a fresh session identifier.
    async fn issue_session(&self) -> Result<String, ClientError>;

    /// Upload a batch and return the progress stream body.
    async fn upload_files(
        &self,
        session_id: &str,
        documents: &[Document],
    ) -> Result<ByteStream, ClientError>;

    /// Run flashcard generation over everything embedded in the session.
    async fn generate(&self, session_id: &str) -> Result<GenerateResponse, ClientError>;

    /// List documents stored for the session.
    async fn list_files(&self, session_id: &str) -> Result<Vec<StoredFile>, ClientError>;

    /// List flashcards generated for the session.
    async fn list_flashcards(&self, session_id: &str) -> Result<Vec<Flashcard>, ClientError>;
}

/// reqwest-backed [`Backend`].
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    client: Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.server_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url)
    }

    fn session_request(&self, method: Method, path: &str, session_id: &str) -> reqwest::RequestBuilder {
        self.request(method, path).query(&[("session_id", session_id)])
    }

    /// Handle response, converting HTTP errors to ClientError.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ClientError::Status { status, body })
        }
    }
}

#[async_trait]
impl Backend for BackendClient {
    async fn issue_session(&self) -> Result<String, ClientError> {
        let response = self.request(Method::GET, "/session-id").send().await?;
        let issued: SessionIdResponse = self.handle_response(response).await?;
        Ok(issued.session_id)
    }

    async fn upload_files(
        &self,
        session_id: &str,
        documents: &[Document],
    ) -> Result<ByteStream, ClientError> {
        let mut form = Form::new();
        for document in documents {
            let mut part = Part::bytes(document.content.clone()).file_name(document.filename.clone());
            if let Some(ref content_type) = document.content_type {
                part = part.mime_str(content_type)?;
            }
            form = form.part("files", part);
        }

        tracing::debug!(session_id, documents = documents.len(), "Uploading batch");
        let response = self
            .session_request(Method::POST, "/upload-files", session_id)
            .multipart(form)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ClientError::from))
            .boxed())
    }

    async fn generate(&self, session_id: &str) -> Result<GenerateResponse, ClientError> {
        let response = self
            .session_request(Method::GET, "/llm", session_id)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn list_files(&self, session_id: &str) -> Result<Vec<StoredFile>, ClientError> {
        let response = self
            .session_request(Method::GET, "/files", session_id)
            .send()
            .await?;
        let listing: FileListResponse = self.handle_response(response).await?;
        Ok(listing.files)
    }

    async fn list_flashcards(&self, session_id: &str) -> Result<Vec<Flashcard>, ClientError> {
        let response = self
            .session_request(Method::GET, "/flashcards", session_id)
            .send()
            .await?;
        let listing: FlashcardListResponse = self.handle_response(response).await?;
        Ok(listing.flashcards)
    }
}
