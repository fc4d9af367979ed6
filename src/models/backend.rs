use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Response of `GET /session-id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIdResponse {
    pub session_id: String,
}

/// Response of `GET /llm`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Number of flashcards stored by the backend. Absent or non-numeric
    /// values mean the backend did not report a count.
    #[serde(default)]
    pub saved_count: Option<Value>,
}

impl GenerateResponse {
    pub fn saved_count(&self) -> Option<u64> {
        let value = self.saved_count.as_ref()?;
        value.as_u64().or_else(|| {
            value
                .as_f64()
                .filter(|n| n.is_finite() && *n >= 0.0)
                .map(|n| n as u64)
        })
    }
}

/// A document stored by the backend for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

/// Response of `GET /files`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<StoredFile>,
}

/// A generated question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    pub question: String,
    pub answer: String,
}

/// Response of `GET /flashcards`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlashcardListResponse {
    #[serde(default)]
    pub flashcards: Vec<Flashcard>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}
