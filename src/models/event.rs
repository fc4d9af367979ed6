use serde::{Deserialize, Serialize};

/// What the backend did with a document it accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOutcome {
    Embedded,
    /// Already embedded in this session; nothing new was stored.
    Skipped,
}

impl DocumentOutcome {
    /// Verb used in progress messages.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Embedded => "Embedded",
            Self::Skipped => "Skipped",
        }
    }
}

/// A decoded frame of the upload progress stream.
///
/// Events are folded into batch state strictly in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The backend bound the upload to a session.
    SessionAssigned { session_id: String },
    /// One document finished processing.
    DocumentProcessed {
        filename: String,
        outcome: DocumentOutcome,
    },
    /// One document failed; the rest of the batch continues.
    DocumentFailed { filename: String, detail: String },
    /// The whole batch failed; nothing after this frame is processed.
    FatalFailure { detail: String },
}
