use serde::Serialize;

use crate::models::Deck;

/// Where the controller is in the upload lifecycle.
///
/// ```text
/// Idle → Uploading → StreamingProgress → Completed | PartiallyCompleted | Fatal
///                                              ↓ (≥1 embedded, not fatal)
///                                          Generating → Idle
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionPhase {
    #[default]
    Idle,
    Uploading,
    StreamingProgress,
    Completed,
    PartiallyCompleted,
    Fatal,
    Generating,
}

impl IngestionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::StreamingProgress => "streaming_progress",
            Self::Completed => "completed",
            Self::PartiallyCompleted => "partially_completed",
            Self::Fatal => "fatal",
            Self::Generating => "generating",
        }
    }

    /// A batch is in flight and new uploads are refused.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Uploading | Self::StreamingProgress | Self::Generating
        )
    }
}

/// Observable controller state for the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionSnapshot {
    pub phase: IngestionPhase,
    pub total: usize,
    pub completed: usize,
    pub embedded_count: usize,
    pub error_count: usize,
    /// Latest user-facing status line.
    pub message: Option<String>,
    /// Latest per-document failure, if any.
    pub last_error: Option<String>,
}

/// How a batch's ingestion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every document was processed without errors.
    Completed,
    /// The stream ended with errors, early, or with nothing processed.
    PartiallyCompleted,
    /// The backend aborted the batch.
    Fatal,
    /// The upload request or its progress stream failed.
    Failed,
    /// The batch was cancelled before the stream ended.
    Cancelled,
}

/// Result of the generation step that follows a successful ingestion.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationReport {
    Generated { deck: Deck, message: String },
    Failed { message: String },
}

impl GenerationReport {
    pub fn message(&self) -> &str {
        match self {
            Self::Generated { message, .. } | Self::Failed { message } => message,
        }
    }

    pub fn deck(&self) -> Option<&Deck> {
        match self {
            Self::Generated { deck, .. } => Some(deck),
            Self::Failed { .. } => None,
        }
    }
}

/// Everything a finished batch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    /// Terminal ingestion message; unaffected by generation.
    pub message: String,
    pub session_id: Option<String>,
    pub total: usize,
    pub completed: usize,
    pub embedded_count: usize,
    pub error_count: usize,
    pub embedded: Vec<String>,
    /// `None` when generation was not attempted.
    pub generation: Option<GenerationReport>,
}
