use crate::models::{DocumentOutcome, StreamEvent};

use super::state::{BatchOutcome, IngestionPhase};

/// Result of folding one event into an [`UploadBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoldStep {
    /// Counters changed; the string is the new status line.
    Progress(String),
    /// The batch is aborted with this detail. Nothing after it may be folded.
    Halt(String),
    /// The event did not change the batch.
    Ignored,
}

/// Per-batch aggregation of progress events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadBatch {
    pub session_id: String,
    /// Submitted filenames, in submission order.
    pub filenames: Vec<String>,
    pub total: usize,
    pub completed: usize,
    pub embedded_count: usize,
    pub error_count: usize,
    /// Filenames reported as embedded, in arrival order.
    pub embedded: Vec<String>,
    pub last_error: Option<String>,
    pub fatal: Option<String>,
}

impl UploadBatch {
    pub fn new(session_id: impl Into<String>, filenames: Vec<String>) -> Self {
        Self {
            session_id: session_id.into(),
            total: filenames.len(),
            filenames,
            completed: 0,
            embedded_count: 0,
            error_count: 0,
            embedded: Vec::new(),
            last_error: None,
            fatal: None,
        }
    }

    /// Apply one event.
    ///
    /// Per-document events past `total` are ignored so `completed` never
    /// exceeds it. Once the batch has halted every further event is ignored.
    /// Session assignment is not a batch concern and is ignored here.
    pub fn apply(&mut self, event: &StreamEvent) -> FoldStep {
        if self.fatal.is_some() {
            return FoldStep::Ignored;
        }

        match event {
            StreamEvent::SessionAssigned { .. } => FoldStep::Ignored,
            StreamEvent::DocumentProcessed { filename, outcome } => {
                if !self.has_room(filename) {
                    return FoldStep::Ignored;
                }
                self.completed += 1;
                if *outcome == DocumentOutcome::Embedded {
                    self.embedded_count += 1;
                    self.embedded.push(filename.clone());
                }
                FoldStep::Progress(format!(
                    "{} {} ({}/{})",
                    outcome.verb(),
                    filename,
                    self.completed,
                    self.total
                ))
            }
            StreamEvent::DocumentFailed { filename, detail } => {
                if !self.has_room(filename) {
                    return FoldStep::Ignored;
                }
                self.completed += 1;
                self.error_count += 1;
                let message = format!("Failed {}: {}", filename, detail);
                self.last_error = Some(message.clone());
                FoldStep::Progress(message)
            }
            StreamEvent::FatalFailure { detail } => {
                self.fatal = Some(detail.clone());
                FoldStep::Halt(detail.clone())
            }
        }
    }

    fn has_room(&self, filename: &str) -> bool {
        if self.completed < self.total {
            return true;
        }
        tracing::warn!(
            filename,
            total = self.total,
            "Ignoring progress event beyond batch size"
        );
        false
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    /// Generation runs only for non-fatal batches that embedded something.
    pub fn can_generate(&self) -> bool {
        !self.is_fatal() && self.embedded_count > 0
    }

    /// Final status line once the stream is over.
    pub fn terminal_message(&self) -> String {
        if let Some(ref detail) = self.fatal {
            detail.clone()
        } else if self.error_count > 0 {
            format!(
                "Processed {}/{} files with {} error(s).",
                self.completed, self.total, self.error_count
            )
        } else if self.completed == 0 {
            "No documents were embedded.".to_string()
        } else if self.completed < self.total {
            format!("Processed {}/{} files.", self.completed, self.total)
        } else {
            "All documents embedded.".to_string()
        }
    }

    pub fn outcome(&self) -> BatchOutcome {
        if self.is_fatal() {
            BatchOutcome::Fatal
        } else if self.error_count == 0 && self.completed > 0 && self.completed == self.total {
            BatchOutcome::Completed
        } else {
            BatchOutcome::PartiallyCompleted
        }
    }

    pub fn terminal_phase(&self) -> IngestionPhase {
        match self.outcome() {
            BatchOutcome::Completed => IngestionPhase::Completed,
            BatchOutcome::Fatal => IngestionPhase::Fatal,
            _ => IngestionPhase::PartiallyCompleted,
        }
    }
}
