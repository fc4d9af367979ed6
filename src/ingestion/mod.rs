//! Upload batch orchestration.
//!
//! [`IngestionController`] owns the whole life of a batch: session lookup,
//! the multipart upload, folding the progress stream into counters, the
//! terminal status, and the hand-off to generation and the deck registry.
//!
//! The presentation layer never touches batch state directly. It calls
//! [`IngestionController::start_upload`] / [`IngestionController::cancel`] and
//! watches [`IngestionSnapshot`]s from [`IngestionController::subscribe`].
//! No error escapes `start_upload`: every failure ends in a snapshot message.

mod batch;
mod state;

pub use batch::{FoldStep, UploadBatch};
pub use state::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::client::Backend;
use crate::generation::GenerationTrigger;
use crate::models::{Document, StreamEvent};
use crate::registry::DeckRegistry;
use crate::session::SessionManager;
use crate::stream::EventStream;

/// Generic message for failures that carry no better explanation.
pub const UPLOAD_FAILED_MESSAGE: &str = "Upload failed. Please try again.";
pub const UPLOAD_CANCELLED_MESSAGE: &str = "Upload cancelled.";
pub const GENERATING_MESSAGE: &str = "Generating flashcards...";

pub struct IngestionController {
    backend: Arc<dyn Backend>,
    sessions: Arc<SessionManager>,
    registry: Arc<DeckRegistry>,
    generator: GenerationTrigger,
    state: watch::Sender<IngestionSnapshot>,
    in_flight: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

/// Clears the in-flight flag when a batch ends, including when the
/// `start_upload` future is dropped mid-stream.
struct InFlight<'a> {
    controller: &'a IngestionController,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.controller.state.send_modify(|snapshot| {
            if snapshot.phase.is_busy() {
                snapshot.phase = IngestionPhase::Idle;
                snapshot.message = Some(UPLOAD_CANCELLED_MESSAGE.to_string());
            }
        });
        self.controller.in_flight.store(false, Ordering::SeqCst);
    }
}

impl IngestionController {
    pub fn new(
        backend: Arc<dyn Backend>,
        sessions: Arc<SessionManager>,
        registry: Arc<DeckRegistry>,
    ) -> Self {
        let (state, _) = watch::channel(IngestionSnapshot::default());
        Self {
            generator: GenerationTrigger::new(backend.clone()),
            backend,
            sessions,
            registry,
            state,
            in_flight: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Receive a snapshot on every state change.
    pub fn subscribe(&self) -> watch::Receiver<IngestionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> IngestionSnapshot {
        self.state.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Abort the batch in flight, releasing the progress stream.
    ///
    /// Does nothing when no batch is in flight; a cancel issued before
    /// `start_upload` has claimed the controller does not carry over to it.
    pub fn cancel(&self) {
        let token = self.cancel.lock().expect("cancel lock poisoned");
        if !self.in_flight.load(Ordering::SeqCst) {
            tracing::debug!("No upload in flight; nothing to cancel");
            return;
        }
        tracing::info!("Cancelling upload batch");
        token.cancel();
    }

    /// Upload `documents` as one batch and follow it to the end.
    ///
    /// Returns `None` without doing anything when `documents` is empty or a
    /// batch is already in flight.
    pub async fn start_upload(&self, documents: Vec<Document>) -> Option<BatchReport> {
        if documents.is_empty() {
            tracing::debug!("Ignoring empty upload");
            return None;
        }
        // The batch's token is installed under the same lock that `cancel`
        // takes, so a cancel that sees the batch in flight always hits it.
        let token = {
            let mut current = self.cancel.lock().expect("cancel lock poisoned");
            if self
                .in_flight
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                tracing::info!("Upload already in progress; ignoring request");
                return None;
            }
            *current = CancellationToken::new();
            current.clone()
        };
        let _in_flight = InFlight { controller: self };

        let report = self.run_batch(documents, token).await;
        self.state.send_modify(|snapshot| snapshot.phase = IngestionPhase::Idle);
        Some(report)
    }

    async fn run_batch(&self, documents: Vec<Document>, token: CancellationToken) -> BatchReport {
        let filenames: Vec<String> = documents.iter().map(|d| d.filename.clone()).collect();
        let total = filenames.len();

        self.state.send_replace(IngestionSnapshot {
            phase: IngestionPhase::Uploading,
            total,
            message: Some(embedding_message(total)),
            ..Default::default()
        });

        let session_id = tokio::select! {
            biased;
            _ = token.cancelled() => return self.abandon(UploadBatch::new("", filenames), None),
            result = self.sessions.ensure_session() => match result {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(error = %e, "Could not obtain a session id");
                    return self.fail(UploadBatch::new("", filenames), UPLOAD_FAILED_MESSAGE);
                }
            },
        };

        let mut batch = UploadBatch::new(session_id, filenames);
        tracing::info!(session_id = %batch.session_id, total, "Starting upload batch");

        let chunks = tokio::select! {
            biased;
            _ = token.cancelled() => return self.abandon(batch, None),
            result = self.backend.upload_files(&batch.session_id, &documents) => match result {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::warn!(error = %e, "Upload request failed");
                    let message = e.detail().unwrap_or_else(|| UPLOAD_FAILED_MESSAGE.to_string());
                    return self.fail(batch, &message);
                }
            },
        };

        self.state
            .send_modify(|snapshot| snapshot.phase = IngestionPhase::StreamingProgress);
        let mut events = EventStream::new(chunks);

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return self.abandon(batch, Some(events)),
                next = events.next_event() => next,
            };

            let event = match next {
                None => break,
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    tracing::warn!(
                        error = %e,
                        completed = batch.completed,
                        "Progress stream interrupted"
                    );
                    events.cancel();
                    return self.fail(batch, UPLOAD_FAILED_MESSAGE);
                }
            };

            if let StreamEvent::SessionAssigned { ref session_id } = event {
                self.sessions.adopt(session_id);
                continue;
            }

            match batch.apply(&event) {
                FoldStep::Progress(message) => {
                    self.publish(&batch, IngestionPhase::StreamingProgress, message)
                }
                FoldStep::Halt(detail) => {
                    events.cancel();
                    tracing::warn!(
                        detail = %detail,
                        completed = batch.completed,
                        "Backend aborted the batch"
                    );
                    break;
                }
                FoldStep::Ignored => {}
            }
        }

        let message = batch.terminal_message();
        self.publish(&batch, batch.terminal_phase(), message.clone());
        tracing::info!(
            outcome = ?batch.outcome(),
            completed = batch.completed,
            total = batch.total,
            embedded = batch.embedded_count,
            errors = batch.error_count,
            "Upload batch finished"
        );

        let generation = if batch.can_generate() {
            Some(self.generate(&batch).await)
        } else {
            None
        };

        report(&batch, batch.outcome(), message, generation)
    }

    async fn generate(&self, batch: &UploadBatch) -> GenerationReport {
        self.publish(batch, IngestionPhase::Generating, GENERATING_MESSAGE.to_string());

        let result = self
            .generator
            .generate(&batch.session_id, &batch.embedded, &batch.filenames)
            .await;

        let report = match result {
            Ok(draft) => {
                let message = draft.message();
                let deck = draft.into_deck(&batch.session_id, Utc::now());
                let stored = self
                    .registry
                    .upsert(deck.clone())
                    .into_iter()
                    .next()
                    .unwrap_or(deck);
                tracing::info!(session_id = %stored.session_id, cards = stored.card_count, "Deck recorded");
                GenerationReport::Generated {
                    deck: stored,
                    message,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Flashcard generation failed");
                GenerationReport::Failed {
                    message: e.to_string(),
                }
            }
        };

        let message = report.message().to_string();
        self.state
            .send_modify(|snapshot| snapshot.message = Some(message));
        report
    }

    fn publish(&self, batch: &UploadBatch, phase: IngestionPhase, message: String) {
        self.state.send_replace(IngestionSnapshot {
            phase,
            total: batch.total,
            completed: batch.completed,
            embedded_count: batch.embedded_count,
            error_count: batch.error_count,
            message: Some(message),
            last_error: batch.last_error.clone(),
        });
    }

    /// End the batch before the stream could be read.
    fn fail(&self, batch: UploadBatch, message: &str) -> BatchReport {
        self.publish(&batch, IngestionPhase::Idle, message.to_string());
        report(&batch, BatchOutcome::Failed, message.to_string(), None)
    }

    fn abandon(&self, batch: UploadBatch, events: Option<EventStream>) -> BatchReport {
        if let Some(events) = events {
            events.cancel();
        }
        tracing::info!(completed = batch.completed, total = batch.total, "Upload batch cancelled");
        self.publish(&batch, IngestionPhase::Idle, UPLOAD_CANCELLED_MESSAGE.to_string());
        report(
            &batch,
            BatchOutcome::Cancelled,
            UPLOAD_CANCELLED_MESSAGE.to_string(),
            None,
        )
    }
}

fn embedding_message(total: usize) -> String {
    format!(
        "Embedding {} document{}...",
        total,
        if total > 1 { "s" } else { "" }
    )
}

fn report(
    batch: &UploadBatch,
    outcome: BatchOutcome,
    message: String,
    generation: Option<GenerationReport>,
) -> BatchReport {
    BatchReport {
        outcome,
        message,
        session_id: Some(batch.session_id.clone()).filter(|id| !id.is_empty()),
        total: batch.total,
        completed: batch.completed,
        embedded_count: batch.embedded_count,
        error_count: batch.error_count,
        embedded: batch.embedded.clone(),
        generation,
    }
}
