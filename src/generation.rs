//! Flashcard generation hand-off.
//!
//! Once a batch has embedded at least one document, the backend is asked to
//! generate flashcards for the session. The result is a [`DeckDraft`] that the
//! ingestion controller turns into a registry entry. A failed generation is
//! reported on its own and never changes the ingestion outcome.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::client::{Backend, ClientError};
use crate::models::Deck;
use crate::registry::UNTITLED_DECK;

/// Message used when the backend gives no usable failure text.
pub const GENERATION_FAILED_MESSAGE: &str = "Flashcard generation failed.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Missing session id for flashcard generation.")]
    MissingSession,

    #[error("{0}")]
    Failed(String),
}

impl From<ClientError> for GenerationError {
    fn from(e: ClientError) -> Self {
        let message = e
            .body()
            .map(str::to_string)
            .unwrap_or_else(|| GENERATION_FAILED_MESSAGE.to_string());
        GenerationError::Failed(message)
    }
}

/// Outcome of a successful generation, before it is stored as a [`Deck`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckDraft {
    pub card_count: u64,
    /// Saved-card count as reported by the backend, if it reported one.
    pub saved_count: Option<u64>,
    pub notes: Vec<String>,
}

impl DeckDraft {
    /// User-facing summary of the generation.
    pub fn message(&self) -> String {
        match self.saved_count {
            Some(count) => format!("Flashcards generated ({} saved).", count),
            None => "Flashcards generated.".to_string(),
        }
    }

    pub fn into_deck(self, session_id: &str, created_at: DateTime<Utc>) -> Deck {
        Deck {
            id: Deck::id_for_session(session_id),
            session_id: session_id.to_string(),
            title: build_deck_title(&self.notes),
            card_count: self.card_count,
            note_count: self.notes.len() as u64,
            notes: self.notes,
            created_at,
            last_studied_at: None,
            mastery: None,
        }
    }
}

pub struct GenerationTrigger {
    backend: Arc<dyn Backend>,
}

impl GenerationTrigger {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Generate flashcards for everything embedded in `session_id`.
    ///
    /// `embedded` are the filenames the stream reported as embedded;
    /// `submitted` are all filenames of the batch and only used when
    /// `embedded` is empty.
    pub async fn generate(
        &self,
        session_id: &str,
        embedded: &[String],
        submitted: &[String],
    ) -> Result<DeckDraft, GenerationError> {
        if session_id.trim().is_empty() {
            return Err(GenerationError::MissingSession);
        }

        tracing::info!(session_id, documents = embedded.len(), "Generating flashcards");
        let response = self.backend.generate(session_id).await?;
        let saved_count = response.saved_count();

        Ok(DeckDraft {
            card_count: saved_count.unwrap_or(0),
            saved_count,
            notes: collect_notes(embedded, submitted),
        })
    }
}

/// Unique, non-blank note filenames in first-seen order.
///
/// Falls back to `submitted` when `embedded` is empty.
pub fn collect_notes(embedded: &[String], submitted: &[String]) -> Vec<String> {
    let source = if embedded.is_empty() { submitted } else { embedded };
    let mut seen = HashSet::new();
    source
        .iter()
        .filter(|name| !name.trim().is_empty())
        .filter(|name| seen.insert(name.to_string()))
        .cloned()
        .collect()
}

/// Deck title from its note filenames: the first note's stem, plus a count of
/// the rest (`"biology + 2 more"`).
pub fn build_deck_title(filenames: &[String]) -> String {
    let stems: Vec<&str> = filenames
        .iter()
        .filter(|name| !name.trim().is_empty())
        .map(|name| file_stem(name))
        .collect();

    match stems.as_slice() {
        [] => UNTITLED_DECK.to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} + {} more", first, rest.len()),
    }
}

fn file_stem(name: &str) -> &str {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    match base.rfind('.') {
        Some(dot) if dot + 1 < base.len() => &base[..dot],
        _ => base,
    }
}
