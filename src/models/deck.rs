use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A flashcard deck generated from one upload session.
///
/// Decks are keyed by `session_id`: the registry never holds two decks for
/// the same session. `created_at` is fixed by the first write; later upserts
/// for the same session keep it.
///
/// Serialized with camelCase keys so the persisted registry stays readable by
/// other clients of the same backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: String,
    pub session_id: String,
    pub title: String,
    /// Number of flashcards the backend reported as saved.
    pub card_count: u64,
    pub note_count: u64,
    /// Filenames of the notes the deck was generated from.
    pub notes: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_studied_at: Option<DateTime<Utc>>,
    /// Study mastery in percent (0–100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mastery: Option<f64>,
}

impl Deck {
    /// Deck id derived from its session.
    pub fn id_for_session(session_id: &str) -> String {
        format!("deck-{}", session_id)
    }

    /// Timestamp used for "most recent first" listings.
    pub fn recency(&self) -> DateTime<Utc> {
        self.last_studied_at.unwrap_or(self.created_at)
    }
}
