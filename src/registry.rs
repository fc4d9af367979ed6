//! Durable registry of generated decks.
//!
//! The registry is one JSON array stored under [`DECKS_KEY`]. Every mutation
//! loads the whole array, normalizes it, applies the change and writes the
//! whole array back; there is no partial patching. Persisted records are not
//! trusted: [`normalize_deck`] repairs or drops each one on load.
//!
//! Persistence is best-effort. A failed write is logged and the in-memory
//! result is still returned, so callers never see storage errors.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::Deck;
use crate::storage::{KeyValueStore, DECKS_KEY};

/// Title used when a deck has no usable name.
pub const UNTITLED_DECK: &str = "Untitled Deck";

pub struct DeckRegistry {
    store: Arc<dyn KeyValueStore>,
    /// Serializes load-mutate-save sequences.
    write_lock: Mutex<()>,
}

impl DeckRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Read and normalize all persisted decks, in stored order.
    pub fn load(&self) -> Vec<Deck> {
        let raw = match self.store.get(DECKS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read deck registry");
                return Vec::new();
            }
        };
        parse_registry(&raw, Utc::now())
    }

    /// Replace the persisted registry with `decks`.
    pub fn save(&self, decks: &[Deck]) {
        let _guard = self.write_lock.lock().expect("registry lock poisoned");
        self.write(decks);
    }

    /// Look up the deck for a session.
    pub fn get(&self, session_id: &str) -> Option<Deck> {
        self.load()
            .into_iter()
            .find(|deck| deck.session_id == session_id)
    }

    /// Insert `deck`, or merge it into the existing deck for the same session.
    ///
    /// A merge keeps the existing `created_at`, keeps the existing notes unless
    /// the incoming list is non-empty, and keeps optional study metadata the
    /// incoming deck does not carry. The resulting deck moves to the front.
    pub fn upsert(&self, deck: Deck) -> Vec<Deck> {
        let _guard = self.write_lock.lock().expect("registry lock poisoned");
        let mut decks = self.load();

        let next = match decks.iter().position(|d| d.session_id == deck.session_id) {
            Some(index) => {
                let current = decks.remove(index);
                merge(current, deck)
            }
            None => deck,
        };

        tracing::debug!(session_id = %next.session_id, cards = next.card_count, "Upserting deck");
        decks.insert(0, next);
        self.write(&decks);
        decks
    }

    /// Stamp the session's deck as studied now.
    ///
    /// Leaves every other deck untouched and skips the write entirely when no
    /// deck matches.
    pub fn mark_studied(&self, session_id: &str) -> Vec<Deck> {
        let _guard = self.write_lock.lock().expect("registry lock poisoned");
        let mut decks = self.load();

        let Some(deck) = decks.iter_mut().find(|d| d.session_id == session_id) else {
            tracing::debug!(session_id, "No deck to mark as studied");
            return decks;
        };
        deck.last_studied_at = Some(Utc::now().max(deck.created_at));

        self.write(&decks);
        decks
    }

    fn write(&self, decks: &[Deck]) {
        let serialized = match serde_json::to_string(decks) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize deck registry");
                return;
            }
        };
        if let Err(e) = self.store.set(DECKS_KEY, &serialized) {
            tracing::warn!(error = %e, "Failed to persist deck registry; changes kept in memory only");
        }
    }
}

fn merge(current: Deck, incoming: Deck) -> Deck {
    Deck {
        created_at: current.created_at,
        notes: if incoming.notes.is_empty() {
            current.notes
        } else {
            incoming.notes
        },
        note_count: if incoming.note_count == 0 {
            current.note_count
        } else {
            incoming.note_count
        },
        last_studied_at: incoming.last_studied_at.or(current.last_studied_at),
        mastery: incoming.mastery.or(current.mastery),
        ..incoming
    }
}

/// Decks ordered most recently studied (or created) first.
pub fn by_recency(decks: &[Deck]) -> Vec<Deck> {
    let mut sorted = decks.to_vec();
    sorted.sort_by(|a, b| b.recency().cmp(&a.recency()));
    sorted
}

/// Parse a persisted registry, dropping anything that is not a usable deck.
pub fn parse_registry(raw: &str, now: DateTime<Utc>) -> Vec<Deck> {
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Deck registry is not valid JSON; starting empty");
            return Vec::new();
        }
    };
    let Value::Array(records) = parsed else {
        tracing::warn!("Deck registry is not an array; starting empty");
        return Vec::new();
    };

    let total = records.len();
    let decks: Vec<Deck> = records
        .iter()
        .filter_map(|record| normalize_deck(record, now))
        .collect();
    if decks.len() < total {
        tracing::debug!(dropped = total - decks.len(), "Dropped unusable deck records");
    }
    decks
}

/// Build a [`Deck`] from an untrusted JSON record.
///
/// Records without a non-empty string `sessionId` are rejected. Every other
/// field falls back to a default when missing or mistyped.
pub fn normalize_deck(raw: &Value, now: DateTime<Utc>) -> Option<Deck> {
    let record = raw.as_object()?;
    let session_id = record
        .get("sessionId")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?
        .to_string();

    let notes: Vec<String> = match record.get("notes") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    let id = record
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| Deck::id_for_session(&session_id));

    let title = record
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(UNTITLED_DECK)
        .to_string();

    let card_count = record.get("cardCount").and_then(count).unwrap_or(0);
    let note_count = record
        .get("noteCount")
        .and_then(count)
        .unwrap_or(notes.len() as u64);

    let created_at = record
        .get("createdAt")
        .and_then(timestamp)
        .unwrap_or(now);
    let last_studied_at = record.get("lastStudiedAt").and_then(timestamp);
    let mastery = record
        .get("mastery")
        .and_then(Value::as_f64)
        .filter(|m| m.is_finite())
        .map(|m| m.clamp(0.0, 100.0));

    Some(Deck {
        id,
        session_id,
        title,
        card_count,
        note_count,
        notes,
        created_at,
        last_studied_at,
        mastery,
    })
}

fn count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as u64)
    })
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
