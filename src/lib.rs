//! Client-side ingestion pipeline for a note-to-flashcard backend.
//!
//! Uploads documents, follows the backend's per-document progress stream,
//! triggers flashcard generation and records the resulting decks locally.
//! See [`ingestion::IngestionController`] for the entry point and [`app::App`]
//! for a fully wired instance.

pub mod app;
pub mod client;
pub mod config;
pub mod generation;
pub mod ingestion;
pub mod models;
pub mod registry;
pub mod session;
pub mod storage;
pub mod stream;
