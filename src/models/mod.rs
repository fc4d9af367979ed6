//! Domain models for notedeck.
//!
//! # Core Concepts
//!
//! ## Persistent Entities
//!
//! - [`Deck`]: A generated flashcard collection tied to one backend session,
//!   with engagement metadata (last studied, mastery). At most one per session.
//!
//! ## Transient Entities
//!
//! These exist only while a batch is in flight:
//!
//! - [`Document`]: A note submitted for ingestion.
//! - [`StreamEvent`]: One decoded progress frame from the upload stream.
//!
//! ## Backend Payloads
//!
//! - [`StoredFile`], [`Flashcard`], [`GenerateResponse`]: Response bodies of the
//!   backend's listing and generation endpoints.

mod backend;
mod deck;
mod document;
mod event;

pub use backend::*;
pub use deck::*;
pub use document::*;
pub use event::*;
