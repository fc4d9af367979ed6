//! Upload progress stream decoding.
//!
//! The backend answers an upload with a newline-delimited body where each
//! line is `data: <json>`. Decoding happens in three layers:
//!
//! - [`FrameDecoder`] buffers raw bytes and yields only complete lines.
//! - [`parse_frame`] turns one line into a [`StreamEvent`], or nothing.
//! - [`EventStream`] pulls chunks from the body on demand and hands out one
//!   event at a time, so a consumer can stop reading the moment it sees a
//!   fatal event.

use std::collections::VecDeque;

use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;

use crate::client::{ByteStream, ClientError};
use crate::models::{DocumentOutcome, StreamEvent};

/// Prefix every progress frame carries.
pub const FRAME_PREFIX: &str = "data: ";

/// Payload marking the end of the stream.
pub const STREAM_TERMINATOR: &str = "[DONE]";

/// Detail used when an error frame does not carry one.
pub const DEFAULT_FAILURE_DETAIL: &str = "Upload failed. Please try again.";

#[derive(Debug, Deserialize)]
struct FramePayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    filename: Option<Value>,
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    session_id: Option<Value>,
}

impl FramePayload {
    fn into_event(self) -> Option<StreamEvent> {
        let filename = text(self.filename);
        match self.status.as_deref()? {
            "session" => text(self.session_id)
                .map(|session_id| StreamEvent::SessionAssigned { session_id }),
            "embedded" => filename.map(|filename| StreamEvent::DocumentProcessed {
                filename,
                outcome: DocumentOutcome::Embedded,
            }),
            "skipped" => filename.map(|filename| StreamEvent::DocumentProcessed {
                filename,
                outcome: DocumentOutcome::Skipped,
            }),
            "error" => {
                let detail =
                    text(self.detail).unwrap_or_else(|| DEFAULT_FAILURE_DETAIL.to_string());
                Some(match filename {
                    Some(filename) => StreamEvent::DocumentFailed { filename, detail },
                    None => StreamEvent::FatalFailure { detail },
                })
            }
            _ => None,
        }
    }
}

/// Non-empty string form of a JSON scalar.
fn text(value: Option<Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Decode one progress line.
///
/// Returns `None` for lines without the `data: ` prefix, empty payloads, the
/// terminator, undecodable JSON and unknown statuses. None of these are errors:
/// the stream tolerates noise.
pub fn parse_frame(raw: &str) -> Option<StreamEvent> {
    let payload = raw.strip_prefix(FRAME_PREFIX)?.trim();
    if payload.is_empty() || payload == STREAM_TERMINATOR {
        return None;
    }

    match serde_json::from_str::<FramePayload>(payload) {
        Ok(frame) => {
            let event = frame.into_event();
            if event.is_none() {
                tracing::debug!(payload, "Ignoring unrecognized progress frame");
            }
            event
        }
        Err(e) => {
            tracing::debug!(error = %e, payload, "Ignoring malformed progress frame");
            None
        }
    }
}

/// Splits a byte stream into complete newline-terminated lines.
///
/// Bytes after the last newline stay buffered until the rest of the line
/// arrives, so a frame (or a multi-byte character) cut by a read boundary is
/// never handed out half-finished.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, blank lines excluded.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.trim_end_matches('\r');
            if !line.trim().is_empty() {
                frames.push(line.to_string());
            }
        }
        frames
    }

    /// Bytes received after the last complete line.
    pub fn remainder(&self) -> &[u8] {
        &self.buffer
    }
}

/// Pull-based sequence of [`StreamEvent`]s over an upload response body.
pub struct EventStream {
    chunks: ByteStream,
    decoder: FrameDecoder,
    frames: VecDeque<String>,
}

impl EventStream {
    pub fn new(chunks: ByteStream) -> Self {
        Self {
            chunks,
            decoder: FrameDecoder::new(),
            frames: VecDeque::new(),
        }
    }

    /// Next event in arrival order.
    ///
    /// Reads from the body only when no complete frame is buffered. Returns
    /// `None` once the body ends; a trailing partial line is discarded.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, ClientError>> {
        loop {
            while let Some(frame) = self.frames.pop_front() {
                if let Some(event) = parse_frame(&frame) {
                    return Some(Ok(event));
                }
            }

            match self.chunks.next().await {
                Some(Ok(chunk)) => self.frames.extend(self.decoder.push(&chunk)),
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    let leftover = self.decoder.remainder();
                    if !leftover.is_empty() {
                        tracing::debug!(
                            bytes = leftover.len(),
                            "Discarding unterminated frame at end of stream"
                        );
                    }
                    return None;
                }
            }
        }
    }

    /// Stop reading and release the underlying connection.
    pub fn cancel(self) {
        tracing::debug!(
            buffered_frames = self.frames.len(),
            "Cancelling progress stream"
        );
        drop(self.chunks);
    }
}
