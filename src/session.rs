//! Client session identity.
//!
//! A session id is issued by the backend once per installation and persisted
//! under [`SESSION_KEY`]. Once stored it is never replaced: the first id that
//! reaches storage wins, whether it came from issuance or was assigned by the
//! upload stream.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::client::{Backend, ClientError};
use crate::storage::{KeyValueStore, SESSION_KEY};

pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    backend: Arc<dyn Backend>,
    issuing: Mutex<()>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KeyValueStore>, backend: Arc<dyn Backend>) -> Self {
        Self {
            store,
            backend,
            issuing: Mutex::new(()),
        }
    }

    /// The persisted session id, without contacting the backend.
    pub fn current(&self) -> Option<String> {
        match self.store.get(SESSION_KEY) {
            Ok(value) => value.filter(|id| !id.trim().is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session id");
                None
            }
        }
    }

    /// Return the persisted session id, issuing and persisting one if needed.
    ///
    /// Concurrent callers share a single issuance request. Nothing is
    /// persisted when issuance fails.
    pub async fn ensure_session(&self) -> Result<String, ClientError> {
        if let Some(id) = self.current() {
            return Ok(id);
        }

        let _issuing = self.issuing.lock().await;
        if let Some(id) = self.current() {
            return Ok(id);
        }

        tracing::info!("Requesting new session id");
        let issued = self.backend.issue_session().await?;
        if issued.trim().is_empty() {
            return Err(ClientError::InvalidResponse(
                "backend issued an empty session id".to_string(),
            ));
        }

        tracing::info!(session_id = %issued, "Session id issued");
        Ok(self.persist_if_absent(&issued))
    }

    /// Record a session id assigned by the backend, unless one is already stored.
    ///
    /// Returns the id in effect afterwards.
    pub fn adopt(&self, session_id: &str) -> String {
        self.persist_if_absent(session_id)
    }

    fn persist_if_absent(&self, session_id: &str) -> String {
        match self.store.set_if_absent(SESSION_KEY, session_id) {
            Ok(stored) if stored.trim().is_empty() => {
                // A blank value counts as unset.
                if let Err(e) = self.store.set(SESSION_KEY, session_id) {
                    tracing::warn!(error = %e, "Failed to persist session id");
                }
                session_id.to_string()
            }
            Ok(stored) => {
                if stored == session_id {
                    tracing::debug!(session_id, "Session id in effect");
                } else {
                    tracing::debug!(
                        kept = %stored,
                        ignored = session_id,
                        "Session id already set; keeping existing"
                    );
                }
                stored
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to persist session id; using it for this run only");
                session_id.to_string()
            }
        }
    }
}
