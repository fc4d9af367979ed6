//! Wiring for a complete client: storage, backend and the pipeline services.

use std::sync::Arc;

use anyhow::Result;

use crate::client::{Backend, BackendClient};
use crate::config::ClientConfig;
use crate::ingestion::IngestionController;
use crate::registry::DeckRegistry;
use crate::session::SessionManager;
use crate::storage::{KeyValueStore, SqliteStore};

/// Shared handles to every pipeline service.
#[derive(Clone)]
pub struct App {
    pub config: ClientConfig,
    pub backend: Arc<dyn Backend>,
    pub sessions: Arc<SessionManager>,
    pub registry: Arc<DeckRegistry>,
    pub controller: Arc<IngestionController>,
}

impl App {
    /// Open the client database and connect to the configured backend.
    pub fn open(config: ClientConfig) -> Result<Self> {
        let store = match config.data_dir {
            Some(ref dir) => SqliteStore::open(dir.join("notedeck.db"))?,
            None => SqliteStore::open_default()?,
        };
        store.migrate()?;

        let backend = Arc::new(BackendClient::from_config(&config));
        Ok(Self::with_parts(config, Arc::new(store), backend))
    }

    /// Assemble the services over an existing store and backend.
    pub fn with_parts(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
        backend: Arc<dyn Backend>,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(store.clone(), backend.clone()));
        let registry = Arc::new(DeckRegistry::new(store));
        let controller = Arc::new(IngestionController::new(
            backend.clone(),
            sessions.clone(),
            registry.clone(),
        ));

        tracing::debug!(server_url = %config.server_url, "Client assembled");
        Self {
            config,
            backend,
            sessions,
            registry,
            controller,
        }
    }
}
