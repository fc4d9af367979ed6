mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeBackend;
use notedeck::session::SessionManager;
use notedeck::storage::{KeyValueStore, MemoryStore, SqliteStore, SESSION_KEY};
use tokio_test::{assert_err, assert_ok};

fn manager(store: Arc<MemoryStore>, backend: Arc<FakeBackend>) -> SessionManager {
    SessionManager::new(store, backend)
}

mod ensure_session {
    use super::*;

    #[tokio::test]
    async fn issues_and_persists_when_nothing_is_stored() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(FakeBackend::new());
        let sessions = manager(store.clone(), backend.clone());

        let id = assert_ok!(sessions.ensure_session().await);

        assert_eq!(id, "issued-session");
        assert_eq!(store.get(SESSION_KEY).unwrap().as_deref(), Some("issued-session"));
        assert_eq!(backend.issue_count(), 1);
    }

    #[tokio::test]
    async fn returns_stored_id_without_contacting_backend() {
        let store = Arc::new(MemoryStore::with_entries([(SESSION_KEY, "existing")]));
        let backend = Arc::new(FakeBackend::new());
        let sessions = manager(store, backend.clone());

        assert_eq!(sessions.ensure_session().await.unwrap(), "existing");
        assert_eq!(sessions.ensure_session().await.unwrap(), "existing");
        assert_eq!(backend.issue_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_issuance() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(FakeBackend {
            issue_delay: Duration::from_millis(50),
            ..FakeBackend::new()
        });
        let sessions = manager(store, backend.clone());

        let (a, b, c) = tokio::join!(
            sessions.ensure_session(),
            sessions.ensure_session(),
            sessions.ensure_session()
        );

        assert_eq!(a.unwrap(), "issued-session");
        assert_eq!(b.unwrap(), "issued-session");
        assert_eq!(c.unwrap(), "issued-session");
        assert_eq!(backend.issue_count(), 1);
    }

    #[tokio::test]
    async fn persists_nothing_when_issuance_fails() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(FakeBackend {
            issued: None,
            ..FakeBackend::new()
        });
        let sessions = manager(store.clone(), backend);

        assert_err!(sessions.ensure_session().await);
        assert!(store.get(SESSION_KEY).unwrap().is_none());
        assert!(sessions.current().is_none());
    }

    #[tokio::test]
    async fn rejects_an_empty_issued_id() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(FakeBackend {
            issued: Some("  ".to_string()),
            ..FakeBackend::new()
        });
        let sessions = manager(store.clone(), backend);

        assert_err!(sessions.ensure_session().await);
        assert!(store.get(SESSION_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn treats_a_blank_stored_value_as_unset() {
        let store = Arc::new(MemoryStore::with_entries([(SESSION_KEY, "")]));
        let backend = Arc::new(FakeBackend::new());
        let sessions = manager(store.clone(), backend.clone());

        assert_eq!(sessions.ensure_session().await.unwrap(), "issued-session");
        assert_eq!(store.get(SESSION_KEY).unwrap().as_deref(), Some("issued-session"));
        assert_eq!(backend.issue_count(), 1);
    }

    #[tokio::test]
    async fn uses_the_id_for_the_run_when_storage_rejects_writes() {
        let store = Arc::new(MemoryStore::new());
        store.set_read_only(true);
        let sessions = manager(store.clone(), Arc::new(FakeBackend::new()));

        assert_eq!(sessions.ensure_session().await.unwrap(), "issued-session");
        assert!(store.get(SESSION_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn survives_reopening_the_database() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("notedeck.db");
        let backend = Arc::new(FakeBackend::new());

        {
            let store = SqliteStore::open(path.clone()).expect("Failed to open database");
            store.migrate().expect("Failed to migrate");
            let sessions = SessionManager::new(Arc::new(store), backend.clone());
            sessions.ensure_session().await.unwrap();
        }

        let store = SqliteStore::open(path).expect("Failed to reopen database");
        store.migrate().expect("Failed to migrate");
        let sessions = SessionManager::new(Arc::new(store), backend.clone());

        assert_eq!(sessions.current().as_deref(), Some("issued-session"));
        assert_eq!(sessions.ensure_session().await.unwrap(), "issued-session");
        assert_eq!(backend.issue_count(), 1);
    }
}

mod adopt {
    use super::*;

    #[test]
    fn stores_an_assigned_id_when_none_exists() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone(), Arc::new(FakeBackend::new()));

        assert_eq!(sessions.adopt("assigned"), "assigned");
        assert_eq!(sessions.current().as_deref(), Some("assigned"));
    }

    #[test]
    fn never_overwrites_an_existing_id() {
        let store = Arc::new(MemoryStore::with_entries([(SESSION_KEY, "first")]));
        let sessions = manager(store.clone(), Arc::new(FakeBackend::new()));

        assert_eq!(sessions.adopt("second"), "first");
        assert_eq!(store.get(SESSION_KEY).unwrap().as_deref(), Some("first"));
    }
}
