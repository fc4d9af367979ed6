use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use notedeck::app::App;
use notedeck::client::{Backend, BackendClient};
use notedeck::config::ClientConfig;
use notedeck::ingestion::BatchOutcome;
use notedeck::models::Document;
use notedeck::storage::{KeyValueStore, MemoryStore, SESSION_KEY};
use serde_json::json;

/// Requests the mock backend received.
#[derive(Default)]
struct Seen {
    uploads: Mutex<Vec<(String, String)>>,
    generated_for: Mutex<Vec<String>>,
}

type Params = Query<HashMap<String, String>>;

fn session_of(params: &HashMap<String, String>) -> String {
    params.get("session_id").cloned().unwrap_or_default()
}

async fn issue_session() -> Json<serde_json::Value> {
    Json(json!({ "session_id": "http-session" }))
}

async fn upload_files(State(seen): State<Arc<Seen>>, Query(params): Params, body: Bytes) -> Response {
    seen.uploads
        .lock()
        .unwrap()
        .push((session_of(&params), String::from_utf8_lossy(&body).into_owned()));

    // The second frame is split across chunks on purpose.
    let chunks: Vec<&'static str> = vec![
        "data: {\"status\":\"session\",\"session_id\":\"assigned\"}\n\n",
        "data: {\"status\":\"embed",
        "ded\",\"filename\":\"a.md\"}\n\ndata: {\"status\":\"error\",\"filename\":\"b.md\",\"detail\":\"Unsupported encoding\"}\n\n",
        "data: [DONE]\n\n",
    ];
    let stream = futures::stream::iter(
        chunks
            .into_iter()
            .map(|chunk| Ok::<_, Infallible>(Bytes::from_static(chunk.as_bytes()))),
    );

    Response::builder()
        .header("content-type", "text/event-stream")
        .body(Body::from_stream(stream))
        .unwrap()
}

async fn reject_upload() -> impl IntoResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "detail": "Only markdown files are supported." })),
    )
}

async fn generate(State(seen): State<Arc<Seen>>, Query(params): Params) -> Json<serde_json::Value> {
    seen.generated_for.lock().unwrap().push(session_of(&params));
    Json(json!({ "saved_count": 2 }))
}

async fn list_files() -> Json<serde_json::Value> {
    Json(json!({
        "files": [
            { "id": 1, "filename": "a.md", "content_type": "text/markdown", "size_bytes": 12 },
            { "id": "f-2", "filename": "b.md" }
        ]
    }))
}

async fn list_flashcards() -> Json<serde_json::Value> {
    Json(json!({
        "flashcards": [
            { "id": 7, "filename": "a.md", "question": "What is ATP?", "answer": "Energy currency" }
        ]
    }))
}

async fn quota_exceeded() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "LLM quota exceeded")
}

fn backend_router(seen: Arc<Seen>) -> Router {
    Router::new()
        .route("/session-id", get(issue_session))
        .route("/upload-files", post(upload_files))
        .route("/llm", get(generate))
        .route("/files", get(list_files))
        .route("/flashcards", get(list_flashcards))
        .with_state(seen)
}

/// Serve `router` on an ephemeral port and return its base URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to read address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Mock backend failed");
    });
    format!("http://{}", addr)
}

fn app_at(url: &str, store: Arc<MemoryStore>) -> App {
    App::with_parts(
        ClientConfig::new(url),
        store,
        Arc::new(BackendClient::new(url)),
    )
}

mod backend_client {
    use super::*;

    #[tokio::test]
    async fn issues_a_session() {
        let url = serve(backend_router(Arc::default())).await;
        let client = BackendClient::new(format!("{}/", url));

        assert_eq!(client.issue_session().await.unwrap(), "http-session");
    }

    #[tokio::test]
    async fn lists_files_with_mixed_id_types() {
        let url = serve(backend_router(Arc::default())).await;
        let client = BackendClient::new(url);

        let files = client.list_files("s1").await.unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].id, "1");
        assert_eq!(files[0].size_bytes, Some(12));
        assert_eq!(files[1].id, "f-2");
        assert!(files[1].content_type.is_none());
    }

    #[tokio::test]
    async fn lists_flashcards() {
        let url = serve(backend_router(Arc::default())).await;
        let client = BackendClient::new(url);

        let cards = client.list_flashcards("s1").await.unwrap();

        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].id, "7");
        assert_eq!(cards[0].question, "What is ATP?");
    }

    #[tokio::test]
    async fn scopes_generation_by_session() {
        let seen = Arc::new(Seen::default());
        let url = serve(backend_router(seen.clone())).await;
        let client = BackendClient::new(url);

        let response = client.generate("s1").await.unwrap();

        assert_eq!(response.saved_count(), Some(2));
        assert_eq!(*seen.generated_for.lock().unwrap(), vec!["s1".to_string()]);
    }

    #[tokio::test]
    async fn keeps_the_body_of_a_rejected_request() {
        let url = serve(Router::new().route("/llm", get(quota_exceeded))).await;
        let client = BackendClient::new(url);

        let err = client.generate("s1").await.unwrap_err();

        assert_eq!(err.body(), Some("LLM quota exceeded"));
        assert!(err.detail().is_none());
    }
}

mod end_to_end {
    use super::*;

    #[tokio::test]
    async fn uploads_streams_and_records_a_deck() {
        let seen = Arc::new(Seen::default());
        let url = serve(backend_router(seen.clone())).await;
        let store = Arc::new(MemoryStore::with_entries([(SESSION_KEY, "s1")]));
        let app = app_at(&url, store.clone());

        let report = app
            .controller
            .start_upload(vec![
                Document::new("a.md", "# Cells"),
                Document::new("b.md", "# Energy"),
            ])
            .await
            .expect("batch should run");

        assert_eq!(report.outcome, BatchOutcome::PartiallyCompleted);
        assert_eq!(report.message, "Processed 2/2 files with 1 error(s).");
        assert_eq!(report.embedded, vec!["a.md"]);

        let uploads = seen.uploads.lock().unwrap().clone();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "s1");
        assert!(uploads[0].1.contains("filename=\"a.md\""));
        assert!(uploads[0].1.contains("filename=\"b.md\""));

        let deck = app.registry.get("s1").expect("deck should be recorded");
        assert_eq!(deck.card_count, 2);
        assert_eq!(deck.title, "a");
        assert_eq!(store.get(SESSION_KEY).unwrap().as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn issues_a_session_for_a_fresh_install() {
        let seen = Arc::new(Seen::default());
        let url = serve(backend_router(seen.clone())).await;
        let store = Arc::new(MemoryStore::new());
        let app = app_at(&url, store.clone());

        let report = app
            .controller
            .start_upload(vec![Document::new("a.md", "# Cells"), Document::new("b.md", "")])
            .await
            .unwrap();

        assert_eq!(report.session_id.as_deref(), Some("http-session"));
        assert_eq!(seen.uploads.lock().unwrap()[0].0, "http-session");
        assert_eq!(store.get(SESSION_KEY).unwrap().as_deref(), Some("http-session"));
    }

    #[tokio::test]
    async fn surfaces_the_rejection_detail() {
        let router = Router::new()
            .route("/session-id", get(issue_session))
            .route("/upload-files", post(reject_upload));
        let url = serve(router).await;
        let app = app_at(&url, Arc::new(MemoryStore::new()));

        let report = app
            .controller
            .start_upload(vec![Document::new("slides.pdf", "%PDF")])
            .await
            .unwrap();

        assert_eq!(report.outcome, BatchOutcome::Failed);
        assert_eq!(report.message, "Only markdown files are supported.");
        assert!(app.registry.load().is_empty());
    }
}
