// tests/session_resolution.rs
//
// The reuse-then-create resolution protocol against a scripted backend.


use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use mentor_chat::api::ApiClient;
use mentor_chat::session::{SessionError, SessionResolver};
use mentor_chat::storage::{MemoryStore, Storage, KEY_SESSION_ID};

use test_helpers::MockBackend;

fn resolver_for(backend: &MockBackend, store: Arc<MemoryStore>) -> SessionResolver {
    SessionResolver::new(ApiClient::new(backend.base_url.as_str()), store)
        .with_retry_backoff(Duration::from_millis(50))
}

#[tokio::test]
async fn test_reuses_open_session_without_creating() {
    let backend = MockBackend::start().await;
    backend
        .state
        .open_session
        .script(200, json!({"sessao": {"id": "s-open"}}));

    let store = Arc::new(MemoryStore::new());
    let resolver = resolver_for(&backend, Arc::clone(&store));

    let session_id = resolver.resolve("u1").await.unwrap();

    assert_eq!(session_id, "s-open");
    assert_eq!(backend.state.open_session.count(), 1);
    assert_eq!(backend.state.create_session.count(), 0);
    assert_eq!(store.get(KEY_SESSION_ID).as_deref(), Some("s-open"));
}

#[tokio::test]
async fn test_creates_when_no_open_session() {
    let backend = MockBackend::start().await;
    // Default /sessao-aberta answers 404; default create answers s1

    let store = Arc::new(MemoryStore::new());
    let resolver = resolver_for(&backend, Arc::clone(&store));

    let session_id = resolver.resolve("u1").await.unwrap();

    assert_eq!(session_id, "s1");
    assert_eq!(backend.state.create_session.count(), 1);

    // The create call carries the user and the opening note
    let bodies = backend.state.create_session.recorded();
    assert_eq!(
        bodies[0],
        json!({"user_id": "u1", "mensagem": "Início da sessão"})
    );
    assert_eq!(store.get(KEY_SESSION_ID).as_deref(), Some("s1"));
}

#[tokio::test]
async fn test_existence_check_failure_falls_through_to_create() {
    let backend = MockBackend::start().await;
    // A 2xx body that is not JSON at all: the check must count as "none"
    backend.state.open_session.script_raw(200, "<html>proxy error</html>");
    backend
        .state
        .create_session
        .script(200, json!({"sessao": {"id": "s-fresh"}}));

    let store = Arc::new(MemoryStore::new());
    let resolver = resolver_for(&backend, Arc::clone(&store));

    let session_id = resolver.resolve("u1").await.unwrap();

    assert_eq!(session_id, "s-fresh");
    assert_eq!(backend.state.create_session.count(), 1);
}

#[tokio::test]
async fn test_well_formed_envelope_without_id_is_not_reused() {
    let backend = MockBackend::start().await;
    backend.state.open_session.script(200, json!({"sessao": {}}));

    let store = Arc::new(MemoryStore::new());
    let resolver = resolver_for(&backend, Arc::clone(&store));

    let session_id = resolver.resolve("u1").await.unwrap();

    assert_eq!(session_id, "s1");
    assert_eq!(backend.state.create_session.count(), 1);
}

#[tokio::test]
async fn test_retry_after_backoff_returns_second_attempt() {
    let backend = MockBackend::start().await;
    backend
        .state
        .create_session
        .script(500, json!({"erro": "indisponível"}));
    backend
        .state
        .create_session
        .script(200, json!({"sessao": {"id": "s-retry"}}));

    let store = Arc::new(MemoryStore::new());
    let resolver = resolver_for(&backend, Arc::clone(&store));

    let started = Instant::now();
    let session_id = resolver.resolve("u1").await.unwrap();

    assert_eq!(session_id, "s-retry");
    assert_eq!(backend.state.create_session.count(), 2);
    // The configured grace period elapsed before the retry
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(store.get(KEY_SESSION_ID).as_deref(), Some("s-retry"));
}

#[tokio::test]
async fn test_both_create_attempts_failing_surfaces_backend_text() {
    let backend = MockBackend::start().await;
    backend
        .state
        .create_session
        .script(500, json!({"erro": "banco indisponível"}));
    backend
        .state
        .create_session
        .script(500, json!({"erro": "banco indisponível"}));

    let store = Arc::new(MemoryStore::new());
    let resolver = resolver_for(&backend, Arc::clone(&store));

    let err = resolver.resolve("u1").await.unwrap_err();

    assert!(matches!(err, SessionError::Resolution(_)));
    assert!(err.to_string().contains("banco indisponível"));
    // Exactly the initial attempt plus one retry
    assert_eq!(backend.state.create_session.count(), 2);
}

#[tokio::test]
async fn test_stale_persisted_session_is_cleared_before_resolving() {
    let backend = MockBackend::start().await;
    backend.state.create_session.set_default(500, json!({"erro": "fora do ar"}));

    let store = Arc::new(MemoryStore::new());
    store.set(KEY_SESSION_ID, "stale-from-other-user");

    let resolver = resolver_for(&backend, Arc::clone(&store));
    let result = resolver.resolve("u1").await;

    assert!(result.is_err());
    // The defensive reset ran even though resolution failed
    assert!(store.get(KEY_SESSION_ID).is_none());
}
