// tests/chat_flow.rs
//
// The chat controller's state machine: send round trips, the pending gate,
// history reloads, and the end/new session transitions.


use std::sync::Arc;

use serde_json::json;

use mentor_chat::api::ApiClient;
use mentor_chat::chat::{ChatController, Origin, SendOutcome};
use mentor_chat::storage::{MemoryStore, Storage, KEY_SESSION_ID};

use test_helpers::MockBackend;

fn controller_for(backend: &MockBackend, store: Arc<MemoryStore>) -> ChatController {
    ChatController::new(ApiClient::new(backend.base_url.as_str()), store, "u1")
}

#[tokio::test]
async fn test_send_appends_user_then_assistant() {
    let backend = MockBackend::start().await;
    let store = Arc::new(MemoryStore::new());
    let controller = controller_for(&backend, Arc::clone(&store));

    controller.bind("s1").await;
    let outcome = controller.send("Oi").await;

    assert_eq!(outcome, SendOutcome::Delivered);
    assert!(!controller.is_pending());

    let state = controller.snapshot();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[0].origin, Origin::User);
    assert_eq!(state.messages[0].text, "Oi");
    assert_eq!(state.messages[1].origin, Origin::Assistant);
    assert_eq!(state.messages[1].text, "Resposta do mentor");
    assert!(state.error.is_none());

    // Persist-then-reply, with the exact wire bodies
    assert_eq!(backend.state.message.count(), 1);
    assert_eq!(backend.state.ia.count(), 1);
    assert_eq!(
        backend.state.message.recorded()[0],
        json!({
            "sessao_id": "s1",
            "user_id": "u1",
            "texto_mensagem": "Oi",
            "origem": "usuario"
        })
    );
    assert_eq!(
        backend.state.ia.recorded()[0],
        json!({"user_id": "u1", "sessao_id": "s1", "mensagem": "Oi"})
    );
}

#[tokio::test]
async fn test_second_concurrent_send_is_rejected() {
    let backend = MockBackend::start().await;
    let store = Arc::new(MemoryStore::new());
    let controller = controller_for(&backend, Arc::clone(&store));

    controller.bind("s1").await;

    // Two rapid submits: the first claims the pending gate before its first
    // await, so the second must be turned away without traffic
    let (first, second) = tokio::join!(controller.send("primeira"), controller.send("segunda"));

    assert_eq!(first, SendOutcome::Delivered);
    assert_eq!(second, SendOutcome::Rejected);
    assert_eq!(backend.state.message.count(), 1);
    assert_eq!(backend.state.ia.count(), 1);

    // Only the delivered message (plus its reply) reached the transcript
    let texts: Vec<String> = controller
        .snapshot()
        .messages
        .iter()
        .map(|m| m.text.clone())
        .collect();
    assert_eq!(texts, vec!["primeira", "Resposta do mentor"]);
}

#[tokio::test]
async fn test_send_rejected_when_unbound_or_empty() {
    let backend = MockBackend::start().await;
    let store = Arc::new(MemoryStore::new());
    let controller = controller_for(&backend, Arc::clone(&store));

    assert_eq!(controller.send("sem sessão").await, SendOutcome::Rejected);

    controller.bind("s1").await;
    assert_eq!(controller.send("   ").await, SendOutcome::Rejected);

    assert_eq!(backend.state.message.count(), 0);
}

#[tokio::test]
async fn test_persist_failure_skips_reply_and_stays_visible() {
    let backend = MockBackend::start().await;
    backend
        .state
        .message
        .script(500, json!({"error": "não foi possível salvar"}));

    let store = Arc::new(MemoryStore::new());
    let controller = controller_for(&backend, Arc::clone(&store));

    controller.bind("s1").await;
    let outcome = controller.send("Oi").await;

    assert_eq!(outcome, SendOutcome::Failed);
    // The reply is never requested when persistence fails
    assert_eq!(backend.state.ia.count(), 0);

    let state = controller.snapshot();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[1].origin, Origin::System);
    assert!(state.messages[1].text.contains("não foi possível salvar"));
    assert!(state.error.unwrap().contains("não foi possível salvar"));
    assert!(!controller.is_pending());
}

#[tokio::test]
async fn test_reply_failure_appends_system_entry() {
    let backend = MockBackend::start().await;
    backend
        .state
        .ia
        .script(502, json!({"erro": "Falha ao obter resposta da IA."}));

    let store = Arc::new(MemoryStore::new());
    let controller = controller_for(&backend, Arc::clone(&store));

    controller.bind("s1").await;
    let outcome = controller.send("Oi").await;

    assert_eq!(outcome, SendOutcome::Failed);
    let state = controller.snapshot();
    assert_eq!(state.messages[1].origin, Origin::System);
    assert!(state.messages[1].text.starts_with("Erro: "));
}

#[tokio::test]
async fn test_empty_reply_is_skipped() {
    let backend = MockBackend::start().await;
    backend.state.ia.script(200, json!({"resposta": "   "}));

    let store = Arc::new(MemoryStore::new());
    let controller = controller_for(&backend, Arc::clone(&store));

    controller.bind("s1").await;
    let outcome = controller.send("Oi").await;

    assert_eq!(outcome, SendOutcome::Delivered);
    let state = controller.snapshot();
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].origin, Origin::User);
}

#[tokio::test]
async fn test_bind_refetches_history_wholesale() {
    let backend = MockBackend::start().await;
    backend.state.history.script(
        200,
        json!({"mensagens": [
            {"origem": "usuario", "texto_mensagem": "Oi", "data_mensagem": "2024-05-01T12:00:00Z"},
            {"origem": "bot", "texto_mensagem": "Olá!", "data_mensagem": "2024-05-01T12:00:05Z"}
        ]}),
    );

    let store = Arc::new(MemoryStore::new());
    let controller = controller_for(&backend, Arc::clone(&store));

    controller.bind("s1").await;

    let state = controller.snapshot();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[0].origin, Origin::User);
    assert_eq!(state.messages[1].origin, Origin::Assistant);
    assert_eq!(state.messages[1].text, "Olá!");

    // Binding mirrored the id into storage
    assert_eq!(store.get(KEY_SESSION_ID).as_deref(), Some("s1"));
}

#[tokio::test]
async fn test_history_failure_sets_error_and_keeps_transcript() {
    let backend = MockBackend::start().await;
    backend
        .state
        .history
        .script(500, json!({"erro": "Falha ao carregar histórico."}));

    let store = Arc::new(MemoryStore::new());
    let controller = controller_for(&backend, Arc::clone(&store));

    controller.bind("s1").await;

    let state = controller.snapshot();
    assert!(state.messages.is_empty());
    assert!(state.error.unwrap().contains("Falha ao carregar histórico."));
}

#[tokio::test]
async fn test_end_session_clears_memory_and_storage() {
    let backend = MockBackend::start().await;
    let store = Arc::new(MemoryStore::new());
    let controller = controller_for(&backend, Arc::clone(&store));

    controller.bind("s1").await;
    controller.end_session().await.unwrap();

    assert!(controller.session_id().is_none());
    assert!(store.get(KEY_SESSION_ID).is_none());

    let state = controller.snapshot();
    let last = state.messages.last().unwrap();
    assert_eq!(last.origin, Origin::System);
    assert_eq!(last.text, "Sessão encerrada.");

    assert_eq!(
        backend.state.end_session.recorded()[0],
        json!({"sessao_id": "s1"})
    );
}

#[tokio::test]
async fn test_end_session_failure_leaves_state_untouched() {
    let backend = MockBackend::start().await;
    backend
        .state
        .end_session
        .script(500, json!({"error": "Erro ao encerrar sessão."}));

    let store = Arc::new(MemoryStore::new());
    let controller = controller_for(&backend, Arc::clone(&store));

    controller.bind("s1").await;
    let err = controller.end_session().await.unwrap_err();

    assert!(err.to_string().contains("Erro ao encerrar sessão."));
    assert_eq!(controller.session_id().as_deref(), Some("s1"));
    assert_eq!(store.get(KEY_SESSION_ID).as_deref(), Some("s1"));
}

#[tokio::test]
async fn test_new_session_always_creates_even_with_open_session() {
    let backend = MockBackend::start().await;
    // An open session exists on the backend; explicit "new" must not reuse it
    backend
        .state
        .open_session
        .set_default(200, json!({"sessao": {"id": "s-open"}}));
    backend
        .state
        .create_session
        .script(200, json!({"sessao": {"id": "s-new"}}));

    let store = Arc::new(MemoryStore::new());
    let controller = controller_for(&backend, Arc::clone(&store));

    controller.bind("s-old").await;
    controller.send("mensagem antiga").await;

    let session_id = controller.new_session().await.unwrap();

    assert_eq!(session_id, "s-new");
    assert_eq!(backend.state.open_session.count(), 0);
    assert_eq!(backend.state.create_session.count(), 1);
    assert_eq!(
        backend.state.create_session.recorded()[0],
        json!({"user_id": "u1", "mensagem": "Nova sessão"})
    );

    // Transcript reset, storage mirrored
    let state = controller.snapshot();
    assert_eq!(state.session_id.as_deref(), Some("s-new"));
    assert!(state.messages.is_empty());
    assert_eq!(store.get(KEY_SESSION_ID).as_deref(), Some("s-new"));
}
