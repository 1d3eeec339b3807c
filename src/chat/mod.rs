//! Session-bound chat controller
//!
//! Owns the in-memory state for the active session (transcript, pending-send
//! gate, error text) and drives the request/response cycle: send a message,
//! fetch the reply, end the session, start a fresh one. Every change to the
//! session id is mirrored into persisted storage in the same step, and the
//! transcript is refetched wholesale whenever the id changes.
//!
//! The state lives behind a mutex that is never held across an await; the
//! pending gate is an atomic claimed by compare-exchange, so a second
//! concurrent submit is rejected rather than queued.

mod types;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::api::{ApiClient, ApiError};
use crate::storage::{Storage, KEY_SESSION_ID};

pub use types::{ChatState, Message, Origin, SendOutcome};

/// Opening note recorded when the user explicitly asks for a fresh session
pub const NEW_SESSION_NOTE: &str = "Nova sessão";

/// Drives one user's conversation against the backend.
pub struct ChatController {
    api: ApiClient,
    store: Arc<dyn Storage>,
    user_id: String,
    state: Mutex<ChatState>,
    pending: AtomicBool,
}

impl ChatController {
    pub fn new(api: ApiClient, store: Arc<dyn Storage>, user_id: impl Into<String>) -> Self {
        Self {
            api,
            store,
            user_id: user_id.into(),
            state: Mutex::new(ChatState::default()),
            pending: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Clone of the current state, for rendering and assertions.
    pub fn snapshot(&self) -> ChatState {
        self.state().clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.state().session_id.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Bind to a session id: persist it, then reload the transcript.
    pub async fn bind(&self, session_id: &str) {
        self.store.set(KEY_SESSION_ID, session_id);
        {
            let mut state = self.state();
            state.session_id = Some(session_id.to_string());
            state.error = None;
        }
        self.load_history().await;
    }

    /// Refetch the transcript wholesale.
    ///
    /// On failure only the error indicator is set; the transcript is left
    /// untouched. A fetch that outlives a session switch is dropped.
    pub async fn load_history(&self) {
        let Some(session_id) = self.session_id() else {
            return;
        };

        match self.api.history(&session_id).await {
            Ok(wire) => {
                let mut state = self.state();
                if state.session_id.as_deref() == Some(session_id.as_str()) {
                    state.messages = wire.into_iter().map(Message::from).collect();
                    state.error = None;
                }
            }
            Err(e) => {
                self.state().error = Some(e.to_string());
            }
        }
    }

    /// Submit a user message.
    ///
    /// The message is appended optimistically before any network traffic.
    /// Persistence strictly precedes the reply request; if either fails, a
    /// system entry lands in the transcript so the failure stays visible in
    /// context.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() || self.user_id.is_empty() {
            return SendOutcome::Rejected;
        }
        let Some(session_id) = self.session_id() else {
            return SendOutcome::Rejected;
        };
        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("send rejected: another send is in flight");
            return SendOutcome::Rejected;
        }

        {
            let mut state = self.state();
            state.error = None;
            state.messages.push(Message::now(Origin::User, text));
        }

        let outcome = match self.round_trip(&session_id, text).await {
            Ok(reply) => {
                if !reply.is_empty() {
                    let mut state = self.state();
                    if state.session_id.as_deref() == Some(session_id.as_str()) {
                        state.messages.push(Message::now(Origin::Assistant, reply));
                    }
                }
                SendOutcome::Delivered
            }
            Err(e) => {
                let message = e.to_string();
                let mut state = self.state();
                if state.session_id.as_deref() == Some(session_id.as_str()) {
                    state
                        .messages
                        .push(Message::now(Origin::System, format!("Erro: {message}")));
                }
                state.error = Some(message);
                SendOutcome::Failed
            }
        };

        self.pending.store(false, Ordering::SeqCst);
        outcome
    }

    async fn round_trip(&self, session_id: &str, text: &str) -> Result<String, ApiError> {
        // The reply is never requested unless persistence succeeded
        self.api
            .post_message(session_id, &self.user_id, text, Origin::User.wire_name())
            .await?;
        self.api.ai_reply(&self.user_id, session_id, text).await
    }

    /// End the current session on the backend.
    ///
    /// On success the session id is cleared from memory and storage and a
    /// system entry is recorded. On failure nothing changes and the error
    /// propagates for the caller to surface.
    pub async fn end_session(&self) -> Result<(), ApiError> {
        let Some(session_id) = self.session_id() else {
            return Ok(());
        };

        self.api.end_session(&session_id).await?;

        self.store.remove(KEY_SESSION_ID);
        let mut state = self.state();
        state.session_id = None;
        state
            .messages
            .push(Message::now(Origin::System, "Sessão encerrada."));
        Ok(())
    }

    /// Start a fresh session, unconditionally creating one (the user asked
    /// for a fresh start, so no reuse here, unlike resolution).
    pub async fn new_session(&self) -> Result<String, ApiError> {
        let session_id = self
            .api
            .create_session(&self.user_id, NEW_SESSION_NOTE)
            .await?;

        self.store.set(KEY_SESSION_ID, &session_id);
        {
            let mut state = self.state();
            state.session_id = Some(session_id.clone());
            state.messages.clear();
            state.error = None;
        }
        self.load_history().await;
        Ok(session_id)
    }
}
