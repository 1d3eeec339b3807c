//! Session resolution
//!
//! Produces exactly one valid session id for a user, preferring reuse over
//! creation so page reloads and restarts do not accumulate orphaned sessions
//! on the backend:
//! 1. Clear the persisted session slot (it may belong to a previous identity
//!    or a crashed attempt).
//! 2. Ask the backend for an already-open session; any failure here counts
//!    as "none" and falls through.
//! 3. Create a new session with an opening note.
//! 4. On failure, wait one fixed backoff and retry creation exactly once.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::storage::{Storage, KEY_SESSION_ID};

/// Opening note recorded when resolution has to create a session
pub const OPENING_NOTE: &str = "Início da sessão";

/// Grace period before the single creation retry
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(600);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("user_id ausente para iniciar sessão")]
    MissingUser,

    /// Both creation attempts failed; carries the most specific message the
    /// backend produced
    #[error("{0}")]
    Resolution(String),
}

/// Resolves the single current session id for a user.
pub struct SessionResolver {
    api: ApiClient,
    store: Arc<dyn Storage>,
    retry_backoff: Duration,
}

impl SessionResolver {
    pub fn new(api: ApiClient, store: Arc<dyn Storage>) -> Self {
        Self {
            api,
            store,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Override the retry backoff (tests use a short one).
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Resolve a session id for `user_id`, reuse-first.
    ///
    /// The resolved id is mirrored into persisted storage before returning,
    /// so a reload reconstructs the same session without another round trip.
    pub async fn resolve(&self, user_id: &str) -> Result<String, SessionError> {
        if user_id.trim().is_empty() {
            return Err(SessionError::MissingUser);
        }

        self.store.remove(KEY_SESSION_ID);

        match self.api.find_open_session(user_id).await {
            Ok(session_id) => {
                debug!("reusing open session {}", session_id);
                self.store.set(KEY_SESSION_ID, &session_id);
                return Ok(session_id);
            }
            Err(e) => {
                // Existence-check failures are not fatal, fall through to create
                debug!("no reusable session ({}), creating one", e);
            }
        }

        let first_failure = match self.api.create_session(user_id, OPENING_NOTE).await {
            Ok(session_id) => {
                self.store.set(KEY_SESSION_ID, &session_id);
                return Ok(session_id);
            }
            Err(e) => e,
        };

        warn!(
            "session creation failed ({}), retrying in {:?}",
            first_failure, self.retry_backoff
        );
        tokio::time::sleep(self.retry_backoff).await;

        match self.api.create_session(user_id, OPENING_NOTE).await {
            Ok(session_id) => {
                self.store.set(KEY_SESSION_ID, &session_id);
                Ok(session_id)
            }
            Err(retry_failure) => Err(SessionError::Resolution(retry_failure.to_string())),
        }
    }
}
