//! HTTP client for the mentoring backend
//!
//! One thin method per endpoint. A response counts as success only when the
//! status is 2xx AND the body parses as JSON AND the expected field is
//! present; anything else surfaces as an [`ApiError`], never as partial
//! success.

pub mod types;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use types::{
    AiRequest, CreateSessionRequest, EndSessionRequest, HistoryEnvelope, Identity, LoginRequest,
    PeopleRequest, Person, PostMessageRequest, RegistrationForm, SessionFeedback,
    SessionListEnvelope, SessionSummary, WireMessage,
};

/// How much of a non-JSON body to keep when reporting it
const BODY_PREVIEW_LEN: usize = 160;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("falha de rede: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success status; carries the backend's own message when the body
    /// had one
    #[error("{0}")]
    Backend(String),

    #[error("resposta da API não é JSON: {0}")]
    InvalidJson(String),

    #[error("resposta sem {0}")]
    MissingField(&'static str),
}

/// Client for all backend endpoints, cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client against the given base URL (trailing slashes are
    /// stripped so path joining stays predictable).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Authenticate and extract the identity from whichever response shape
    /// the backend used.
    pub async fn login(&self, email: &str, senha: &str) -> Result<Identity, ApiError> {
        let body = self
            .post_json("/login", &LoginRequest { email, senha })
            .await?;
        types::extract_identity(&body).ok_or(ApiError::MissingField("user_id"))
    }

    /// Register a new account. Status-only response.
    pub async fn register(&self, form: &RegistrationForm) -> Result<(), ApiError> {
        self.post_json("/cadastro", form).await.map(|_| ())
    }

    /// Register significant people for a user. Status-only response.
    pub async fn register_people(&self, user_id: &str, people: &[Person]) -> Result<(), ApiError> {
        self.post_json(
            "/pessoas",
            &PeopleRequest {
                user_id,
                pessoas: people,
            },
        )
        .await
        .map(|_| ())
    }

    /// Create a new conversation session carrying an opening note.
    pub async fn create_session(
        &self,
        user_id: &str,
        opening_note: &str,
    ) -> Result<String, ApiError> {
        let body = self
            .post_json(
                "/nova-sessao",
                &CreateSessionRequest {
                    user_id,
                    mensagem: opening_note,
                },
            )
            .await?;
        types::extract_session_id(&body).ok_or(ApiError::MissingField("sessao.id"))
    }

    /// Look up an already-open session for this user.
    pub async fn find_open_session(&self, user_id: &str) -> Result<String, ApiError> {
        let path = format!("/sessao-aberta/{}", urlencoding::encode(user_id));
        let body = self.get_json(&path).await?;
        types::extract_session_id(&body).ok_or(ApiError::MissingField("sessao.id"))
    }

    /// List the user's sessions, newest first as returned by the backend.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>, ApiError> {
        let path = format!("/sessoes/{}", urlencoding::encode(user_id));
        let body = self.get_json(&path).await?;
        let envelope: SessionListEnvelope =
            serde_json::from_value(body).map_err(|_| ApiError::MissingField("sessoes"))?;
        Ok(envelope.sessoes)
    }

    /// Fetch the full message history of a session.
    pub async fn history(&self, session_id: &str) -> Result<Vec<WireMessage>, ApiError> {
        let path = format!("/historico/{}", urlencoding::encode(session_id));
        let body = self.get_json(&path).await?;
        let envelope: HistoryEnvelope =
            serde_json::from_value(body).map_err(|_| ApiError::MissingField("mensagens"))?;
        Ok(envelope.mensagens)
    }

    /// Persist one message into the session history. Status-only response.
    pub async fn post_message(
        &self,
        session_id: &str,
        user_id: &str,
        text: &str,
        origin: &str,
    ) -> Result<(), ApiError> {
        self.post_json(
            "/mensagem",
            &PostMessageRequest {
                sessao_id: session_id,
                user_id,
                texto_mensagem: text,
                origem: origin,
            },
        )
        .await
        .map(|_| ())
    }

    /// Ask the assistant for a reply to the user's message.
    ///
    /// Returns the trimmed reply text; an empty reply is a valid outcome the
    /// caller may skip.
    pub async fn ai_reply(
        &self,
        user_id: &str,
        session_id: &str,
        text: &str,
    ) -> Result<String, ApiError> {
        let body = self
            .post_json(
                "/ia",
                &AiRequest {
                    user_id,
                    sessao_id: session_id,
                    mensagem: text,
                },
            )
            .await?;
        let reply = body
            .get("resposta")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        Ok(reply.trim().to_string())
    }

    /// Close a session on the backend. Status-only response.
    pub async fn end_session(&self, session_id: &str) -> Result<(), ApiError> {
        self.post_json(
            "/finalizar-sessao",
            &EndSessionRequest {
                sessao_id: session_id,
            },
        )
        .await
        .map(|_| ())
    }

    /// Submit session feedback. Status-only response.
    pub async fn submit_feedback(&self, feedback: &SessionFeedback) -> Result<(), ApiError> {
        self.post_json("/feedback/sessao", feedback).await.map(|_| ())
    }

    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self.http.get(&url).send().await?;
        Self::read_body(response).await
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Value, ApiError> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self.http.post(&url).json(body).send().await?;
        Self::read_body(response).await
    }

    /// Normalize a response into JSON-or-error.
    ///
    /// Error bodies are read tolerantly: `erro`, then `error`, then the raw
    /// text truncated, then the bare status code.
    async fn read_body(response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Backend(extract_error_message(&text, status)));
        }

        serde_json::from_str(&text).map_err(|_| ApiError::InvalidJson(preview(&text)))
    }
}

fn extract_error_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["erro", "error"] {
            if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                if !message.trim().is_empty() {
                    return message.to_string();
                }
            }
        }
    }
    let raw = preview(body);
    if raw.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        raw
    }
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    trimmed
        .char_indices()
        .nth(BODY_PREVIEW_LEN)
        .map(|(idx, _)| trimmed[..idx].to_string())
        .unwrap_or_else(|| trimmed.to_string())
}
