//! Wire types for the mentoring backend
//!
//! The backend's JSON contract is not fully stable: ids arrive as strings or
//! numbers, login responses exist in several shapes, and error bodies use
//! either `erro` or `error`. The tolerant readers in this module are ordered
//! first-match-wins rule lists over the known variants.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Logged-in user, as established by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
}

/// Login request body
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub senha: &'a str,
}

/// Registration form for `POST /cadastro`
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationForm {
    pub nome: String,
    pub email: String,
    pub telefone: String,
    pub telefone_emergencia: String,
    pub senha: String,
}

/// A significant person in the user's life, for `POST /pessoas`
#[derive(Debug, Clone, Serialize)]
pub struct Person {
    pub nome: String,
    pub apelido: String,
    pub relacao: String,
    pub sentimento: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PeopleRequest<'a> {
    pub user_id: &'a str,
    pub pessoas: &'a [Person],
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateSessionRequest<'a> {
    pub user_id: &'a str,
    pub mensagem: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct PostMessageRequest<'a> {
    pub sessao_id: &'a str,
    pub user_id: &'a str,
    pub texto_mensagem: &'a str,
    pub origem: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct AiRequest<'a> {
    pub user_id: &'a str,
    pub sessao_id: &'a str,
    pub mensagem: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct EndSessionRequest<'a> {
    pub sessao_id: &'a str,
}

/// Session feedback payload for `POST /feedback/sessao`
#[derive(Debug, Clone, Serialize)]
pub struct SessionFeedback {
    pub user_id: String,
    pub sessao_id: String,
    /// Deployment label, lowercase ("beta" or "prod")
    pub ambiente: String,
    /// Tone and rapport score, 1..=10
    pub nota_tom_rapport: i32,
    /// Context memory score, 1..=10
    pub nota_memoria: i32,
    /// Net promoter score, 0..=10
    pub nps: i32,
    pub atingiu_objetivo: Option<bool>,
    /// Free-text suggestion, capped at 1000 chars by the caller
    pub sugestao: Option<String>,
    pub modelo_ai: Option<String>,
    pub versao_app: Option<String>,
    pub motivo_gatilho: String,
}

/// One entry of `GET /sessoes/{user_id}`
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub criado_em: Option<String>,
    #[serde(default)]
    pub resumo: Option<String>,
    /// Array of strings or a single comma-joined string, depending on the
    /// backend version
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub status: Option<String>,
}

impl SessionSummary {
    /// Tags flattened to a display string, empty when absent.
    pub fn tags_label(&self) -> String {
        match &self.tags {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionListEnvelope {
    #[serde(default)]
    pub sessoes: Vec<SessionSummary>,
}

/// One entry of `GET /historico/{session_id}`
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub origem: String,
    #[serde(default)]
    pub texto_mensagem: String,
    #[serde(default)]
    pub data_mensagem: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryEnvelope {
    #[serde(default)]
    pub mensagens: Vec<WireMessage>,
}

/// Accept `"42"` or `42` for id fields.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_id(&value).ok_or_else(|| serde::de::Error::custom("id is neither string nor number"))
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extract the session id at the known path `sessao.id`.
///
/// Returns `None` for anything other than a non-empty string or a number:
/// a missing id is failure, never partial success.
pub fn extract_session_id(body: &Value) -> Option<String> {
    value_to_id(body.get("sessao")?.get("id")?)
}

/// Extract an identity from a login response.
///
/// The id is taken from the first matching rule:
///   1. `user.id`
///   2. `user_id`
///   3. `id`
/// and the display name from:
///   1. `user.nome`
///   2. `nome`
///   3. `user.name`
///   4. `name`
///   5. the fallback "Usuário"
pub fn extract_identity(body: &Value) -> Option<Identity> {
    let user = body.get("user");

    let user_id = user
        .and_then(|u| u.get("id"))
        .or_else(|| body.get("user_id"))
        .or_else(|| body.get("id"))
        .and_then(value_to_id)?;

    let display_name = user
        .and_then(|u| u.get("nome"))
        .or_else(|| body.get("nome"))
        .or_else(|| user.and_then(|u| u.get("name")))
        .or_else(|| body.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or("Usuário")
        .to_string();

    Some(Identity {
        user_id,
        display_name,
    })
}
