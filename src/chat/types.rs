//! Chat domain types

use serde::{Deserialize, Serialize};

use crate::api::types::WireMessage;

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    User,
    Assistant,
    System,
}

impl Origin {
    /// Name used on the wire (`origem` field).
    pub fn wire_name(self) -> &'static str {
        match self {
            Origin::User => "usuario",
            Origin::Assistant => "bot",
            Origin::System => "sistema",
        }
    }

    /// Unknown origins are treated as system notices.
    pub fn from_wire(name: &str) -> Self {
        match name {
            "usuario" => Origin::User,
            "bot" => Origin::Assistant,
            _ => Origin::System,
        }
    }
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub origin: Origin,
    pub text: String,
    /// ISO-8601; empty when the backend omitted it
    pub timestamp: String,
}

impl Message {
    /// A message stamped with the current time.
    pub fn now(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        Self {
            origin: Origin::from_wire(&wire.origem),
            text: wire.texto_mensagem,
            timestamp: wire.data_mensagem.unwrap_or_default(),
        }
    }
}

/// Observable controller state, cloned out for rendering.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub session_id: Option<String>,
    pub messages: Vec<Message>,
    pub error: Option<String>,
}

/// What happened to a submit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Message persisted; reply (if any) appended
    Delivered,
    /// Ignored: empty text, no bound session, or a send already in flight
    Rejected,
    /// Round trip failed; a system entry was appended to the transcript
    Failed,
}
