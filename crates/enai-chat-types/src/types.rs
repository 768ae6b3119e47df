//! Core conversation and account types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The kind of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// A user-authored prompt.
    Prompt,
    /// Assistant-authored streamed text.
    Text,
    /// Assistant-authored structured applet content.
    Applet,
}

/// The content payload of a message. The shape varies by message kind, so the
/// union is untagged and matches on field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Rich applet content rendered in a sandboxed sub-document.
    Applet {
        /// Location of the applet bundle.
        #[serde(rename = "resourceUrl")]
        resource_url: String,
        /// Opaque applet state handed to the sub-document.
        data: Value,
    },
    /// Plain text, used by both prompts and streamed responses.
    Text {
        /// The text body.
        text: String,
    },
}

impl MessageContent {
    /// The text body, when this is text content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text { text } => Some(text),
            MessageContent::Applet { .. } => None,
        }
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Opaque identifier, unique within a conversation.
    pub id: String,
    /// True while content is still pending or being streamed in.
    #[serde(rename = "isLoading")]
    pub is_loading: bool,
    /// The kind of turn.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// The content payload.
    pub content: MessageContent,
}

impl Message {
    /// Generates a fresh client-side message id.
    pub fn next_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// A settled user prompt.
    pub fn prompt(text: &str) -> Message {
        Message {
            id: Message::next_id(),
            is_loading: false,
            kind: MessageKind::Prompt,
            content: MessageContent::Text {
                text: text.to_string(),
            },
        }
    }

    /// An empty assistant text message awaiting streamed content.
    pub fn pending_text() -> Message {
        Message {
            id: Message::next_id(),
            is_loading: true,
            kind: MessageKind::Text,
            content: MessageContent::Text {
                text: String::new(),
            },
        }
    }

    /// A settled assistant text message.
    pub fn text(text: &str) -> Message {
        Message {
            id: Message::next_id(),
            is_loading: false,
            kind: MessageKind::Text,
            content: MessageContent::Text {
                text: text.to_string(),
            },
        }
    }

    /// A settled applet message.
    pub fn applet(resource_url: &str, data: Value) -> Message {
        Message {
            id: Message::next_id(),
            is_loading: false,
            kind: MessageKind::Applet,
            content: MessageContent::Applet {
                resource_url: resource_url.to_string(),
                data,
            },
        }
    }
}

/// Role of a message on the backend wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The assistant.
    Assistant,
}

/// A role-tagged message as the backend understands it, used both in the chat
/// request body and in conversation history restored by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeMessage {
    /// Who authored the message.
    pub role: Role,
    /// Flat text rendering of the message content.
    pub content: String,
}

/// A prior conversation turn restored by the host. Older hosts deliver plain
/// text bodies; newer ones may deliver applet payloads.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HistoryMessage {
    /// Who authored the turn.
    pub role: Role,
    /// The restored content.
    pub content: HistoryContent,
}

/// Content of a restored history turn.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum HistoryContent {
    /// An applet payload with its bundle location and state.
    Applet {
        /// Location of the applet bundle.
        applet_url: String,
        /// Opaque applet state.
        content: Value,
    },
    /// A text body wrapped in an object.
    Text {
        /// The text body.
        text: String,
    },
    /// A bare text body.
    Plain(String),
}

/// Descriptor for a selectable backend model, supplied by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiModel {
    /// Backend model identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Short marketing description.
    pub description: String,
    /// Context window budget communicated back to the host.
    pub token_limit: u32,
}

/// Bearer credentials issued by the native host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account the requests are issued for.
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Bearer token attached to backend requests.
    #[serde(rename = "bearerToken")]
    pub bearer_token: String,
}

/// Current authentication state. Credentials exist exactly when the session
/// is active; transitioning away from `Active` drops them structurally.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthSession {
    /// No token has ever been issued.
    #[default]
    Unset,
    /// The last token was rejected by the backend.
    Invalid,
    /// A token the backend has not rejected yet.
    Active(Credentials),
}

impl AuthSession {
    /// The current credentials, when the session is active.
    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            AuthSession::Active(credentials) => Some(credentials),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_serializes_with_wire_field_names() {
        let message = Message {
            id: "abc123".to_string(),
            is_loading: true,
            kind: MessageKind::Text,
            content: MessageContent::Text {
                text: "partial".to_string(),
            },
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "abc123",
                "isLoading": true,
                "type": "TEXT",
                "content": { "text": "partial" }
            })
        );
    }

    #[test]
    fn applet_content_round_trips() {
        let message = Message::applet("https://applets.example/map", json!({"zoom": 4}));
        let encoded = serde_json::to_string(&message).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.content, message.content);
        assert_eq!(decoded.kind, MessageKind::Applet);
    }

    #[test]
    fn history_content_accepts_all_shapes() {
        let text: HistoryContent = serde_json::from_value(json!({"text": "hi"})).unwrap();
        assert_eq!(
            text,
            HistoryContent::Text {
                text: "hi".to_string()
            }
        );

        let plain: HistoryContent = serde_json::from_value(json!("hi")).unwrap();
        assert_eq!(plain, HistoryContent::Plain("hi".to_string()));

        let applet: HistoryContent =
            serde_json::from_value(json!({"applet_url": "https://a", "content": {"k": 1}}))
                .unwrap();
        assert!(matches!(applet, HistoryContent::Applet { .. }));
    }

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_value(Role::User).unwrap(), json!("user"));
        assert_eq!(
            serde_json::to_value(Role::Assistant).unwrap(),
            json!("assistant")
        );
    }

    #[test]
    fn credentials_use_host_field_names() {
        let credentials: Credentials =
            serde_json::from_value(json!({"userId": "u1", "bearerToken": "t1"})).unwrap();
        assert_eq!(credentials.user_id, "u1");
        assert_eq!(credentials.bearer_token, "t1");
    }

    #[test]
    fn auth_session_credentials_only_when_active() {
        assert!(AuthSession::Unset.credentials().is_none());
        assert!(AuthSession::Invalid.credentials().is_none());

        let session = AuthSession::Active(Credentials {
            user_id: "u1".to_string(),
            bearer_token: "t1".to_string(),
        });
        assert_eq!(session.credentials().unwrap().user_id, "u1");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = Message::next_id();
        let b = Message::next_id();
        assert_ne!(a, b);
    }
}
