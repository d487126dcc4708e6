//! Wire and domain types shared by the gateway, the controllers, and the mock backend.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Server-assigned chat identifier.
pub type ChatId = i64;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// File contents attached to a user message (base64 + mime type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub encoded_bytes: String,
    pub mime_type: String,
}

/// A single message in a conversation. Wire form: `{ role, content, fileContent?, fileType? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireMessage", into = "WireMessage")]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub attachment: Option<Attachment>,
}

impl Message {
    pub fn user(content: impl Into<String>, attachment: Option<Attachment>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachment,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachment: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    role: Role,
    #[serde(default, deserialize_with = "null_as_empty")]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_type: Option<String>,
}

impl From<WireMessage> for Message {
    fn from(w: WireMessage) -> Self {
        let attachment = w.file_content.map(|encoded_bytes| Attachment {
            encoded_bytes,
            mime_type: w
                .file_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        });
        Self {
            role: w.role,
            content: w.content,
            attachment,
        }
    }
}

impl From<Message> for WireMessage {
    fn from(m: Message) -> Self {
        let (file_content, file_type) = match m.attachment {
            Some(a) => (Some(a.encoded_bytes), Some(a.mime_type)),
            None => (None, None),
        };
        Self {
            role: m.role,
            content: m.content,
            file_content,
            file_type,
        }
    }
}

/// A persisted conversation thread. Wire form: `{ id, title, created_at }`; `title` may be null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: ChatId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(
        serialize_with = "serialize_timestamp",
        deserialize_with = "deserialize_timestamp"
    )]
    pub created_at: DateTime<Utc>,
}

/// Signed-in user's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// Bearer token plus the cached profile it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn serialize_timestamp<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339())
}

/// Accepts RFC 3339 or a naive ISO-8601 timestamp (read as UTC).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_timestamp(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s)))
}

pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn message_wire_uses_file_fields() {
        let msg = Message::user(
            "look",
            Some(Attachment {
                encoded_bytes: "aGk=".to_string(),
                mime_type: "text/plain".to_string(),
            }),
        );
        let v = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(v["role"], "user");
        assert_eq!(v["fileContent"], "aGk=");
        assert_eq!(v["fileType"], "text/plain");

        let plain = serde_json::to_value(Message::assistant("hi")).expect("serialize");
        assert!(plain.get("fileContent").is_none());
    }

    #[test]
    fn server_message_with_timestamp_parses() {
        let msg: Message = serde_json::from_str(
            r#"{"role":"assistant","content":"hey","timestamp":"2025-01-02T03:04:05.123456"}"#,
        )
        .expect("parse");
        assert_eq!(msg, Message::assistant("hey"));
    }

    #[test]
    fn chat_session_accepts_naive_timestamp_and_null_title() {
        let chat: ChatSession = serde_json::from_str(
            r#"{"id":7,"title":null,"created_at":"2025-03-04T10:11:12.5"}"#,
        )
        .expect("parse");
        assert_eq!(chat.id, 7);
        assert_eq!(chat.title, "");
        assert_eq!(chat.created_at.year(), 2025);
        assert_eq!(chat.created_at.hour(), 10);
    }

    #[test]
    fn chat_session_accepts_rfc3339() {
        let chat: ChatSession = serde_json::from_str(
            r#"{"id":1,"title":"Trip planning","created_at":"2025-03-04T10:11:12+02:00"}"#,
        )
        .expect("parse");
        assert_eq!(chat.created_at.hour(), 8);
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        assert!(parse_timestamp("yesterday").is_none());
    }
}
