//! Backend gateway: typed boundary to the remote REST API.
//!
//! The [`Backend`] trait is the only way controllers reach the server. [`HttpBackend`] is the
//! reqwest implementation; tests drive the controllers with an in-memory fake instead.
//! Every failure is one of four kinds, and callers only distinguish auth failures
//! (401/422: the session is no longer valid) from everything else.

mod http;
mod types;

pub use http::HttpBackend;
pub use types::{Attachment, AuthSession, ChatId, ChatSession, Message, Role, User};


use crate::upload::PendingUpload;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// HTTP 401: missing or expired credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// HTTP 422: the token could not be verified.
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    /// Network unreachable, timed out, or the body could not be decoded.
    #[error("transport error: {0}")]
    Transport(String),
    /// Any other non-success status, with the server's message.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
}

impl ApiError {
    /// True for failures that invalidate the stored session.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::Unprocessable(_))
    }

    /// The server-provided (or transport) message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthorized(m) | ApiError::Unprocessable(m) | ApiError::Transport(m) => m,
            ApiError::Server { message, .. } => message,
        }
    }

    /// Map a non-success status and its extracted message to a failure kind.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => ApiError::Unauthorized(message),
            422 => ApiError::Unprocessable(message),
            _ => ApiError::Server { status, message },
        }
    }

    pub(crate) fn timed_out() -> Self {
        ApiError::Transport("request timed out".to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

/// Operations exposed by the remote backend. Implementations attach the bearer token from the
/// session store to every request when one is present.
#[async_trait]
pub trait Backend: Send + Sync {
    /// POST /login: exchange credentials for a session.
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ApiError>;

    /// POST /register: create an account and sign in.
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ApiError>;

    /// GET /user/me
    async fn current_user(&self) -> Result<User, ApiError>;

    /// GET /chats: newest first, as ordered by the server.
    async fn list_chats(&self) -> Result<Vec<ChatSession>, ApiError>;

    /// GET /chats/{id}/messages
    async fn messages(&self, chat_id: ChatId) -> Result<Vec<Message>, ApiError>;

    /// POST /chats
    async fn create_chat(&self, title: &str) -> Result<ChatSession, ApiError>;

    /// PUT /chats/{id}
    async fn rename_chat(&self, chat_id: ChatId, title: &str) -> Result<(), ApiError>;

    /// DELETE /chats/{id}
    async fn delete_chat(&self, chat_id: ChatId) -> Result<(), ApiError>;

    /// POST /chat: full history (ending with the new user message), active chat, optional file.
    /// Returns the assistant reply.
    async fn send_message(
        &self,
        history: &[Message],
        chat_id: Option<ChatId>,
        upload: Option<&PendingUpload>,
    ) -> Result<Message, ApiError>;
}
