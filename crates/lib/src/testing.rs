//! In-memory backend for controller tests: scripted failures, call log, and a send gate.

use crate::api::{ApiError, AuthSession, Backend, ChatId, ChatSession, Message, User};
use crate::upload::PendingUpload;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::Notify;

/// Blocks `send_message` until released so a test can observe the in-flight interval.
#[derive(Default)]
pub struct SendGate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub struct FakeBackend {
    pub chats: Mutex<Vec<ChatSession>>,
    pub stored: Mutex<HashMap<ChatId, Vec<Message>>>,
    /// Operation name -> failure returned instead of the normal result.
    pub failures: Mutex<HashMap<&'static str, ApiError>>,
    pub calls: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<(Vec<Message>, Option<ChatId>, Option<PendingUpload>)>>,
    pub gate: Option<SendGate>,
    /// When set, `send_message` never completes.
    pub hang: bool,
    next_id: Mutex<ChatId>,
}

impl FakeBackend {
    pub fn with_chats(chats: Vec<ChatSession>) -> Self {
        let next = chats.iter().map(|c| c.id).max().unwrap_or(0);
        let backend = Self::default();
        *backend.chats.lock().unwrap() = chats;
        *backend.next_id.lock().unwrap() = next;
        backend
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(SendGate::default()),
            ..Self::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn fail(&self, op: &'static str, err: ApiError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    fn enter(&self, op: &'static str) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(op.to_string());
        match self.failures.lock().unwrap().get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

pub fn chat(id: ChatId, title: &str) -> ChatSession {
    ChatSession {
        id,
        title: title.to_string(),
        created_at: Utc
            .with_ymd_and_hms(2025, 1, 1, 12, 0, 0)
            .single()
            .unwrap_or_default(),
    }
}

pub fn signed_in_session() -> AuthSession {
    AuthSession {
        token: "test-token".to_string(),
        user: User {
            username: "Test User".to_string(),
            email: "test@example.com".to_string(),
        },
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn login(&self, email: &str, _password: &str) -> Result<AuthSession, ApiError> {
        self.enter("login")?;
        Ok(AuthSession {
            token: format!("token-for-{}", email),
            user: User {
                username: "User".to_string(),
                email: email.to_string(),
            },
        })
    }

    async fn register(
        &self,
        username: &str,
        email: &str,
        _password: &str,
    ) -> Result<AuthSession, ApiError> {
        self.enter("register")?;
        Ok(AuthSession {
            token: format!("token-for-{}", email),
            user: User {
                username: username.to_string(),
                email: email.to_string(),
            },
        })
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        self.enter("current_user")?;
        Ok(signed_in_session().user)
    }

    async fn list_chats(&self) -> Result<Vec<ChatSession>, ApiError> {
        self.enter("list_chats")?;
        Ok(self.chats.lock().unwrap().clone())
    }

    async fn messages(&self, chat_id: ChatId) -> Result<Vec<Message>, ApiError> {
        self.enter("messages")?;
        Ok(self
            .stored
            .lock()
            .unwrap()
            .get(&chat_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_chat(&self, title: &str) -> Result<ChatSession, ApiError> {
        self.enter("create_chat")?;
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        let created = chat(id, title);
        self.chats.lock().unwrap().insert(0, created.clone());
        Ok(created)
    }

    async fn rename_chat(&self, chat_id: ChatId, title: &str) -> Result<(), ApiError> {
        self.enter("rename_chat")?;
        for c in self.chats.lock().unwrap().iter_mut() {
            if c.id == chat_id {
                c.title = title.to_string();
            }
        }
        Ok(())
    }

    async fn delete_chat(&self, chat_id: ChatId) -> Result<(), ApiError> {
        self.enter("delete_chat")?;
        self.chats.lock().unwrap().retain(|c| c.id != chat_id);
        Ok(())
    }

    async fn send_message(
        &self,
        history: &[Message],
        chat_id: Option<ChatId>,
        upload: Option<&PendingUpload>,
    ) -> Result<Message, ApiError> {
        self.calls.lock().unwrap().push("send_message".to_string());
        self.sent
            .lock()
            .unwrap()
            .push((history.to_vec(), chat_id, upload.cloned()));
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(err) = self.failures.lock().unwrap().get("send_message") {
            return Err(err.clone());
        }
        let last = history.last().map(|m| m.content.as_str()).unwrap_or("");
        Ok(Message::assistant(format!("echo: {}", last)))
    }
}
