//! In-memory accounts, tokens, chats and messages for the mock backend.

use crate::api::{ChatId, ChatSession, Message, User};
use crate::chats::DEFAULT_CHAT_TITLE;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

pub(crate) type UserId = i64;

/// Characters of the first user message that replace a default chat title.
const TITLE_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Invalid email or password")]
    BadCredentials,
    #[error("Invalid token")]
    UnknownToken,
    #[error("User not found")]
    UserNotFound,
    #[error("Chat not found")]
    ChatNotFound,
    #[error("Unauthorized")]
    NotOwner,
    #[error("Title is required")]
    TitleRequired,
}

struct Account {
    id: UserId,
    username: String,
    email: String,
    password_digest: String,
}

impl Account {
    fn profile(&self) -> User {
        User {
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

struct ChatRecord {
    id: ChatId,
    owner: UserId,
    title: String,
    created_at: DateTime<Utc>,
    messages: Vec<Message>,
}

impl ChatRecord {
    fn session(&self) -> ChatSession {
        ChatSession {
            id: self.id,
            title: self.title.clone(),
            created_at: self.created_at,
        }
    }
}

fn digest(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

#[derive(Default)]
pub(crate) struct Store {
    accounts: Vec<Account>,
    tokens: HashMap<String, UserId>,
    chats: Vec<ChatRecord>,
    next_user: UserId,
    next_chat: ChatId,
}

impl Store {
    fn issue_token(&mut self, user: UserId) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        self.tokens.insert(token.clone(), user);
        token
    }

    pub(crate) fn register(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(String, User), StoreError> {
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(StoreError::MissingFields);
        }
        if self.accounts.iter().any(|a| a.email == email) {
            return Err(StoreError::EmailTaken);
        }
        if self.accounts.iter().any(|a| a.username == username) {
            return Err(StoreError::UsernameTaken);
        }
        self.next_user += 1;
        let account = Account {
            id: self.next_user,
            username: username.to_string(),
            email: email.to_string(),
            password_digest: digest(password),
        };
        let user = account.profile();
        let id = account.id;
        self.accounts.push(account);
        Ok((self.issue_token(id), user))
    }

    pub(crate) fn login(
        &mut self,
        email: &str,
        password: &str,
    ) -> Result<(String, User), StoreError> {
        let wanted = digest(password);
        let (id, user) = self
            .accounts
            .iter()
            .find(|a| a.email == email && a.password_digest == wanted)
            .map(|a| (a.id, a.profile()))
            .ok_or(StoreError::BadCredentials)?;
        Ok((self.issue_token(id), user))
    }

    pub(crate) fn user_for_token(&self, token: &str) -> Result<UserId, StoreError> {
        self.tokens
            .get(token)
            .copied()
            .ok_or(StoreError::UnknownToken)
    }

    pub(crate) fn profile(&self, user: UserId) -> Result<User, StoreError> {
        self.accounts
            .iter()
            .find(|a| a.id == user)
            .map(Account::profile)
            .ok_or(StoreError::UserNotFound)
    }

    /// The user's chats, newest first.
    pub(crate) fn chats_for(&self, user: UserId) -> Vec<ChatSession> {
        let mut chats: Vec<&ChatRecord> = self.chats.iter().filter(|c| c.owner == user).collect();
        chats.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        chats.into_iter().map(ChatRecord::session).collect()
    }

    pub(crate) fn create_chat(&mut self, user: UserId, title: &str) -> ChatSession {
        self.next_chat += 1;
        let record = ChatRecord {
            id: self.next_chat,
            owner: user,
            title: title.to_string(),
            created_at: Utc::now(),
            messages: Vec::new(),
        };
        let session = record.session();
        self.chats.push(record);
        session
    }

    fn owned_mut(&mut self, user: UserId, chat_id: ChatId) -> Result<&mut ChatRecord, StoreError> {
        let chat = self
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or(StoreError::ChatNotFound)?;
        if chat.owner != user {
            return Err(StoreError::NotOwner);
        }
        Ok(chat)
    }

    pub(crate) fn messages(
        &mut self,
        user: UserId,
        chat_id: ChatId,
    ) -> Result<Vec<Message>, StoreError> {
        Ok(self.owned_mut(user, chat_id)?.messages.clone())
    }

    pub(crate) fn rename_chat(
        &mut self,
        user: UserId,
        chat_id: ChatId,
        title: &str,
    ) -> Result<ChatSession, StoreError> {
        let chat = self.owned_mut(user, chat_id)?;
        if title.is_empty() {
            return Err(StoreError::TitleRequired);
        }
        chat.title = title.to_string();
        Ok(chat.session())
    }

    pub(crate) fn delete_chat(&mut self, user: UserId, chat_id: ChatId) -> Result<(), StoreError> {
        self.owned_mut(user, chat_id)?;
        self.chats.retain(|c| c.id != chat_id);
        Ok(())
    }

    /// Persist one user/assistant exchange into an owned chat. A default title becomes the
    /// start of the user message. Returns false when the chat is missing or not owned.
    pub(crate) fn record_exchange(
        &mut self,
        user: UserId,
        chat_id: ChatId,
        text: &str,
        reply: &str,
    ) -> bool {
        let Ok(chat) = self.owned_mut(user, chat_id) else {
            return false;
        };
        chat.messages.push(Message::user(text, None));
        chat.messages.push(Message::assistant(reply));
        if chat.title == DEFAULT_CHAT_TITLE {
            chat.title = text.chars().take(TITLE_CHARS).collect();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rejects_duplicates_and_blanks() {
        let mut store = Store::default();
        assert_eq!(
            store.register("", "a@b.c", "pw").unwrap_err(),
            StoreError::MissingFields
        );
        store.register("Ada", "a@b.c", "pw").expect("register");
        assert_eq!(
            store.register("Other", "a@b.c", "pw").unwrap_err(),
            StoreError::EmailTaken
        );
        assert_eq!(
            store.register("Ada", "x@b.c", "pw").unwrap_err(),
            StoreError::UsernameTaken
        );
    }

    #[test]
    fn login_checks_digest_and_issues_fresh_token() {
        let mut store = Store::default();
        let (first, _) = store.register("Ada", "a@b.c", "pw").expect("register");
        assert_eq!(
            store.login("a@b.c", "nope").unwrap_err(),
            StoreError::BadCredentials
        );
        let (second, user) = store.login("a@b.c", "pw").expect("login");
        assert_ne!(first, second);
        assert_eq!(user.username, "Ada");
        assert_eq!(store.user_for_token(&first), store.user_for_token(&second));
        assert_eq!(store.user_for_token("junk"), Err(StoreError::UnknownToken));
    }

    #[test]
    fn password_digest_is_sha256_hex() {
        assert_eq!(
            digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn chats_are_private_and_newest_first() {
        let mut store = Store::default();
        store.create_chat(1, "first");
        let second = store.create_chat(1, "second");
        let foreign = store.create_chat(2, "theirs");

        let ids: Vec<ChatId> = store.chats_for(1).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second.id, 1]);
        assert_eq!(store.messages(1, foreign.id), Err(StoreError::NotOwner));
        assert_eq!(store.delete_chat(1, 99), Err(StoreError::ChatNotFound));
        assert_eq!(
            store.rename_chat(1, second.id, ""),
            Err(StoreError::TitleRequired)
        );
    }

    #[test]
    fn exchange_names_default_chat() {
        let mut store = Store::default();
        let chat = store.create_chat(1, DEFAULT_CHAT_TITLE);
        let question = "Plan a week-long trip to Portugal in May";
        assert!(store.record_exchange(1, chat.id, question, "ok"));
        assert_eq!(store.chats_for(1)[0].title, "Plan a week-long trip to Portu");
        assert_eq!(store.messages(1, chat.id).map(|m| m.len()), Ok(2));

        assert!(store.record_exchange(1, chat.id, "second question", "ok"));
        assert_eq!(store.chats_for(1)[0].title, "Plan a week-long trip to Portu");
        assert!(!store.record_exchange(2, chat.id, "intruder", "no"));
    }
}
