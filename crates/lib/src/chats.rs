//! Chat list controller: the user's chat sessions, search filtering, and create/rename/delete.

use crate::api::{Backend, ChatId, ChatSession};
use crate::conversation::{ChatError, ConversationController, SendOutcome};
use crate::session::SessionStore;
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::sync::Arc;

/// Title given to new chats, and shown for chats without one.
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// Title shown for a session; empty titles display as [`DEFAULT_CHAT_TITLE`].
pub fn display_title(chat: &ChatSession) -> &str {
    if chat.title.is_empty() {
        DEFAULT_CHAT_TITLE
    } else {
        &chat.title
    }
}

/// Lazy iterator over sessions whose display title contains a term (case-insensitive).
/// Cloning restarts from the clone's position without touching the source list.
#[derive(Debug, Clone)]
pub struct ChatFilter<'a> {
    inner: std::slice::Iter<'a, ChatSession>,
    needle: String,
}

impl<'a> ChatFilter<'a> {
    pub fn new(chats: &'a [ChatSession], term: &str) -> Self {
        Self {
            inner: chats.iter(),
            needle: term.to_lowercase(),
        }
    }
}

impl<'a> Iterator for ChatFilter<'a> {
    type Item = &'a ChatSession;

    fn next(&mut self) -> Option<Self::Item> {
        let needle = &self.needle;
        self.inner
            .by_ref()
            .find(|c| display_title(c).to_lowercase().contains(needle.as_str()))
    }
}

/// Borrowed view of the list for one search term. Drop it before mutating the list.
pub struct FilteredChats<'a> {
    chats: Ref<'a, Vec<ChatSession>>,
    term: String,
}

impl FilteredChats<'_> {
    /// Start a fresh pass over the matching sessions.
    pub fn iter(&self) -> ChatFilter<'_> {
        ChatFilter::new(&self.chats, &self.term)
    }
}

pub struct ChatListController {
    backend: Arc<dyn Backend>,
    session: Arc<SessionStore>,
    conversation: Rc<ConversationController>,
    chats: RefCell<Vec<ChatSession>>,
}

impl ChatListController {
    pub fn new(
        backend: Arc<dyn Backend>,
        session: Arc<SessionStore>,
        conversation: Rc<ConversationController>,
    ) -> Self {
        Self {
            backend,
            session,
            conversation,
            chats: RefCell::new(Vec::new()),
        }
    }

    /// Snapshot of the list in display order.
    pub fn chats(&self) -> Vec<ChatSession> {
        self.chats.borrow().clone()
    }

    pub fn get(&self, id: ChatId) -> Option<ChatSession> {
        self.chats.borrow().iter().find(|c| c.id == id).cloned()
    }

    /// Sessions matching `term`; an empty term matches everything in order.
    pub fn filter(&self, term: &str) -> FilteredChats<'_> {
        FilteredChats {
            chats: self.chats.borrow(),
            term: term.to_string(),
        }
    }

    /// Reload the list from the backend; when no chat is active, start a new one.
    pub async fn refresh(&self) -> Result<(), ChatError> {
        self.reload().await?;
        if self.conversation.active_chat().is_none() {
            self.create_new().await?;
        }
        Ok(())
    }

    /// Reload the list from the backend without starting a chat.
    pub async fn reload(&self) -> Result<(), ChatError> {
        let list = self
            .backend
            .list_chats()
            .await
            .map_err(|e| ChatError::settle(&self.session, e))?;
        log::debug!("chat list refreshed ({} chats)", list.len());
        *self.chats.borrow_mut() = list;
        Ok(())
    }

    /// Create a chat titled [`DEFAULT_CHAT_TITLE`], put it first, make it active, and reset the
    /// conversation to the greeting.
    pub async fn create_new(&self) -> Result<ChatSession, ChatError> {
        let created = self
            .backend
            .create_chat(DEFAULT_CHAT_TITLE)
            .await
            .map_err(|e| ChatError::settle(&self.session, e))?;
        log::info!("created chat {}", created.id);
        self.chats.borrow_mut().insert(0, created.clone());
        self.conversation.set_active_chat(Some(created.id));
        self.conversation.reset_to_greeting();
        Ok(created)
    }

    /// Rename a chat in place. Returns `false` without calling the backend when the title is blank.
    pub async fn rename(&self, id: ChatId, new_title: &str) -> Result<bool, ChatError> {
        let title = new_title.trim();
        if title.is_empty() {
            return Ok(false);
        }
        self.backend
            .rename_chat(id, title)
            .await
            .map_err(|e| ChatError::settle(&self.session, e))?;
        if let Some(chat) = self.chats.borrow_mut().iter_mut().find(|c| c.id == id) {
            chat.title = title.to_string();
        }
        Ok(true)
    }

    /// Delete a chat; deleting the active one clears it and resets the conversation.
    pub async fn remove(&self, id: ChatId) -> Result<(), ChatError> {
        self.backend
            .delete_chat(id)
            .await
            .map_err(|e| ChatError::settle(&self.session, e))?;
        self.chats.borrow_mut().retain(|c| c.id != id);
        if self.conversation.active_chat() == Some(id) {
            self.conversation.set_active_chat(None);
            self.conversation.reset_to_greeting();
        }
        log::info!("deleted chat {}", id);
        Ok(())
    }

    /// After a send: while the active chat still has the default title, reload the list so the
    /// title the server derived from the first message shows up. Returns whether it reloaded.
    pub async fn refresh_if_untitled(&self) -> Result<bool, ChatError> {
        let Some(active) = self.conversation.active_chat() else {
            return Ok(false);
        };
        let untitled = self
            .get(active)
            .is_some_and(|c| display_title(&c) == DEFAULT_CHAT_TITLE);
        if !untitled {
            return Ok(false);
        }
        self.reload().await?;
        Ok(true)
    }

    /// Pick up a server-assigned title once a send got a real reply. Fallback replies never
    /// reached the backend, so the list is left alone.
    pub async fn refresh_after_send(&self, outcome: &SendOutcome) -> Result<bool, ChatError> {
        match outcome {
            SendOutcome::Replied => self.refresh_if_untitled().await,
            SendOutcome::Fallback(_) => Ok(false),
        }
    }
}
