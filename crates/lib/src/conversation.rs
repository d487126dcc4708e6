//! Conversation controller: the active chat's message sequence and the send lifecycle.
//!
//! Single-threaded by design: state lives in `Cell`/`RefCell` and every operation runs on the
//! caller's task. Network calls are the only suspension points and no borrow is held across them,
//! so the UI can keep reading state (and have a second send rejected) while a request is pending.

use crate::api::{ApiError, Backend, ChatId, Message};
use crate::scroll::ScrollState;
use crate::session::SessionStore;
use crate::upload::PendingUpload;
use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::time::Duration;

/// Shown when a chat has no messages yet, and after a reset.
pub const GREETING: &str = "Hello! I'm Zara ✨. How can I help you today? 😊";

/// Appended in place of a reply when the send fails for any reason other than auth.
pub const CONNECTION_FALLBACK: &str =
    "I'm having trouble connecting to the server. Please check your connection or AI quota. ⚠️";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Failure of a chat operation after the gateway has been called.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The backend rejected the session; the store has been cleared.
    #[error("session expired; sign in again")]
    ReauthRequired,
    #[error(transparent)]
    Api(ApiError),
}

impl ChatError {
    /// Classify a gateway failure, clearing the session store on auth failures.
    pub(crate) fn settle(session: &SessionStore, err: ApiError) -> Self {
        if err.is_auth_failure() {
            sign_out(session, &err);
            ChatError::ReauthRequired
        } else {
            ChatError::Api(err)
        }
    }
}

fn sign_out(session: &SessionStore, cause: &ApiError) {
    log::warn!("backend rejected session ({}), signing out", cause);
    session.clear();
}

/// Why a send was not started, or ended in re-authentication.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("nothing to send")]
    Empty,
    #[error("a message is already being sent")]
    InFlight,
    #[error("session expired; sign in again")]
    ReauthRequired,
}

/// How an accepted send settled.
#[derive(Debug)]
pub enum SendOutcome {
    /// The assistant reply was appended.
    Replied,
    /// The fallback message was appended; carries the cause.
    Fallback(ApiError),
}

/// Clears the in-flight flag when dropped, whichever way the send settles (including when the
/// send future itself is dropped).
struct InFlightGuard<'a>(&'a Cell<bool>);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct ConversationController {
    backend: Arc<dyn Backend>,
    session: Arc<SessionStore>,
    request_timeout: Duration,
    messages: RefCell<Vec<Message>>,
    active_chat: Cell<Option<ChatId>>,
    in_flight: Cell<bool>,
    pending_upload: RefCell<Option<PendingUpload>>,
    scroll: Cell<ScrollState>,
    scroll_request: Cell<Option<usize>>,
}

impl ConversationController {
    pub fn new(backend: Arc<dyn Backend>, session: Arc<SessionStore>) -> Self {
        Self {
            backend,
            session,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            messages: RefCell::new(vec![Message::assistant(GREETING)]),
            active_chat: Cell::new(None),
            in_flight: Cell::new(false),
            pending_upload: RefCell::new(None),
            scroll: Cell::new(ScrollState::Following),
            scroll_request: Cell::new(None),
        }
    }

    /// Bound every send by `timeout`; an expired send settles as a connectivity failure.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Snapshot of the message sequence (never empty).
    pub fn messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    pub fn message_count(&self) -> usize {
        self.messages.borrow().len()
    }

    pub fn active_chat(&self) -> Option<ChatId> {
        self.active_chat.get()
    }

    pub(crate) fn set_active_chat(&self, id: Option<ChatId>) {
        self.active_chat.set(id);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.get()
    }

    /// Make `id` the active chat and replace the sequence with its history.
    /// On failure the previous messages stay as they were.
    pub async fn load_chat(&self, id: ChatId) -> Result<(), ChatError> {
        self.active_chat.set(Some(id));
        match self.backend.messages(id).await {
            Ok(history) => {
                log::debug!("loaded chat {} ({} messages)", id, history.len());
                self.replace_messages(history);
                Ok(())
            }
            Err(e) => Err(ChatError::settle(&self.session, e)),
        }
    }

    /// Replace the sequence with the single greeting.
    pub fn reset_to_greeting(&self) {
        self.replace_messages(Vec::new());
    }

    fn replace_messages(&self, history: Vec<Message>) {
        let history = if history.is_empty() {
            vec![Message::assistant(GREETING)]
        } else {
            history
        };
        *self.messages.borrow_mut() = history;
        self.messages_changed();
    }

    fn append(&self, message: Message) {
        self.messages.borrow_mut().push(message);
        self.messages_changed();
    }

    fn messages_changed(&self) {
        if self.scroll.get().is_following() {
            self.scroll_request.set(Some(self.message_count() - 1));
        }
    }

    /// Hold `upload` for the next send, replacing any earlier selection.
    pub fn attach(&self, upload: PendingUpload) {
        *self.pending_upload.borrow_mut() = Some(upload);
    }

    /// Drop the pending upload; returns it if there was one.
    pub fn detach(&self) -> Option<PendingUpload> {
        self.pending_upload.borrow_mut().take()
    }

    pub fn pending_upload(&self) -> Option<PendingUpload> {
        self.pending_upload.borrow().clone()
    }

    /// Feed a scroll-position sample (distance from the bottom of the viewport).
    pub fn record_scroll(&self, distance_from_bottom: f64) {
        self.scroll.set(ScrollState::observe(distance_from_bottom));
    }

    pub fn scroll_state(&self) -> ScrollState {
        self.scroll.get()
    }

    /// Index of the message the view should scroll to, if a change requested one since the last
    /// call.
    pub fn take_scroll_request(&self) -> Option<usize> {
        self.scroll_request.take()
    }

    /// Send `text` (with `attachment`, or else the pending upload) to the active chat.
    ///
    /// The user message is appended before the request is issued. The reply, or the connectivity
    /// fallback, is appended when it settles. Auth failures clear the session store and append
    /// nothing.
    pub async fn send_message(
        &self,
        text: &str,
        attachment: Option<PendingUpload>,
    ) -> Result<SendOutcome, SendError> {
        if self.in_flight.get() {
            return Err(SendError::InFlight);
        }
        if text.trim().is_empty() && attachment.is_none() && self.pending_upload.borrow().is_none()
        {
            return Err(SendError::Empty);
        }
        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or(SendError::InFlight)?;

        let upload = attachment.or_else(|| self.pending_upload.borrow_mut().take());
        self.pending_upload.borrow_mut().take();

        self.scroll.set(ScrollState::Following);
        self.append(Message::user(
            text,
            upload.as_ref().map(PendingUpload::attachment),
        ));

        let history = self.messages();
        let chat_id = self.active_chat.get();
        log::debug!(
            "sending message to chat {:?} ({} in history)",
            chat_id,
            history.len()
        );
        let result = tokio::time::timeout(
            self.request_timeout,
            self.backend.send_message(&history, chat_id, upload.as_ref()),
        )
        .await
        .unwrap_or_else(|_| Err(ApiError::timed_out()));

        match result {
            Ok(reply) => {
                self.append(Message::assistant(reply.content));
                Ok(SendOutcome::Replied)
            }
            Err(e) if e.is_auth_failure() => {
                sign_out(&self.session, &e);
                Err(SendError::ReauthRequired)
            }
            Err(e) => {
                log::warn!("send failed: {}", e);
                self.append(Message::assistant(CONNECTION_FALLBACK));
                Ok(SendOutcome::Fallback(e))
            }
        }
    }
}
