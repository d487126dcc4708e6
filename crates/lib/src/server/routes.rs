//! HTTP handlers for the mock backend. Error bodies are `{ "error": ... }`, token problems
//! are `{ "msg": ... }`.

use super::store::{Store, StoreError, UserId};
use crate::api::{ChatId, Message};
use crate::chats::DEFAULT_CHAT_TITLE;
use crate::reply::ReplyRules;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct ServerState {
    store: Arc<Mutex<Store>>,
    rules: Arc<ReplyRules>,
}

impl ServerState {
    pub(crate) fn new(rules: ReplyRules) -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            rules: Arc::new(rules),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub(crate) fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/health", get(health))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/user/me", get(current_user))
        .route("/api/chats", get(list_chats).post(create_chat))
        .route("/api/chats/:id", put(rename_chat).delete(delete_chat))
        .route("/api/chats/:id/messages", get(chat_messages))
        .route("/api/chat", post(chat))
        .with_state(state)
}

#[derive(Debug)]
pub(crate) struct Failure {
    status: StatusCode,
    body: Value,
}

impl Failure {
    fn error(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
        }
    }

    fn token(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: json!({ "msg": message }),
        }
    }

    fn auth_required() -> Self {
        Self::token(StatusCode::UNAUTHORIZED, "Authorization required")
    }
}

impl From<StoreError> for Failure {
    fn from(e: StoreError) -> Self {
        let status = match e {
            StoreError::MissingFields | StoreError::TitleRequired => StatusCode::BAD_REQUEST,
            StoreError::EmailTaken | StoreError::UsernameTaken => StatusCode::CONFLICT,
            StoreError::BadCredentials => StatusCode::UNAUTHORIZED,
            StoreError::UnknownToken => {
                return Self::token(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string())
            }
            StoreError::UserNotFound | StoreError::ChatNotFound => StatusCode::NOT_FOUND,
            StoreError::NotOwner => StatusCode::FORBIDDEN,
        };
        Self::error(status, &e.to_string())
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type Reply = Result<(StatusCode, Json<Value>), Failure>;

fn ok(body: Value) -> Reply {
    Ok((StatusCode::OK, Json(body)))
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn require_user(state: &ServerState, headers: &HeaderMap) -> Result<UserId, Failure> {
    let token = bearer(headers).ok_or_else(Failure::auth_required)?;
    Ok(state.lock().user_for_token(token)?)
}

/// Anonymous when no bearer is sent; a bearer that does not verify is still rejected.
fn optional_user(state: &ServerState, headers: &HeaderMap) -> Result<Option<UserId>, Failure> {
    match bearer(headers) {
        Some(token) => Ok(Some(state.lock().user_for_token(token)?)),
        None => Ok(None),
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "Zara mock backend is running!",
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Credentials {
    username: String,
    email: String,
    password: String,
}

async fn register(State(state): State<ServerState>, Json(body): Json<Credentials>) -> Reply {
    let (token, user) = state
        .lock()
        .register(body.username.trim(), body.email.trim(), &body.password)?;
    log::info!("registered {}", user.email);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "token": token,
            "user": user,
        })),
    ))
}

async fn login(State(state): State<ServerState>, Json(body): Json<Credentials>) -> Reply {
    let (token, user) = state.lock().login(body.email.trim(), &body.password)?;
    log::debug!("login {}", user.email);
    ok(json!({
        "message": "Login successful",
        "token": token,
        "user": user,
    }))
}

async fn current_user(State(state): State<ServerState>, headers: HeaderMap) -> Reply {
    let user = require_user(&state, &headers)?;
    let profile = state.lock().profile(user)?;
    ok(json!(profile))
}

async fn list_chats(State(state): State<ServerState>, headers: HeaderMap) -> Reply {
    let user = require_user(&state, &headers)?;
    ok(json!(state.lock().chats_for(user)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TitleBody {
    title: Option<String>,
}

async fn create_chat(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<TitleBody>,
) -> Reply {
    let user = require_user(&state, &headers)?;
    let title = body.title.unwrap_or_else(|| DEFAULT_CHAT_TITLE.to_string());
    let chat = state.lock().create_chat(user, &title);
    log::debug!("created chat {} for user {}", chat.id, user);
    Ok((StatusCode::CREATED, Json(json!(chat))))
}

async fn rename_chat(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(id): Path<ChatId>,
    Json(body): Json<TitleBody>,
) -> Reply {
    let user = require_user(&state, &headers)?;
    let title = body.title.unwrap_or_default();
    let chat = state.lock().rename_chat(user, id, title.trim())?;
    ok(json!(chat))
}

async fn delete_chat(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(id): Path<ChatId>,
) -> Reply {
    let user = require_user(&state, &headers)?;
    state.lock().delete_chat(user, id)?;
    ok(json!({ "message": "Chat deleted successfully" }))
}

async fn chat_messages(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(id): Path<ChatId>,
) -> Reply {
    let user = require_user(&state, &headers)?;
    ok(json!(state.lock().messages(user, id)?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileUpload {
    name: String,
    #[serde(rename = "type")]
    typ: String,
    base64: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ChatBody {
    messages: Vec<Message>,
    chat_id: Option<ChatId>,
    file_data: Option<FileUpload>,
}

async fn chat(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Reply {
    let user = optional_user(&state, &headers)?;
    let Some(last) = body.messages.last() else {
        return Err(Failure::error(StatusCode::BAD_REQUEST, "No messages provided"));
    };
    if let Some(file) = &body.file_data {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(file.base64.as_bytes())
            .map_err(|_| Failure::error(StatusCode::BAD_REQUEST, "Invalid file data"))?;
        log::debug!("chat upload {} ({}, {} bytes)", file.name, file.typ, bytes.len());
    }

    let reply = state.rules.reply(&last.content);
    if let (Some(user), Some(chat_id)) = (user, body.chat_id) {
        if !state
            .lock()
            .record_exchange(user, chat_id, &last.content, &reply)
        {
            log::debug!("chat {} not persisted for user {}", chat_id, user);
        }
    }
    ok(json!({ "role": "assistant", "content": reply }))
}
