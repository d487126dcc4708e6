//! reqwest implementation of the backend gateway.

use super::{ApiError, AuthSession, Backend, ChatId, ChatSession, Message, Role, User};
use crate::config::{self, Config};
use crate::session::SessionStore;
use crate::upload::PendingUpload;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Client for the Zara REST API. Paths are joined onto `base_url` (which includes `/api`).
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    session: Arc<SessionStore>,
    client: reqwest::Client,
}

/// Error body shape used by the server: `{ "error": ..., "msg": ... }`; some failures carry
/// an assistant-style `{ "content": ... }` instead.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    msg: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    user: User,
}

#[derive(Debug, Deserialize)]
struct ReplyBody {
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct TitleBody<'a> {
    title: &'a str,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendBody<'a> {
    messages: &'a [Message],
    chat_id: Option<ChatId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData<'a>>,
}

/// Wire form of a pending upload: `{ name, type, base64 }`.
#[derive(Serialize)]
struct FileData<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    typ: &'a str,
    base64: &'a str,
}

impl<'a> From<&'a PendingUpload> for FileData<'a> {
    fn from(u: &'a PendingUpload) -> Self {
        Self {
            name: &u.filename,
            typ: &u.mime_type,
            base64: &u.encoded_bytes,
        }
    }
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, session: Arc<SessionStore>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("http client with timeout unavailable ({}), using defaults", e);
                reqwest::Client::new()
            });
        Self {
            base_url,
            session,
            client,
        }
    }

    /// Build from config: base URL from ZARA_API_URL or `api.baseUrl`, timeout from
    /// `api.requestTimeoutSecs`.
    pub fn from_config(config: &Config, session: Arc<SessionStore>) -> Self {
        Self::new(
            config::resolve_api_base_url(config),
            session,
            config.api.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

async fn fetch<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
    let res = check_status(builder.send().await?).await?;
    Ok(res.json().await?)
}

async fn execute(builder: RequestBuilder) -> Result<(), ApiError> {
    check_status(builder.send().await?).await?;
    Ok(())
}

/// Turn a non-success response into the matching failure kind, keeping the server's message.
async fn check_status(res: Response) -> Result<Response, ApiError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body
        .error
        .or(body.msg)
        .or(body.content)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    log::debug!("api {} failed: {}", status, message);
    Err(ApiError::from_status(status.as_u16(), message))
}

#[async_trait]
impl Backend for HttpBackend {
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        let body = LoginBody { email, password };
        let data: AuthResponse = fetch(self.request(Method::POST, "/login").json(&body)).await?;
        Ok(AuthSession {
            token: data.token,
            user: data.user,
        })
    }

    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ApiError> {
        let body = RegisterBody {
            username,
            email,
            password,
        };
        let data: AuthResponse = fetch(self.request(Method::POST, "/register").json(&body)).await?;
        Ok(AuthSession {
            token: data.token,
            user: data.user,
        })
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        fetch(self.request(Method::GET, "/user/me")).await
    }

    async fn list_chats(&self) -> Result<Vec<ChatSession>, ApiError> {
        fetch(self.request(Method::GET, "/chats")).await
    }

    async fn messages(&self, chat_id: ChatId) -> Result<Vec<Message>, ApiError> {
        let path = format!("/chats/{}/messages", chat_id);
        fetch(self.request(Method::GET, &path)).await
    }

    async fn create_chat(&self, title: &str) -> Result<ChatSession, ApiError> {
        fetch(self.request(Method::POST, "/chats").json(&TitleBody { title })).await
    }

    async fn rename_chat(&self, chat_id: ChatId, title: &str) -> Result<(), ApiError> {
        let path = format!("/chats/{}", chat_id);
        execute(self.request(Method::PUT, &path).json(&TitleBody { title })).await
    }

    async fn delete_chat(&self, chat_id: ChatId) -> Result<(), ApiError> {
        let path = format!("/chats/{}", chat_id);
        execute(self.request(Method::DELETE, &path)).await
    }

    async fn send_message(
        &self,
        history: &[Message],
        chat_id: Option<ChatId>,
        upload: Option<&PendingUpload>,
    ) -> Result<Message, ApiError> {
        let body = SendBody {
            messages: history,
            chat_id,
            file_data: upload.map(FileData::from),
        };
        let reply: ReplyBody = fetch(self.request(Method::POST, "/chat").json(&body)).await?;
        match (reply.content, reply.error) {
            (Some(content), _) => {
                if reply.role.is_some_and(|r| r != Role::Assistant) {
                    log::debug!("reply carried a non-assistant role; treating it as assistant");
                }
                Ok(Message::assistant(content))
            }
            (None, error) => Err(ApiError::Server {
                status: 200,
                message: error.unwrap_or_else(|| "empty reply".to_string()),
            }),
        }
    }
}
