//! Sign-in flow: login/register form validation, startup session check, logout.

use crate::api::{ApiError, AuthSession, Backend, User};
use crate::session::SessionStore;
use std::sync::Arc;

/// Server message for a duplicate registration; the UI switches to login mode on it.
const EMAIL_TAKEN: &str = "Email already registered";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Client-side check failed; nothing was sent.
    #[error("{0}")]
    Validation(String),
    /// Registration hit an existing account; switch the form to login.
    #[error("Account already exists. Switched to Login.")]
    AlreadyRegistered,
    /// No usable session; the user must sign in.
    #[error("sign in required")]
    ReauthRequired,
    #[error("Unable to connect to server. Please try again later.")]
    Unreachable(#[source] ApiError),
    /// The server refused the request (bad credentials, missing fields, ...).
    #[error("{}", .0.message())]
    Rejected(ApiError),
    #[error("saving session: {0}")]
    Storage(#[from] std::io::Error),
}

impl From<ApiError> for AuthError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Transport(_) => AuthError::Unreachable(e),
            other => AuthError::Rejected(other),
        }
    }
}

/// Registration form fields.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl Registration {
    /// `"first last"` trimmed, or `User` when both are blank.
    pub fn username(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string();
        if name.is_empty() {
            "User".to_string()
        } else {
            name
        }
    }
}

pub struct AuthController {
    backend: Arc<dyn Backend>,
    session: Arc<SessionStore>,
}

impl AuthController {
    pub fn new(backend: Arc<dyn Backend>, session: Arc<SessionStore>) -> Self {
        Self { backend, session }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        let session = self.backend.login(email, password).await?;
        log::info!("signed in as {}", session.user.email);
        self.session.set(session.clone())?;
        Ok(session)
    }

    pub async fn register(&self, form: &Registration) -> Result<AuthSession, AuthError> {
        if form.password != form.confirm_password {
            return Err(AuthError::Validation("Passwords do not match".to_string()));
        }
        let email = form.email.trim();
        if email.is_empty() || form.password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        let username = form.username();
        let session = match self.backend.register(&username, email, &form.password).await {
            Ok(s) => s,
            Err(e) if e.message() == EMAIL_TAKEN => return Err(AuthError::AlreadyRegistered),
            Err(e) => return Err(e.into()),
        };
        log::info!("registered {}", session.user.email);
        self.session.set(session.clone())?;
        Ok(session)
    }

    /// Confirm the stored token with the backend and refresh the cached profile.
    /// Any failure clears the store and asks for sign-in.
    pub async fn validate_session(&self) -> Result<User, AuthError> {
        if !self.session.is_signed_in() {
            return Err(AuthError::ReauthRequired);
        }
        match self.backend.current_user().await {
            Ok(user) => {
                if let Err(e) = self.session.update_user(user.clone()) {
                    log::warn!("caching profile failed: {}", e);
                }
                Ok(user)
            }
            Err(e) => {
                log::warn!("session validation failed: {}", e);
                self.session.clear();
                Err(AuthError::ReauthRequired)
            }
        }
    }

    pub fn logout(&self) {
        self.session.clear();
        log::info!("signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{signed_in_session, FakeBackend};

    fn controller(backend: Arc<FakeBackend>) -> (AuthController, Arc<SessionStore>) {
        let session = Arc::new(SessionStore::in_memory());
        (AuthController::new(backend, session.clone()), session)
    }

    fn form(password: &str, confirm: &str) -> Registration {
        Registration {
            first_name: " Ada ".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn username_defaults_to_user() {
        assert_eq!(form("a", "a").username(), "Ada Lovelace");
        assert_eq!(Registration::default().username(), "User");
        let only_last = Registration {
            last_name: "Byron".to_string(),
            ..Registration::default()
        };
        assert_eq!(only_last.username(), "Byron");
    }

    #[tokio::test]
    async fn mismatched_confirmation_blocks_register() {
        let backend = Arc::new(FakeBackend::default());
        let (auth, session) = controller(backend.clone());
        let err = auth.register(&form("one", "two")).await.unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match");
        assert!(backend.calls().is_empty());
        assert!(session.get().is_none());
    }

    #[tokio::test]
    async fn register_persists_session() {
        let backend = Arc::new(FakeBackend::default());
        let (auth, session) = controller(backend);
        let s = auth.register(&form("pw", "pw")).await.expect("register");
        assert_eq!(s.user.username, "Ada Lovelace");
        assert_eq!(session.get(), Some(s));
    }

    #[tokio::test]
    async fn duplicate_email_switches_to_login() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail("register", ApiError::from_status(409, EMAIL_TAKEN));
        let (auth, _) = controller(backend);
        assert!(matches!(
            auth.register(&form("pw", "pw")).await,
            Err(AuthError::AlreadyRegistered)
        ));
    }

    #[tokio::test]
    async fn login_validation_and_errors() {
        let backend = Arc::new(FakeBackend::default());
        let (auth, session) = controller(backend.clone());
        assert!(matches!(
            auth.login("  ", "pw").await,
            Err(AuthError::Validation(_))
        ));

        backend.fail("login", ApiError::from_status(401, "Invalid email or password"));
        let err = auth.login("a@b.c", "bad").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid email or password");
        assert!(session.get().is_none());

        backend.fail("login", ApiError::Transport("refused".to_string()));
        assert!(matches!(
            auth.login("a@b.c", "pw").await,
            Err(AuthError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn login_persists_session() {
        let backend = Arc::new(FakeBackend::default());
        let (auth, session) = controller(backend);
        auth.login(" a@b.c ", "pw").await.expect("login");
        assert_eq!(session.token().as_deref(), Some("token-for-a@b.c"));
    }

    #[tokio::test]
    async fn validate_without_token_needs_sign_in() {
        let backend = Arc::new(FakeBackend::default());
        let (auth, _) = controller(backend.clone());
        assert!(matches!(
            auth.validate_session().await,
            Err(AuthError::ReauthRequired)
        ));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn validate_failure_clears_store() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail("current_user", ApiError::from_status(422, "Invalid token"));
        let (auth, session) = controller(backend);
        session.set(signed_in_session()).expect("set");
        assert!(matches!(
            auth.validate_session().await,
            Err(AuthError::ReauthRequired)
        ));
        assert!(session.get().is_none());
    }

    #[tokio::test]
    async fn validate_refreshes_profile_and_logout_clears() {
        let backend = Arc::new(FakeBackend::default());
        let (auth, session) = controller(backend);
        session
            .set(AuthSession {
                token: "t".to_string(),
                user: User::default(),
            })
            .expect("set");
        let user = auth.validate_session().await.expect("valid");
        assert_eq!(session.get().map(|s| s.user), Some(user));

        auth.logout();
        assert!(!session.is_signed_in());
    }
}
