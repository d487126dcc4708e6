//! Persisted auth session (bearer token + cached user profile).
//!
//! One writer, many readers: the gateway reads the token for every request, controllers clear the
//! store on any auth failure. The file-backed store keeps `token` and `user.json` in the config
//! directory so a session survives restarts.

use crate::api::{AuthSession, User};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

const TOKEN_FILE: &str = "token";
const USER_FILE: &str = "user.json";

/// Holds zero or one [`AuthSession`], optionally mirrored to disk.
pub struct SessionStore {
    dir: Option<PathBuf>,
    current: RwLock<Option<AuthSession>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SessionStore {
    /// Store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            current: RwLock::new(None),
        }
    }

    /// Open the file-backed store in `dir`, loading any persisted session.
    /// A missing, blank, `"null"` or `"undefined"` token loads as no session.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let current = load_session(&dir);
        if current.is_some() {
            log::debug!("loaded session from {}", dir.display());
        }
        Self {
            dir: Some(dir),
            current: RwLock::new(current),
        }
    }

    /// Current session, if any.
    pub fn get(&self) -> Option<AuthSession> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Bearer token of the current session.
    pub fn token(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.token.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.token().is_some()
    }

    /// Replace the session and persist token and profile. The in-memory value is updated even
    /// when writing to disk fails.
    pub fn set(&self, session: AuthSession) -> std::io::Result<()> {
        let persisted = match &self.dir {
            Some(dir) => save_session(dir, &session),
            None => Ok(()),
        };
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
        persisted
    }

    /// Update the cached profile of the current session. No-op when signed out.
    pub fn update_user(&self, user: User) -> std::io::Result<()> {
        match self.get() {
            Some(mut session) => {
                session.user = user;
                self.set(session)
            }
            None => Ok(()),
        }
    }

    /// Remove token and profile; subsequent `get()` returns `None`.
    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = None;
        if let Some(dir) = &self.dir {
            for name in [TOKEN_FILE, USER_FILE] {
                let path = dir.join(name);
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => log::warn!("removing {}: {}", path.display(), e),
                }
            }
        }
        log::debug!("session cleared");
    }
}

fn usable_token(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() || t == "null" || t == "undefined" {
        None
    } else {
        Some(t.to_string())
    }
}

fn load_session(dir: &Path) -> Option<AuthSession> {
    let raw = std::fs::read_to_string(dir.join(TOKEN_FILE)).ok()?;
    let token = usable_token(&raw)?;
    let user = std::fs::read_to_string(dir.join(USER_FILE))
        .ok()
        .and_then(|s| serde_json::from_str::<User>(&s).ok())
        .unwrap_or_default();
    Some(AuthSession { token, user })
}

fn save_session(dir: &Path, session: &AuthSession) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(TOKEN_FILE), &session.token)?;
    let user = serde_json::to_string_pretty(&session.user)?;
    std::fs::write(dir.join(USER_FILE), user)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("zara-session-{}", uuid::Uuid::new_v4()))
    }

    fn sample() -> AuthSession {
        AuthSession {
            token: "tok-123".to_string(),
            user: User {
                username: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
            },
        }
    }

    #[test]
    fn in_memory_set_get_clear() {
        let store = SessionStore::in_memory();
        assert!(store.get().is_none());
        store.set(sample()).expect("set");
        assert_eq!(store.token().as_deref(), Some("tok-123"));
        store.clear();
        assert!(store.get().is_none());
        assert!(!store.is_signed_in());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = temp_dir();
        let store = SessionStore::open(&dir);
        store.set(sample()).expect("set");

        let reopened = SessionStore::open(&dir);
        assert_eq!(reopened.get(), Some(sample()));

        reopened.clear();
        assert!(SessionStore::open(&dir).get().is_none());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn placeholder_tokens_load_as_signed_out() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).expect("mkdir");
        for raw in ["null", "undefined", "  "] {
            std::fs::write(dir.join(TOKEN_FILE), raw).expect("write");
            assert!(SessionStore::open(&dir).get().is_none(), "token {:?}", raw);
        }
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_profile_loads_with_empty_user() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join(TOKEN_FILE), "abc\n").expect("write");
        let session = SessionStore::open(&dir).get().expect("session");
        assert_eq!(session.token, "abc");
        assert_eq!(session.user, User::default());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn update_user_only_when_signed_in() {
        let store = SessionStore::in_memory();
        let user = User {
            username: "x".to_string(),
            email: "x@example.com".to_string(),
        };
        store.update_user(user.clone()).expect("noop");
        assert!(store.get().is_none());
        store.set(sample()).expect("set");
        store.update_user(user.clone()).expect("update");
        assert_eq!(store.get().map(|s| s.user), Some(user));
    }
}
