//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.zara/config.json`) and environment.
//! The same directory holds the persisted session (`token`, `user.json`) and the theme preference.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Remote backend settings used by the client.
    #[serde(default)]
    pub api: ApiConfig,

    /// Bind settings for the local mock backend (`zara serve`).
    #[serde(default)]
    pub server: ServerConfig,
}

/// Backend base URL and request limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Base URL including the `/api` prefix (default "http://127.0.0.1:5000/api"). Overridden by
    /// ZARA_API_URL env.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Upper bound for a single outbound request, in seconds (default 60). A send that exceeds it
    /// settles as a connectivity failure.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Mock backend bind address and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for the mock backend (default 5000).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:5000/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_server_port() -> u16 {
    5000
}

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a duration; zero is bumped to one second.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Resolve the backend base URL: env ZARA_API_URL overrides config. Trailing slashes are stripped.
pub fn resolve_api_base_url(config: &Config) -> String {
    std::env::var("ZARA_API_URL")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .unwrap_or_else(|| config.api.base_url.trim().to_string())
        .trim_end_matches('/')
        .to_string()
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("ZARA_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".zara").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Directory that holds the config file and persisted client state.
pub fn state_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf()
}

/// Load config from the given path (or the default / ZARA_CONFIG_PATH). Missing file => default
/// config.
/// Returns the config and the path that was used (for resolving the state directory).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_backend() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://127.0.0.1:5000/api");
        assert_eq!(config.api.request_timeout_secs, 60);
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.bind, "127.0.0.1");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"api":{"baseUrl":"https://zara.example/api/"}}"#)
                .expect("parse");
        assert_eq!(config.api.base_url, "https://zara.example/api/");
        assert_eq!(config.api.request_timeout_secs, 60);
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let api = ApiConfig {
            request_timeout_secs: 0,
            ..ApiConfig::default()
        };
        assert_eq!(api.request_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn state_dir_is_config_parent() {
        let path = Path::new("/home/user/.zara/config.json");
        assert_eq!(state_dir(path), PathBuf::from("/home/user/.zara"));
        assert_eq!(state_dir(Path::new("config.json")), PathBuf::from("."));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let path = std::env::temp_dir()
            .join(format!("zara-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let (config, used) = load_config(Some(path.clone())).expect("load");
        assert_eq!(used, path);
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn loopback_detection() {
        assert!(is_loopback_bind("127.0.0.1"));
        assert!(is_loopback_bind(" localhost "));
        assert!(!is_loopback_bind("0.0.0.0"));
    }
}
