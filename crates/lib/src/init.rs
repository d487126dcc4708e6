//! Initialize the configuration directory: create ~/.zara and a default config file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;

/// Create the config directory and default config if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with the default settings if missing.
///
/// Returns the directory, which also holds the persisted session and theme.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config::state_dir(config_path);
    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        let default_config = serde_json::to_string_pretty(&config::Config::default())
            .context("serializing default config")?;
        std::fs::write(config_path, default_config)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    Ok(config_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_default_config_once() {
        let dir = std::env::temp_dir().join(format!("zara-init-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.json");

        let created = init_config_dir(&path).expect("init");
        assert_eq!(created, dir);
        let (config, _) = config::load_config(Some(path.clone())).expect("load");
        assert_eq!(config.api.request_timeout_secs, 60);

        std::fs::write(&path, r#"{"server":{"port":6000}}"#).expect("overwrite");
        init_config_dir(&path).expect("second init");
        let (config, _) = config::load_config(Some(path)).expect("reload");
        assert_eq!(config.server.port, 6000);

        let _ = std::fs::remove_dir_all(dir);
    }
}
