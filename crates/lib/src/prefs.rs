//! Display theme preference, persisted as `theme` in the config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const THEME_FILE: &str = "theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }
}

fn theme_path(dir: &Path) -> PathBuf {
    dir.join(THEME_FILE)
}

/// Saved theme; dark when nothing (or something unreadable) is stored.
pub fn load_theme(dir: &Path) -> Theme {
    std::fs::read_to_string(theme_path(dir))
        .ok()
        .and_then(|s| Theme::parse(&s))
        .unwrap_or_default()
}

pub fn save_theme(dir: &Path, theme: Theme) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(theme_path(dir), theme.as_str())
}

/// Flip the saved theme and persist it; returns the new value.
pub fn toggle_theme(dir: &Path) -> std::io::Result<Theme> {
    let next = load_theme(dir).toggled();
    save_theme(dir, next)?;
    log::debug!("theme set to {}", next.as_str());
    Ok(next)
}
