//! Durable client preferences.
//!
//! A small JSON key-value file standing in for browser local storage. Only
//! the `theme` key is used: read at startup, rewritten on every change.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::models::Theme;

const THEME_KEY: &str = "theme";

#[derive(Debug)]
pub struct ThemePreference {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl ThemePreference {
    /// Open the preference file. A missing file reads as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no preference file yet");
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored theme, light when unset or unrecognized.
    pub fn current(&self) -> Theme {
        self.values
            .get(THEME_KEY)
            .map(|raw| Theme::normalize(raw))
            .unwrap_or_default()
    }

    pub fn apply(&mut self, theme: Theme) -> Result<Theme> {
        self.values.insert(THEME_KEY.to_string(), theme.as_str().to_string());
        std::fs::write(&self.path, serde_json::to_vec_pretty(&self.values)?)?;
        info!(theme = theme.as_str(), "theme applied");
        Ok(theme)
    }

    /// Switch to `theme`, or flip the current one when `None`.
    pub fn toggle(&mut self, theme: Option<Theme>) -> Result<Theme> {
        let next = theme.unwrap_or_else(|| self.current().flipped());
        self.apply(next)
    }
}
