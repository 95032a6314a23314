use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    /// Anything other than `dark` is light.
    pub fn normalize(raw: &str) -> Self {
        if raw == "dark" {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Partial preferences; set fields overwrite, unset fields are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferencesPatch {
    pub theme: Option<Theme>,
    pub extra: BTreeMap<String, Value>,
}

impl PreferencesPatch {
    pub fn theme(theme: Theme) -> Self {
        Self {
            theme: Some(theme),
            ..Self::default()
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl Preferences {
    pub fn merge(&mut self, patch: PreferencesPatch) {
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        self.extra.extend(patch.extra);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub preferences: Preferences,
}

impl User {
    pub fn new(id: &str, name: &str, role: &str, theme: Theme) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            preferences: Preferences {
                theme,
                extra: BTreeMap::new(),
            },
        }
    }
}
