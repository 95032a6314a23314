//! MedCart client core library
//!
//! This module exports the reactive stores, the notification channel and
//! the bootstrap wiring used by the MedCart front end.

pub mod api;
pub mod app;
pub mod error;
pub mod models;
pub mod prefs;
pub mod stores;
pub mod websocket;

pub use app::{App, InitReport};
pub use error::ClientError;

/// Application configuration
pub mod config {
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct Settings {
        #[serde(default)]
        pub api: ApiSettings,
        #[serde(default)]
        pub notifications: NotificationSettings,
        #[serde(default)]
        pub prefs: PrefsSettings,
        #[serde(default)]
        pub log: LogSettings,
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct LogSettings {
        /// One JSON object per line instead of the human-readable format.
        #[serde(default)]
        pub json: bool,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ApiSettings {
        /// Origin the client is served from; its scheme picks `ws` or `wss`.
        #[serde(default = "default_origin")]
        pub origin: String,
        #[serde(default = "default_prefix")]
        pub prefix: String,
        /// Talk to the backend directly, without the proxy prefix.
        #[serde(default)]
        pub strip_prefix: bool,
        #[serde(default = "default_timeout_secs")]
        pub timeout_secs: u64,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct NotificationSettings {
        #[serde(default = "default_notifications_path")]
        pub path: String,
        #[serde(default = "default_reconnect_delay_ms")]
        pub reconnect_delay_ms: u64,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct PrefsSettings {
        #[serde(default = "default_prefs_path")]
        pub path: String,
    }

    fn default_origin() -> String {
        "http://localhost:5173".into()
    }

    fn default_prefix() -> String {
        "/api".into()
    }

    fn default_timeout_secs() -> u64 {
        30
    }

    fn default_notifications_path() -> String {
        "/notifications/ws".into()
    }

    fn default_reconnect_delay_ms() -> u64 {
        3000
    }

    fn default_prefs_path() -> String {
        "medcart-prefs.json".into()
    }

    impl Default for ApiSettings {
        fn default() -> Self {
            Self {
                origin: default_origin(),
                prefix: default_prefix(),
                strip_prefix: false,
                timeout_secs: default_timeout_secs(),
            }
        }
    }

    impl Default for NotificationSettings {
        fn default() -> Self {
            Self {
                path: default_notifications_path(),
                reconnect_delay_ms: default_reconnect_delay_ms(),
            }
        }
    }

    impl Default for PrefsSettings {
        fn default() -> Self {
            Self { path: default_prefs_path() }
        }
    }

    /// Load configuration from file
    pub fn load_config() -> Result<Settings, config::ConfigError> {
        // Override with environment-specific settings
        let env = std::env::var("MEDCART_ENV").unwrap_or_else(|_| "development".into());

        config::Config::builder()
            // Start with default settings
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Override with environment variables, e.g. MEDCART_API__ORIGIN
            .add_source(
                config::Environment::with_prefix("MEDCART")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

}
