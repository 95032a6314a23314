use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// A server-pushed workflow event, e.g. `{"event_type": "cart_updated", "cart_id": 3}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub event_type: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub cart_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NotificationEvent {
    pub const ERROR: &'static str = "error";

    /// Parse a text frame; anything unreadable becomes an `error` event.
    ///
    /// Well-formed JSON that breaks the event contract, such as an object
    /// without `event_type` or with a non-integer `cart_id`, is reported the
    /// same way rather than passed through untyped.
    pub fn from_frame(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!(error = %e, "unreadable notification frame");
            Self::parse_failure(raw)
        })
    }

    pub fn parse_failure(raw: &str) -> Self {
        Self {
            event_type: Self::ERROR.to_string(),
            message: Some(format!("Failed to parse message: {}", raw)),
            cart_id: None,
            extra: Map::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.event_type == Self::ERROR
    }
}
