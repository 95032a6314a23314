//! API module for the MedCart client
//!
//! URL derivation for the resource and notification endpoints, plus a thin
//! JSON request/response client that turns non-success answers into
//! readable [`ClientError::Status`] values.

use std::time::Duration;

use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::ApiSettings;
use crate::error::{ClientError, Result};

/// Resource and notification URLs derived from the configured origin.
#[derive(Debug, Clone)]
pub struct Endpoints {
    origin: Url,
    prefix: String,
}

impl Endpoints {
    pub fn from_settings(settings: &ApiSettings) -> Result<Self> {
        let origin = Url::parse(&settings.origin)?;
        let prefix = if settings.strip_prefix {
            String::new()
        } else {
            normalize_prefix(&settings.prefix)
        };
        Ok(Self { origin, prefix })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// `origin + prefix + path`, e.g. `http://localhost:5173/api/carts`.
    pub fn resource(&self, path: &str) -> Result<Url> {
        let path = format!("{}/{}", self.prefix, path.trim_start_matches('/'));
        Ok(self.origin.join(&path)?)
    }

    /// WebSocket URL for `path`. Secure transport iff the origin is `https`.
    pub fn notifications(&self, path: &str) -> Result<Url> {
        let scheme = if self.origin.scheme() == "https" { "wss" } else { "ws" };
        let host = self.origin.host_str().ok_or(url::ParseError::EmptyHost)?;
        let authority = match self.origin.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let url = format!(
            "{}://{}{}/{}",
            scheme,
            authority,
            self.prefix,
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&url)?)
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Shared HTTP client for every store.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoints: Endpoints::from_settings(settings)?,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// GET a collection. A body that is not a JSON array reads as empty.
    pub async fn get_list<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<Vec<T>> {
        let url = self.endpoints.resource(path)?;
        debug!(%url, "GET");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: format!("Failed to fetch {} ({})", what, status.as_u16()),
            });
        }

        let bytes = response.bytes().await?;
        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).map_err(ClientError::from))
                .collect(),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn post<B, T>(&self, path: &str, body: &B, what: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let response = self.write(Method::POST, path, Some(body), what).await?;
        decode(response).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B, what: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let response = self.write(Method::PATCH, path, Some(body), what).await?;
        decode(response).await
    }

    /// DELETE a resource. The confirmation body is ignored.
    pub async fn delete(&self, path: &str, what: &str) -> Result<()> {
        self.write(Method::DELETE, path, None, what).await?;
        Ok(())
    }

    async fn write(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        what: &str,
    ) -> Result<Response> {
        let url = self.endpoints.resource(path)?;
        debug!(%url, %method, "write");

        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let bytes = response.bytes().await.unwrap_or_default();
        let message = detail_message(&bytes)
            .unwrap_or_else(|| format!("Failed to {} ({})", what, status.as_u16()));
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Server-supplied `detail` from an error body, if any.
pub fn detail_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        Value::Null => None,
        Value::String(detail) => Some(detail.clone()),
        other => Some(other.to_string()),
    }
}
