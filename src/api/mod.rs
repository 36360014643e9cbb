//! Client-side interface for the World Forge backend.
//!
//! Every backend response is wrapped in a `{"data": ...}` envelope. The
//! [`ApiClient`] unwraps it and turns non-2xx responses, missing envelopes and
//! undecodable payloads into [`ApiError`]s.

pub mod models;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request {method} {path} failed: {source}")]
    Transport {
        method: Method,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {path} failed (status {status}): {message}")]
    Status {
        method: Method,
        path: String,
        status: StatusCode,
        message: String,
    },

    #[error("Response from {path} has no 'data' field")]
    MissingData { path: String },

    #[error("Failed to parse response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self.status(),
            Some(StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY)
        )
    }
}

/// Authenticated JSON client bound to one backend URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.request(Method::GET, path);
        self.send(request, Method::GET, path).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, path).json(body);
        self.send(request, Method::POST, path).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::PUT, path).json(body);
        self.send(request, Method::PUT, path).await
    }

    /// DELETE tolerates an empty body; only the status code matters.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, path);
        self.send_raw(request, Method::DELETE, path).await.map(|_| ())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        method: Method,
        path: &str,
    ) -> Result<T, ApiError> {
        let body = self.send_raw(request, method, path).await?;
        unwrap_envelope(path, &body)
    }

    async fn send_raw(
        &self,
        request: RequestBuilder,
        method: Method,
        path: &str,
    ) -> Result<String, ApiError> {
        debug!(method = %method, path = path, "Sending backend request");

        let response = request.send().await.map_err(|source| ApiError::Transport {
            method: method.clone(),
            path: path.to_string(),
            source,
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ApiError::Transport {
                method: method.clone(),
                path: path.to_string(),
                source,
            })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                method,
                path: path.to_string(),
                status,
                message: error_message(&body),
            });
        }

        Ok(body)
    }
}

fn unwrap_envelope<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, ApiError> {
    let mut envelope: serde_json::Value =
        serde_json::from_str(body).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })?;

    let data = match envelope.get_mut("data").map(serde_json::Value::take) {
        Some(serde_json::Value::Null) | None => {
            return Err(ApiError::MissingData {
                path: path.to_string(),
            })
        }
        Some(data) => data,
    };

    serde_json::from_value(data).map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}

/// Pull a human readable message out of an error body.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error", "data"] {
            if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    if body.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        body.trim().to_string()
    }
}
