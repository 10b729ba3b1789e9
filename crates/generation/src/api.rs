//! HTTP client for the upstream generation API.
//!
//! The API takes a prompt plus optional style flags and answers with a
//! streamed text body (a JSON document emitted incrementally).

use layoutgen_core::generation::GenerationFlags;
use serde::Serialize;

/// Request body sent to the generation API.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<GenerationFlags>,
}

/// Errors from the generation API layer.
#[derive(Debug, thiserror::Error)]
pub enum GenerationApiError {
    /// The HTTP request itself failed (network, DNS, TLS, or a broken body).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code. The body is kept for logs
    /// only; the message persisted on the task carries just the status.
    #[error("API request failed: {status}")]
    ApiError { status: u16, body: String },
}

/// HTTP client for one generation API endpoint.
pub struct GenerationApi {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl GenerationApi {
    /// * `api_url` - Full URL of the generation endpoint.
    /// * `api_key` - Sent as a Bearer token when present.
    pub fn new(api_url: String, api_key: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, api_key)
    }

    pub fn with_client(client: reqwest::Client, api_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            api_url,
            api_key,
        }
    }

    /// Start a generation and return the response whose body streams the
    /// output. Fails on transport errors and non-2xx statuses.
    pub async fn open_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<reqwest::Response, GenerationApiError> {
        let mut builder = self.client.post(&self.api_url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;
        Self::ensure_success(response).await
    }

    /// Return the response unchanged if its status is 2xx, otherwise read
    /// the body into an [`GenerationApiError::ApiError`].
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GenerationApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenerationApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_message_carries_only_status() {
        let err = GenerationApiError::ApiError {
            status: 500,
            body: "stack trace".into(),
        };
        assert_eq!(err.to_string(), "API request failed: 500");
    }

    #[test]
    fn request_omits_missing_flags() {
        let req = GenerationRequest {
            prompt: "blue dashboard".into(),
            flags: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({ "prompt": "blue dashboard" }));
    }
}
