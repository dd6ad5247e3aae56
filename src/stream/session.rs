//! Minimal async HTTP session used by the stream client.
//!
//! The trait is the seam between protocol logic and transport: production
//! code uses the blanket `reqwest::Client` implementation below, tests
//! substitute a scripted mock.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use serde_json::Value;

use super::error::StreamError;

/// The service rejects bare automated requests, so every call carries
/// browser-like headers. Opaque protocol requirement, not a choice.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";
const STREAM_ORIGIN: &str = "https://www.icloud.com";

/// Status plus parsed JSON body of a shared-stream POST.
///
/// The body is `Value::Null` when the response was not JSON; the client
/// decides what that means for the status it came with.
#[derive(Debug)]
pub struct JsonResponse {
    pub status: u16,
    pub body: Value,
}

#[async_trait]
pub trait StreamSession: Send + Sync {
    /// POST a JSON body, returning the response status with its JSON payload.
    async fn post_json(&self, url: &str, body: &Value) -> Result<JsonResponse, StreamError>;

    /// GET a binary asset body. Non-success statuses become
    /// [`StreamError::Status`].
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, StreamError>;
}

/// Build the HTTP client used against the shared-stream service: browser
/// headers installed as defaults, and the per-request timeout baked in so a
/// stuck upstream can never hold a sync cycle open indefinitely.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ORIGIN, HeaderValue::from_static(STREAM_ORIGIN));
    headers.insert(REFERER, HeaderValue::from_static("https://www.icloud.com/"));
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
}

fn transport_error(e: reqwest::Error) -> StreamError {
    StreamError::Network(e.to_string())
}

#[async_trait]
impl StreamSession for reqwest::Client {
    async fn post_json(&self, url: &str, body: &Value) -> Result<JsonResponse, StreamError> {
        let resp = self
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await.map_err(transport_error)?;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Ok(JsonResponse { status, body })
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, StreamError> {
        let resp = self.get(url).send().await.map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StreamError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.bytes().await.map_err(transport_error)?.to_vec())
    }
}
