//! HTTP Client Abstraction
//!
//! Transport seam for the Catalog API (reads) and the Checkout Intent API
//! (the single write). The core never talks to a socket directly; hosts
//! supply an implementation appropriate for their platform.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

// ============================================================================
// Request
// ============================================================================

/// A request, assembled builder-style before being handed to the client.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    /// Per-request timeout override. `None` uses the client's default.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Shorthand for a GET with no body.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    /// Serialize `body` as the JSON payload and set the content type.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let payload = serde_json::to_vec(body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON serialization failed: {}", e))
        })?;
        self.body = Some(Bytes::from(payload));
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

// ============================================================================
// Response
// ============================================================================

/// A fully buffered response. Catalog payloads are small; streaming media
/// never travels through this seam.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON deserialization failed: {}", e))
        })
    }

    /// The body as a UTF-8 string.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid UTF-8: {}", e)))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

// ============================================================================
// Retry policy
// ============================================================================

/// Retry configuration for idempotent requests.
///
/// Only reads should be retried through this. Checkout intent creation is
/// never retried automatically; a duplicate request risks a duplicate charge.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub use_exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
        }
    }
}

// ============================================================================
// Client trait
// ============================================================================

/// Async HTTP client.
///
/// Implementations own connection pooling, TLS validation, and timeouts.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest};
///
/// async fn fetch_track(client: &dyn HttpClient) -> Result<String> {
///     let request = HttpRequest::get("https://api.example.com/tracks/1");
///     let response = client.execute(request).await?;
///     response.text()
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute a request once.
    ///
    /// # Errors
    ///
    /// Returns error if the connection fails, TLS validation fails, or the
    /// request times out. A non-2xx status is NOT an error at this layer;
    /// callers inspect [`HttpResponse::status`].
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Execute a request under a retry policy.
    ///
    /// The default implementation performs a single attempt; desktop and
    /// mobile clients override it with real backoff.
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let _ = policy;
        self.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_accumulates_headers() {
        let request = HttpRequest::get("https://api.example.com/me")
            .header("Accept", "application/json")
            .bearer_token("secret")
            .timeout(Duration::from_secs(5));

        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(
            request.headers.get("Authorization"),
            Some(&"Bearer secret".to_string())
        );
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn json_body_sets_content_type() {
        #[derive(Serialize)]
        struct Payload {
            amount: f64,
        }

        let request = HttpRequest::new(HttpMethod::Post, "https://api.example.com/checkout")
            .json(&Payload { amount: 4.5 })
            .unwrap();

        assert_eq!(
            request.headers.get("Content-Type"),
            Some(&"application/json".to_string())
        );
        assert!(request.body.is_some());
    }

    #[test]
    fn status_classification() {
        let response = HttpResponse {
            status: 503,
            headers: HashMap::new(),
            body: Bytes::new(),
        };

        assert!(!response.is_success());
        assert!(response.is_server_error());
        assert!(!response.is_client_error());
    }
}
