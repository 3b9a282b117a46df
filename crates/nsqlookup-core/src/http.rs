//! HTTP Client Abstraction
//!
//! Catalog-backed resolvers talk HTTP through the [`HttpClient`] trait so the
//! transport can be swapped:
//! - Production use with reqwest ([`ReqwestHttpClient`])
//! - Tests with stub clients returning canned responses

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Default HTTP timeout in milliseconds
pub const HTTP_CLIENT_TIMEOUT_MS_DEFAULT: u64 = 30_000;

/// Maximum response body size in bytes
pub const HTTP_CLIENT_RESPONSE_BYTES_MAX: u64 = 10 * 1024 * 1024; // 10MB

// =============================================================================
// HTTP Request
// =============================================================================

/// A read-only (GET) HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request timeout
    pub timeout: Duration,
}

impl HttpRequest {
    /// Create a new GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeout: Duration::from_millis(HTTP_CLIENT_TIMEOUT_MS_DEFAULT),
        }
    }

    /// Add a header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// =============================================================================
// HTTP Response
// =============================================================================

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: String,
}

impl HttpResponse {
    /// Create a new response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Check if status is success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Canonical reason phrase for the status code ("Not Found", ...)
    pub fn reason(&self) -> &'static str {
        reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Unknown Status")
    }
}

// =============================================================================
// HTTP Error
// =============================================================================

/// HTTP client errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("HTTP request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("HTTP request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("HTTP response too large: {size} bytes (max: {max} bytes)")]
    ResponseTooLarge { size: u64, max: u64 },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },
}

/// HTTP client result type
pub type HttpResult<T> = Result<T, HttpError>;

// =============================================================================
// HTTP Client Trait
// =============================================================================

/// Abstract HTTP client
///
/// Implementations must read the response body to completion before
/// returning, so no connection state outlives the call.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request
    async fn execute(&self, request: HttpRequest) -> HttpResult<HttpResponse>;
}

// =============================================================================
// Reqwest Implementation
// =============================================================================

/// Production HTTP client using reqwest
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a client with reqwest's default settings
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured reqwest client (proxies, TLS roots, ...)
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> HttpResult<HttpResponse> {
        let mut builder = self.client.get(&request.url).timeout(request.timeout);

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        let timeout_ms = request.timeout.as_millis() as u64;
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                HttpError::Timeout { timeout_ms }
            } else if e.is_connect() {
                HttpError::ConnectionFailed {
                    reason: e.to_string(),
                }
            } else if e.is_builder() {
                HttpError::InvalidUrl {
                    url: request.url.clone(),
                }
            } else {
                HttpError::RequestFailed {
                    reason: e.to_string(),
                }
            }
        };

        let response = builder.send().await.map_err(map_err)?;

        if let Some(size) = response.content_length() {
            if size > HTTP_CLIENT_RESPONSE_BYTES_MAX {
                return Err(HttpError::ResponseTooLarge {
                    size,
                    max: HTTP_CLIENT_RESPONSE_BYTES_MAX,
                });
            }
        }

        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string(), v.to_string());
            }
        }

        let body = response.bytes().await.map_err(map_err)?;

        if body.len() as u64 > HTTP_CLIENT_RESPONSE_BYTES_MAX {
            return Err(HttpError::ResponseTooLarge {
                size: body.len() as u64,
                max: HTTP_CLIENT_RESPONSE_BYTES_MAX,
            });
        }

        Ok(HttpResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let req = HttpRequest::get("http://localhost:8500/v1/catalog/services")
            .with_header("Accept", "application/json")
            .with_timeout(Duration::from_secs(3));

        assert_eq!(req.url, "http://localhost:8500/v1/catalog/services");
        assert_eq!(
            req.headers.get("Accept"),
            Some(&"application/json".to_string())
        );
        assert_eq!(req.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_http_request_default_timeout() {
        let req = HttpRequest::get("http://example.com");
        assert_eq!(
            req.timeout,
            Duration::from_millis(HTTP_CLIENT_TIMEOUT_MS_DEFAULT)
        );
    }

    #[test]
    fn test_http_response_status() {
        let ok = HttpResponse::new(200, "[]");
        assert!(ok.is_success());
        assert_eq!(ok.reason(), "OK");

        let missing = HttpResponse::new(404, "");
        assert!(!missing.is_success());
        assert_eq!(missing.reason(), "Not Found");

        let odd = HttpResponse::new(599, "");
        assert_eq!(odd.reason(), "Unknown Status");
    }

    #[test]
    fn test_http_error_display() {
        let err = HttpError::Timeout { timeout_ms: 1500 };
        assert_eq!(err.to_string(), "HTTP request timed out after 1500ms");
    }
}
