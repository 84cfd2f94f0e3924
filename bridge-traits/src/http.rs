//! HTTP Client Abstraction
//!
//! Media files are fetched with plain GET requests against resolved URLs.
//! Hosts provide the transport; the core describes requests and reads either
//! a complete [`HttpResponse`] or a chunked [`HttpStream`].

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream};
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::platform::PlatformSendSync;

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            timeout: None,
        }
    }

    /// Shorthand for a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Advertise the audio content types the decoder understands.
    pub fn accept_audio(self) -> Self {
        self.header("Accept", "audio/*, application/octet-stream")
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Get response body as UTF-8 string
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid UTF-8: {}", e)))
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// `Content-Type` without parameters, lowercased.
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type").and_then(mime_of)
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response status indicates a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if response status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

fn find_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn mime_of(value: &str) -> Option<String> {
    value
        .split(';')
        .next()
        .map(|mime| mime.trim().to_ascii_lowercase())
}

/// Body chunks in arrival order. An `Err` item ends the stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Response whose body is read incrementally.
///
/// Only the status line and headers have arrived when this is returned; no
/// overall deadline applies to the body.
pub struct HttpStream {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: ByteStream,
}

impl HttpStream {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// `Content-Type` without parameters, lowercased.
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type").and_then(mime_of)
    }

    /// Declared body length, when the server sent one.
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|value| value.trim().parse().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for HttpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStream")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl From<HttpResponse> for HttpStream {
    /// Wrap a buffered response as a single-chunk stream.
    fn from(response: HttpResponse) -> Self {
        let body = Some(response.body).filter(|body| !body.is_empty());
        Self {
            status: response.status,
            headers: response.headers,
            body: Box::pin(stream::iter(body.map(Ok))),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub use_exponential_backoff: bool,
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait before attempt number `attempt` (1-based retry index).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = if self.use_exponential_backoff {
            let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
            self.base_delay.saturating_mul(factor)
        } else {
            self.base_delay
        };
        delay.min(self.max_delay)
    }
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

/// Async HTTP client trait
///
/// Implementations handle connection pooling, TLS, and transport-level
/// retries. A non-2xx status is NOT an error at this layer: callers inspect
/// [`HttpResponse::is_success`].
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest};
///
/// async fn fetch(client: &dyn HttpClient, url: &str) -> Result<bytes::Bytes> {
///     let response = client.execute(HttpRequest::get(url).accept_audio()).await?;
///     Ok(response.body)
/// }
/// ```
#[async_trait]
pub trait HttpClient: PlatformSendSync {
    /// Execute an HTTP request
    ///
    /// # Errors
    ///
    /// Returns error if the connection fails, TLS validation fails, or the
    /// request times out.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Execute an HTTP request with custom retry policy
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let _ = policy;
        self.execute(request).await
    }

    /// Execute a request and return as soon as the headers arrive.
    ///
    /// Retries apply to establishing the response only; once the body
    /// starts flowing, failures surface as `Err` items on
    /// [`HttpStream::body`]. The default buffers the whole body through
    /// [`execute_with_retry`](Self::execute_with_retry).
    async fn execute_streaming(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpStream> {
        let response = self.execute_with_retry(request, policy).await?;
        Ok(HttpStream::from(response))
    }

    /// Check network connectivity
    async fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let request = HttpRequest::get("https://cdn.example.com/audio-bucket/a.mp3")
            .accept_audio()
            .timeout(Duration::from_secs(30));

        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "https://cdn.example.com/audio-bucket/a.mp3");
        assert!(request.headers.get("Accept").unwrap().starts_with("audio/"));
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_http_response_status_checks() {
        let response = HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from("test"),
        };

        assert!(response.is_success());
        assert!(!response.is_client_error());
        assert!(!response.is_server_error());

        let missing = HttpResponse {
            status: 404,
            headers: HashMap::new(),
            body: Bytes::new(),
        };
        assert!(missing.is_client_error());
    }

    #[test]
    fn test_content_type_strips_parameters() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "Audio/MPEG; charset=binary".to_string());
        let response = HttpResponse {
            status: 200,
            headers,
            body: Bytes::new(),
        };

        assert_eq!(response.content_type().as_deref(), Some("audio/mpeg"));
        assert!(response.header("content-type").is_some());
    }

    #[test]
    fn test_buffered_response_becomes_single_chunk_stream() {
        use futures::executor::block_on;
        use futures::StreamExt;

        let mut headers = HashMap::new();
        headers.insert("Content-Length".to_string(), "4".to_string());
        let mut streamed = HttpStream::from(HttpResponse {
            status: 206,
            headers,
            body: Bytes::from_static(b"RIFF"),
        });

        assert!(streamed.is_success());
        assert_eq!(streamed.content_length(), Some(4));
        let chunks: Vec<_> = block_on(streamed.body.by_ref().collect::<Vec<_>>());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap(), &Bytes::from_static(b"RIFF"));

        let mut empty = HttpStream::from(HttpResponse {
            status: 204,
            headers: HashMap::new(),
            body: Bytes::new(),
        });
        assert!(block_on(empty.body.next()).is_none());
    }

    #[test]
    fn test_retry_policy_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            use_exponential_backoff: true,
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }
}
