//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStream, RetryPolicy},
};
use core_async::time::{sleep, timeout};
use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("lectern-core/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reqwest-based HTTP client implementation
///
/// Connection pooling and TLS come from reqwest. 5xx and 429 responses are
/// retried with the caller's [`RetryPolicy`]; other statuses are returned
/// as-is for the caller to inspect.
///
/// The timeout bounds a whole buffered exchange. For
/// [`execute_streaming`](HttpClient::execute_streaming) it bounds the wait
/// for response headers only, so long media bodies are never cut off.
pub struct ReqwestHttpClient {
    client: Client,
    timeout: Duration,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a new HTTP client with custom timeout
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized. Use
    /// [`try_with_timeout`](Self::try_with_timeout) to handle that case.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::try_with_timeout(timeout).expect("Failed to build HTTP client")
    }

    pub fn try_with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Wrap an existing reqwest client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(Self::convert_method(request.method), &request.url);

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        req
    }

    fn map_send_error(e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            BridgeError::OperationFailed("Request timed out".to_string())
        } else if e.is_connect() {
            BridgeError::OperationFailed(format!("Connection failed: {}", e))
        } else {
            BridgeError::OperationFailed(e.to_string())
        }
    }

    fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect()
    }

    /// Send `request` until it yields a non-retryable status.
    ///
    /// With `whole_exchange` the timeout also covers reading the body;
    /// otherwise it only covers the wait for headers.
    async fn send_with_retry(
        &self,
        request: &HttpRequest,
        policy: &RetryPolicy,
        whole_exchange: bool,
    ) -> Result<reqwest::Response> {
        let max_attempts = policy.max_attempts.max(1);
        let limit = request.timeout.unwrap_or(self.timeout);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!(
                attempt,
                max_attempts,
                method = ?request.method,
                "Executing HTTP request"
            );

            let builder = self.build_request(request);
            let sent = if whole_exchange {
                builder.timeout(limit).send().await
            } else {
                match timeout(limit, builder.send()).await {
                    Ok(sent) => sent,
                    Err(_) => {
                        warn!(attempt, "HTTP response headers timed out");
                        last_error =
                            Some(BridgeError::OperationFailed("Request timed out".to_string()));
                        if attempt < max_attempts {
                            sleep(policy.delay_for(attempt)).await;
                        }
                        continue;
                    }
                }
            };

            match sent {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if status >= 500 || status == 429 {
                        warn!(status, attempt, "HTTP request failed with retryable status");
                        last_error =
                            Some(BridgeError::OperationFailed(format!("HTTP {} error", status)));
                    } else {
                        return Ok(response);
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt, "HTTP request failed");
                    last_error = Some(Self::map_send_error(e));
                }
            }

            if attempt < max_attempts {
                let delay = policy.delay_for(attempt);
                debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::default())
            .await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let response = self.send_with_retry(&request, &policy, true).await?;
        let status = response.status().as_u16();
        let headers = Self::collect_headers(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;

        debug!(status, bytes = body.len(), "HTTP request completed");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn execute_streaming(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpStream> {
        let response = self.send_with_retry(&request, &policy, false).await?;
        let status = response.status().as_u16();
        let headers = Self::collect_headers(response.headers());
        debug!(status, length = ?response.content_length(), "HTTP response streaming");

        let body = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| BridgeError::OperationFailed(format!("Body stream failed: {}", e)))
        });

        Ok(HttpStream {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}
