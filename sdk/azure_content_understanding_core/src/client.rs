//! HTTP client for Azure AI Content Understanding.
//!
//! This module provides [`ContentUnderstandingClient`], the transport layer used
//! by every request in the SDK. The client handles authentication, the
//! `api-version` query parameter, retries on transient status codes and
//! mapping of error responses.
//!
//! # Examples
//!
//! ## Using a resource key
//! ```rust,no_run
//! use azure_content_understanding_core::client::ContentUnderstandingClient;
//! use azure_content_understanding_core::auth::ContentUnderstandingCredential;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ContentUnderstandingClient::builder()
//!     .endpoint("https://your-resource.services.ai.azure.com")
//!     .credential(ContentUnderstandingCredential::api_key("your-key"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Using the environment
//! ```rust,no_run
//! use azure_content_understanding_core::client::ContentUnderstandingClient;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Reads AZURE_CONTENT_UNDERSTANDING_ENDPOINT and
//! // AZURE_CONTENT_UNDERSTANDING_KEY (or AZURE_CONTENT_UNDERSTANDING_TOKEN).
//! let client = ContentUnderstandingClient::builder().build()?;
//! # Ok(())
//! # }
//! ```

use crate::auth::ContentUnderstandingCredential;
use crate::error::{ContentUnderstandingError, ContentUnderstandingResult};
use bytes::Bytes;
use reqwest::{Client as HttpClient, Method};
use url::Url;

use std::time::Duration;

/// Default API version for Content Understanding.
pub const DEFAULT_API_VERSION: &str = "2025-05-01-preview";

/// Environment variable holding the resource endpoint.
pub const ENDPOINT_ENV: &str = "AZURE_CONTENT_UNDERSTANDING_ENDPOINT";

/// Default value of the `x-ms-useragent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("cu-rust-sdk/", env!("CARGO_PKG_VERSION"));

/// Default connection timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read/response timeout (60 seconds).
///
/// Applies to each individual request, not to the overall operation. Upload of
/// large binaries may need a longer value.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Determines if an HTTP status code represents a retriable error.
///
/// Retriable errors are transient server-side issues that may succeed on retry:
/// - 429 Too Many Requests (rate limiting)
/// - 500 Internal Server Error
/// - 502 Bad Gateway
/// - 503 Service Unavailable
/// - 504 Gateway Timeout
#[inline]
pub fn is_retriable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Configuration for automatic retry behavior on transient errors.
///
/// Only retriable status codes are retried. Connection failures surface
/// immediately as [`ContentUnderstandingError::Transport`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial request).
    pub max_retries: u32,
    /// Initial backoff duration before the first retry.
    /// Subsequent retries use exponential backoff (2^attempt * initial_backoff).
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (0-based), with ±25% jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff * 2_u32.saturating_pow(attempt);
        let jitter = 0.75 + fastrand::f64() * 0.5;
        base.mul_f64(jitter)
    }
}

/// A request body, serialized once so it can be resent on retry.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// Pre-serialized bytes with their content type.
    Bytes { data: Bytes, content_type: String },
}

impl RequestBody {
    /// Serializes `value` as an `application/json` body.
    pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> ContentUnderstandingResult<Self> {
        Self::json_with_content_type(value, "application/json")
    }

    /// Serializes `value` as JSON with a custom content type
    /// (for example `application/merge-patch+json`).
    pub fn json_with_content_type<T: serde::Serialize + ?Sized>(
        value: &T,
        content_type: &str,
    ) -> ContentUnderstandingResult<Self> {
        let data = serde_json::to_vec(value)?;
        Ok(Self::Bytes {
            data: Bytes::from(data),
            content_type: content_type.to_string(),
        })
    }

    /// Wraps raw binary content.
    pub fn binary(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self::Bytes {
            data: data.into(),
            content_type: content_type.into(),
        }
    }
}

/// The client for the Content Understanding REST API.
///
/// The client is cheaply cloneable and can be shared across threads.
#[derive(Debug, Clone)]
pub struct ContentUnderstandingClient {
    pub(crate) http: HttpClient,
    pub(crate) endpoint: Url,
    pub(crate) credential: ContentUnderstandingCredential,
    pub(crate) api_version: String,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) user_agent: String,
}

/// Builder for constructing a [`ContentUnderstandingClient`].
///
/// Use [`ContentUnderstandingClient::builder()`] to create a new builder.
#[derive(Debug, Default)]
pub struct ContentUnderstandingClientBuilder {
    endpoint: Option<String>,
    credential: Option<ContentUnderstandingCredential>,
    api_version: Option<String>,
    http_client: Option<HttpClient>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
    user_agent: Option<String>,
}

impl ContentUnderstandingClient {
    /// Create a new builder for configuring a client.
    pub fn builder() -> ContentUnderstandingClientBuilder {
        ContentUnderstandingClientBuilder::default()
    }

    /// Get the base endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Get the API version being used.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Get the retry policy configuration.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Build a full URL for an API path, including the `api-version` query parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined to the endpoint URL.
    pub fn url(&self, path: &str) -> ContentUnderstandingResult<Url> {
        let mut url = self.endpoint.join(path).map_err(|e| {
            ContentUnderstandingError::invalid_endpoint_with_source("failed to construct URL", e)
        })?;
        self.ensure_api_version(&mut url);
        Ok(url)
    }

    /// Returns `true` if `url` has the same scheme, host and port as the endpoint.
    ///
    /// Operation URLs returned by the service are only followed when this holds,
    /// so credentials are never sent to another host.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.endpoint.origin()
    }

    fn ensure_api_version(&self, url: &mut Url) {
        if !url.query_pairs().any(|(k, _)| k == "api-version") {
            url.query_pairs_mut()
                .append_pair("api-version", &self.api_version);
        }
    }

    /// Send a GET request to an API path.
    pub async fn get(&self, path: &str) -> ContentUnderstandingResult<reqwest::Response> {
        let url = self.url(path)?;
        self.execute(Method::GET, url, RequestBody::Empty).await
    }

    /// Send a GET request to an absolute URL, such as an `Operation-Location`.
    ///
    /// The `api-version` parameter is added if the URL does not carry one.
    ///
    /// # Errors
    ///
    /// Returns [`ContentUnderstandingError::Protocol`] if the URL is not on the
    /// configured endpoint's origin.
    pub async fn get_absolute(&self, url: &Url) -> ContentUnderstandingResult<reqwest::Response> {
        if !self.is_same_origin(url) {
            return Err(ContentUnderstandingError::Protocol(format!(
                "refusing to follow URL on foreign origin: {}",
                url.origin().ascii_serialization()
            )));
        }
        let mut url = url.clone();
        self.ensure_api_version(&mut url);
        self.execute(Method::GET, url, RequestBody::Empty).await
    }

    /// Send a POST request with a JSON body.
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ContentUnderstandingResult<reqwest::Response> {
        self.send(Method::POST, path, RequestBody::json(body)?).await
    }

    /// Send a PUT request with a JSON body.
    pub async fn put<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ContentUnderstandingResult<reqwest::Response> {
        self.send(Method::PUT, path, RequestBody::json(body)?).await
    }

    /// Send a PATCH request with a JSON merge-patch body.
    pub async fn patch<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ContentUnderstandingResult<reqwest::Response> {
        let body = RequestBody::json_with_content_type(body, "application/merge-patch+json")?;
        self.send(Method::PATCH, path, body).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> ContentUnderstandingResult<reqwest::Response> {
        self.send(Method::DELETE, path, RequestBody::Empty).await
    }

    /// Send a request with an arbitrary method and pre-built body.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> ContentUnderstandingResult<reqwest::Response> {
        let url = self.url(path)?;
        self.execute(method, url, body).await
    }

    /// Runs one request with automatic retry on retriable status codes.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: RequestBody,
    ) -> ContentUnderstandingResult<reqwest::Response> {
        let (auth_name, auth_value) = self.credential.header();

        for attempt in 0..=self.retry_policy.max_retries {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header(auth_name, &auth_value)
                .header("x-ms-useragent", &self.user_agent);

            if let RequestBody::Bytes { data, content_type } = &body {
                request = request
                    .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
                    .body(data.clone());
            }

            let response = request.send().await?;
            let status = response.status().as_u16();

            if response.status().is_success() {
                return Ok(response);
            }

            if !is_retriable_status(status) || attempt == self.retry_policy.max_retries {
                return Self::check_response(response).await;
            }

            let backoff = self.retry_policy.backoff(attempt);
            tracing::debug!(
                status,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                "retriable status, backing off",
            );
            tokio::time::sleep(backoff).await;
        }

        unreachable!("retry loop should return before reaching here")
    }

    /// Maximum length for error messages to prevent sensitive data leaks.
    const MAX_ERROR_MESSAGE_LEN: usize = 1000;

    /// Markers after which a secret value follows in error bodies.
    const SECRET_MARKERS: [&'static str; 3] = [
        "Bearer ",
        "Ocp-Apim-Subscription-Key: ",
        "subscription-key=",
    ];

    /// Sanitize error messages by redacting bearer tokens and subscription keys.
    pub(crate) fn sanitize_error_message(msg: &str) -> String {
        let mut result = msg.to_string();
        for marker in Self::SECRET_MARKERS {
            result = Self::redact_after(&result, marker);
        }
        result
    }

    fn redact_after(msg: &str, marker: &str) -> String {
        const REDACTED: &str = "[REDACTED]";

        let mut result = msg.to_string();
        let mut search_start = 0;
        while let Some(relative_pos) = result[search_start..].find(marker) {
            let secret_start = search_start + relative_pos + marker.len();
            if result[secret_start..].starts_with(REDACTED) {
                search_start = secret_start + REDACTED.len();
                continue;
            }

            let secret_end = result[secret_start..]
                .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ',' | '&'))
                .map(|pos| secret_start + pos)
                .unwrap_or(result.len());

            if secret_end > secret_start {
                result.replace_range(secret_start..secret_end, REDACTED);
                search_start = secret_start + REDACTED.len();
            } else {
                search_start = secret_start;
            }
        }
        result
    }

    /// Truncate a message if it exceeds the maximum length.
    /// Also sanitizes sensitive data before truncating.
    pub(crate) fn truncate_message(msg: &str) -> String {
        let sanitized = Self::sanitize_error_message(msg);

        if sanitized.len() > Self::MAX_ERROR_MESSAGE_LEN {
            let mut cut = Self::MAX_ERROR_MESSAGE_LEN;
            while !sanitized.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}... (truncated)", &sanitized[..cut])
        } else {
            sanitized
        }
    }

    /// Check the response status and return an error if not successful.
    async fn check_response(
        response: reqwest::Response,
    ) -> ContentUnderstandingResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if let Ok(error) = serde_json::from_str::<serde_json::Value>(&body) {
            if let Some(err_obj) = error.get("error") {
                return Err(ContentUnderstandingError::Validation {
                    status,
                    code: err_obj
                        .get("code")
                        .and_then(|c| c.as_str())
                        .map(str::to_string),
                    message: Self::truncate_message(
                        err_obj
                            .get("message")
                            .and_then(|m| m.as_str())
                            .unwrap_or(&body),
                    ),
                });
            }
        }

        Err(ContentUnderstandingError::Validation {
            status,
            code: None,
            message: Self::truncate_message(&body),
        })
    }
}

impl ContentUnderstandingClientBuilder {
    /// Set the resource endpoint URL.
    ///
    /// This should be in the format:
    /// `https://<resource-name>.services.ai.azure.com`
    ///
    /// If not set, the builder will check the `AZURE_CONTENT_UNDERSTANDING_ENDPOINT`
    /// environment variable.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the credential to use for authentication.
    ///
    /// If not set, the builder will use [`ContentUnderstandingCredential::from_env()`].
    pub fn credential(mut self, credential: ContentUnderstandingCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Set the API version.
    ///
    /// Defaults to [`DEFAULT_API_VERSION`].
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set a custom HTTP client.
    ///
    /// **Note:** If you provide a custom HTTP client, any timeout configuration
    /// via [`connect_timeout`](Self::connect_timeout) or
    /// [`read_timeout`](Self::read_timeout) will be ignored.
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the per-request read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the retry policy for transient errors.
    ///
    /// Defaults to 3 retries with 500ms initial backoff.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Set the `x-ms-useragent` header value.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No endpoint is provided and `AZURE_CONTENT_UNDERSTANDING_ENDPOINT` is not set
    /// - The endpoint URL is invalid
    /// - No credential is provided and none is found in the environment
    /// - The HTTP client cannot be constructed
    pub fn build(self) -> ContentUnderstandingResult<ContentUnderstandingClient> {
        let http = match self.http_client {
            Some(http) => http,
            None => reqwest::Client::builder()
                .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
                .timeout(self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT))
                .build()?,
        };

        let endpoint_str = self
            .endpoint
            .or_else(|| std::env::var(ENDPOINT_ENV).ok())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                ContentUnderstandingError::MissingConfig(format!(
                    "endpoint is required. Set it via builder or {ENDPOINT_ENV} env var."
                ))
            })?;

        let endpoint = Url::parse(&endpoint_str).map_err(|e| {
            ContentUnderstandingError::invalid_endpoint_with_source("invalid endpoint URL", e)
        })?;

        let credential = match self.credential {
            Some(credential) => credential,
            None => ContentUnderstandingCredential::from_env()?,
        };

        Ok(ContentUnderstandingClient {
            http,
            endpoint,
            credential,
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            retry_policy: self.retry_policy.unwrap_or_default(),
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use wiremock::matchers::{body_bytes, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(endpoint: &str) -> ContentUnderstandingClient {
        ContentUnderstandingClient::builder()
            .endpoint(endpoint)
            .credential(ContentUnderstandingCredential::api_key("test"))
            .build()
            .expect("should build")
    }

    #[test]
    #[serial]
    fn builder_requires_endpoint() {
        std::env::remove_var(ENDPOINT_ENV);

        let result = ContentUnderstandingClient::builder()
            .credential(ContentUnderstandingCredential::api_key("test"))
            .build();

        let err = result.expect_err("should require endpoint");
        assert!(matches!(err, ContentUnderstandingError::MissingConfig(_)));
    }

    #[test]
    #[serial]
    fn builder_uses_endpoint_from_env() {
        let original = std::env::var(ENDPOINT_ENV).ok();
        std::env::set_var(ENDPOINT_ENV, "https://env.services.ai.azure.com");

        let client = ContentUnderstandingClient::builder()
            .credential(ContentUnderstandingCredential::api_key("test"))
            .build()
            .expect("should build");

        assert_eq!(
            client.endpoint().as_str(),
            "https://env.services.ai.azure.com/"
        );

        match original {
            Some(val) => std::env::set_var(ENDPOINT_ENV, val),
            None => std::env::remove_var(ENDPOINT_ENV),
        }
    }

    #[test]
    #[serial]
    fn builder_endpoint_overrides_env() {
        let original = std::env::var(ENDPOINT_ENV).ok();
        std::env::set_var(ENDPOINT_ENV, "https://env.services.ai.azure.com");

        let client = test_client("https://explicit.services.ai.azure.com");
        assert_eq!(
            client.endpoint().as_str(),
            "https://explicit.services.ai.azure.com/"
        );

        match original {
            Some(val) => std::env::set_var(ENDPOINT_ENV, val),
            None => std::env::remove_var(ENDPOINT_ENV),
        }
    }

    #[test]
    fn builder_invalid_endpoint_url() {
        let result = ContentUnderstandingClient::builder()
            .endpoint("not a valid url")
            .credential(ContentUnderstandingCredential::api_key("test"))
            .build();

        assert!(matches!(
            result.unwrap_err(),
            ContentUnderstandingError::InvalidEndpoint { .. }
        ));
    }

    #[test]
    fn builder_uses_defaults() {
        let client = test_client("https://test.services.ai.azure.com");
        assert_eq!(client.api_version(), DEFAULT_API_VERSION);
        assert_eq!(client.retry_policy().max_retries, 3);
        assert_eq!(client.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn url_appends_api_version() {
        let client = ContentUnderstandingClient::builder()
            .endpoint("https://test.services.ai.azure.com")
            .credential(ContentUnderstandingCredential::api_key("test"))
            .api_version("2024-12-01-preview")
            .build()
            .expect("should build");

        let url = client
            .url("/contentunderstanding/analyzers/invoice")
            .expect("should join");
        assert_eq!(
            url.as_str(),
            "https://test.services.ai.azure.com/contentunderstanding/analyzers/invoice?api-version=2024-12-01-preview"
        );
    }

    #[test]
    fn url_keeps_existing_api_version() {
        let client = test_client("https://test.services.ai.azure.com");
        let url = client
            .url("contentunderstanding/analyzers?api-version=2024-12-01-preview")
            .expect("should join");
        assert_eq!(
            url.query_pairs().filter(|(k, _)| k == "api-version").count(),
            1
        );
    }

    #[test]
    fn same_origin_check() {
        let client = test_client("https://test.services.ai.azure.com");
        let own = Url::parse("https://test.services.ai.azure.com/contentunderstanding/x").unwrap();
        let other = Url::parse("https://evil.example.com/contentunderstanding/x").unwrap();
        assert!(client.is_same_origin(&own));
        assert!(!client.is_same_origin(&other));
    }

    #[test]
    fn retry_backoff_stays_within_jitter_bounds() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
        };
        for _ in 0..50 {
            let b = policy.backoff(2);
            assert!(b >= Duration::from_millis(300), "backoff {b:?}");
            assert!(b <= Duration::from_millis(500), "backoff {b:?}");
        }
    }

    // --- Wiremock integration tests ---

    async fn setup_mock_client(server: &MockServer) -> ContentUnderstandingClient {
        ContentUnderstandingClient::builder()
            .endpoint(server.uri())
            .credential(ContentUnderstandingCredential::api_key("test-api-key"))
            .retry_policy(RetryPolicy {
                max_retries: 2,
                initial_backoff: Duration::from_millis(1),
            })
            .build()
            .expect("should build client")
    }

    #[tokio::test]
    async fn get_sends_auth_and_api_version() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/contentunderstanding/analyzers"))
            .and(header("Ocp-Apim-Subscription-Key", "test-api-key"))
            .and(header("x-ms-useragent", DEFAULT_USER_AGENT))
            .and(query_param("api-version", DEFAULT_API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let response = client
            .get("/contentunderstanding/analyzers")
            .await
            .expect("should succeed");
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn bearer_token_is_sent_as_authorization() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/x"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = ContentUnderstandingClient::builder()
            .endpoint(server.uri())
            .credential(ContentUnderstandingCredential::bearer_token("tok"))
            .build()
            .expect("should build");
        client.get("/x").await.expect("should succeed");
    }

    #[tokio::test]
    async fn put_sends_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/contentunderstanding/analyzers/a1"))
            .and(header("content-type", "application/json"))
            .and(body_bytes(br#"{"baseAnalyzerId":"prebuilt-documentAnalyzer"}"#.to_vec()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let body = serde_json::json!({"baseAnalyzerId": "prebuilt-documentAnalyzer"});
        let response = client
            .put("/contentunderstanding/analyzers/a1", &body)
            .await
            .expect("should succeed");
        assert_eq!(response.status(), 201);
    }

    #[tokio::test]
    async fn binary_body_keeps_content_type() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header("content-type", "application/pdf"))
            .and(body_bytes(b"%PDF-1.7".to_vec()))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        client
            .send(
                Method::POST,
                "/upload",
                RequestBody::binary(&b"%PDF-1.7"[..], "application/pdf"),
            )
            .await
            .expect("should succeed");
    }

    #[tokio::test]
    async fn patch_uses_merge_patch_content_type() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/contentunderstanding/defaults"))
            .and(header("content-type", "application/merge-patch+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        client
            .patch("/contentunderstanding/defaults", &serde_json::json!({}))
            .await
            .expect("should succeed");
    }

    #[tokio::test]
    async fn error_body_with_error_object_maps_to_validation() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/contentunderstanding/analyzers/bad"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {
                    "code": "InvalidRequest",
                    "message": "Invalid field schema"
                }
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let err = client
            .put("/contentunderstanding/analyzers/bad", &serde_json::json!({}))
            .await
            .expect_err("should fail");

        match err {
            ContentUnderstandingError::Validation {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code.as_deref(), Some("InvalidRequest"));
                assert_eq!(message, "Invalid field schema");
            }
            other => panic!("Expected Validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_body_plain_text_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let err = client.get("/x").await.expect_err("should fail");
        match err {
            ContentUnderstandingError::Validation {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 401);
                assert!(code.is_none());
                assert_eq!(message, "Unauthorized");
            }
            other => panic!("Expected Validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retries_on_503_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let response = client.get("/x").await.expect("should succeed after retries");
        assert_eq!(response.status(), 200);

        let requests = server.received_requests().await.expect("recording enabled");
        assert_eq!(requests.len(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too many requests"))
            .expect(3)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let err = client.get("/x").await.expect_err("should fail");
        assert!(matches!(
            err,
            ContentUnderstandingError::Validation { status: 429, .. }
        ));
    }

    #[tokio::test]
    async fn does_not_retry_on_400() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let _ = client.post("/x", &serde_json::json!({})).await;
    }

    #[tokio::test]
    async fn connection_failure_is_transport_error() {
        // Nothing listens on port 9 on localhost in test environments.
        let client = ContentUnderstandingClient::builder()
            .endpoint("http://127.0.0.1:9")
            .credential(ContentUnderstandingCredential::api_key("test"))
            .connect_timeout(Duration::from_millis(200))
            .build()
            .expect("should build");

        let err = client.get("/x").await.expect_err("should fail");
        assert!(matches!(err, ContentUnderstandingError::Transport(_)));
    }

    #[tokio::test]
    async fn get_absolute_rejects_foreign_origin() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server).await;

        let foreign = Url::parse("https://elsewhere.example.com/op/1").unwrap();
        let err = client
            .get_absolute(&foreign)
            .await
            .expect_err("should refuse");
        assert!(matches!(err, ContentUnderstandingError::Protocol(_)));
    }

    #[tokio::test]
    async fn get_absolute_adds_api_version() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/contentunderstanding/analyzerResults/abc"))
            .and(query_param("api-version", DEFAULT_API_VERSION))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server).await;
        let url = Url::parse(&format!(
            "{}/contentunderstanding/analyzerResults/abc",
            server.uri()
        ))
        .unwrap();
        client.get_absolute(&url).await.expect("should succeed");
    }

    #[test]
    fn sanitization_redacts_bearer_tokens() {
        let msg = "Invalid token: Bearer eyJhbGciOi.abc, please retry";
        let sanitized = ContentUnderstandingClient::sanitize_error_message(msg);
        assert_eq!(sanitized, "Invalid token: Bearer [REDACTED], please retry");
    }

    #[test]
    fn sanitization_redacts_subscription_keys() {
        let msg = "header Ocp-Apim-Subscription-Key: 0123abcd rejected; url ?subscription-key=xyz&a=1";
        let sanitized = ContentUnderstandingClient::sanitize_error_message(msg);
        assert!(!sanitized.contains("0123abcd"));
        assert!(!sanitized.contains("xyz"));
        assert!(sanitized.contains("&a=1"));
    }

    #[test]
    fn sanitization_preserves_legitimate_errors() {
        let msg = "Analyzer 'invoice' not found";
        assert_eq!(ContentUnderstandingClient::sanitize_error_message(msg), msg);
    }

    #[test]
    fn truncation_applies_after_sanitization() {
        let long = format!("Bearer secret {}", "x".repeat(2000));
        let truncated = ContentUnderstandingClient::truncate_message(&long);
        assert!(!truncated.contains("secret"));
        assert!(truncated.ends_with("... (truncated)"));
    }
}
