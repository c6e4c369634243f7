//! Helpers for testing code built on this crate against a `wiremock` server.
//!
//! Enabled with the `test-support` feature.

use crate::auth::ContentUnderstandingCredential;
use crate::client::{ContentUnderstandingClient, RetryPolicy};
use std::time::Duration;
use wiremock::MockServer;

/// Test API key (not a real key).
pub const TEST_API_KEY: &str = "test-api-key";

/// Create a client connected to a mock server.
///
/// Retries use a 1ms backoff so tests exercising retriable statuses stay fast.
pub async fn setup_mock_client(server: &MockServer) -> ContentUnderstandingClient {
    ContentUnderstandingClient::builder()
        .endpoint(server.uri())
        .credential(ContentUnderstandingCredential::api_key(TEST_API_KEY))
        .retry_policy(RetryPolicy {
            max_retries: 1,
            initial_backoff: Duration::from_millis(1),
        })
        .build()
        .expect("should build client")
}
