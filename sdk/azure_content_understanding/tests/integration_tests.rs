//! Integration tests for azure_content_understanding.
//!
//! These tests require a live Azure AI Content Understanding resource.
//! Run with: `cargo test --features integration-tests`
//!
//! Required environment variables:
//! - `AZURE_CONTENT_UNDERSTANDING_ENDPOINT`: The resource endpoint URL
//! - `AZURE_CONTENT_UNDERSTANDING_KEY`: The resource key
//!
//! Optional:
//! - `AZURE_CONTENT_UNDERSTANDING_SAMPLE_URL`: A publicly reachable PDF

#![cfg(feature = "integration-tests")]

use azure_content_understanding::analyzer::{
    self, AnalyzerDefinition, FieldDefinition, FieldMethod, FieldSchema,
};
use azure_content_understanding::models::PREBUILT_DOCUMENT_ANALYZER;
use azure_content_understanding::operation::{PollOptions, STANDARD_ANALYSIS_TIMEOUT};
use azure_content_understanding::{analyze, defaults};
use azure_content_understanding_core::client::ContentUnderstandingClient;
use azure_content_understanding_core::error::ContentUnderstandingError;
use std::time::Duration;

const DEFAULT_SAMPLE_URL: &str =
    "https://github.com/Azure-Samples/azure-ai-content-understanding-python/raw/refs/heads/main/data/invoice.pdf";

fn get_client() -> ContentUnderstandingClient {
    // Endpoint and key are read from the environment by the builder.
    ContentUnderstandingClient::builder()
        .build()
        .expect("Failed to build client")
}

fn sample_url() -> String {
    std::env::var("AZURE_CONTENT_UNDERSTANDING_SAMPLE_URL")
        .unwrap_or_else(|_| DEFAULT_SAMPLE_URL.to_string())
}

fn unique_id(prefix: &str) -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{prefix}-{millis}")
}

#[tokio::test]
async fn test_defaults_readable() {
    let client = get_client();
    defaults::get(&client).await.expect("get defaults");
}

#[tokio::test]
async fn test_analyze_url_with_prebuilt_analyzer() {
    let client = get_client();
    let options = PollOptions::new(STANDARD_ANALYSIS_TIMEOUT).with_interval(Duration::from_secs(2));

    let result = analyze::analyze_url(&client, PREBUILT_DOCUMENT_ANALYZER, &sample_url(), &options)
        .await
        .expect("analyze url");
    assert!(!result.contents().is_empty());
    assert!(result.markdown().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn test_analyzer_lifecycle() {
    let client = get_client();
    let analyzer_id = unique_id("it-invoice");
    let options = PollOptions::new(STANDARD_ANALYSIS_TIMEOUT).with_interval(Duration::from_secs(2));

    let definition = AnalyzerDefinition::builder()
        .base_analyzer_id(PREBUILT_DOCUMENT_ANALYZER)
        .description("Integration test analyzer")
        .config("returnDetails", true)
        .field_schema(
            FieldSchema::new("InvoiceFields").field(
                "VendorName",
                FieldDefinition::string()
                    .method(FieldMethod::Extract)
                    .description("Name of the vendor"),
            ),
        )
        .build()
        .expect("valid definition");

    analyzer::create(&client, &analyzer_id, &definition, &options)
        .await
        .expect("create analyzer");

    let info = analyzer::get(&client, &analyzer_id).await.expect("get analyzer");
    assert_eq!(info.analyzer_id, analyzer_id);

    let all = analyzer::list(&client).await.expect("list analyzers");
    assert!(all.iter().any(|a| a.analyzer_id == analyzer_id));

    let result = analyze::analyze_url(&client, &analyzer_id, &sample_url(), &options)
        .await
        .expect("analyze with custom analyzer");
    assert!(result.fields().is_some_and(|f| f.contains_key("VendorName")));

    analyzer::delete(&client, &analyzer_id).await.expect("delete analyzer");

    let err = analyzer::get(&client, &analyzer_id)
        .await
        .expect_err("deleted analyzer should be gone");
    assert!(matches!(
        err,
        ContentUnderstandingError::Validation { status: 404, .. }
    ));
}

#[tokio::test]
async fn test_tiny_timeout_reports_last_status() {
    let client = get_client();
    let options = PollOptions::new(Duration::ZERO);

    let err = analyze::analyze_url(&client, PREBUILT_DOCUMENT_ANALYZER, &sample_url(), &options)
        .await
        .expect_err("zero timeout should not wait for completion");
    assert!(
        matches!(err, ContentUnderstandingError::Timeout { .. }),
        "got {err:?}"
    );
}
