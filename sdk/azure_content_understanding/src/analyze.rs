//! Running analyzers over content.
//!
//! Every function here starts an analyze operation on an existing analyzer.
//! The `begin_*` functions return the [`OperationHandle`] right after
//! submission; the others also poll until the result is available.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azure_content_understanding::analyze;
//! use azure_content_understanding::models::PREBUILT_DOCUMENT_ANALYZER;
//! use azure_content_understanding::operation::{PollOptions, STANDARD_ANALYSIS_TIMEOUT};
//! use azure_content_understanding_core::client::ContentUnderstandingClient;
//!
//! # async fn example(client: &ContentUnderstandingClient) -> Result<(), Box<dyn std::error::Error>> {
//! let options = PollOptions::new(STANDARD_ANALYSIS_TIMEOUT);
//! let result = analyze::analyze_file(
//!     client,
//!     PREBUILT_DOCUMENT_ANALYZER,
//!     "data/invoice.pdf",
//!     &options,
//! )
//! .await?;
//! println!("{}", result.markdown().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use azure_content_understanding_core::client::ContentUnderstandingClient;
use azure_content_understanding_core::error::ContentUnderstandingResult;
use bytes::Bytes;
use reqwest::Method;
use serde_json::json;
use std::path::Path;

use crate::models::{analyzer_path, validate_resource_id};
use crate::operation::{self, OperationHandle, PollOptions, SubmitBody};
use crate::result::ResultDocument;

const ANALYZE_ACTION: &str = "analyze";

/// Content type used when uploading a file, derived from its extension.
///
/// Conversation transcripts (`.json`) are sent as JSON, everything else as
/// an opaque byte stream that the service sniffs.
pub fn content_type_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Start analyzing a document reachable by URL.
///
/// # Tracing
///
/// Emits a span named `content_understanding::analyze::begin_analyze_url`
/// with field `analyzer_id`.
#[tracing::instrument(
    name = "content_understanding::analyze::begin_analyze_url",
    skip(client, url),
    fields(analyzer_id = %analyzer_id)
)]
pub async fn begin_analyze_url(
    client: &ContentUnderstandingClient,
    analyzer_id: &str,
    url: &str,
) -> ContentUnderstandingResult<OperationHandle> {
    validate_resource_id("analyzer_id", analyzer_id)?;
    operation::submit(
        client,
        Method::POST,
        &analyzer_path(analyzer_id, Some(ANALYZE_ACTION)),
        SubmitBody::Json(json!({ "url": url })),
    )
    .await
}

/// Start analyzing several documents together, as pro mode analyzers do.
#[tracing::instrument(
    name = "content_understanding::analyze::begin_analyze_urls",
    skip(client, urls),
    fields(analyzer_id = %analyzer_id, inputs = urls.len())
)]
pub async fn begin_analyze_urls(
    client: &ContentUnderstandingClient,
    analyzer_id: &str,
    urls: &[&str],
) -> ContentUnderstandingResult<OperationHandle> {
    validate_resource_id("analyzer_id", analyzer_id)?;
    let inputs: Vec<_> = urls.iter().map(|url| json!({ "url": url })).collect();
    operation::submit(
        client,
        Method::POST,
        &analyzer_path(analyzer_id, Some(ANALYZE_ACTION)),
        SubmitBody::Json(json!({ "inputs": inputs })),
    )
    .await
}

/// Start analyzing in-memory content.
#[tracing::instrument(
    name = "content_understanding::analyze::begin_analyze_binary",
    skip(client, data),
    fields(analyzer_id = %analyzer_id, content_type = %content_type)
)]
pub async fn begin_analyze_binary(
    client: &ContentUnderstandingClient,
    analyzer_id: &str,
    data: impl Into<Bytes>,
    content_type: &str,
) -> ContentUnderstandingResult<OperationHandle> {
    validate_resource_id("analyzer_id", analyzer_id)?;
    let data = data.into();
    tracing::debug!(bytes = data.len(), "uploading content");
    operation::submit(
        client,
        Method::POST,
        &analyzer_path(analyzer_id, Some(ANALYZE_ACTION)),
        SubmitBody::Binary {
            data,
            content_type: content_type.to_string(),
        },
    )
    .await
}

/// Start analyzing a local file.
///
/// # Errors
///
/// Returns [`Io`](azure_content_understanding_core::error::ContentUnderstandingError::Io)
/// if the file cannot be read, before anything is sent.
pub async fn begin_analyze_file(
    client: &ContentUnderstandingClient,
    analyzer_id: &str,
    path: impl AsRef<Path>,
) -> ContentUnderstandingResult<OperationHandle> {
    let path = path.as_ref();
    let data = tokio::fs::read(path).await?;
    begin_analyze_binary(client, analyzer_id, data, content_type_for_path(path)).await
}

/// Analyze a document reachable by URL and wait for the result.
pub async fn analyze_url(
    client: &ContentUnderstandingClient,
    analyzer_id: &str,
    url: &str,
    options: &PollOptions,
) -> ContentUnderstandingResult<ResultDocument> {
    let handle = begin_analyze_url(client, analyzer_id, url).await?;
    operation::poll_until_complete(client, handle, options).await
}

/// Analyze in-memory content and wait for the result.
pub async fn analyze_binary(
    client: &ContentUnderstandingClient,
    analyzer_id: &str,
    data: impl Into<Bytes>,
    content_type: &str,
    options: &PollOptions,
) -> ContentUnderstandingResult<ResultDocument> {
    let handle = begin_analyze_binary(client, analyzer_id, data, content_type).await?;
    operation::poll_until_complete(client, handle, options).await
}

/// Analyze a local file and wait for the result.
pub async fn analyze_file(
    client: &ContentUnderstandingClient,
    analyzer_id: &str,
    path: impl AsRef<Path>,
    options: &PollOptions,
) -> ContentUnderstandingResult<ResultDocument> {
    let handle = begin_analyze_file(client, analyzer_id, path).await?;
    operation::poll_until_complete(client, handle, options).await
}
