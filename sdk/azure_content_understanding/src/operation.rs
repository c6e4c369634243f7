//! Submission and polling of long-running operations.
//!
//! Every mutating Content Understanding call (create analyzer, analyze,
//! classify, create classifier) follows the same asynchronous pattern: the
//! submit request returns `200`/`201`/`202` with an `Operation-Location` header,
//! and the client polls that URL until the operation reaches `succeeded` or
//! `failed`. This module implements the pattern once:
//!
//! - [`submit`] sends the request and returns an [`OperationHandle`]
//! - [`get_status`] reads the operation once
//! - [`poll_until_complete`] polls to a terminal status under a caller-supplied
//!   timeout and returns the decoded [`ResultDocument`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use azure_content_understanding::operation::{self, PollOptions, SubmitBody};
//! use azure_content_understanding_core::client::ContentUnderstandingClient;
//! use reqwest::Method;
//! use std::time::Duration;
//!
//! # async fn example(client: &ContentUnderstandingClient) -> Result<(), Box<dyn std::error::Error>> {
//! let handle = operation::submit(
//!     client,
//!     Method::POST,
//!     "contentunderstanding/analyzers/prebuilt-documentAnalyzer:analyze",
//!     SubmitBody::Json(serde_json::json!({"url": "https://example.com/invoice.pdf"})),
//! )
//! .await?;
//!
//! let options = PollOptions::new(Duration::from_secs(120));
//! let result = operation::poll_until_complete(client, handle, &options).await?;
//! println!("{}", result.to_pretty_string()?);
//! # Ok(())
//! # }
//! ```

use azure_content_understanding_core::client::{ContentUnderstandingClient, RequestBody};
use azure_content_understanding_core::error::{
    ContentUnderstandingError, ContentUnderstandingResult,
};
use bytes::Bytes;
use reqwest::Method;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::result::{self, ResultDocument};

/// Header carrying the operation status URL.
pub const OPERATION_LOCATION_HEADER: &str = "Operation-Location";

/// Headers checked, in order, for the request correlation id.
const REQUEST_ID_HEADERS: [&str; 2] = ["apim-request-id", "x-ms-request-id"];

/// Default pause between two status reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Suggested timeout for single-document analysis and analyzer creation.
pub const STANDARD_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(300);

/// Suggested timeout for pro mode (multi-document reasoning) operations.
pub const PRO_MODE_TIMEOUT: Duration = Duration::from_secs(600);

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// The status of a long-running operation.
///
/// Parsed case-insensitively. Codes the SDK does not know are kept in
/// [`Other`](Self::Other) and treated as still in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    /// The operation has been accepted but not started.
    NotStarted,
    /// The operation is in progress.
    Running,
    /// The operation completed successfully.
    Succeeded,
    /// The operation failed.
    Failed,
    /// An interim status this SDK does not recognize, such as `queued`.
    Other(String),
}

impl OperationStatus {
    /// Parses a service status code.
    pub fn parse(code: &str) -> Self {
        match code.to_ascii_lowercase().as_str() {
            "notstarted" => Self::NotStarted,
            "running" => Self::Running,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            _ => Self::Other(code.to_string()),
        }
    }

    /// Returns `true` if the status is terminal (succeeded or failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// The status code as sent by the service (canonical casing for known codes).
    pub fn as_str(&self) -> &str {
        match self {
            Self::NotStarted => "notStarted",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Other(code) => code,
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OperationStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::parse(&code))
    }
}

// ---------------------------------------------------------------------------
// Handle and snapshot
// ---------------------------------------------------------------------------

/// A reference to a pending operation.
///
/// Returned by [`submit`] and consumed by [`poll_until_complete`], so a handle
/// is polled to completion at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct OperationHandle {
    location: Url,
    request_id: Option<String>,
}

impl OperationHandle {
    /// Creates a handle for an operation whose location is already known,
    /// for example one persisted from an earlier process.
    pub fn new(location: Url, request_id: Option<String>) -> Self {
        Self {
            location,
            request_id,
        }
    }

    /// The URL polled for the operation status.
    pub fn operation_location(&self) -> &Url {
        &self.location
    }

    /// The correlation id of the request that created the operation.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Builds a handle from a submission response.
    ///
    /// # Errors
    ///
    /// Returns [`ContentUnderstandingError::Protocol`] if the
    /// `Operation-Location` header is missing, is not a URL, or points
    /// outside the client's endpoint.
    pub fn from_response(
        client: &ContentUnderstandingClient,
        response: &reqwest::Response,
    ) -> ContentUnderstandingResult<Self> {
        let headers = response.headers();

        let raw = headers
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ContentUnderstandingError::Protocol(format!(
                    "{OPERATION_LOCATION_HEADER} header missing from {} response",
                    response.status().as_u16()
                ))
            })?;

        let location = match Url::parse(raw) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                client.endpoint().join(raw).map_err(|e| {
                    ContentUnderstandingError::Protocol(format!(
                        "invalid {OPERATION_LOCATION_HEADER} header: {e}"
                    ))
                })?
            }
            Err(e) => {
                return Err(ContentUnderstandingError::Protocol(format!(
                    "invalid {OPERATION_LOCATION_HEADER} header: {e}"
                )))
            }
        };

        if !client.is_same_origin(&location) {
            return Err(ContentUnderstandingError::Protocol(format!(
                "{OPERATION_LOCATION_HEADER} points outside the configured endpoint: {}",
                location.origin().ascii_serialization()
            )));
        }

        let request_id = REQUEST_ID_HEADERS
            .iter()
            .find_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
            .map(str::to_string);

        Ok(Self {
            location,
            request_id,
        })
    }
}

/// An error reported by a failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OperationError {
    /// The error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable error description.
    #[serde(default)]
    pub message: Option<String>,
}

/// The body of a single status read.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationSnapshot {
    /// Service-assigned operation id.
    #[serde(default)]
    pub id: Option<String>,

    /// Current status of the operation.
    pub status: OperationStatus,

    /// The result, present when status is `Succeeded`.
    #[serde(default)]
    pub result: Option<Value>,

    /// Error details, present when status is `Failed`.
    #[serde(default)]
    pub error: Option<OperationError>,
}

impl OperationSnapshot {
    fn from_document(doc: ResultDocument) -> ContentUnderstandingResult<Self> {
        serde_json::from_value(doc.into_value()).map_err(|e| {
            ContentUnderstandingError::Protocol(format!("unexpected operation status body: {e}"))
        })
    }

    /// Converts a succeeded snapshot into its result document.
    fn into_result(self) -> ContentUnderstandingResult<ResultDocument> {
        self.result.map(ResultDocument::new).ok_or_else(|| {
            ContentUnderstandingError::Protocol("succeeded operation carried no result".into())
        })
    }

    /// Converts a failed snapshot into the error reported to the caller.
    fn into_failure(self) -> ContentUnderstandingError {
        let error = self.error.unwrap_or(OperationError {
            code: None,
            message: None,
        });
        ContentUnderstandingError::OperationFailed {
            code: error.code.unwrap_or_else(|| "unknown".into()),
            message: error
                .message
                .unwrap_or_else(|| "operation failed without error details".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Timing of [`poll_until_complete`].
///
/// The timeout is always explicit. See [`STANDARD_ANALYSIS_TIMEOUT`] and
/// [`PRO_MODE_TIMEOUT`] for typical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    timeout: Duration,
    interval: Duration,
}

impl PollOptions {
    /// Creates options with the given overall timeout and a 1 second interval.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the pause between status reads.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The overall polling budget.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The pause between status reads.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

/// The body of a submission request.
#[derive(Debug, Clone)]
pub enum SubmitBody {
    /// A JSON document, such as an analyzer definition or `{"url": ...}`.
    Json(Value),
    /// Raw file content.
    Binary { data: Bytes, content_type: String },
}

impl SubmitBody {
    fn into_request_body(self) -> ContentUnderstandingResult<RequestBody> {
        match self {
            Self::Json(value) => RequestBody::json(&value),
            Self::Binary { data, content_type } => Ok(RequestBody::binary(data, content_type)),
        }
    }
}

/// Submit a request that starts a long-running operation.
///
/// # Errors
///
/// - [`ContentUnderstandingError::Transport`] on connection failure
/// - [`ContentUnderstandingError::Validation`] if the service rejects the request
/// - [`ContentUnderstandingError::Protocol`] if the response has no usable
///   `Operation-Location` header
///
/// # Tracing
///
/// Emits a span named `content_understanding::operation::submit` with fields
/// `method` and `path`.
#[tracing::instrument(
    name = "content_understanding::operation::submit",
    skip(client, body),
    fields(method = %method, path = %path)
)]
pub async fn submit(
    client: &ContentUnderstandingClient,
    method: Method,
    path: &str,
    body: SubmitBody,
) -> ContentUnderstandingResult<OperationHandle> {
    tracing::debug!("submitting operation");

    let response = client.send(method, path, body.into_request_body()?).await?;
    let handle = OperationHandle::from_response(client, &response)?;

    tracing::debug!(
        operation_location = %handle.location,
        request_id = handle.request_id().unwrap_or_default(),
        "operation submitted",
    );
    Ok(handle)
}

/// Read the current status of an operation once.
///
/// # Errors
///
/// Returns [`ContentUnderstandingError::MalformedResponse`] if the body is not
/// JSON, and [`ContentUnderstandingError::Protocol`] if it has no `status`.
#[tracing::instrument(
    name = "content_understanding::operation::get_status",
    skip(client, handle),
    fields(operation_location = %handle.location)
)]
pub async fn get_status(
    client: &ContentUnderstandingClient,
    handle: &OperationHandle,
) -> ContentUnderstandingResult<OperationSnapshot> {
    let response = client.get_absolute(&handle.location).await?;
    let body = response.bytes().await?;
    let snapshot = OperationSnapshot::from_document(result::decode(&body)?)?;

    tracing::trace!(status = %snapshot.status, "operation status read");
    Ok(snapshot)
}

/// Poll an operation until it reaches a terminal status.
///
/// The first read happens immediately. While the status is not terminal the
/// poller sleeps for the interval (shortened to end at the deadline) and reads
/// again. Each read is bounded by the deadline too, so the call returns within
/// the timeout even when a status request hangs.
///
/// # Errors
///
/// - [`ContentUnderstandingError::OperationFailed`] with the service's code
///   and message when the operation fails
/// - [`ContentUnderstandingError::Timeout`] with the last observed status when
///   the deadline passes first
/// - any error of [`get_status`], which aborts the wait
///
/// # Tracing
///
/// Emits a span named `content_understanding::operation::poll_until_complete`.
#[tracing::instrument(
    name = "content_understanding::operation::poll_until_complete",
    skip(client, handle, options),
    fields(operation_location = %handle.location, timeout = ?options.timeout)
)]
pub async fn poll_until_complete(
    client: &ContentUnderstandingClient,
    handle: OperationHandle,
    options: &PollOptions,
) -> ContentUnderstandingResult<ResultDocument> {
    poll_inner(client, handle, options, std::future::pending()).await
}

/// Like [`poll_until_complete`], but stops as soon as `cancel` completes.
///
/// Cancellation interrupts both an in-flight status read and the sleep
/// between reads.
///
/// # Errors
///
/// Returns [`ContentUnderstandingError::Cancelled`] carrying the last observed
/// status when `cancel` completes first, plus every error of
/// [`poll_until_complete`].
///
/// # Example
///
/// ```rust,no_run
/// # use azure_content_understanding::operation::{self, OperationHandle, PollOptions};
/// # use azure_content_understanding_core::client::ContentUnderstandingClient;
/// # async fn example(client: &ContentUnderstandingClient, handle: OperationHandle) -> azure_content_understanding_core::error::ContentUnderstandingResult<()> {
/// let options = PollOptions::new(operation::PRO_MODE_TIMEOUT);
/// let ctrl_c = async {
///     let _ = tokio::signal::ctrl_c().await;
/// };
/// let result = operation::poll_until_complete_with_cancel(client, handle, &options, ctrl_c).await?;
/// # Ok(())
/// # }
/// ```
#[tracing::instrument(
    name = "content_understanding::operation::poll_until_complete",
    skip(client, handle, options, cancel),
    fields(operation_location = %handle.location, timeout = ?options.timeout)
)]
pub async fn poll_until_complete_with_cancel<C>(
    client: &ContentUnderstandingClient,
    handle: OperationHandle,
    options: &PollOptions,
    cancel: C,
) -> ContentUnderstandingResult<ResultDocument>
where
    C: Future<Output = ()>,
{
    poll_inner(client, handle, options, cancel).await
}

/// Submit a request and poll the resulting operation to completion.
pub async fn submit_and_wait(
    client: &ContentUnderstandingClient,
    method: Method,
    path: &str,
    body: SubmitBody,
    options: &PollOptions,
) -> ContentUnderstandingResult<ResultDocument> {
    let handle = submit(client, method, path, body).await?;
    poll_until_complete(client, handle, options).await
}

async fn poll_inner<C>(
    client: &ContentUnderstandingClient,
    handle: OperationHandle,
    options: &PollOptions,
    cancel: C,
) -> ContentUnderstandingResult<ResultDocument>
where
    C: Future<Output = ()>,
{
    tokio::pin!(cancel);

    let started = Instant::now();
    let deadline = started + options.timeout;
    let mut last_status: Option<OperationStatus> = None;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        // A read still in flight at the deadline is abandoned.
        let read = tokio::time::timeout_at(deadline, get_status(client, &handle));
        let snapshot = tokio::select! {
            biased;
            () = &mut cancel => return Err(cancelled(last_status)),
            outcome = read => match outcome {
                Ok(snapshot) => snapshot?,
                Err(_) => return Err(timed_out(last_status, started, attempt)),
            },
        };

        if snapshot.status.is_terminal() {
            return settle(snapshot, attempt);
        }

        let pause = options
            .interval
            .min(deadline.saturating_duration_since(Instant::now()));
        tracing::trace!(
            status = %snapshot.status,
            attempt,
            "operation still in progress, waiting",
        );
        last_status = Some(snapshot.status);

        tokio::select! {
            biased;
            () = &mut cancel => return Err(cancelled(last_status)),
            () = tokio::time::sleep(pause) => {}
        }

        if Instant::now() >= deadline {
            return Err(timed_out(last_status, started, attempt));
        }
    }
}

/// Turns a terminal snapshot into the poller's outcome.
fn settle(
    snapshot: OperationSnapshot,
    attempt: u32,
) -> ContentUnderstandingResult<ResultDocument> {
    if snapshot.status == OperationStatus::Succeeded {
        tracing::debug!(attempt, "operation succeeded");
        snapshot.into_result()
    } else {
        let err = snapshot.into_failure();
        tracing::debug!(attempt, error = %err, "operation failed");
        Err(err)
    }
}

fn timed_out(
    last_status: Option<OperationStatus>,
    started: Instant,
    attempt: u32,
) -> ContentUnderstandingError {
    let last_status = last_status.map_or_else(|| "none".to_string(), |s| s.to_string());
    tracing::debug!(attempt, status = %last_status, "operation timed out");
    ContentUnderstandingError::Timeout {
        last_status,
        elapsed: started.elapsed(),
    }
}

fn cancelled(last_status: Option<OperationStatus>) -> ContentUnderstandingError {
    tracing::debug!("operation polling cancelled");
    ContentUnderstandingError::Cancelled {
        last_status: last_status.map(|s| s.to_string()),
    }
}
