//! Shared constants and path helpers for Content Understanding requests.

use azure_content_understanding_core::error::{
    ContentUnderstandingError, ContentUnderstandingResult,
};

/// Prebuilt base analyzer for documents (PDF, images of pages, Office files).
pub const PREBUILT_DOCUMENT_ANALYZER: &str = "prebuilt-documentAnalyzer";

/// Prebuilt base analyzer for images.
pub const PREBUILT_IMAGE_ANALYZER: &str = "prebuilt-imageAnalyzer";

/// Prebuilt base analyzer for audio.
pub const PREBUILT_AUDIO_ANALYZER: &str = "prebuilt-audioAnalyzer";

/// Prebuilt base analyzer for video.
pub const PREBUILT_VIDEO_ANALYZER: &str = "prebuilt-videoAnalyzer";

/// Prebuilt analyzer for call center conversations.
pub const PREBUILT_CALL_CENTER: &str = "prebuilt-callCenter";

const ANALYZERS_PATH: &str = "/contentunderstanding/analyzers";
const CLASSIFIERS_PATH: &str = "/contentunderstanding/classifiers";

/// Path of the analyzer collection.
pub(crate) fn analyzers_path() -> &'static str {
    ANALYZERS_PATH
}

/// Path of a single analyzer, with an optional `:action` suffix.
pub(crate) fn analyzer_path(analyzer_id: &str, action: Option<&str>) -> String {
    resource_path(ANALYZERS_PATH, analyzer_id, action)
}

/// Path of a single classifier, with an optional `:action` suffix.
pub(crate) fn classifier_path(classifier_id: &str, action: Option<&str>) -> String {
    resource_path(CLASSIFIERS_PATH, classifier_id, action)
}

fn resource_path(collection: &str, id: &str, action: Option<&str>) -> String {
    match action {
        Some(action) => format!("{collection}/{id}:{action}"),
        None => format!("{collection}/{id}"),
    }
}

/// Checks that `id` can be used verbatim as a path segment.
///
/// Analyzer and classifier ids start with a letter or digit and are limited to
/// letters, digits, `.`, `_` and `-`. Ids such as `..` would otherwise be
/// resolved as relative path segments.
pub(crate) fn validate_resource_id(kind: &str, id: &str) -> ContentUnderstandingResult<()> {
    let Some(first) = id.chars().next() else {
        return Err(ContentUnderstandingError::Builder(format!(
            "{kind} is required"
        )));
    };
    if !first.is_ascii_alphanumeric() {
        return Err(ContentUnderstandingError::Builder(format!(
            "{kind} must start with a letter or digit: {id}"
        )));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(ContentUnderstandingError::Builder(format!(
            "{kind} contains invalid character {c:?}: {id}"
        )));
    }
    Ok(())
}
