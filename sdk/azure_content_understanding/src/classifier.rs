//! Classifiers: split a file into typed documents and route each one to an
//! analyzer.

use azure_content_understanding_core::client::ContentUnderstandingClient;
use azure_content_understanding_core::error::{
    ContentUnderstandingError, ContentUnderstandingResult,
};
use bytes::Bytes;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::analyze::content_type_for_path;
use crate::models::{classifier_path, validate_resource_id};
use crate::operation::{self, OperationHandle, PollOptions, SubmitBody};
use crate::result::ResultDocument;

/// How a multi-document file is split before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SplitMode {
    /// Let the service detect document boundaries.
    Auto,
    /// Classify the whole file as one document.
    None,
    /// Classify every page separately.
    PerPage,
}

/// A category the classifier can assign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierCategory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Analyzer that documents of this category are routed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer_id: Option<String>,
}

impl ClassifierCategory {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            analyzer_id: None,
        }
    }

    /// Route documents of this category to `analyzer_id`.
    pub fn analyzer_id(mut self, analyzer_id: impl Into<String>) -> Self {
        self.analyzer_id = Some(analyzer_id.into());
        self
    }
}

/// The body of a create-classifier request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    split_mode: Option<SplitMode>,
    categories: BTreeMap<String, ClassifierCategory>,
}

impl ClassifierDefinition {
    pub fn builder() -> ClassifierDefinitionBuilder {
        ClassifierDefinitionBuilder::default()
    }

    pub fn split_mode(&self) -> Option<SplitMode> {
        self.split_mode
    }

    pub fn categories(&self) -> &BTreeMap<String, ClassifierCategory> {
        &self.categories
    }
}

/// Builder for [`ClassifierDefinition`].
#[derive(Debug, Default)]
pub struct ClassifierDefinitionBuilder {
    description: Option<String>,
    split_mode: Option<SplitMode>,
    categories: BTreeMap<String, ClassifierCategory>,
}

impl ClassifierDefinitionBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn split_mode(mut self, mode: SplitMode) -> Self {
        self.split_mode = Some(mode);
        self
    }

    pub fn category(mut self, name: impl Into<String>, category: ClassifierCategory) -> Self {
        self.categories.insert(name.into(), category);
        self
    }

    /// Builds the definition.
    ///
    /// # Errors
    ///
    /// Returns [`ContentUnderstandingError::Builder`] if no category was added,
    /// a category name is empty, or a routed analyzer id is invalid.
    pub fn build(self) -> ContentUnderstandingResult<ClassifierDefinition> {
        if self.categories.is_empty() {
            return Err(ContentUnderstandingError::Builder(
                "classifier needs at least one category".into(),
            ));
        }
        if self.categories.contains_key("") {
            return Err(ContentUnderstandingError::Builder(
                "category name cannot be empty".into(),
            ));
        }
        for category in self.categories.values() {
            if let Some(analyzer_id) = &category.analyzer_id {
                validate_resource_id("analyzer_id", analyzer_id)?;
            }
        }

        Ok(ClassifierDefinition {
            description: self.description,
            split_mode: self.split_mode,
            categories: self.categories,
        })
    }
}

/// Submit a classifier for creation (or replacement).
#[tracing::instrument(
    name = "content_understanding::classifier::begin_create",
    skip(client, definition),
    fields(classifier_id = %classifier_id, categories = definition.categories.len())
)]
pub async fn begin_create(
    client: &ContentUnderstandingClient,
    classifier_id: &str,
    definition: &ClassifierDefinition,
) -> ContentUnderstandingResult<OperationHandle> {
    validate_resource_id("classifier_id", classifier_id)?;
    tracing::debug!("creating classifier");

    operation::submit(
        client,
        Method::PUT,
        &classifier_path(classifier_id, None),
        SubmitBody::Json(serde_json::to_value(definition)?),
    )
    .await
}

/// Create a classifier and wait until it is ready.
pub async fn create(
    client: &ContentUnderstandingClient,
    classifier_id: &str,
    definition: &ClassifierDefinition,
    options: &PollOptions,
) -> ContentUnderstandingResult<ResultDocument> {
    let handle = begin_create(client, classifier_id, definition).await?;
    operation::poll_until_complete(client, handle, options).await
}

/// Start classifying in-memory content.
#[tracing::instrument(
    name = "content_understanding::classifier::begin_classify_binary",
    skip(client, data),
    fields(classifier_id = %classifier_id, content_type = %content_type)
)]
pub async fn begin_classify_binary(
    client: &ContentUnderstandingClient,
    classifier_id: &str,
    data: impl Into<Bytes>,
    content_type: &str,
) -> ContentUnderstandingResult<OperationHandle> {
    validate_resource_id("classifier_id", classifier_id)?;
    operation::submit(
        client,
        Method::POST,
        &classifier_path(classifier_id, Some("classify")),
        SubmitBody::Binary {
            data: data.into(),
            content_type: content_type.to_string(),
        },
    )
    .await
}

/// Start classifying a local file.
pub async fn begin_classify_file(
    client: &ContentUnderstandingClient,
    classifier_id: &str,
    path: impl AsRef<Path>,
) -> ContentUnderstandingResult<OperationHandle> {
    let path = path.as_ref();
    let data = tokio::fs::read(path).await?;
    begin_classify_binary(client, classifier_id, data, content_type_for_path(path)).await
}

/// Classify a local file and wait for the result.
pub async fn classify_file(
    client: &ContentUnderstandingClient,
    classifier_id: &str,
    path: impl AsRef<Path>,
    options: &PollOptions,
) -> ContentUnderstandingResult<ResultDocument> {
    let handle = begin_classify_file(client, classifier_id, path).await?;
    operation::poll_until_complete(client, handle, options).await
}

/// Delete a classifier.
#[tracing::instrument(
    name = "content_understanding::classifier::delete",
    skip(client),
    fields(classifier_id = %classifier_id)
)]
pub async fn delete(
    client: &ContentUnderstandingClient,
    classifier_id: &str,
) -> ContentUnderstandingResult<()> {
    validate_resource_id("classifier_id", classifier_id)?;
    client.delete(&classifier_path(classifier_id, None)).await?;
    tracing::debug!("classifier deleted");
    Ok(())
}
