//! Analyzer definitions and analyzer management.
//!
//! An analyzer describes what to extract from content: a base analyzer, a
//! processing configuration and a field schema. Creating an analyzer is a
//! long-running operation; reading, listing and deleting are plain requests.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azure_content_understanding::analyzer::{
//!     self, AnalyzerDefinition, FieldDefinition, FieldMethod, FieldSchema,
//! };
//! use azure_content_understanding::models::PREBUILT_DOCUMENT_ANALYZER;
//! use azure_content_understanding::operation::{PollOptions, STANDARD_ANALYSIS_TIMEOUT};
//! use azure_content_understanding_core::client::ContentUnderstandingClient;
//!
//! # async fn example(client: &ContentUnderstandingClient) -> Result<(), Box<dyn std::error::Error>> {
//! let schema = FieldSchema::new("InvoiceFields")
//!     .description("Fields of a vendor invoice")
//!     .field(
//!         "VendorName",
//!         FieldDefinition::string()
//!             .method(FieldMethod::Extract)
//!             .description("Name of the vendor"),
//!     )
//!     .field(
//!         "Items",
//!         FieldDefinition::array(FieldDefinition::object([
//!             ("Description", FieldDefinition::string()),
//!             ("Amount", FieldDefinition::number()),
//!         ])),
//!     );
//!
//! let definition = AnalyzerDefinition::builder()
//!     .base_analyzer_id(PREBUILT_DOCUMENT_ANALYZER)
//!     .description("Invoice extraction")
//!     .config("returnDetails", true)
//!     .field_schema(schema)
//!     .build()?;
//!
//! let options = PollOptions::new(STANDARD_ANALYSIS_TIMEOUT);
//! analyzer::create(client, "invoice-v1", &definition, &options).await?;
//! # Ok(())
//! # }
//! ```

use azure_content_understanding_core::client::ContentUnderstandingClient;
use azure_content_understanding_core::error::{
    ContentUnderstandingError, ContentUnderstandingResult,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use url::Url;

use crate::models::{analyzer_path, analyzers_path, validate_resource_id};
use crate::operation::{self, OperationHandle, PollOptions, SubmitBody};
use crate::result::{read_json, ResultDocument};

// ---------------------------------------------------------------------------
// Field schema
// ---------------------------------------------------------------------------

/// How a field value is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldMethod {
    /// Read the value as it appears in the content.
    Extract,
    /// Generate the value from the content (summaries, inferred values).
    Generate,
    /// Pick one of the field's enum values.
    Classify,
}

/// The type of a field, including nested structure.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Date,
    Time,
    /// A list whose items follow the given definition.
    Array(Box<FieldDefinition>),
    /// A nested object with named properties.
    Object(BTreeMap<String, FieldDefinition>),
    /// A reference into the schema's `definitions`, e.g. `#/$defs/LineItem`.
    Ref(String),
}

/// A single field of an analyzer's schema.
///
/// Construct with one of the type constructors and refine with the chained
/// setters:
///
/// ```rust
/// use azure_content_understanding::analyzer::{FieldDefinition, FieldMethod};
///
/// let field = FieldDefinition::string()
///     .method(FieldMethod::Classify)
///     .description("Document language")
///     .enum_values(["en", "fr", "de"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "FieldRepr", try_from = "FieldRepr")]
pub struct FieldDefinition {
    kind: FieldType,
    method: Option<FieldMethod>,
    description: Option<String>,
    enum_values: Vec<String>,
    extra: Map<String, Value>,
}

impl FieldDefinition {
    fn of(kind: FieldType) -> Self {
        Self {
            kind,
            method: None,
            description: None,
            enum_values: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn string() -> Self {
        Self::of(FieldType::String)
    }

    pub fn number() -> Self {
        Self::of(FieldType::Number)
    }

    pub fn integer() -> Self {
        Self::of(FieldType::Integer)
    }

    pub fn boolean() -> Self {
        Self::of(FieldType::Boolean)
    }

    pub fn date() -> Self {
        Self::of(FieldType::Date)
    }

    pub fn time() -> Self {
        Self::of(FieldType::Time)
    }

    /// A list of `item`.
    pub fn array(item: FieldDefinition) -> Self {
        Self::of(FieldType::Array(Box::new(item)))
    }

    /// An object with the given properties.
    pub fn object<K, I>(properties: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldDefinition)>,
    {
        Self::of(FieldType::Object(
            properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// A reference to a shared definition.
    pub fn reference(target: impl Into<String>) -> Self {
        Self::of(FieldType::Ref(target.into()))
    }

    /// Sets how the value is obtained.
    pub fn method(mut self, method: FieldMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the description given to the model.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restricts the value to a fixed set, typically with [`FieldMethod::Classify`].
    pub fn enum_values<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Sets a property the SDK does not model, such as `examples`.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> &FieldType {
        &self.kind
    }

    pub fn field_method(&self) -> Option<FieldMethod> {
        self.method
    }
}

/// Wire shape of a field: a flat object keyed by `type`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldRepr {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    field_type: Option<String>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<FieldMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    enum_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Box<FieldDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<BTreeMap<String, FieldDefinition>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<FieldDefinition> for FieldRepr {
    fn from(field: FieldDefinition) -> Self {
        let mut repr = FieldRepr {
            field_type: None,
            reference: None,
            method: field.method,
            description: field.description,
            enum_values: field.enum_values,
            items: None,
            properties: None,
            extra: field.extra,
        };
        let type_name = match field.kind {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Array(item) => {
                repr.items = Some(item);
                "array"
            }
            FieldType::Object(properties) => {
                repr.properties = Some(properties);
                "object"
            }
            FieldType::Ref(target) => {
                repr.reference = Some(target);
                return repr;
            }
        };
        repr.field_type = Some(type_name.to_string());
        repr
    }
}

impl TryFrom<FieldRepr> for FieldDefinition {
    type Error = String;

    fn try_from(repr: FieldRepr) -> Result<Self, Self::Error> {
        let kind = match (repr.field_type.as_deref(), repr.reference) {
            (Some(_), Some(_)) => return Err("field cannot have both `type` and `$ref`".into()),
            (None, Some(target)) => FieldType::Ref(target),
            (None, None) => return Err("field has neither `type` nor `$ref`".into()),
            (Some("string"), _) => FieldType::String,
            (Some("number"), _) => FieldType::Number,
            (Some("integer"), _) => FieldType::Integer,
            (Some("boolean"), _) => FieldType::Boolean,
            (Some("date"), _) => FieldType::Date,
            (Some("time"), _) => FieldType::Time,
            (Some("array"), _) => FieldType::Array(
                repr.items
                    .ok_or_else(|| "array field is missing `items`".to_string())?,
            ),
            (Some("object"), _) => FieldType::Object(repr.properties.unwrap_or_default()),
            (Some(other), _) => return Err(format!("unknown field type `{other}`")),
        };
        Ok(Self {
            kind,
            method: repr.method,
            description: repr.description,
            enum_values: repr.enum_values,
            extra: repr.extra,
        })
    }
}

/// The set of fields an analyzer extracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    fields: BTreeMap<String, FieldDefinition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    definitions: BTreeMap<String, FieldDefinition>,
}

impl FieldSchema {
    /// Creates an empty schema with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: None,
            fields: BTreeMap::new(),
            definitions: BTreeMap::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds (or replaces) a field.
    pub fn field(mut self, name: impl Into<String>, field: FieldDefinition) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Adds a shared definition that fields can point to with [`FieldDefinition::reference`].
    pub fn definition(mut self, name: impl Into<String>, field: FieldDefinition) -> Self {
        self.definitions.insert(name.into(), field);
        self
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldDefinition> {
        &self.fields
    }
}

// ---------------------------------------------------------------------------
// Analyzer definition
// ---------------------------------------------------------------------------

/// Processing mode of an analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerMode {
    /// Single-document extraction.
    Standard,
    /// Multi-document reasoning over reference knowledge. Needs a longer
    /// polling timeout, see [`operation::PRO_MODE_TIMEOUT`].
    Pro,
}

/// A blob container location, addressed by a SAS URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobSource {
    /// Container URL including a SAS token with read and list permissions.
    pub container_url: String,
    /// Only blobs under this prefix are used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Path of a file listing the blobs to use, relative to the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_list_path: Option<String>,
}

impl BlobSource {
    pub fn new(container_url: impl Into<String>) -> Self {
        Self {
            container_url: container_url.into(),
            prefix: None,
            file_list_path: None,
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn file_list_path(mut self, path: impl Into<String>) -> Self {
        self.file_list_path = Some(path.into());
        self
    }
}

/// Labeled samples used to improve extraction quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TrainingData {
    Blob(BlobSource),
}

/// Reference documents a pro mode analyzer reasons against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum KnowledgeSource {
    Reference(BlobSource),
}

/// The body of a create-analyzer request.
///
/// Build one with [`AnalyzerDefinition::builder`], or load a JSON template
/// with [`AnalyzerDefinition::from_json`] / [`AnalyzerDefinition::from_file`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_analyzer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mode: Option<AnalyzerMode>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    field_schema: Option<FieldSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    training_data: Option<TrainingData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    knowledge_sources: Vec<KnowledgeSource>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    tags: BTreeMap<String, String>,
    /// Template keys the SDK does not model are passed through unchanged.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl AnalyzerDefinition {
    /// Creates a new builder for an analyzer definition.
    pub fn builder() -> AnalyzerDefinitionBuilder {
        AnalyzerDefinitionBuilder::default()
    }

    /// Parses an analyzer template.
    ///
    /// # Errors
    ///
    /// Returns [`ContentUnderstandingError::Builder`] if the template does not
    /// have the shape of an analyzer definition.
    pub fn from_json(value: Value) -> ContentUnderstandingResult<Self> {
        serde_json::from_value(value).map_err(|e| {
            ContentUnderstandingError::Builder(format!("invalid analyzer template: {e}"))
        })
    }

    /// Reads and parses an analyzer template file.
    pub async fn from_file(path: impl AsRef<Path>) -> ContentUnderstandingResult<Self> {
        let raw = tokio::fs::read(path.as_ref()).await?;
        let value: Value = serde_json::from_slice(&raw).map_err(|e| {
            ContentUnderstandingError::Builder(format!(
                "analyzer template {} is not JSON: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json(value)
    }

    pub fn base_analyzer_id(&self) -> Option<&str> {
        self.base_analyzer_id.as_deref()
    }

    pub fn mode(&self) -> Option<AnalyzerMode> {
        self.mode
    }

    pub fn field_schema(&self) -> Option<&FieldSchema> {
        self.field_schema.as_ref()
    }
}

/// Builder for [`AnalyzerDefinition`].
#[derive(Debug, Default)]
pub struct AnalyzerDefinitionBuilder {
    base_analyzer_id: Option<String>,
    description: Option<String>,
    mode: Option<AnalyzerMode>,
    config: Map<String, Value>,
    field_schema: Option<FieldSchema>,
    training_data: Option<TrainingData>,
    knowledge_sources: Vec<KnowledgeSource>,
    tags: BTreeMap<String, String>,
}

impl AnalyzerDefinitionBuilder {
    /// Sets the prebuilt analyzer this one extends (required).
    pub fn base_analyzer_id(mut self, id: impl Into<String>) -> Self {
        self.base_analyzer_id = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn mode(mut self, mode: AnalyzerMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets one processing option, e.g. `("enableOcr", true)`.
    pub fn config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn field_schema(mut self, schema: FieldSchema) -> Self {
        self.field_schema = Some(schema);
        self
    }

    /// Labeled training samples in a blob container.
    pub fn training_data(mut self, source: BlobSource) -> Self {
        self.training_data = Some(TrainingData::Blob(source));
        self
    }

    /// Adds a reference knowledge source (pro mode).
    pub fn knowledge_source(mut self, source: BlobSource) -> Self {
        self.knowledge_sources.push(KnowledgeSource::Reference(source));
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Builds the definition, validating all required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ContentUnderstandingError::Builder`] if:
    /// - `base_analyzer_id` is missing or empty
    /// - the field schema has no fields
    /// - a training data or knowledge source container URL is not a URL
    pub fn build(self) -> ContentUnderstandingResult<AnalyzerDefinition> {
        let base_analyzer_id = self
            .base_analyzer_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ContentUnderstandingError::Builder("base_analyzer_id is required".into()))?;

        if let Some(schema) = &self.field_schema {
            if schema.fields.is_empty() {
                return Err(ContentUnderstandingError::Builder(
                    "field_schema must define at least one field".into(),
                ));
            }
        }

        if let Some(TrainingData::Blob(source)) = &self.training_data {
            check_container_url("training_data", source)?;
        }
        for KnowledgeSource::Reference(source) in &self.knowledge_sources {
            check_container_url("knowledge_source", source)?;
        }

        Ok(AnalyzerDefinition {
            base_analyzer_id: Some(base_analyzer_id),
            description: self.description,
            mode: self.mode,
            config: self.config,
            field_schema: self.field_schema,
            training_data: self.training_data,
            knowledge_sources: self.knowledge_sources,
            tags: self.tags,
            extra: Map::new(),
        })
    }
}

fn check_container_url(what: &str, source: &BlobSource) -> ContentUnderstandingResult<()> {
    Url::parse(&source.container_url).map(|_| ()).map_err(|e| {
        ContentUnderstandingError::Builder(format!("{what} container_url is not a valid URL: {e}"))
    })
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// An analyzer as stored by the service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerInfo {
    /// The analyzer id.
    pub analyzer_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub base_analyzer_id: Option<String>,
    /// Provisioning status, e.g. `ready`, `creating` or `failed`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_modified_at: Option<String>,
    /// The field schema, kept as raw JSON.
    #[serde(default)]
    pub field_schema: Option<Value>,
    /// Everything else the service returned.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzerPage {
    #[serde(default)]
    value: Vec<AnalyzerInfo>,
    #[serde(default)]
    next_link: Option<String>,
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

/// Submit an analyzer for creation (or replacement).
///
/// Returns the handle of the creation operation.
///
/// # Tracing
///
/// Emits a span named `content_understanding::analyzer::begin_create` with
/// field `analyzer_id`.
#[tracing::instrument(
    name = "content_understanding::analyzer::begin_create",
    skip(client, definition),
    fields(analyzer_id = %analyzer_id)
)]
pub async fn begin_create(
    client: &ContentUnderstandingClient,
    analyzer_id: &str,
    definition: &AnalyzerDefinition,
) -> ContentUnderstandingResult<OperationHandle> {
    validate_resource_id("analyzer_id", analyzer_id)?;
    tracing::debug!("creating analyzer");

    let body = serde_json::to_value(definition)?;
    operation::submit(
        client,
        Method::PUT,
        &analyzer_path(analyzer_id, None),
        SubmitBody::Json(body),
    )
    .await
}

/// Create an analyzer and wait until it is ready.
pub async fn create(
    client: &ContentUnderstandingClient,
    analyzer_id: &str,
    definition: &AnalyzerDefinition,
    options: &PollOptions,
) -> ContentUnderstandingResult<ResultDocument> {
    let handle = begin_create(client, analyzer_id, definition).await?;
    operation::poll_until_complete(client, handle, options).await
}

/// Get an analyzer by id.
#[tracing::instrument(
    name = "content_understanding::analyzer::get",
    skip(client),
    fields(analyzer_id = %analyzer_id)
)]
pub async fn get(
    client: &ContentUnderstandingClient,
    analyzer_id: &str,
) -> ContentUnderstandingResult<AnalyzerInfo> {
    validate_resource_id("analyzer_id", analyzer_id)?;
    let response = client.get(&analyzer_path(analyzer_id, None)).await?;
    read_json(response).await
}

/// List all analyzers of the resource, following pagination links.
#[tracing::instrument(name = "content_understanding::analyzer::list", skip(client))]
pub async fn list(
    client: &ContentUnderstandingClient,
) -> ContentUnderstandingResult<Vec<AnalyzerInfo>> {
    let response = client.get(analyzers_path()).await?;
    let mut page: AnalyzerPage = read_json(response).await?;
    let mut analyzers = std::mem::take(&mut page.value);
    let mut visited = HashSet::new();

    while let Some(next) = page.next_link.take() {
        if !visited.insert(next.clone()) {
            return Err(ContentUnderstandingError::Protocol(format!(
                "analyzer list repeats nextLink {next}"
            )));
        }
        let url = Url::parse(&next).map_err(|e| {
            ContentUnderstandingError::Protocol(format!("invalid nextLink in analyzer list: {e}"))
        })?;
        let response = client.get_absolute(&url).await?;
        page = read_json(response).await?;
        analyzers.append(&mut page.value);
    }

    tracing::debug!(count = analyzers.len(), "analyzers listed");
    Ok(analyzers)
}

/// Delete an analyzer.
#[tracing::instrument(
    name = "content_understanding::analyzer::delete",
    skip(client),
    fields(analyzer_id = %analyzer_id)
)]
pub async fn delete(
    client: &ContentUnderstandingClient,
    analyzer_id: &str,
) -> ContentUnderstandingResult<()> {
    validate_resource_id("analyzer_id", analyzer_id)?;
    client.delete(&analyzer_path(analyzer_id, None)).await?;
    tracing::debug!("analyzer deleted");
    Ok(())
}
