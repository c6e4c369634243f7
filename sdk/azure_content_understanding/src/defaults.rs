//! Resource-level defaults: which model deployments prebuilt analyzers use.
//!
//! A newly created resource has no deployments configured; prebuilt analyzers
//! fail until each model name they rely on is mapped to a deployment.

use azure_content_understanding_core::client::ContentUnderstandingClient;
use azure_content_understanding_core::error::{
    ContentUnderstandingError, ContentUnderstandingResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::result::read_json;

const DEFAULTS_PATH: &str = "/contentunderstanding/defaults";

/// Mapping of model name (e.g. `gpt-4.1`) to deployment name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelDeployments(BTreeMap<String, String>);

impl ModelDeployments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `model` to `deployment`.
    pub fn deployment(mut self, model: impl Into<String>, deployment: impl Into<String>) -> Self {
        self.0.insert(model.into(), deployment.into());
        self
    }

    pub fn get(&self, model: &str) -> Option<&str> {
        self.0.get(model).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Defaults stored on the resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefaults {
    #[serde(default)]
    pub model_deployments: ModelDeployments,
}

/// Read the resource's defaults.
#[tracing::instrument(name = "content_understanding::defaults::get", skip(client))]
pub async fn get(client: &ContentUnderstandingClient) -> ContentUnderstandingResult<ServiceDefaults> {
    let response = client.get(DEFAULTS_PATH).await?;
    read_json(response).await
}

/// Merge `deployments` into the resource's defaults and return the result.
///
/// Models not named in `deployments` keep their current mapping.
///
/// # Errors
///
/// Returns [`ContentUnderstandingError::Builder`] if `deployments` is empty.
#[tracing::instrument(
    name = "content_understanding::defaults::update",
    skip(client, deployments),
    fields(models = deployments.0.len())
)]
pub async fn update(
    client: &ContentUnderstandingClient,
    deployments: &ModelDeployments,
) -> ContentUnderstandingResult<ServiceDefaults> {
    if deployments.is_empty() {
        return Err(ContentUnderstandingError::Builder(
            "at least one model deployment is required".into(),
        ));
    }

    let body = ServiceDefaults {
        model_deployments: deployments.clone(),
    };
    let response = client.patch(DEFAULTS_PATH, &body).await?;
    let updated: ServiceDefaults = read_json(response).await?;
    tracing::debug!("model deployments updated");
    Ok(updated)
}
