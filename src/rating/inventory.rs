use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::directory::read_json;
use crate::error::{RatingError, Result};

/// A labelled cloud resource as reported by an inventory provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    #[serde(alias = "asset_kind")]
    pub asset_kind: String,
    /// Zone or region, depending on the kind
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub status: String,
    /// Kind-specific metadata (e.g. `availabilityType` for managed SQL)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ResourceRecord {
    pub fn new(asset_kind: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            asset_kind: asset_kind.into(),
            location: location.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn has_label(&self, key: &str, value: &str) -> bool {
        self.labels.get(key).is_some_and(|v| v == value)
    }
}

/// Source of resource records for a cloud project.
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    async fn list_resources(&self, project_id: &str) -> std::result::Result<Vec<ResourceRecord>, RatingError>;
}

/// Inventory held in memory, optionally loaded from a JSON file of the form
/// `{"projects": {"<id>": [records...]}}`.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    projects: HashMap<String, Vec<ResourceRecord>>,
}

#[derive(Deserialize)]
struct InventoryFile {
    projects: HashMap<String, Vec<ResourceRecord>>,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project_id: &str, records: Vec<ResourceRecord>) -> Self {
        self.projects.insert(project_id.to_string(), records);
        self
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file: InventoryFile = read_json(path.as_ref())?;
        tracing::info!(projects = file.projects.len(), "Loaded static inventory");
        Ok(Self {
            projects: file.projects,
        })
    }
}

#[async_trait]
impl InventoryProvider for StaticInventory {
    async fn list_resources(&self, project_id: &str) -> std::result::Result<Vec<ResourceRecord>, RatingError> {
        Ok(self.projects.get(project_id).cloned().unwrap_or_default())
    }
}

/// Inventory service reached over HTTP: `GET {base}/projects/{id}/resources`
/// returning a JSON array of records.
#[derive(Debug, Clone)]
pub struct HttpInventory {
    base: Url,
    http: reqwest::Client,
}

impl HttpInventory {
    pub fn new(base: Url, request_timeout: Duration) -> std::result::Result<Self, RatingError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RatingError::Inventory(e.to_string()))?;
        Ok(Self { base, http })
    }

    fn resources_url(&self, project_id: &str) -> std::result::Result<Url, RatingError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RatingError::Inventory(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(["projects", project_id, "resources"]);
        Ok(url)
    }
}

#[async_trait]
impl InventoryProvider for HttpInventory {
    async fn list_resources(&self, project_id: &str) -> std::result::Result<Vec<ResourceRecord>, RatingError> {
        let url = self.resources_url(project_id)?;
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RatingError::Inventory(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RatingError::Inventory(format!("{url} responded with status {status}")));
        }

        response
            .json::<Vec<ResourceRecord>>()
            .await
            .map_err(|e| RatingError::Inventory(e.to_string()))
    }
}
