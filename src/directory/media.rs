use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
struct ImageHash {
    #[serde(rename = "Name", alias = "name")]
    name: String,
    #[serde(rename = "Hash", alias = "hash")]
    hash: String,
}

#[derive(Deserialize)]
struct ImageHashesBlob {
    image_hashes: Vec<ImageHash>,
}

/// Known-good content hashes keyed by media base name (e.g. `shoes.jpg`).
///
/// The catalog size doubles as the number of items the storefront serves,
/// which bounds the item identifiers the benchmarker picks.
#[derive(Debug, Clone, Default)]
pub struct MediaCatalog {
    hashes: HashMap<String, String>,
}

impl MediaCatalog {
    pub fn new<K: Into<String>, V: Into<String>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            hashes: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into().to_ascii_lowercase()))
                .collect(),
        }
    }

    /// Load `{"image_hashes": [{"Name": .., "Hash": ..}]}` from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let blob: ImageHashesBlob = super::read_json(path.as_ref())?;
        let catalog = Self::new(blob.image_hashes.into_iter().map(|h| (h.name, h.hash)));
        tracing::info!(path = %path.as_ref().display(), items = catalog.len(), "Loaded media catalog");
        Ok(catalog)
    }

    pub fn expected_hash(&self, name: &str) -> Option<&str> {
        self.hashes.get(name).map(String::as_str)
    }

    /// True when `hash` (lowercase hex) is the known-good hash for `name`.
    pub fn matches(&self, name: &str, hash: &str) -> bool {
        self.expected_hash(name).is_some_and(|h| h == hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
