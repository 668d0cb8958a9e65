//! Static data loaded once at startup.
//!
//! - [`UserDirectory`]: participant identity key -> display name and metadata
//! - [`MediaCatalog`]: media base name -> known-good content hash
//!
//! Both are immutable after load and shared behind an `Arc`.

pub mod media;
pub mod users;

pub use media::MediaCatalog;
pub use users::{Participant, UserDirectory};

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{Result, ScorerError};

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|source| ScorerError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ScorerError::Parse {
        path: path.display().to_string(),
        source,
    })
}
