//! The per-collection manifest, the single commit point of a build.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};
use crate::types::CollectionSummary;

/// Manifest file name inside a collection's namespace.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Persisted description of one built collection.
///
/// The manifest names the blob generation it points at; blobs written
/// under other generations are invisible until a manifest commits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionManifest {
    pub version: u32,
    pub collection_id: String,
    pub dimension: usize,
    pub vector_count: usize,
    pub built_at: DateTime<Utc>,
    pub vectors_file: String,
    pub metadata_file: String,
}

impl CollectionManifest {
    /// Describe a fresh build under `generation`.
    pub fn new(
        collection_id: &str,
        dimension: usize,
        vector_count: usize,
        generation: &str,
    ) -> Self {
        CollectionManifest {
            version: MANIFEST_VERSION,
            collection_id: collection_id.to_string(),
            dimension,
            vector_count,
            built_at: Utc::now(),
            vectors_file: format!("vectors-{generation}.bin"),
            metadata_file: format!("metadata-{generation}.bin"),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse and validate a manifest. Any defect makes the collection
    /// corrupt rather than silently unreadable.
    pub fn from_json(collection_id: &str, bytes: &[u8]) -> Result<Self> {
        let manifest: CollectionManifest = serde_json::from_slice(bytes).map_err(|e| {
            QuarryError::corrupt_collection(format!(
                "unreadable manifest for collection '{collection_id}': {e}"
            ))
        })?;
        if manifest.version != MANIFEST_VERSION {
            return Err(QuarryError::corrupt_collection(format!(
                "unknown manifest version {} for collection '{collection_id}'",
                manifest.version
            )));
        }
        if manifest.collection_id != collection_id {
            return Err(QuarryError::corrupt_collection(format!(
                "manifest for collection '{collection_id}' names '{}'",
                manifest.collection_id
            )));
        }
        Ok(manifest)
    }

    pub fn summary(&self) -> CollectionSummary {
        CollectionSummary {
            collection_id: self.collection_id.clone(),
            dimension: self.dimension,
            vector_count: self.vector_count,
            built_at: self.built_at,
        }
    }
}
