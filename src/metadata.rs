//! Per-chunk metadata, positionally aligned with a collection's vectors.

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};

/// Provenance record for one chunk: its text and a best-effort time span.
///
/// Times come from transcript segments when available; for non-timed
/// sources the chunker emits synthetic placeholder spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// The chunk text that was embedded.
    pub chunk_text: String,
    /// Span start in seconds.
    pub start: f64,
    /// Span end in seconds.
    pub end: f64,
}

impl ChunkMetadata {
    /// Create a new metadata record.
    pub fn new(chunk_text: impl Into<String>, start: f64, end: f64) -> Self {
        ChunkMetadata {
            chunk_text: chunk_text.into(),
            start,
            end,
        }
    }
}

/// Positional, append-only sequence of [`ChunkMetadata`].
///
/// Written once at build time in lockstep with vector insertion order and
/// persisted as a unit with the index, so `get(ordinal)` always refers to
/// the vector at the same ordinal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataStore {
    records: Vec<ChunkMetadata>,
}

impl MetadataStore {
    /// Build a store from records already in insertion order.
    pub fn from_records(records: Vec<ChunkMetadata>) -> Self {
        MetadataStore { records }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up the record at an ordinal position.
    pub fn get(&self, ordinal: usize) -> Result<&ChunkMetadata> {
        self.records.get(ordinal).ok_or(QuarryError::IndexOutOfRange {
            ordinal,
            len: self.records.len(),
        })
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[ChunkMetadata] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_by_ordinal() {
        let store = MetadataStore::from_records(vec![
            ChunkMetadata::new("first", 0.0, 4.5),
            ChunkMetadata::new("second", 4.5, 9.0),
        ]);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0).unwrap().chunk_text, "first");
        assert_eq!(store.get(1).unwrap().start, 4.5);
    }

    #[test]
    fn test_get_out_of_range() {
        let store = MetadataStore::from_records(vec![ChunkMetadata::new("only", 0.0, 1.0)]);

        match store.get(1) {
            Err(QuarryError::IndexOutOfRange { ordinal: 1, len: 1 }) => {}
            other => panic!("expected out of range error, got {other:?}"),
        }
    }
}
