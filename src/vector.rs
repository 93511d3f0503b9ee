//! Exact nearest-neighbor index over fixed-dimension f32 vectors.
//!
//! A [`FlatVectorIndex`] stores its vectors contiguously and answers top-k
//! queries by brute-force squared Euclidean scan. Collections are modest
//! (one per ingested video or document), so an exact scan beats the
//! complexity of an approximate structure here.

use crate::error::{QuarryError, Result};
use crate::util::distance::batch_squared_euclidean;

/// One search result: the ordinal of a stored vector and its squared
/// Euclidean distance from the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Zero-based insertion position of the matched vector.
    pub ordinal: usize,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
}

/// An append-only exact nearest-neighbor index.
///
/// Ordinals are assigned sequentially in insertion order and never change;
/// metadata for a collection is joined to results positionally by ordinal.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatVectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatVectorIndex {
    /// Allocate an empty index for vectors of the given dimension.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(QuarryError::invalid_argument(
                "vector index dimension must be greater than zero",
            ));
        }
        Ok(FlatVectorIndex {
            dimension,
            data: Vec::new(),
        })
    }

    /// Reconstruct an index from a contiguous buffer of row-major vectors.
    ///
    /// Used by the loader; a buffer whose length is not a multiple of the
    /// dimension means the persisted blob is damaged.
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 {
            return Err(QuarryError::invalid_argument(
                "vector index dimension must be greater than zero",
            ));
        }
        if data.len() % dimension != 0 {
            return Err(QuarryError::corrupt_collection(format!(
                "vector buffer length {} is not a multiple of dimension {}",
                data.len(),
                dimension
            )));
        }
        Ok(FlatVectorIndex { dimension, data })
    }

    /// The fixed dimensionality of this index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors stored.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The raw row-major vector buffer, used for persistence.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Append vectors in order, assigning ordinals sequentially from the
    /// current size.
    ///
    /// All lengths are validated before anything is appended, so a failed
    /// call leaves the index unchanged.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(QuarryError::dimension_mismatch(
                    self.dimension,
                    vector.len(),
                ));
            }
        }
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Return the `k` nearest vectors by ascending squared distance.
    ///
    /// Ties are broken by ascending ordinal, so the first-inserted vector
    /// wins. An index holding fewer than `k` vectors returns everything it
    /// has, sorted; `k == 0` returns an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(QuarryError::dimension_mismatch(self.dimension, query.len()));
        }
        if self.is_empty() {
            if k > 0 {
                return Err(QuarryError::empty_index(
                    "cannot search an index holding zero vectors",
                ));
            }
            return Ok(Vec::new());
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let distances = batch_squared_euclidean(query, &self.data, self.dimension);
        let mut neighbors: Vec<Neighbor> = distances
            .into_iter()
            .enumerate()
            .map(|(ordinal, distance)| Neighbor { ordinal, distance })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.ordinal.cmp(&b.ordinal))
        });
        neighbors.truncate(k);
        Ok(neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> FlatVectorIndex {
        let mut index = FlatVectorIndex::new(2).unwrap();
        index
            .add(&[
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![2.0, 2.0],
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_rejects_zero_dimension() {
        assert!(FlatVectorIndex::new(0).is_err());
    }

    #[test]
    fn test_add_assigns_sequential_ordinals() {
        let index = sample_index();
        assert_eq!(index.len(), 4);
        assert_eq!(index.dimension(), 2);

        let results = index.search(&[0.0, 0.0], 4).unwrap();
        assert_eq!(results[0].ordinal, 0);
        assert_eq!(results[0].distance, 0.0);
    }

    #[test]
    fn test_add_validates_before_appending() {
        let mut index = FlatVectorIndex::new(2).unwrap();
        let result = index.add(&[vec![1.0, 0.0], vec![1.0, 0.0, 0.0]]);

        match result {
            Err(QuarryError::DimensionMismatch {
                expected: 2,
                actual: 3,
            }) => {}
            other => panic!("expected dimension mismatch, got {other:?}"),
        }
        // No partial append.
        assert!(index.is_empty());
    }

    #[test]
    fn test_search_sorted_ascending() {
        let index = sample_index();
        let results = index.search(&[1.0, 1.0], 4).unwrap();

        for window in results.windows(2) {
            assert!(window[0].distance <= window[1].distance);
        }
    }

    #[test]
    fn test_search_ties_break_by_ordinal() {
        let mut index = FlatVectorIndex::new(2).unwrap();
        // Ordinals 0 and 1 are equidistant from the query.
        index
            .add(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![5.0, 5.0]])
            .unwrap();

        let results = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(results[0].ordinal, 0);
        assert_eq!(results[1].ordinal, 1);
    }

    #[test]
    fn test_search_fewer_than_k() {
        let index = sample_index();
        let results = index.search(&[0.0, 0.0], 100).unwrap();
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_search_k_zero_is_empty() {
        let index = sample_index();
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_empty_index_fails() {
        let index = FlatVectorIndex::new(2).unwrap();
        match index.search(&[0.0, 0.0], 1) {
            Err(QuarryError::EmptyIndex(_)) => {}
            other => panic!("expected empty index error, got {other:?}"),
        }
    }

    #[test]
    fn test_search_query_dimension_mismatch() {
        let index = sample_index();
        match index.search(&[0.0, 0.0, 0.0], 1) {
            Err(QuarryError::DimensionMismatch {
                expected: 2,
                actual: 3,
            }) => {}
            other => panic!("expected dimension mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_from_raw_round_trip() {
        let index = sample_index();
        let rebuilt = FlatVectorIndex::from_raw(2, index.as_slice().to_vec()).unwrap();
        assert_eq!(index, rebuilt);
    }

    #[test]
    fn test_from_raw_rejects_ragged_buffer() {
        match FlatVectorIndex::from_raw(3, vec![0.0; 7]) {
            Err(QuarryError::CorruptCollection(_)) => {}
            other => panic!("expected corrupt collection error, got {other:?}"),
        }
    }
}
