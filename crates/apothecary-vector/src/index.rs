//! Immutable in-memory vector index with exact squared-L2 search.
//!
//! Vectors are stored row-major in one flat buffer. The index is never
//! mutated after construction; a rebuilt catalog produces a new index, so it
//! can be shared across threads behind an `Arc` without locking.

use std::cmp::Ordering;

use apothecary_core::error::{ApothecaryError, Result};

/// A single nearest-neighbor hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Insertion position of the stored vector.
    pub position: usize,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
}

/// Exact nearest-neighbor index over fixed-dimension vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Build an index from a sequence of vectors.
    ///
    /// The dimension is taken from the first vector; every other vector must
    /// match it.
    pub fn from_vectors(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dimension = match vectors.first() {
            Some(first) => first.len(),
            None => {
                return Err(ApothecaryError::Config(
                    "cannot build an index from zero vectors".to_string(),
                ))
            }
        };
        if dimension == 0 {
            return Err(ApothecaryError::Config(
                "embedding dimension must be non-zero".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(dimension * vectors.len());
        for (position, vector) in vectors.into_iter().enumerate() {
            if vector.len() != dimension {
                return Err(ApothecaryError::Config(format!(
                    "embedding {} has dimension {}, expected {}",
                    position,
                    vector.len(),
                    dimension
                )));
            }
            data.extend(vector);
        }

        Ok(Self { dimension, data })
    }

    /// Rebuild an index from its flat row-major representation.
    ///
    /// Used when loading a persisted index; a malformed buffer is treated as
    /// corruption.
    pub fn from_flat(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 {
            return Err(ApothecaryError::Retrieval(
                "persisted index has dimension 0".to_string(),
            ));
        }
        if data.is_empty() {
            return Err(ApothecaryError::Retrieval(
                "persisted index contains no vectors".to_string(),
            ));
        }
        if data.len() % dimension != 0 {
            return Err(ApothecaryError::Retrieval(format!(
                "index buffer of {} values is not a multiple of dimension {}",
                data.len(),
                dimension
            )));
        }
        Ok(Self { dimension, data })
    }

    /// Dimension shared by every stored vector.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The vector stored at `position`, if any.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Flat row-major view of all stored values.
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    /// Find the `k` stored vectors closest to `query`.
    ///
    /// Results are ordered by ascending squared Euclidean distance, ties by
    /// ascending insertion position. `k` larger than the index is clamped.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(ApothecaryError::Input(
                "k must be a positive integer".to_string(),
            ));
        }
        if query.len() != self.dimension {
            return Err(ApothecaryError::Retrieval(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, stored)| Neighbor {
                position,
                distance: squared_l2(query, stored),
            })
            .collect();

        scored.sort_by(compare_neighbors);
        scored.truncate(k.min(self.len()));
        Ok(scored)
    }
}

fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.position.cmp(&b.position))
}

/// Squared Euclidean distance between two equal-length vectors.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_point_index() -> VectorIndex {
        VectorIndex::from_vectors(vec![
            vec![0.0, 0.0],
            vec![3.0, 4.0],
            vec![1.0, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_from_vectors_records_dimension_and_len() {
        let index = three_point_index();
        assert_eq!(index.dimension(), 2);
        assert_eq!(index.len(), 3);
        assert!(!index.is_empty());
        assert_eq!(index.vector(1), Some(&[3.0, 4.0][..]));
        assert_eq!(index.vector(3), None);
    }

    #[test]
    fn test_from_vectors_empty_is_config_error() {
        let err = VectorIndex::from_vectors(vec![]).unwrap_err();
        assert!(matches!(err, ApothecaryError::Config(_)));
    }

    #[test]
    fn test_from_vectors_zero_dimension() {
        let err = VectorIndex::from_vectors(vec![vec![]]).unwrap_err();
        assert!(matches!(err, ApothecaryError::Config(_)));
    }

    #[test]
    fn test_from_vectors_dimension_mismatch() {
        let err = VectorIndex::from_vectors(vec![vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, ApothecaryError::Config(_)));
        assert!(err.to_string().contains("embedding 1 has dimension 1, expected 2"));
    }

    #[test]
    fn test_search_orders_by_squared_distance() {
        let index = three_point_index();
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 2, 1]);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].distance, 1.0);
        // Squared, not Euclidean: 3^2 + 4^2.
        assert_eq!(hits[2].distance, 25.0);
    }

    #[test]
    fn test_search_clamps_k() {
        let index = three_point_index();
        assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 3);
        assert_eq!(index.search(&[0.0, 0.0], 2).unwrap().len(), 2);
    }

    #[test]
    fn test_search_zero_k_is_input_error() {
        let index = three_point_index();
        let err = index.search(&[0.0, 0.0], 0).unwrap_err();
        assert!(err.is_input());
    }

    #[test]
    fn test_search_dimension_mismatch_is_retrieval_error() {
        let index = three_point_index();
        let err = index.search(&[0.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, ApothecaryError::Retrieval(_)));
    }

    #[test]
    fn test_search_ties_break_by_position() {
        let index = VectorIndex::from_vectors(vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![-1.0, 0.0],
            vec![0.0, -1.0],
        ])
        .unwrap();
        let hits = index.search(&[0.0, 0.0], 4).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_search_results_non_decreasing_for_many_queries() {
        let vectors: Vec<Vec<f32>> = (0..50)
            .map(|i| {
                let x = i as f32;
                vec![(x * 0.37).sin(), (x * 1.3).cos(), x % 7.0]
            })
            .collect();
        let index = VectorIndex::from_vectors(vectors).unwrap();

        for q in 0..20 {
            let qf = q as f32;
            let query = [qf.cos(), (qf * 0.5).sin(), qf % 5.0];
            for k in [1usize, 5, 50, 80] {
                let hits = index.search(&query, k).unwrap();
                assert_eq!(hits.len(), k.min(50));
                for pair in hits.windows(2) {
                    assert!(pair[0].distance <= pair[1].distance);
                }
            }
        }
    }

    #[test]
    fn test_from_flat_validation() {
        assert!(VectorIndex::from_flat(2, vec![1.0, 2.0, 3.0, 4.0]).is_ok());
        assert!(matches!(
            VectorIndex::from_flat(2, vec![1.0, 2.0, 3.0]),
            Err(ApothecaryError::Retrieval(_))
        ));
        assert!(matches!(
            VectorIndex::from_flat(0, vec![]),
            Err(ApothecaryError::Retrieval(_))
        ));
        assert!(matches!(
            VectorIndex::from_flat(4, vec![]),
            Err(ApothecaryError::Retrieval(_))
        ));
    }

    #[test]
    fn test_squared_l2() {
        assert_eq!(squared_l2(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert_eq!(squared_l2(&[0.0, 0.0], &[2.0, 0.0]), 4.0);
    }
}
