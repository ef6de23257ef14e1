//! Vector index abstraction for knowledge chunks.
//!
//! Defines a trait for vector storage and retrieval, plus the exact flat
//! inner-product implementation used by the retriever.

use crate::types::Chunk;
use pagecite_core::{AppError, AppResult};

/// Trait for vector index backends.
///
/// Implementations must keep vectors and chunks paired one-to-one at
/// stable positional slots; entries are only ever appended or cleared as
/// a whole.
pub trait VectorIndex: Send + Sync {
    /// Append vectors with their chunks, in order.
    ///
    /// Either every entry is appended or, on error, nothing is.
    fn add(&mut self, vectors: Vec<Vec<f32>>, chunks: Vec<Chunk>) -> AppResult<()>;

    /// Search for the `top_k` chunks most similar to `query`.
    ///
    /// Returns chunks ordered by descending similarity; ties keep insertion
    /// order. An empty index returns an empty result.
    fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<(Chunk, f32)>>;

    /// Number of stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension shared by all stored vectors, if any are stored.
    fn dimension(&self) -> Option<usize>;

    /// Discard every entry. The next `add` may use a different dimension.
    fn reset(&mut self);
}

/// Exact brute-force inner-product index.
///
/// Vectors live in one contiguous row-major buffer.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    dimension: Option<usize>,
    data: Vec<f32>,
    chunks: Vec<Chunk>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored chunks in insertion order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    fn row(&self, slot: usize, dim: usize) -> &[f32] {
        &self.data[slot * dim..(slot + 1) * dim]
    }
}

/// Inner product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl VectorIndex for FlatIndex {
    fn add(&mut self, vectors: Vec<Vec<f32>>, chunks: Vec<Chunk>) -> AppResult<()> {
        if vectors.len() != chunks.len() {
            return Err(AppError::DimensionMismatch {
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }
        let Some(first) = vectors.first() else {
            return Ok(());
        };

        let expected = self.dimension.unwrap_or(first.len());
        if expected == 0 {
            return Err(AppError::Knowledge(
                "cannot index zero-length vectors".to_string(),
            ));
        }
        for vector in &vectors {
            if vector.len() != expected {
                return Err(AppError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(AppError::Knowledge(
                    "embedding contains non-finite values".to_string(),
                ));
            }
        }

        self.data.reserve(vectors.len() * expected);
        for vector in &vectors {
            self.data.extend_from_slice(vector);
        }
        self.chunks.extend(chunks);
        self.dimension = Some(expected);

        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<(Chunk, f32)>> {
        let Some(dim) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dim {
            return Err(AppError::DimensionMismatch {
                expected: dim,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = (0..self.chunks.len())
            .map(|slot| (slot, dot(self.row(slot, dim), query)))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(slot, score)| (self.chunks[slot].clone(), score))
            .collect())
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn reset(&mut self) {
        self.data.clear();
        self.chunks.clear();
        self.dimension = None;
    }
}
