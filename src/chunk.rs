//! Chunk scheduling along the folded batch axis
//!
//! Splits `[0, folded_length)` into contiguous, ascending, non-overlapping
//! ranges of at most `chunk_size` elements. The last chunk carries the
//! remainder. `chunk_size == 1` is an ordinary plan of single-element
//! chunks, not a special mode.

use crate::error::{BenchError, Result};

/// Contiguous range `[start, end)` of the folded batch axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    /// First index (inclusive)
    pub start: usize,
    /// One past the last index
    pub end: usize,
}

impl Chunk {
    /// Number of elements in the chunk
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Always false for chunks produced by a [`ChunkPlan`]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// As a standard range
    #[must_use]
    pub const fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Chunking of a folded batch axis
///
/// Cheap to copy; [`ChunkPlan::iter`] can be called any number of times and
/// always yields the same sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    folded_length: usize,
    chunk_size: usize,
}

impl ChunkPlan {
    /// Plan chunks of at most `chunk_size` over `folded_length` elements
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Config`] if `chunk_size` is zero
    pub fn new(folded_length: usize, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(BenchError::Config {
                reason: "chunk_size must be > 0".to_string(),
            });
        }
        Ok(Self {
            folded_length,
            chunk_size,
        })
    }

    /// Length of the axis being chunked
    #[must_use]
    pub const fn folded_length(&self) -> usize {
        self.folded_length
    }

    /// Maximum chunk length
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks, `ceil(folded_length / chunk_size)`
    #[must_use]
    pub const fn n_chunks(&self) -> usize {
        self.folded_length.div_ceil(self.chunk_size)
    }

    /// Iterate the chunks in ascending order
    #[must_use]
    pub const fn iter(&self) -> Chunks {
        Chunks {
            next_start: 0,
            folded_length: self.folded_length,
            chunk_size: self.chunk_size,
        }
    }
}

impl IntoIterator for ChunkPlan {
    type Item = Chunk;
    type IntoIter = Chunks;

    fn into_iter(self) -> Chunks {
        self.iter()
    }
}

impl IntoIterator for &ChunkPlan {
    type Item = Chunk;
    type IntoIter = Chunks;

    fn into_iter(self) -> Chunks {
        self.iter()
    }
}

/// Lazy iterator over the chunks of a [`ChunkPlan`]
#[derive(Debug, Clone)]
pub struct Chunks {
    next_start: usize,
    folded_length: usize,
    chunk_size: usize,
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.next_start >= self.folded_length {
            return None;
        }
        let start = self.next_start;
        let end = (start + self.chunk_size).min(self.folded_length);
        self.next_start = end;
        Some(Chunk { start, end })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.folded_length - self.next_start.min(self.folded_length))
            .div_ceil(self.chunk_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks {}

impl std::iter::FusedIterator for Chunks {}

/// Chunks of at most `chunk_size` over `[0, folded_length)`
///
/// # Errors
///
/// Returns [`BenchError::Config`] if `chunk_size` is zero
pub fn chunks(folded_length: usize, chunk_size: usize) -> Result<Chunks> {
    Ok(ChunkPlan::new(folded_length, chunk_size)?.iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remainder_chunk() {
        let got: Vec<_> = chunks(6, 4).expect("test").map(|c| c.range()).collect();
        assert_eq!(got, vec![0..4, 4..6]);
    }

    #[test]
    fn test_exact_division() {
        let plan = ChunkPlan::new(6, 3).expect("test");
        assert_eq!(plan.n_chunks(), 2);
        let lens: Vec<_> = plan.iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![3, 3]);
    }

    #[test]
    fn test_chunk_size_one() {
        let plan = ChunkPlan::new(3, 1).expect("test");
        let got: Vec<_> = plan.iter().collect();
        assert_eq!(
            got,
            vec![
                Chunk { start: 0, end: 1 },
                Chunk { start: 1, end: 2 },
                Chunk { start: 2, end: 3 },
            ]
        );
    }

    #[test]
    fn test_chunk_larger_than_axis() {
        let got: Vec<_> = chunks(5, 100).expect("test").collect();
        assert_eq!(got, vec![Chunk { start: 0, end: 5 }]);
    }

    #[test]
    fn test_zero_chunk_size_is_config_error() {
        assert!(matches!(
            ChunkPlan::new(10, 0),
            Err(BenchError::Config { .. })
        ));
    }

    #[test]
    fn test_restartable_and_exact_size() {
        let plan = ChunkPlan::new(10, 3).expect("test");
        let mut it = plan.iter();
        assert_eq!(it.len(), 4);
        it.next();
        assert_eq!(it.len(), 3);
        let first: Vec<_> = plan.iter().collect();
        let second: Vec<_> = plan.into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_axis_yields_nothing() {
        assert_eq!(chunks(0, 4).expect("test").count(), 0);
    }
}
