//! Fixed-size chunking of request inputs.

use crate::error::{CacheError, Result};

/// Iterates a slice in chunks of `batch_size`, yielding each chunk with the
/// offset of its first element.
pub struct BatchIterator<'a, T> {
    source: &'a [T],
    offset: usize,
    batch_size: usize,
}

impl<'a, T> BatchIterator<'a, T> {
    /// Fails on a zero batch size, which would never make progress.
    pub fn new(source: &'a [T], batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(CacheError::InvalidChunkSize(batch_size));
        }
        Ok(Self { source, offset: 0, batch_size })
    }

    /// Number of chunks the whole slice splits into.
    pub fn batch_count(&self) -> usize {
        self.source.len().div_ceil(self.batch_size)
    }
}

impl<'a, T> Iterator for BatchIterator<'a, T> {
    type Item = (usize, &'a [T]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.source.len() {
            return None;
        }
        let end = (self.offset + self.batch_size).min(self.source.len());
        let chunk = &self.source[self.offset..end];
        let start = self.offset;
        self.offset = end;
        Some((start, chunk))
    }
}
