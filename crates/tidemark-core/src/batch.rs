//! Column-wise element staging.
//!
//! An [`ElementBatch`] accumulates the rows headed into one table as four
//! parallel arrays, so the storage layer commits columns instead of rows.
//! Batches are recycled through a bounded global free list: `acquire` hands
//! out a previously released batch when one is available, and `release`
//! clears the batch before parking it. A released batch must not be touched
//! again by the releaser.

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::tag::TagFamily;

/// Upper bound on parked batches; beyond this, released batches are dropped.
const POOL_LIMIT: usize = 64;

static POOL: Lazy<Mutex<Vec<ElementBatch>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Parallel-array staging area for the elements of one table.
///
/// Invariant: the four arrays always have identical length; every append
/// path pushes to each exactly once per element.
#[derive(Debug, Default)]
pub struct ElementBatch {
    pub timestamps: Vec<i64>,
    pub element_ids: Vec<u64>,
    pub series_ids: Vec<u64>,
    pub tag_families: Vec<Vec<TagFamily>>,
}

impl ElementBatch {
    /// Takes a batch from the pool, or allocates a fresh one.
    pub fn acquire() -> Self {
        POOL.lock().pop().unwrap_or_default()
    }

    /// Clears the batch and parks it for reuse.
    pub fn release(mut batch: Self) {
        batch.reset();
        let mut pool = POOL.lock();
        if pool.len() < POOL_LIMIT {
            pool.push(batch);
        }
    }

    /// Empties all four arrays, keeping their capacity.
    pub fn reset(&mut self) {
        self.timestamps.clear();
        self.element_ids.clear();
        self.series_ids.clear();
        self.tag_families.clear();
    }

    /// Number of staged elements.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// True when the four parallel arrays agree on length.
    pub fn is_aligned(&self) -> bool {
        self.timestamps.len() == self.element_ids.len()
            && self.timestamps.len() == self.series_ids.len()
            && self.timestamps.len() == self.tag_families.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged() -> ElementBatch {
        let mut batch = ElementBatch::acquire();
        batch.timestamps.push(1);
        batch.element_ids.push(2);
        batch.series_ids.push(3);
        batch.tag_families.push(vec![]);
        batch
    }

    #[test]
    fn test_alignment() {
        let mut batch = staged();
        assert!(batch.is_aligned());
        assert_eq!(batch.len(), 1);

        batch.timestamps.push(9);
        assert!(!batch.is_aligned());
    }

    #[test]
    fn test_release_clears() {
        ElementBatch::release(staged());
        // Whatever acquire returns, pooled or fresh, it must be empty.
        let batch = ElementBatch::acquire();
        assert!(batch.is_empty());
        assert!(batch.is_aligned());
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut batch = staged();
        let cap = batch.timestamps.capacity();
        batch.reset();
        assert!(batch.is_empty());
        assert_eq!(batch.timestamps.capacity(), cap);
    }
}
