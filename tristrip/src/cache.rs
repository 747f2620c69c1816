/// Fixed-size FIFO model of a GPU's post-transform vertex cache.
///
/// This never touches real GPU state; it exists purely as a cost oracle
/// for scoring strip and face orderings.
pub struct VertexCache {
    entries: Vec<i32>,
}

impl Default for VertexCache {
    fn default() -> Self {
        Self::new(16)
    }
}

impl VertexCache {
    pub fn new(size: usize) -> Self {
        Self {
            entries: vec![-1; size],
        }
    }

    /// Non-mutating hit test.
    pub fn in_cache(&self, entry: u16) -> bool {
        self.entries.iter().any(|&e| e == entry as i32)
    }

    /// Pushes `entry` to the front, shifting everything back one slot.
    /// Returns the evicted tail entry, or `None` if the tail slot was empty.
    pub fn add_entry(&mut self, entry: u16) -> Option<u16> {
        let removed = *self.entries.last().unwrap();

        for i in (0..self.entries.len() - 1).rev() {
            self.entries[i + 1] = self.entries[i];
        }
        self.entries[0] = entry as i32;

        (removed >= 0).then_some(removed as u16)
    }

    pub fn clear(&mut self) {
        self.entries.fill(-1);
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;

    #[test]
    fn fifo_eviction() {
        let cache_size = 4;
        let mut cache = VertexCache::new(cache_size);

        for v in 0..=cache_size as u16 {
            assert!(!cache.in_cache(v));
            cache.add_entry(v);
        }

        // first entry fell off the end, most recent N remain
        assert!(!cache.in_cache(0));
        for v in 1..=cache_size as u16 {
            assert!(cache.in_cache(v));
        }
    }

    #[test]
    fn add_returns_evicted() {
        let mut cache = VertexCache::new(2);

        assert_eq!(cache.add_entry(10), None);
        assert_eq!(cache.add_entry(11), None);
        assert_eq!(cache.add_entry(12), Some(10));
    }

    #[test]
    fn in_cache_does_not_mutate() {
        let mut cache = VertexCache::new(2);
        cache.add_entry(5);

        assert!(cache.in_cache(5));
        assert!(cache.in_cache(5));
        cache.add_entry(6);
        assert!(cache.in_cache(5));
    }
}
