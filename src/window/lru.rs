//! A small bounded LRU map
//!
//! Backs the per-document window lists: a handful of open documents keep
//! cached windows, and the least-recently-touched document loses its list
//! when capacity is exceeded. Capacity is tiny, so a recency-ordered vector
//! beats a linked structure.

/// Bounded map with least-recently-used eviction
///
/// The most recently touched entry sits at index 0.
#[derive(Debug)]
pub struct LruMap<K, V> {
    capacity: usize,
    entries: Vec<(K, V)>,
}

impl<K: Eq + Clone, V> LruMap<K, V> {
    /// Create a map that holds at most `capacity` entries
    ///
    /// A zero capacity is rounded up to one; an unusable cache is a
    /// configuration error caught elsewhere.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Look up an entry and mark it most recently used
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        let entry = self.entries.remove(idx);
        self.entries.insert(0, entry);
        Some(&mut self.entries[0].1)
    }

    /// Look up an entry, inserting a fresh value if absent; either way the
    /// entry becomes most recently used
    ///
    /// Returns the evicted entry, if the insertion pushed one out.
    pub fn get_or_insert_with(
        &mut self,
        key: &K,
        make: impl FnOnce() -> V,
    ) -> (&mut V, Option<(K, V)>) {
        if let Some(idx) = self.entries.iter().position(|(k, _)| k == key) {
            let entry = self.entries.remove(idx);
            self.entries.insert(0, entry);
            return (&mut self.entries[0].1, None);
        }

        self.entries.insert(0, (key.clone(), make()));
        let evicted = if self.entries.len() > self.capacity {
            self.entries.pop()
        } else {
            None
        };
        (&mut self.entries[0].1, evicted)
    }

    /// Remove an entry without touching recency of the others
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }
}
