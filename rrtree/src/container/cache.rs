//! LRU page cache with fixed (pinned) pages.
//!
//! Pages are only loaded when first accessed. A page marked fixed is
//! skipped by eviction until an access releases it again.

use std::collections::HashMap;
use std::collections::VecDeque;

use super::NodeKey;

/// A cached node with its dirty and fixed flags
pub struct CachedPage<N> {
    pub node: N,
    pub dirty: bool,
    pub fixed: bool,
}

/// LRU cache for container pages
pub struct PageCache<N> {
    pages: HashMap<NodeKey, CachedPage<N>>,
    /// LRU order (front = oldest, back = newest)
    lru_order: VecDeque<NodeKey>,
    max_pages: usize,
}

impl<N> PageCache<N> {
    pub fn new(max_pages: usize) -> Self {
        Self {
            pages: HashMap::new(),
            lru_order: VecDeque::new(),
            max_pages,
        }
    }

    fn touch(&mut self, key: NodeKey) {
        self.lru_order.retain(|&k| k != key);
        self.lru_order.push_back(key);
    }

    /// Get a page, updating LRU order and its fixed flag.
    /// Returns None if the page must be loaded from disk.
    pub fn get(&mut self, key: NodeKey, fixed: bool) -> Option<&N> {
        if !self.pages.contains_key(&key) {
            return None;
        }
        self.touch(key);
        let cached = self.pages.get_mut(&key)?;
        cached.fixed = fixed;
        Some(&cached.node)
    }

    /// Replace the node of a cached page, marking it dirty.
    /// Returns false if the page is not cached.
    pub fn replace(&mut self, key: NodeKey, node: N, fixed: bool) -> bool {
        if !self.pages.contains_key(&key) {
            return false;
        }
        self.touch(key);
        if let Some(cached) = self.pages.get_mut(&key) {
            cached.node = node;
            cached.dirty = true;
            cached.fixed = fixed;
        }
        true
    }

    /// Insert a page (after loading from disk or creating new).
    /// The caller must make room first, see `needs_eviction`.
    pub fn insert(&mut self, key: NodeKey, node: N, dirty: bool, fixed: bool) {
        self.touch(key);
        self.pages.insert(key, CachedPage { node, dirty, fixed });
    }

    pub fn needs_eviction(&self) -> bool {
        self.pages.len() >= self.max_pages
    }

    /// The least recently used page that is not fixed, left in place.
    /// Returns None if every cached page is fixed.
    pub fn oldest_evictable(&self) -> Option<NodeKey> {
        self.lru_order
            .iter()
            .copied()
            .find(|key| self.pages.get(key).is_some_and(|cached| !cached.fixed))
    }

    /// Evict the least recently used page that is not fixed.
    /// Returns None if every cached page is fixed.
    pub fn evict_oldest(&mut self) -> Option<(NodeKey, N, bool)> {
        let key = self.oldest_evictable()?;
        self.remove(key).map(|(node, dirty)| (key, node, dirty))
    }

    pub fn get_dirty_pages(&self) -> Vec<NodeKey> {
        self.pages
            .iter()
            .filter(|(_, cached)| cached.dirty)
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn peek(&self, key: NodeKey) -> Option<&CachedPage<N>> {
        self.pages.get(&key)
    }

    pub fn mark_clean(&mut self, key: NodeKey) {
        if let Some(cached) = self.pages.get_mut(&key) {
            cached.dirty = false;
        }
    }

    pub fn remove(&mut self, key: NodeKey) -> Option<(N, bool)> {
        self.lru_order.retain(|&k| k != key);
        self.pages.remove(&key).map(|c| (c.node, c.dirty))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_pages
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.pages.contains_key(&key)
    }

    pub fn fixed_count(&self) -> usize {
        self.pages.values().filter(|cached| cached.fixed).count()
    }
}
