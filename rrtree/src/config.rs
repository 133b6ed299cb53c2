//! Tree and container configuration.

use crate::constants::{DEFAULT_CACHE_PAGES, MAX_NODE_ENTRIES, MIN_NODE_ENTRIES, PAGE_SIZE};
use crate::errors::{RRTreeError, RRTreeResult};

/// Node capacity bounds shared by every node of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskTreeConfig {
    pub min_node_capacity: usize,
    pub max_node_capacity: usize,
}

impl DiskTreeConfig {
    pub fn new(min_node_capacity: usize, max_node_capacity: usize) -> Self {
        Self {
            min_node_capacity,
            max_node_capacity,
        }
    }

    /// Checks that a split of an overflowing node can always produce two
    /// halves that do not underflow.
    pub fn validate(&self) -> RRTreeResult<()> {
        if self.min_node_capacity == 0 {
            return Err(RRTreeError::InvalidConfiguration(
                "minimum node capacity must be at least 1".into(),
            ));
        }
        if self.max_node_capacity < 2 * self.min_node_capacity {
            return Err(RRTreeError::InvalidConfiguration(format!(
                "maximum node capacity {} must be at least twice the minimum {}",
                self.max_node_capacity, self.min_node_capacity
            )));
        }
        Ok(())
    }
}

impl Default for DiskTreeConfig {
    fn default() -> Self {
        Self::new(MIN_NODE_ENTRIES, MAX_NODE_ENTRIES)
    }
}

/// Page file layout and cache size of a `FileContainer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileContainerConfig {
    pub page_size: usize,
    pub cache_pages: usize,
}

impl FileContainerConfig {
    pub fn with_cache_pages(mut self, cache_pages: usize) -> Self {
        self.cache_pages = cache_pages;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> RRTreeResult<()> {
        if self.cache_pages == 0 {
            return Err(RRTreeError::InvalidConfiguration(
                "cache must hold at least one page".into(),
            ));
        }
        if self.page_size < 512 {
            return Err(RRTreeError::InvalidConfiguration(format!(
                "page size {} is too small",
                self.page_size
            )));
        }
        Ok(())
    }
}

impl Default for FileContainerConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            cache_pages: DEFAULT_CACHE_PAGES,
        }
    }
}
