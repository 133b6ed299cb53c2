//! File-backed container: bincode pages behind an LRU cache.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::cache::PageCache;
use super::storage::{decode, encode, FileHeader, PageRecord, PageStorage};
use super::{Container, ContainerStats, NodeKey};
use crate::config::FileContainerConfig;
use crate::errors::{RRTreeError, RRTreeResult};

/// Stores nodes in a page file and keeps hot ones in a `PageCache`.
///
/// Nodes are written lazily: an insert or update only dirties the cached
/// page, and the page reaches the file on eviction, `flush` or `close`.
/// Nodes accessed with `evictable == false` stay fixed in the cache; if the
/// cache is full of fixed nodes a new node cannot be admitted and the access
/// fails with `RRTreeError::BufferFull`.
pub struct FileContainer<N>
where
    N: Clone + Serialize + DeserializeOwned,
{
    storage: PageStorage,
    cache: PageCache<N>,
    header: FileHeader,
    stats: ContainerStats,
    closed: bool,
}

impl<N> FileContainer<N>
where
    N: Clone + Serialize + DeserializeOwned,
{
    /// Create an empty container file at `path`, truncating any existing file.
    pub fn create(path: impl AsRef<Path>, config: FileContainerConfig) -> RRTreeResult<Self> {
        config.validate()?;
        let storage = PageStorage::create(path.as_ref(), config.page_size)?;
        let header = FileHeader::new(config.page_size);
        storage.write_header(&header)?;
        storage.sync()?;
        log::debug!(
            "Created node container {:?} with {} byte pages",
            path.as_ref(),
            config.page_size
        );

        Ok(Self::with_parts(storage, header, config.cache_pages))
    }

    /// Open an existing container file. Only the header is read.
    pub fn open(path: impl AsRef<Path>, cache_pages: usize) -> RRTreeResult<Self> {
        if cache_pages == 0 {
            return Err(RRTreeError::InvalidConfiguration(
                "cache must hold at least one page".into(),
            ));
        }
        let (storage, header) = PageStorage::open(path.as_ref())?;
        log::debug!(
            "Opened node container {:?} holding {} nodes",
            path.as_ref(),
            header.node_count
        );
        Ok(Self::with_parts(storage, header, cache_pages))
    }

    fn with_parts(storage: PageStorage, header: FileHeader, cache_pages: usize) -> Self {
        Self {
            storage,
            cache: PageCache::new(cache_pages),
            header,
            stats: ContainerStats::default(),
            closed: false,
        }
    }

    /// Write every dirty page and the header, then sync the file.
    pub fn flush(&mut self) -> RRTreeResult<()> {
        self.check_closed()?;
        let mut dirty = self.cache.get_dirty_pages();
        dirty.sort();
        for key in dirty {
            self.write_back(key)?;
        }

        self.storage.write_header(&self.header)?;
        self.storage.sync()
    }

    /// Flush and refuse further use.
    pub fn close(&mut self) -> RRTreeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        self.closed = true;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }

    pub fn fixed_pages(&self) -> usize {
        self.cache.fixed_count()
    }

    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    fn check_closed(&self) -> RRTreeResult<()> {
        if self.closed {
            Err(RRTreeError::Closed)
        } else {
            Ok(())
        }
    }

    /// Take a page from the free chain, or extend the file.
    fn allocate_page(&mut self) -> RRTreeResult<u64> {
        if self.header.free_list_head != 0 {
            let page_id = self.header.free_list_head;
            match self.storage.read_record(page_id)? {
                PageRecord::Free { next_free } => {
                    self.header.free_list_head = next_free;
                    self.header.free_page_count -= 1;
                    return Ok(page_id);
                }
                PageRecord::Node { .. } => {
                    return Err(RRTreeError::Serialization(format!(
                        "Free list points at live page {}",
                        page_id
                    )));
                }
            }
        }

        let page_id = self.header.next_page_id;
        self.header.next_page_id += 1;
        Ok(page_id)
    }

    fn free_page(&mut self, page_id: u64) -> RRTreeResult<()> {
        let record = PageRecord::Free {
            next_free: self.header.free_list_head,
        };
        self.storage.write_record(page_id, &record)?;
        self.stats.disk_writes += 1;
        self.header.free_list_head = page_id;
        self.header.free_page_count += 1;
        Ok(())
    }

    /// Load a node straight from its page, `NodeNotFound` for unallocated
    /// or released pages.
    fn read_from_disk(&mut self, key: NodeKey) -> RRTreeResult<N> {
        if key.0 == 0 || key.0 >= self.header.next_page_id {
            return Err(RRTreeError::NodeNotFound(key));
        }
        self.stats.disk_reads += 1;
        match self.storage.read_record(key.0) {
            Ok(record) => match record.into_payload()? {
                Some(payload) => decode(&payload),
                None => Err(RRTreeError::NodeNotFound(key)),
            },
            // a page allocated but never flushed does not exist in the file yet
            Err(RRTreeError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(RRTreeError::NodeNotFound(key))
            }
            Err(e) => Err(e),
        }
    }

    /// Write a cached page to its slot if it is dirty.
    fn write_back(&mut self, key: NodeKey) -> RRTreeResult<()> {
        let Some(cached) = self.cache.peek(key) else {
            return Ok(());
        };
        if !cached.dirty {
            return Ok(());
        }
        let payload = encode(&cached.node)?;
        self.storage.write_record(key.0, &PageRecord::node(payload))?;
        self.stats.disk_writes += 1;
        self.cache.mark_clean(key);
        Ok(())
    }

    /// Evict until a page fits. A dirty page leaves the cache only after
    /// it reached the file, so a failed write loses nothing.
    fn make_room(&mut self) -> RRTreeResult<()> {
        while self.cache.needs_eviction() {
            let Some(victim) = self.cache.oldest_evictable() else {
                return Err(RRTreeError::BufferFull {
                    capacity: self.cache.capacity(),
                });
            };
            self.write_back(victim)?;
            self.cache.remove(victim);
        }
        Ok(())
    }

    /// Add a page to the cache, writing back whatever gets evicted.
    fn admit(&mut self, key: NodeKey, node: N, dirty: bool, fixed: bool) -> RRTreeResult<()> {
        self.make_room()?;
        self.cache.insert(key, node, dirty, fixed);
        Ok(())
    }
}

impl<N> Container<N> for FileContainer<N>
where
    N: Clone + Serialize + DeserializeOwned,
{
    fn insert(&mut self, node: N, evictable: bool) -> RRTreeResult<NodeKey> {
        self.check_closed()?;
        // evict first, so a failed eviction leaves no page allocated
        self.make_room()?;
        let key = NodeKey(self.allocate_page()?);
        self.admit(key, node, true, !evictable)?;
        self.header.node_count += 1;
        self.stats.inserts += 1;
        Ok(key)
    }

    fn get(&mut self, key: NodeKey, evictable: bool) -> RRTreeResult<N> {
        self.check_closed()?;
        self.stats.gets += 1;
        if let Some(node) = self.cache.get(key, !evictable) {
            self.stats.cache_hits += 1;
            return Ok(node.clone());
        }

        self.stats.cache_misses += 1;
        let node = self.read_from_disk(key)?;
        self.admit(key, node.clone(), false, !evictable)?;
        Ok(node)
    }

    fn update(&mut self, key: NodeKey, node: N, evictable: bool) -> RRTreeResult<()> {
        self.check_closed()?;
        if !self.cache.replace(key, node.clone(), !evictable) {
            // make sure the key names a live node before overwriting it
            self.read_from_disk(key)?;
            self.admit(key, node, true, !evictable)?;
        }
        self.stats.updates += 1;
        Ok(())
    }

    fn remove(&mut self, key: NodeKey) -> RRTreeResult<()> {
        self.check_closed()?;
        if self.cache.remove(key).is_none() {
            self.read_from_disk(key)?;
        }
        self.free_page(key.0)?;
        self.header.node_count -= 1;
        self.stats.removes += 1;
        Ok(())
    }

    fn contains(&self, key: NodeKey) -> bool {
        if self.cache.contains(key) {
            return true;
        }
        if key.0 == 0 || key.0 >= self.header.next_page_id {
            return false;
        }
        matches!(
            self.storage.read_record(key.0),
            Ok(PageRecord::Node { .. })
        )
    }

    fn len(&self) -> usize {
        self.header.node_count as usize
    }

    fn stats(&self) -> ContainerStats {
        self.stats
    }
}

impl<N> Drop for FileContainer<N>
where
    N: Clone + Serialize + DeserializeOwned,
{
    fn drop(&mut self) {
        // Best effort flush on drop
        if !self.closed {
            if let Err(e) = self.flush() {
                log::warn!("Failed to flush node container {:?}: {}", self.storage.path(), e);
            }
        }
    }
}
