//! Constants for the RR-tree and its page file.

/// Default page size (16KB) for the file container
pub const PAGE_SIZE: usize = 16384;

/// Default maximum number of entries per node
pub const MAX_NODE_ENTRIES: usize = 64;

/// Default minimum entries before underflow (roughly 40% of max)
pub const MIN_NODE_ENTRIES: usize = 25;

/// Default cache size in number of pages (16MB with 16KB pages)
pub const DEFAULT_CACHE_PAGES: usize = 1024;

/// Default number of index nodes kept by an `IndexNodeCache`
pub const DEFAULT_INDEX_CACHE_NODES: usize = 256;

/// Magic number for file format identification
pub const MAGIC: u32 = 0x52525452; // "RRTR"

/// File format version
pub const VERSION: u32 = 1;
