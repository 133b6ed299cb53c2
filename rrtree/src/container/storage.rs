//! Page file underneath `FileContainer`.
//!
//! The file is a sequence of fixed-size pages. Page 0 holds the
//! `FileHeader`; every other page holds one `PageRecord`, either a node
//! payload guarded by a CRC32 checksum or a link in the free-page chain.
//! Each read or write touches exactly one page.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants::{MAGIC, VERSION};
use crate::errors::{RRTreeError, RRTreeResult};

/// Bytes read to decode a header before the page size is known.
const HEADER_PROBE_LEN: usize = 256;

// ============================================================================
// File Header
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    pub page_size: u32,
    pub next_page_id: u64,
    pub node_count: u64,
    /// First page of the free chain (0 = empty chain)
    pub free_list_head: u64,
    pub free_page_count: u64,
}

impl FileHeader {
    pub fn new(page_size: usize) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            page_size: page_size as u32,
            next_page_id: 1,
            node_count: 0,
            free_list_head: 0,
            free_page_count: 0,
        }
    }

    pub fn validate(&self) -> RRTreeResult<()> {
        if self.magic != MAGIC {
            return Err(RRTreeError::Serialization(
                "Invalid file format (bad magic)".into(),
            ));
        }
        if self.version != VERSION {
            return Err(RRTreeError::Serialization(format!(
                "Unsupported file format version {}",
                self.version
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Page Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageRecord {
    /// A released page; `next_free` continues the chain (0 = end).
    Free { next_free: u64 },
    Node { checksum: u32, payload: Vec<u8> },
}

impl PageRecord {
    pub fn node(payload: Vec<u8>) -> Self {
        PageRecord::Node {
            checksum: crc32(&payload),
            payload,
        }
    }

    /// Returns the node payload after verifying its checksum,
    /// `None` for a free page.
    pub fn into_payload(self) -> RRTreeResult<Option<Vec<u8>>> {
        match self {
            PageRecord::Free { .. } => Ok(None),
            PageRecord::Node { checksum, payload } => {
                let expected = crc32(&payload);
                if checksum != expected {
                    return Err(RRTreeError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!(
                            "Page checksum mismatch - possible corruption (expected: {:x}, got: {:x})",
                            expected, checksum
                        ),
                    )));
                }
                Ok(Some(payload))
            }
        }
    }
}

/// CRC32-MPEG2
fn crc32(data: &[u8]) -> u32 {
    const POLY: u32 = 0x04C11DB7;
    let mut crc: u32 = 0xFFFFFFFF;

    for &byte in data {
        crc ^= (byte as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x80000000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
    }

    crc ^ 0xFFFFFFFF
}

pub(crate) fn encode<T: Serialize>(value: &T) -> RRTreeResult<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::legacy())
        .map_err(|e| RRTreeError::Serialization(e.to_string()))
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> RRTreeResult<T> {
    bincode::serde::decode_from_slice(bytes, bincode::config::legacy())
        .map(|(value, _)| value)
        .map_err(|e| RRTreeError::Serialization(e.to_string()))
}

// ============================================================================
// Storage
// ============================================================================

/// Reads and writes single pages of the container file.
pub struct PageStorage {
    file: RwLock<File>,
    path: PathBuf,
    page_size: usize,
}

impl PageStorage {
    /// Create (or truncate) a page file.
    pub fn create(path: &Path, page_size: usize) -> RRTreeResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            file: RwLock::new(file),
            path: path.to_path_buf(),
            page_size,
        })
    }

    /// Open an existing page file, returning its validated header.
    pub fn open(path: &Path) -> RRTreeResult<(Self, FileHeader)> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut storage = Self {
            file: RwLock::new(file),
            path: path.to_path_buf(),
            page_size: HEADER_PROBE_LEN,
        };
        let header = storage.read_header()?;
        header.validate()?;
        storage.page_size = header.page_size as usize;
        Ok((storage, header))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn read_header(&self) -> RRTreeResult<FileHeader> {
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(0))?;
        let mut buffer = vec![0u8; self.page_size.min(HEADER_PROBE_LEN)];
        file.read_exact(&mut buffer)?;
        decode(&buffer)
    }

    pub fn write_header(&self, header: &FileHeader) -> RRTreeResult<()> {
        let mut padded = encode(header)?;
        padded.resize(self.page_size, 0);

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&padded)?;
        Ok(())
    }

    /// Read the record stored on one page (one seek + one read).
    pub fn read_record(&self, page_id: u64) -> RRTreeResult<PageRecord> {
        Self::check_page(page_id)?;

        let offset = page_id * self.page_size as u64;
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; self.page_size];
        file.read_exact(&mut buffer)?;
        decode(&buffer)
    }

    pub fn write_record(&self, page_id: u64, record: &PageRecord) -> RRTreeResult<()> {
        Self::check_page(page_id)?;

        let mut padded = encode(record)?;
        if padded.len() > self.page_size {
            return Err(RRTreeError::Serialization(format!(
                "Node too large: {} bytes (max {})",
                padded.len(),
                self.page_size
            )));
        }
        padded.resize(self.page_size, 0);

        let offset = page_id * self.page_size as u64;
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&padded)?;
        Ok(())
    }

    pub fn sync(&self) -> RRTreeResult<()> {
        self.file.write().sync_all()?;
        Ok(())
    }

    fn check_page(page_id: u64) -> RRTreeResult<()> {
        if page_id == 0 {
            return Err(RRTreeError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Page 0 is reserved for the header",
            )));
        }
        Ok(())
    }
}
