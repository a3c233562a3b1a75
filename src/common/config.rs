use super::error::{HeapError, Result};

/// Default size of a heap page in bytes (4 KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of pages the buffer pool keeps resident
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Maximum number of payload bytes stored for a string field
pub const STRING_LEN: usize = 128;

/// Encoded width of an integer field
pub const INT_SIZE: usize = 4;

/// Width of the length prefix in front of a string payload
pub const STRING_LEN_PREFIX: usize = 4;

/// Storage-level settings shared by the buffer pool and every heap file it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    /// Size of a heap page in bytes
    pub page_size: usize,
    /// Maximum number of pages resident in the buffer pool
    pub pool_pages: usize,
}

impl StorageConfig {
    pub fn new(page_size: usize, pool_pages: usize) -> Self {
        Self {
            page_size,
            pool_pages,
        }
    }

    /// Checks that the configuration can actually hold pages.
    pub fn validate(&self) -> Result<()> {
        if self.pool_pages == 0 {
            return Err(HeapError::InvalidCapacity(self.pool_pages));
        }
        if self.page_size == 0 {
            return Err(HeapError::InvalidPageSize(self.page_size));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_pages: DEFAULT_POOL_PAGES,
        }
    }
}
