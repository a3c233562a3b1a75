//! Buffer pool.
//!
//! The pool is the single access path to pages for the operators. It keeps at
//! most `pool_pages` decoded pages in an [`LruCache`]; a miss reads the page
//! from its table's heap file, and evicting a dirty page writes it back first.
//!
//! Misses and evictions are serialized by a load lock, so a page is never read
//! from disk while an evicted copy of it is still waiting to be written back.
//! Mutations go through [`BufferPool::mutate_page`], which only modifies the
//! copy that is resident in the cache.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::catalog::Catalog;
use crate::common::{
    HeapError, PageId, Permissions, Result, StorageConfig, TableId, TransactionId,
};
use crate::storage::page::HeapPage;
use crate::tuple::Tuple;

use super::LruCache;

/// A shared handle to a resident page. The lock provides the per-page
/// exclusive section for writers.
pub type PageRef = Arc<RwLock<HeapPage>>;

/// BufferPool caches pages of every table registered in the catalog.
pub struct BufferPool {
    config: StorageConfig,
    catalog: Arc<Catalog>,
    pages: LruCache<PageId, PageRef>,
    /// Held across a miss: disk read, insertion and write-back of the victim
    load_lock: Mutex<()>,
}

impl BufferPool {
    /// Creates a pool for the tables of `catalog`.
    pub fn new(config: StorageConfig, catalog: Arc<Catalog>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pages: LruCache::new(config.pool_pages)?,
            config,
            catalog,
            load_lock: Mutex::new(()),
        })
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Returns the maximum number of resident pages.
    pub fn capacity(&self) -> usize {
        self.pages.capacity()
    }

    /// Returns the number of resident pages.
    pub fn resident_pages(&self) -> usize {
        self.pages.len()
    }

    /// Returns true if the page is currently cached.
    pub fn is_resident(&self, pid: PageId) -> bool {
        self.pages.contains(&pid)
    }

    /// Returns the catalog this pool resolves table ids against.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Returns the page, reading it from disk on a miss.
    ///
    /// Permissions and the transaction id are recorded for a future lock
    /// manager; no page locks are taken here.
    pub fn get_page(&self, tid: TransactionId, pid: PageId, perm: Permissions) -> Result<PageRef> {
        if let Some(page) = self.pages.get(&pid) {
            trace!(%tid, %pid, ?perm, "buffer pool hit");
            return Ok(page);
        }

        let _load = self.load_lock.lock();
        // Another thread may have loaded it while we waited
        if let Some(page) = self.pages.get(&pid) {
            return Ok(page);
        }

        let file = self.catalog.file(pid.table_id)?;
        let page = Arc::new(RwLock::new(file.read_page(pid.page_no)?));
        debug!(%tid, %pid, ?perm, "buffer pool miss");

        let (page, evicted) = self.pages.get_or_insert(pid, page);
        if let Some((evicted_pid, evicted_page)) = evicted {
            self.write_back(evicted_pid, &evicted_page)?;
        }
        Ok(page)
    }

    /// Runs `f` on the resident copy of a page under its write lock and
    /// returns the page with `f`'s result.
    ///
    /// If the page is evicted between the fetch and the lock, the fetch is
    /// retried, so changes never land on a copy the cache has let go of.
    pub fn mutate_page<T>(
        &self,
        tid: TransactionId,
        pid: PageId,
        mut f: impl FnMut(&mut HeapPage) -> Result<T>,
    ) -> Result<(PageRef, T)> {
        loop {
            let page = self.get_page(tid, pid, Permissions::ReadWrite)?;
            let mut guard = page.write();
            let resident = self
                .pages
                .peek(&pid)
                .is_some_and(|cached| Arc::ptr_eq(&cached, &page));
            if !resident {
                trace!(%tid, %pid, "page evicted before mutation, refetching");
                continue;
            }
            let out = f(&mut *guard)?;
            drop(guard);
            return Ok((page, out));
        }
    }

    /// Inserts `tuple` into the table. On success the tuple carries its new
    /// record id.
    pub fn insert_tuple(&self, tid: TransactionId, table_id: TableId, tuple: &mut Tuple) -> Result<()> {
        let file = self.catalog.file(table_id)?;
        let dirtied = file.insert_tuple(self, tid, tuple)?;
        trace!(%tid, %table_id, pages = dirtied.len(), "inserted tuple");
        Ok(())
    }

    /// Deletes `tuple` from the table named by its record id.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(HeapError::MissingRecordId)?;
        let file = self.catalog.file(record_id.page_id.table_id)?;
        let dirtied = file.delete_tuple(self, tid, tuple)?;
        trace!(%tid, pid = %record_id.page_id, pages = dirtied.len(), "deleted tuple");
        Ok(())
    }

    /// Writes a page to its heap file if it is dirty and marks it clean.
    fn write_back(&self, pid: PageId, page: &PageRef) -> Result<bool> {
        let mut guard = page.write();
        if !guard.is_dirty() {
            return Ok(false);
        }
        let file = self.catalog.file(pid.table_id)?;
        file.write_page(&guard)?;
        guard.mark_dirty(None);
        debug!(%pid, "wrote back dirty page");
        Ok(true)
    }

    /// Writes one resident page to disk if dirty. Returns true if it was written.
    pub fn flush_page(&self, pid: PageId) -> Result<bool> {
        match self.pages.get(&pid) {
            Some(page) => self.write_back(pid, &page),
            None => Ok(false),
        }
    }

    /// Writes every dirty resident page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut flushed = 0usize;
        for (pid, page) in self.pages.entries() {
            if self.write_back(pid, &page)? {
                flushed += 1;
            }
        }
        debug!(flushed, "flushed all pages");
        Ok(())
    }

    /// Writes every resident page dirtied by `tid` to disk.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        for (pid, page) in self.pages.entries() {
            if page.read().dirtier() == Some(tid) {
                self.write_back(pid, &page)?;
            }
        }
        Ok(())
    }

    /// Drops a page from the cache without writing it back.
    pub fn discard_page(&self, pid: PageId) -> bool {
        let removed = self.pages.remove(&pid).is_some();
        if removed {
            debug!(%pid, "discarded page");
        }
        removed
    }

    /// Evicts the least recently used page, writing it back if dirty.
    /// Returns the evicted page id, or None if nothing is resident.
    pub fn evict_page(&self) -> Result<Option<PageId>> {
        let _load = self.load_lock.lock();
        match self.pages.discard_lru() {
            Some((pid, page)) => {
                self.write_back(pid, &page)?;
                Ok(Some(pid))
            }
            None => Ok(None),
        }
    }
}
