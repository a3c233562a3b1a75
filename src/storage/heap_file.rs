use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::buffer::{BufferPool, PageRef};
use crate::common::{
    HeapError, PageId, Permissions, Result, TableId, TransactionId,
};
use crate::tuple::{Schema, Tuple};

use super::page::HeapPage;

/// HeapFile stores the tuples of one table as an unordered sequence of
/// fixed-size heap pages in a single flat file.
///
/// The file has no header: page `n` lives at byte offset `n * page_size`, and
/// the file length is always a whole number of pages. The table id is derived
/// from the canonical path, so the same file maps to the same id in every run.
pub struct HeapFile {
    /// Stable id derived from the canonical path
    id: TableId,
    /// Canonical path of the backing file
    path: PathBuf,
    /// Schema of every tuple in the file
    schema: Arc<Schema>,
    /// Size of a page in bytes
    page_size: usize,
    /// The backing file
    file: Mutex<File>,
    /// Number of page reads performed
    num_reads: AtomicU32,
    /// Number of page writes performed
    num_writes: AtomicU32,
}

impl HeapFile {
    /// Opens the heap file at `path`, creating an empty one if it doesn't exist.
    pub fn open<P: AsRef<Path>>(path: P, schema: Arc<Schema>, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(HeapError::InvalidPageSize(page_size));
        }
        if HeapPage::slots_for(page_size, &schema) == 0 {
            return Err(HeapError::TupleTooLarge {
                tuple_size: schema.byte_size(),
                page_size,
            });
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let path = path.as_ref().canonicalize()?;
        let id = Self::id_for_path(&path);
        debug!(table_id = id.as_u32(), path = %path.display(), "opened heap file");

        Ok(Self {
            id,
            path,
            schema,
            page_size,
            file: Mutex::new(file),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    /// Computes the table id of a canonical path (CRC-32 of its bytes).
    pub fn id_for_path(path: &Path) -> TableId {
        TableId::new(crc32fast::hash(path.to_string_lossy().as_bytes()))
    }

    /// Returns the stable id of this file.
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Returns the schema of the tuples in this file.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the canonical path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of pages, `file_length / page_size`.
    pub fn page_count(&self) -> Result<u32> {
        let len = self.file.lock().metadata()?.len();
        Ok((len / self.page_size as u64) as u32)
    }

    /// Reads and decodes a page straight from disk, bypassing the buffer pool.
    pub fn read_page(&self, page_no: u32) -> Result<HeapPage> {
        let pid = PageId::new(self.id, page_no);
        let mut data = vec![0u8; self.page_size];

        {
            let mut file = self.file.lock();
            let len = file.metadata()?.len();
            if pid.offset(self.page_size) + self.page_size as u64 > len {
                return Err(HeapError::PageOutOfRange(pid));
            }
            file.seek(SeekFrom::Start(pid.offset(self.page_size)))?;
            file.read_exact(&mut data)?;
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        trace!(%pid, "read page from disk");
        HeapPage::new(pid, &data, self.schema.clone())
    }

    /// Writes the page's encoding at its offset in the file.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let pid = page.id();
        if pid.table_id != self.id {
            return Err(HeapError::TupleNotOnPage(pid));
        }
        let data = page.page_data();

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(pid.offset(self.page_size)))?;
        file.write_all(&data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        trace!(%pid, "wrote page to disk");
        Ok(())
    }

    /// Appends an empty page to the file and returns its page number.
    fn append_empty_page(&self) -> Result<u32> {
        let mut file = self.file.lock();
        let page_no = (file.metadata()?.len() / self.page_size as u64) as u32;
        let offset = PageId::new(self.id, page_no).offset(self.page_size);

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&HeapPage::empty_page_data(self.page_size))?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        debug!(table_id = self.id.as_u32(), page_no, "appended empty page");
        Ok(page_no)
    }

    /// Inserts `tuple` into the first page with a free slot, appending a new
    /// page when every existing page is full. Pages are fetched through the
    /// buffer pool; the returned pages were dirtied by the insert.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>> {
        if tuple.schema().as_ref() != self.schema.as_ref() {
            return Err(HeapError::SchemaMismatch {
                expected: self.schema.to_string(),
                found: tuple.schema().to_string(),
            });
        }

        for page_no in 0..self.page_count()? {
            let pid = PageId::new(self.id, page_no);
            if let Some(page) = Self::try_insert(pool, tid, pid, tuple)? {
                return Ok(vec![page]);
            }
        }

        // Another inserter may grab the fresh page first, so keep appending until one fits
        loop {
            let pid = PageId::new(self.id, self.append_empty_page()?);
            if let Some(page) = Self::try_insert(pool, tid, pid, tuple)? {
                return Ok(vec![page]);
            }
        }
    }

    /// Inserts into the resident copy of one page. Ok(None) means the page is full.
    fn try_insert(
        pool: &BufferPool,
        tid: TransactionId,
        pid: PageId,
        tuple: &mut Tuple,
    ) -> Result<Option<PageRef>> {
        let (page, inserted) = pool.mutate_page(tid, pid, |page| match page.insert_tuple(tuple) {
            Ok(_) => {
                page.mark_dirty(Some(tid));
                Ok(true)
            }
            Err(HeapError::PageFull(_)) => Ok(false),
            Err(e) => Err(e),
        })?;
        Ok(inserted.then_some(page))
    }

    /// Removes `tuple` from the page named by its record id.
    /// The returned pages were dirtied by the delete.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>> {
        let record_id = tuple.record_id().ok_or(HeapError::MissingRecordId)?;
        let pid = record_id.page_id;

        if pid.table_id != self.id {
            return Err(HeapError::TupleNotOnPage(pid));
        }
        if pid.page_no >= self.page_count()? {
            return Err(HeapError::PageOutOfRange(pid));
        }

        let (page, ()) = pool.mutate_page(tid, pid, |page| {
            page.delete_tuple(tuple)?;
            page.mark_dirty(Some(tid));
            Ok(())
        })?;
        Ok(vec![page])
    }

    /// Returns an iterator over every live tuple, in page order and slot order
    /// within a page. The iterator must be opened before use.
    pub fn iter(self: &Arc<Self>, pool: Arc<BufferPool>, tid: TransactionId) -> HeapFileIterator {
        HeapFileIterator::new(Arc::clone(self), pool, tid)
    }

    /// Returns the number of page reads performed.
    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of page writes performed.
    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for HeapFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapFile")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("schema", &self.schema.to_string())
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// Scans a heap file page by page through the buffer pool.
///
/// Each page's live tuples are copied out under its read lock when the scan
/// reaches it, so the page lock is never held between calls. Empty pages are
/// skipped.
pub struct HeapFileIterator {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    tid: TransactionId,
    /// Next page to load
    next_page: u32,
    /// Remaining tuples of the current page
    current: Option<std::vec::IntoIter<Tuple>>,
    /// Tuple fetched by has_next and not yet returned
    peeked: Option<Tuple>,
    open: bool,
}

impl HeapFileIterator {
    fn new(file: Arc<HeapFile>, pool: Arc<BufferPool>, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            next_page: 0,
            current: None,
            peeked: None,
            open: false,
        }
    }

    /// Starts the scan at the first page.
    pub fn open(&mut self) -> Result<()> {
        self.next_page = 0;
        self.current = None;
        self.peeked = None;
        self.open = true;
        Ok(())
    }

    /// Returns true if another tuple is available.
    pub fn has_next(&mut self) -> Result<bool> {
        if !self.open {
            return Err(HeapError::IteratorNotOpen);
        }
        if self.peeked.is_none() {
            self.peeked = self.advance()?;
        }
        Ok(self.peeked.is_some())
    }

    /// Returns the next tuple, or None once every page has been read.
    pub fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.open {
            return Err(HeapError::IteratorNotOpen);
        }
        match self.peeked.take() {
            Some(tuple) => Ok(Some(tuple)),
            None => self.advance(),
        }
    }

    /// Restarts the scan from the first page.
    pub fn rewind(&mut self) -> Result<()> {
        self.close();
        self.open()
    }

    /// Releases the scan state. next and has_next fail until reopened.
    pub fn close(&mut self) {
        self.open = false;
        self.current = None;
        self.peeked = None;
    }

    fn advance(&mut self) -> Result<Option<Tuple>> {
        loop {
            if let Some(tuple) = self.current.as_mut().and_then(|it| it.next()) {
                return Ok(Some(tuple));
            }

            if self.next_page >= self.file.page_count()? {
                self.current = None;
                return Ok(None);
            }

            let pid = PageId::new(self.file.id(), self.next_page);
            let page = self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?;
            let tuples: Vec<Tuple> = page.read().iter().cloned().collect();
            self.current = Some(tuples.into_iter());
            self.next_page += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DEFAULT_PAGE_SIZE;
    use crate::tuple::{Field, Type};
    use tempfile::NamedTempFile;

    fn schema() -> Arc<Schema> {
        Schema::builder()
            .field("a", Type::Int)
            .field("b", Type::Int)
            .build_arc()
    }

    #[test]
    fn test_new_file_is_empty() {
        let temp = NamedTempFile::new().unwrap();
        let file = HeapFile::open(temp.path(), schema(), DEFAULT_PAGE_SIZE).unwrap();
        assert_eq!(file.page_count().unwrap(), 0);
        assert!(matches!(
            file.read_page(0),
            Err(HeapError::PageOutOfRange(_))
        ));
    }

    #[test]
    fn test_id_is_stable() {
        let temp = NamedTempFile::new().unwrap();
        let a = HeapFile::open(temp.path(), schema(), DEFAULT_PAGE_SIZE).unwrap();
        let b = HeapFile::open(temp.path(), schema(), DEFAULT_PAGE_SIZE).unwrap();
        assert_eq!(a.id(), b.id());

        let other = NamedTempFile::new().unwrap();
        let c = HeapFile::open(other.path(), schema(), DEFAULT_PAGE_SIZE).unwrap();
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_write_then_read_page() {
        let temp = NamedTempFile::new().unwrap();
        let file = HeapFile::open(temp.path(), schema(), DEFAULT_PAGE_SIZE).unwrap();

        let page_no = file.append_empty_page().unwrap();
        assert_eq!(page_no, 0);
        assert_eq!(file.page_count().unwrap(), 1);

        let mut page = file.read_page(0).unwrap();
        let mut t = Tuple::new(schema(), vec![Field::Int(1), Field::Int(2)]).unwrap();
        page.insert_tuple(&mut t).unwrap();
        file.write_page(&page).unwrap();

        let reread = file.read_page(0).unwrap();
        assert_eq!(reread.iter().next(), Some(&t));
        assert_eq!(
            std::fs::metadata(temp.path()).unwrap().len(),
            DEFAULT_PAGE_SIZE as u64
        );
    }

    #[test]
    fn test_tuple_wider_than_page_rejected() {
        let temp = NamedTempFile::new().unwrap();
        let wide = Schema::builder().field("s", Type::Str).build_arc();
        assert!(matches!(
            HeapFile::open(temp.path(), wide.clone(), 64),
            Err(HeapError::TupleTooLarge {
                tuple_size: 132,
                page_size: 64
            })
        ));
        assert!(HeapFile::open(temp.path(), wide, 133).is_ok());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let temp = NamedTempFile::new().unwrap();
        assert!(matches!(
            HeapFile::open(temp.path(), schema(), 0),
            Err(HeapError::InvalidPageSize(0))
        ));
    }
}
