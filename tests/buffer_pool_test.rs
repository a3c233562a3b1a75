//! Integration tests for the buffer pool

use std::sync::Arc;
use std::thread;

use heapstore::buffer::BufferPool;
use heapstore::catalog::Catalog;
use heapstore::common::{HeapError, PageId, Permissions, StorageConfig, TransactionId};
use heapstore::storage::HeapFile;
use heapstore::tuple::{Field, Schema, Tuple, Type};
use tempfile::TempDir;

// 64-byte pages hold 15 single-int tuples
const PAGE_SIZE: usize = 64;
const PER_PAGE: i32 = 15;

fn create_pool(dir: &TempDir, pool_pages: usize) -> (Arc<BufferPool>, Arc<HeapFile>) {
    let schema = Schema::builder().field("v", Type::Int).build_arc();
    let file = Arc::new(HeapFile::open(dir.path().join("t.dat"), schema, PAGE_SIZE).unwrap());
    let catalog = Arc::new(Catalog::new());
    catalog.register_table(file.clone(), "t", "v");
    let config = StorageConfig {
        page_size: PAGE_SIZE,
        pool_pages,
    };
    (Arc::new(BufferPool::new(config, catalog).unwrap()), file)
}

fn fill(pool: &BufferPool, file: &HeapFile, count: i32) {
    let tid = TransactionId::next();
    for v in 0..count {
        let mut t = Tuple::new(file.schema().clone(), vec![Field::Int(v)]).unwrap();
        pool.insert_tuple(tid, file.id(), &mut t).unwrap();
    }
}

#[test]
fn test_buffer_pool_invalid_config() {
    let catalog = Arc::new(Catalog::new());
    let config = StorageConfig {
        page_size: PAGE_SIZE,
        pool_pages: 0,
    };
    assert!(matches!(
        BufferPool::new(config, catalog),
        Err(HeapError::InvalidCapacity(0))
    ));
}

#[test]
fn test_buffer_pool_eviction_order() {
    let dir = TempDir::new().unwrap();
    let (pool, file) = create_pool(&dir, 2);
    fill(&pool, &file, PER_PAGE * 4);
    pool.flush_all_pages().unwrap();
    assert_eq!(file.page_count().unwrap(), 4);

    let tid = TransactionId::next();
    let pid = |n| PageId::new(file.id(), n);
    for n in 0..3 {
        pool.get_page(tid, pid(n), Permissions::ReadOnly).unwrap();
    }
    assert_eq!(pool.resident_pages(), 2);
    assert!(!pool.is_resident(pid(0)));
    assert!(pool.is_resident(pid(1)));
    assert!(pool.is_resident(pid(2)));

    // Touch 1 so that 2 is evicted next
    pool.get_page(tid, pid(1), Permissions::ReadOnly).unwrap();
    pool.get_page(tid, pid(3), Permissions::ReadOnly).unwrap();
    assert!(pool.is_resident(pid(1)));
    assert!(!pool.is_resident(pid(2)));
    assert!(pool.is_resident(pid(3)));
}

#[test]
fn test_buffer_pool_persistence() {
    let dir = TempDir::new().unwrap();
    {
        let (pool, file) = create_pool(&dir, 3);
        fill(&pool, &file, 100);
        pool.flush_all_pages().unwrap();
    }

    let (pool, file) = create_pool(&dir, 3);
    let tid = TransactionId::next();
    let mut iter = file.iter(pool.clone(), tid);
    iter.open().unwrap();
    let mut seen = Vec::new();
    while let Some(t) = iter.next().unwrap() {
        seen.push(t.field(0).unwrap().as_int().unwrap());
    }
    assert_eq!(seen, (0..100).collect::<Vec<_>>());
}

#[test]
fn test_buffer_pool_unflushed_changes_survive_eviction() {
    let dir = TempDir::new().unwrap();
    let (pool, file) = create_pool(&dir, 1);

    // Every page change evicts a dirty page, which must be written back
    fill(&pool, &file, PER_PAGE * 3);
    let page_count = file.page_count().unwrap();
    assert_eq!(page_count, 3);

    // The last page is still resident and dirty; the rest are on disk
    let last = page_count - 1;
    for n in 0..last {
        assert_eq!(file.read_page(n).unwrap().iter().count(), PER_PAGE as usize);
    }
    assert!(file.read_page(last).unwrap().iter().count() < PER_PAGE as usize);

    pool.flush_all_pages().unwrap();
    assert_eq!(file.read_page(last).unwrap().iter().count(), PER_PAGE as usize);
}

#[test]
fn test_buffer_pool_concurrent_readers() {
    let dir = TempDir::new().unwrap();
    let (pool, file) = create_pool(&dir, 2);
    fill(&pool, &file, PER_PAGE * 6);
    pool.flush_all_pages().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let file = Arc::clone(&file);
            thread::spawn(move || {
                let mut iter = file.iter(pool, TransactionId::next());
                iter.open().unwrap();
                let mut sum = 0i64;
                while let Some(t) = iter.next().unwrap() {
                    sum += i64::from(t.field(0).unwrap().as_int().unwrap());
                }
                sum
            })
        })
        .collect();

    let expected: i64 = (0..i64::from(PER_PAGE * 6)).sum();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
    assert!(pool.resident_pages() <= 2);
}
