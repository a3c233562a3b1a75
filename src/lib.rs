//! Heapstore - a single-node relational storage and query engine
//!
//! Tables are stored as heap files of fixed-size pages. Every page access goes
//! through a bounded LRU buffer pool, and queries are trees of pull-based
//! operators.
//!
//! # Architecture
//!
//! - **Tuples** (`tuple`): typed fields, schemas and fixed-width tuple encoding
//!   - `Type`: `Int` (4 bytes) and `Str` (length prefix + 128 bytes)
//!   - `Schema`: ordered (type, name) pairs
//!   - `Tuple`: a field vector bound to a schema, with an optional record id
//!
//! - **Storage** (`storage`): on-disk layout
//!   - `HeapPage`: presence bitmap followed by fixed-width tuple slots
//!   - `HeapFile`: flat file of heap pages, one per table
//!
//! - **Buffer Pool** (`buffer`): page cache
//!   - `LruCache`: bounded map evicting the least recently used entry
//!   - `BufferPool`: page access, dirty write-back and flushing
//!
//! - **Catalog** (`catalog`): table id / name to heap file mapping
//!
//! - **Execution** (`execution`): `SeqScan`, `Filter`, `Insert`, `Delete`
//!   and `Aggregate` operators
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use heapstore::buffer::BufferPool;
//! use heapstore::catalog::Catalog;
//! use heapstore::common::{StorageConfig, TransactionId};
//! use heapstore::execution::{collect_tuples, OpIterator, SeqScan};
//! use heapstore::storage::HeapFile;
//! use heapstore::tuple::{Field, Schema, Tuple, Type};
//!
//! let config = StorageConfig::default();
//! let schema = Schema::builder().field("id", Type::Int).build_arc();
//! let file = Arc::new(HeapFile::open("users.dat", schema.clone(), config.page_size).unwrap());
//!
//! let catalog = Arc::new(Catalog::new());
//! catalog.register_table(file.clone(), "users", "id");
//! let pool = Arc::new(BufferPool::new(config, catalog).unwrap());
//!
//! let tid = TransactionId::next();
//! let mut tuple = Tuple::new(schema, vec![Field::Int(1)]).unwrap();
//! pool.insert_tuple(tid, file.id(), &mut tuple).unwrap();
//!
//! let mut scan = SeqScan::new(pool.clone(), tid, file.id()).unwrap();
//! scan.open().unwrap();
//! let rows = collect_tuples(&mut scan).unwrap();
//! assert_eq!(rows.len(), 1);
//!
//! pool.flush_all_pages().unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod execution;
pub mod storage;
pub mod tuple;

// Re-export commonly used types
pub use common::{HeapError, PageId, RecordId, Result, TableId, TransactionId};
