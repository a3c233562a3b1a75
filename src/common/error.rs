use thiserror::Error;

use super::types::{PageId, TableId};

/// Storage and execution error types
#[derive(Error, Debug)]
pub enum HeapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Field index {index} out of range for arity {arity}")]
    FieldIndexOutOfRange { index: usize, arity: usize },

    #[error("No field named {0}")]
    FieldNameNotFound(String),

    #[error("Table {0} not found")]
    TableNotFound(TableId),

    #[error("No table named {0}")]
    TableNameNotFound(String),

    #[error("{0} is past the end of its heap file")]
    PageOutOfRange(PageId),

    #[error("{0} is full")]
    PageFull(PageId),

    #[error("Page {0} is corrupt: {1}")]
    CorruptPage(PageId, String),

    #[error("Tuple does not live on {0}")]
    TupleNotOnPage(PageId),

    #[error("Slot {1} of {0} is already empty")]
    SlotAlreadyEmpty(PageId, u16),

    #[error("Tuple has no record id")]
    MissingRecordId,

    #[error("Iterator is not open")]
    IteratorNotOpen,

    #[error("Transaction aborted")]
    TransactionAborted,

    #[error("Aggregate {op} is not supported over {field_type} fields")]
    UnsupportedAggregate { op: String, field_type: String },

    #[error("Aggregate result {0} does not fit an integer field")]
    AggregateOverflow(i64),

    #[error("Invalid cache capacity: {0}")]
    InvalidCapacity(usize),

    #[error("Invalid page size: {0}")]
    InvalidPageSize(usize),

    #[error("A {tuple_size}-byte tuple does not fit a {page_size}-byte page")]
    TupleTooLarge { tuple_size: usize, page_size: usize },
}

pub type Result<T> = std::result::Result<T, HeapError>;
