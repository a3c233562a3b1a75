use std::sync::Arc;

use tracing::trace;

use crate::buffer::BufferPool;
use crate::common::{Result, TableId, TransactionId};
use crate::storage::HeapFileIterator;
use crate::tuple::{Schema, Tuple};

use super::OpIterator;

/// Sequential scan over every live tuple of a table, in storage order.
///
/// With an alias, output field names become `alias.field`.
pub struct SeqScan {
    table_id: TableId,
    table_name: String,
    alias: Option<String>,
    schema: Arc<Schema>,
    iter: HeapFileIterator,
}

impl SeqScan {
    /// Creates a scan of `table_id` whose output keeps the table's field names.
    pub fn new(pool: Arc<BufferPool>, tid: TransactionId, table_id: TableId) -> Result<Self> {
        Self::build(pool, tid, table_id, None)
    }

    /// Creates a scan whose output field names are prefixed by `alias`.
    pub fn with_alias(
        pool: Arc<BufferPool>,
        tid: TransactionId,
        table_id: TableId,
        alias: impl Into<String>,
    ) -> Result<Self> {
        Self::build(pool, tid, table_id, Some(alias.into()))
    }

    fn build(
        pool: Arc<BufferPool>,
        tid: TransactionId,
        table_id: TableId,
        alias: Option<String>,
    ) -> Result<Self> {
        let catalog = pool.catalog().clone();
        let file = catalog.file(table_id)?;
        let table_name = catalog.table_name(table_id)?;
        let schema = match &alias {
            Some(alias) => Arc::new(file.schema().with_alias(alias)),
            None => file.schema().clone(),
        };

        Ok(Self {
            table_id,
            table_name,
            alias,
            schema,
            iter: file.iter(pool, tid),
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

impl OpIterator for SeqScan {
    fn open(&mut self) -> Result<()> {
        trace!(table = %self.table_name, "opening scan");
        self.iter.open()
    }

    fn has_next(&mut self) -> Result<bool> {
        self.iter.has_next()
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        let mut tuple = match self.iter.next()? {
            Some(tuple) => tuple,
            None => return Ok(None),
        };
        if self.alias.is_some() {
            tuple.reset_schema(self.schema.clone());
        }
        Ok(Some(tuple))
    }

    fn rewind(&mut self) -> Result<()> {
        self.iter.rewind()
    }

    fn close(&mut self) {
        self.iter.close();
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
