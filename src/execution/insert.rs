use std::sync::Arc;

use tracing::debug;

use crate::buffer::BufferPool;
use crate::common::{HeapError, Result, TableId, TransactionId};
use crate::tuple::{Field, Schema, Tuple, Type};

use super::{OpIterator, TupleIterator};

/// Inserts every child tuple into a table and emits a single `{count}` tuple.
///
/// The inserts happen on the first open only. Reopening or rewinding replays
/// the count without inserting again.
pub struct Insert {
    pool: Arc<BufferPool>,
    tid: TransactionId,
    child: Box<dyn OpIterator>,
    table_id: TableId,
    schema: Arc<Schema>,
    count: Option<i32>,
    results: TupleIterator,
}

impl Insert {
    /// Fails with `SchemaMismatch` if the child's schema differs from the table's.
    pub fn new(
        pool: Arc<BufferPool>,
        tid: TransactionId,
        child: Box<dyn OpIterator>,
        table_id: TableId,
    ) -> Result<Self> {
        let table_schema = pool.catalog().schema(table_id)?;
        if child.schema().as_ref() != table_schema.as_ref() {
            return Err(HeapError::SchemaMismatch {
                expected: table_schema.to_string(),
                found: child.schema().to_string(),
            });
        }

        let schema = Arc::new(Schema::from_types(&[Type::Int]));
        Ok(Self {
            pool,
            tid,
            child,
            table_id,
            results: TupleIterator::new(schema.clone(), Vec::new()),
            schema,
            count: None,
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    fn insert_all(&mut self) -> Result<i32> {
        self.child.open()?;
        let mut count = 0;
        while let Some(mut tuple) = self.child.next()? {
            self.pool.insert_tuple(self.tid, self.table_id, &mut tuple)?;
            count += 1;
        }
        debug!(tid = %self.tid, table_id = %self.table_id, count, "inserted tuples");
        Ok(count)
    }
}

impl OpIterator for Insert {
    fn open(&mut self) -> Result<()> {
        let count = match self.count {
            Some(count) => count,
            None => {
                let count = self.insert_all()?;
                self.count = Some(count);
                count
            }
        };
        let tuple = Tuple::new(self.schema.clone(), vec![Field::Int(count)])?;
        self.results = TupleIterator::new(self.schema.clone(), vec![tuple]);
        self.results.open()
    }

    fn has_next(&mut self) -> Result<bool> {
        self.results.has_next()
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        self.results.next()
    }

    fn rewind(&mut self) -> Result<()> {
        self.results.rewind()
    }

    fn close(&mut self) {
        self.results.close();
        self.child.close();
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
