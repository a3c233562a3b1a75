use std::sync::Arc;

use tracing::debug;

use crate::buffer::BufferPool;
use crate::common::{Result, TransactionId};
use crate::tuple::{Field, Schema, Tuple, Type};

use super::{OpIterator, TupleIterator};

/// Deletes every child tuple from the table its record id points into and
/// emits a single `{count}` tuple.
///
/// Like [`super::Insert`], the deletes run on the first open only.
pub struct Delete {
    pool: Arc<BufferPool>,
    tid: TransactionId,
    child: Box<dyn OpIterator>,
    schema: Arc<Schema>,
    count: Option<i32>,
    results: TupleIterator,
}

impl Delete {
    pub fn new(pool: Arc<BufferPool>, tid: TransactionId, child: Box<dyn OpIterator>) -> Self {
        let schema = Arc::new(Schema::from_types(&[Type::Int]));
        Self {
            pool,
            tid,
            child,
            results: TupleIterator::new(schema.clone(), Vec::new()),
            schema,
            count: None,
        }
    }

    fn delete_all(&mut self) -> Result<i32> {
        self.child.open()?;
        let mut count = 0;
        while let Some(tuple) = self.child.next()? {
            self.pool.delete_tuple(self.tid, &tuple)?;
            count += 1;
        }
        debug!(tid = %self.tid, count, "deleted tuples");
        Ok(count)
    }
}

impl OpIterator for Delete {
    fn open(&mut self) -> Result<()> {
        let count = match self.count {
            Some(count) => count,
            None => {
                let count = self.delete_all()?;
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
