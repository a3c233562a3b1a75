use std::sync::Arc;

use tracing::trace;

use crate::common::Result;
use crate::tuple::{Schema, Tuple};

use super::{OpIterator, Predicate, TupleIterator};

/// Passes through the child tuples that satisfy a predicate.
///
/// Matches are collected when the operator is opened; rewind replays them
/// without touching the child.
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn OpIterator>,
    results: TupleIterator,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator>) -> Self {
        let results = TupleIterator::new(child.schema().clone(), Vec::new());
        Self {
            predicate,
            child,
            results,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl OpIterator for Filter {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        let mut matches = Vec::new();
        while let Some(tuple) = self.child.next()? {
            if self.predicate.filter(&tuple)? {
                matches.push(tuple);
            }
        }
        trace!(predicate = %self.predicate, matched = matches.len(), "filter materialized");

        self.results = TupleIterator::new(self.child.schema().clone(), matches);
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
        self.child.schema()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::HeapError;
    use crate::execution::collect_tuples;
    use crate::tuple::{CompareOp, Field, Type};

    fn child() -> Box<dyn OpIterator> {
        let schema = Arc::new(Schema::from_types(&[Type::Int, Type::Int]));
        let rows = [(1, 2), (3, 4), (5, 6)];
        let tuples = rows
            .iter()
            .map(|&(a, b)| Tuple::new(schema.clone(), vec![Field::Int(a), Field::Int(b)]).unwrap())
            .collect();
        Box::new(TupleIterator::new(schema, tuples))
    }

    #[test]
    fn test_filter_greater_than() {
        let mut filter = Filter::new(Predicate::constant(0, CompareOp::GreaterThan, 2), child());
        filter.open().unwrap();
        let out = collect_tuples(&mut filter).unwrap();
        let firsts: Vec<_> = out.iter().map(|t| t.field(0).unwrap().clone()).collect();
        assert_eq!(firsts, vec![Field::Int(3), Field::Int(5)]);
    }

    #[test]
    fn test_rewind_and_reopen() {
        let mut filter = Filter::new(Predicate::constant(1, CompareOp::Equals, 4), child());
        assert_eq!(filter.predicate().field(), 1);
        assert!(matches!(filter.next(), Err(HeapError::IteratorNotOpen)));

        filter.open().unwrap();
        assert_eq!(collect_tuples(&mut filter).unwrap().len(), 1);
        assert!(filter.next().unwrap().is_none());

        filter.rewind().unwrap();
        assert_eq!(collect_tuples(&mut filter).unwrap().len(), 1);

        filter.close();
        assert!(matches!(filter.has_next(), Err(HeapError::IteratorNotOpen)));
        filter.open().unwrap();
        assert_eq!(collect_tuples(&mut filter).unwrap().len(), 1);
    }
}
