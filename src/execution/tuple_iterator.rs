use std::sync::Arc;

use crate::common::{HeapError, Result};
use crate::tuple::{Schema, Tuple};

use super::OpIterator;

/// An operator over a fixed list of tuples.
///
/// Also serves as the output buffer of operators that materialize their
/// results at open.
#[derive(Debug)]
pub struct TupleIterator {
    schema: Arc<Schema>,
    tuples: Vec<Tuple>,
    cursor: usize,
    open: bool,
}

impl TupleIterator {
    pub fn new(schema: Arc<Schema>, tuples: Vec<Tuple>) -> Self {
        Self {
            schema,
            tuples,
            cursor: 0,
            open: false,
        }
    }

    /// Returns the number of buffered tuples.
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    fn check_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(HeapError::IteratorNotOpen)
        }
    }
}

impl OpIterator for TupleIterator {
    fn open(&mut self) -> Result<()> {
        self.cursor = 0;
        self.open = true;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        self.check_open()?;
        Ok(self.cursor < self.tuples.len())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        self.check_open()?;
        let tuple = self.tuples.get(self.cursor).cloned();
        if tuple.is_some() {
            self.cursor += 1;
        }
        Ok(tuple)
    }

    fn rewind(&mut self) -> Result<()> {
        self.check_open()?;
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{Field, Type};

    fn iter_of(values: &[i32]) -> TupleIterator {
        let schema = Arc::new(Schema::from_types(&[Type::Int]));
        let tuples = values
            .iter()
            .map(|&v| Tuple::new(schema.clone(), vec![Field::Int(v)]).unwrap())
            .collect();
        TupleIterator::new(schema, tuples)
    }

    #[test]
    fn test_not_open() {
        let mut it = iter_of(&[1]);
        assert!(matches!(it.next(), Err(HeapError::IteratorNotOpen)));
        assert!(matches!(it.has_next(), Err(HeapError::IteratorNotOpen)));

        it.open().unwrap();
        it.close();
        assert!(matches!(it.next(), Err(HeapError::IteratorNotOpen)));
    }

    #[test]
    fn test_exhaust_and_rewind() {
        let mut it = iter_of(&[1, 2]);
        it.open().unwrap();
        assert!(it.has_next().unwrap());
        assert_eq!(it.next().unwrap().unwrap().field(0).unwrap(), &Field::Int(1));
        assert_eq!(it.next().unwrap().unwrap().field(0).unwrap(), &Field::Int(2));
        assert!(!it.has_next().unwrap());
        assert!(it.next().unwrap().is_none());
        assert!(it.next().unwrap().is_none());

        it.rewind().unwrap();
        assert_eq!(it.next().unwrap().unwrap().field(0).unwrap(), &Field::Int(1));
    }
}
