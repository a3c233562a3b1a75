//! Pull-based query operators.
//!
//! Every operator implements [`OpIterator`]. A parent pulls tuples from its
//! children one at a time; operator trees are built from boxed trait objects
//! and driven from a single thread.

mod aggregate;
mod aggregator;
mod delete;
mod filter;
mod insert;
mod predicate;
mod seq_scan;
mod tuple_iterator;

pub use aggregate::*;
pub use aggregator::*;
pub use delete::*;
pub use filter::*;
pub use insert::*;
pub use predicate::*;
pub use seq_scan::*;
pub use tuple_iterator::*;

use std::sync::Arc;

use crate::common::Result;
use crate::tuple::{Schema, Tuple};

/// The iterator protocol shared by all operators.
///
/// `next` and `has_next` fail with `IteratorNotOpen` before `open` and after
/// `close`. Once exhausted, `next` keeps returning `Ok(None)` until `rewind`.
pub trait OpIterator: Send {
    /// Prepares the operator, opening its children.
    fn open(&mut self) -> Result<()>;

    /// Returns true if `next` would produce a tuple.
    fn has_next(&mut self) -> Result<bool>;

    /// Returns the next tuple, or None once exhausted.
    fn next(&mut self) -> Result<Option<Tuple>>;

    /// Restarts the operator from its first tuple.
    fn rewind(&mut self) -> Result<()>;

    /// Releases resources. The operator may be opened again.
    fn close(&mut self);

    /// Returns the schema of the produced tuples.
    fn schema(&self) -> &Arc<Schema>;
}

/// Drains an opened operator into a vector.
pub fn collect_tuples(op: &mut dyn OpIterator) -> Result<Vec<Tuple>> {
    let mut tuples = Vec::new();
    while let Some(tuple) = op.next()? {
        tuples.push(tuple);
    }
    Ok(tuples)
}
