use std::sync::Arc;

use tracing::trace;

use crate::common::{HeapError, Result};
use crate::tuple::{Schema, SchemaItem, Tuple, Type};

use super::{new_aggregator, AggregateOp, OpIterator, TupleIterator};

/// Computes an aggregate over one child field, optionally grouped by another.
///
/// Output tuples are `(group, value)` when grouping and `(value)` otherwise.
/// The value column is always an integer named `op(field)`. All input is
/// consumed at open; an empty input produces no tuples.
pub struct Aggregate {
    child: Box<dyn OpIterator>,
    afield: usize,
    gfield: Option<usize>,
    op: AggregateOp,
    afield_type: Type,
    gfield_type: Option<Type>,
    schema: Arc<Schema>,
    results: TupleIterator,
}

impl Aggregate {
    /// Fails with `UnsupportedAggregate` for anything but COUNT over a string field.
    pub fn new(
        child: Box<dyn OpIterator>,
        afield: usize,
        gfield: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self> {
        let child_schema = child.schema().clone();
        let afield_type = child_schema.field_type(afield)?;
        let gfield_type = gfield.map(|g| child_schema.field_type(g)).transpose()?;

        if afield_type == Type::Str && op != AggregateOp::Count {
            return Err(HeapError::UnsupportedAggregate {
                op: op.to_string(),
                field_type: afield_type.to_string(),
            });
        }

        let agg_name = format!("{}({})", op, child_schema.field_name(afield)?.unwrap_or(""));
        let mut items = Vec::with_capacity(2);
        if let (Some(g), Some(gtype)) = (gfield, gfield_type) {
            let name = child_schema.field_name(g)?.map(str::to_string);
            items.push(SchemaItem::new(gtype, name));
        }
        items.push(SchemaItem::new(Type::Int, Some(agg_name)));
        let schema = Arc::new(Schema::new(items));

        Ok(Self {
            child,
            afield,
            gfield,
            op,
            afield_type,
            gfield_type,
            results: TupleIterator::new(schema.clone(), Vec::new()),
            schema,
        })
    }

    /// Returns the grouping field index, if any.
    pub fn group_field(&self) -> Option<usize> {
        self.gfield
    }

    /// Returns the name of the grouping field in the output, if grouping.
    pub fn group_field_name(&self) -> Option<&str> {
        self.gfield
            .and_then(|_| self.schema.field_name(0).ok().flatten())
    }

    pub fn aggregate_field(&self) -> usize {
        self.afield
    }

    /// Returns the name of the aggregate column, `op(field)`.
    pub fn aggregate_field_name(&self) -> Option<&str> {
        let index = self.schema.num_fields() - 1;
        self.schema.field_name(index).ok().flatten()
    }

    pub fn aggregate_op(&self) -> AggregateOp {
        self.op
    }
}

impl OpIterator for Aggregate {
    fn open(&mut self) -> Result<()> {
        let mut aggregator = new_aggregator(
            self.gfield,
            self.gfield_type,
            self.afield,
            self.afield_type,
            self.op,
        )?;

        self.child.open()?;
        let mut merged = 0usize;
        while let Some(tuple) = self.child.next()? {
            aggregator.merge_tuple(&tuple)?;
            merged += 1;
        }

        let tuples = aggregator.results(&self.schema)?;
        trace!(op = %self.op, merged, groups = tuples.len(), "aggregate materialized");
        self.results = TupleIterator::new(self.schema.clone(), tuples);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::collect_tuples;
    use crate::tuple::Field;

    fn child(rows: &[(i32, &str)]) -> Box<dyn OpIterator> {
        let schema = Schema::builder()
            .field("n", Type::Int)
            .field("s", Type::Str)
            .build_arc();
        let tuples = rows
            .iter()
            .map(|&(n, s)| Tuple::new(schema.clone(), vec![Field::Int(n), Field::from(s)]).unwrap())
            .collect();
        Box::new(TupleIterator::new(schema, tuples))
    }

    #[test]
    fn test_schema_and_accessors() {
        let agg = Aggregate::new(child(&[]), 0, Some(1), AggregateOp::Sum).unwrap();
        assert_eq!(agg.schema().to_string(), "STRING(s),INT(sum(n))");
        assert_eq!(agg.group_field(), Some(1));
        assert_eq!(agg.group_field_name(), Some("s"));
        assert_eq!(agg.aggregate_field(), 0);
        assert_eq!(agg.aggregate_field_name(), Some("sum(n)"));
        assert_eq!(agg.aggregate_op(), AggregateOp::Sum);

        let agg = Aggregate::new(child(&[]), 1, None, AggregateOp::Count).unwrap();
        assert_eq!(agg.schema().num_fields(), 1);
        assert_eq!(agg.group_field_name(), None);
    }

    #[test]
    fn test_string_sum_rejected() {
        assert!(matches!(
            Aggregate::new(child(&[]), 1, None, AggregateOp::Sum),
            Err(HeapError::UnsupportedAggregate { .. })
        ));
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let mut agg = Aggregate::new(child(&[]), 0, None, AggregateOp::Count).unwrap();
        agg.open().unwrap();
        assert!(!agg.has_next().unwrap());
    }

    #[test]
    fn test_grouped_by_string() {
        let rows = [(1, "a"), (2, "b"), (3, "a")];
        let mut agg = Aggregate::new(child(&rows), 0, Some(1), AggregateOp::Max).unwrap();
        agg.open().unwrap();
        let mut out: Vec<String> = collect_tuples(&mut agg)
            .unwrap()
            .iter()
            .map(|t| t.to_string())
            .collect();
        out.sort();
        assert_eq!(out, vec!["a\t3", "b\t2"]);

        agg.rewind().unwrap();
        assert_eq!(collect_tuples(&mut agg).unwrap().len(), 2);
    }
}
