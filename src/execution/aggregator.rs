use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::common::{HeapError, Result};
use crate::tuple::{Field, Schema, Tuple, Type};

/// Group key used when there is no grouping field.
const NO_GROUPING_KEY: &str = "NO_GROUPING_KEY";

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
        };
        write!(f, "{}", s)
    }
}

/// Accumulates tuples into groups and produces one result tuple per group.
pub trait Aggregator: Send {
    /// Folds one tuple into its group.
    fn merge_tuple(&mut self, tuple: &Tuple) -> Result<()>;

    /// Returns `(group, value)` or `(value)` tuples, one per group seen.
    fn results(&self, schema: &Arc<Schema>) -> Result<Vec<Tuple>>;
}

/// Builds the aggregator that matches the aggregated field's type.
pub fn new_aggregator(
    gfield: Option<usize>,
    gtype: Option<Type>,
    afield: usize,
    afield_type: Type,
    op: AggregateOp,
) -> Result<Box<dyn Aggregator>> {
    match afield_type {
        Type::Int => Ok(Box::new(IntegerAggregator::new(gfield, gtype, afield, op))),
        Type::Str => Ok(Box::new(StringAggregator::new(gfield, gtype, afield, op)?)),
    }
}

/// Grouping state shared by both aggregators.
#[derive(Debug)]
struct Grouping {
    gfield: Option<usize>,
    gtype: Option<Type>,
}

impl Grouping {
    /// Returns the canonical text key of the tuple's group.
    fn key(&self, tuple: &Tuple) -> Result<String> {
        match (self.gfield, self.gtype) {
            (Some(index), Some(gtype)) => {
                let field = tuple.field(index)?;
                if field.field_type() != gtype {
                    return Err(HeapError::TypeMismatch {
                        expected: gtype.to_string(),
                        found: field.field_type().to_string(),
                    });
                }
                Ok(field.to_string())
            }
            _ => Ok(NO_GROUPING_KEY.to_string()),
        }
    }

    fn output(&self, schema: &Arc<Schema>, key: &str, value: i64) -> Result<Tuple> {
        let value = i32::try_from(value).map_err(|_| HeapError::AggregateOverflow(value))?;
        let fields = match self.gtype {
            Some(gtype) if self.gfield.is_some() => vec![gtype.parse(key)?, Field::Int(value)],
            _ => vec![Field::Int(value)],
        };
        Tuple::new(schema.clone(), fields)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct GroupState {
    value: i64,
    sum: i64,
    count: i64,
}

/// Computes COUNT, SUM, AVG, MIN and MAX over an integer field.
#[derive(Debug)]
pub struct IntegerAggregator {
    grouping: Grouping,
    afield: usize,
    op: AggregateOp,
    groups: HashMap<String, GroupState>,
}

impl IntegerAggregator {
    pub fn new(gfield: Option<usize>, gtype: Option<Type>, afield: usize, op: AggregateOp) -> Self {
        Self {
            grouping: Grouping { gfield, gtype },
            afield,
            op,
            groups: HashMap::new(),
        }
    }
}

impl Aggregator for IntegerAggregator {
    fn merge_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let key = self.grouping.key(tuple)?;
        let v = i64::from(tuple.field(self.afield)?.as_int()?);

        let first = !self.groups.contains_key(&key);
        let state = self.groups.entry(key).or_default();
        state.count += 1;
        state.sum += v;

        state.value = match self.op {
            AggregateOp::Count => state.count,
            AggregateOp::Sum => state.sum,
            // Integer division truncating toward zero
            AggregateOp::Avg => state.sum / state.count,
            AggregateOp::Min if first => v,
            AggregateOp::Min => state.value.min(v),
            AggregateOp::Max if first => v,
            AggregateOp::Max => state.value.max(v),
        };
        Ok(())
    }

    fn results(&self, schema: &Arc<Schema>) -> Result<Vec<Tuple>> {
        self.groups
            .iter()
            .map(|(key, state)| self.grouping.output(schema, key, state.value))
            .collect()
    }
}

/// Counts the values of a string field. Only COUNT is supported.
#[derive(Debug)]
pub struct StringAggregator {
    grouping: Grouping,
    afield: usize,
    counts: HashMap<String, i64>,
}

impl StringAggregator {
    /// Fails with `UnsupportedAggregate` for anything but COUNT.
    pub fn new(gfield: Option<usize>, gtype: Option<Type>, afield: usize, op: AggregateOp) -> Result<Self> {
        if op != AggregateOp::Count {
            return Err(HeapError::UnsupportedAggregate {
                op: op.to_string(),
                field_type: Type::Str.to_string(),
            });
        }
        Ok(Self {
            grouping: Grouping { gfield, gtype },
            afield,
            counts: HashMap::new(),
        })
    }
}

impl Aggregator for StringAggregator {
    fn merge_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let key = self.grouping.key(tuple)?;
        let field = tuple.field(self.afield)?;
        if field.field_type() != Type::Str {
            return Err(HeapError::TypeMismatch {
                expected: Type::Str.to_string(),
                found: field.field_type().to_string(),
            });
        }
        *self.counts.entry(key).or_insert(0) += 1;
        Ok(())
    }

    fn results(&self, schema: &Arc<Schema>) -> Result<Vec<Tuple>> {
        self.counts
            .iter()
            .map(|(key, &count)| self.grouping.output(schema, key, count))
            .collect()
    }
}
