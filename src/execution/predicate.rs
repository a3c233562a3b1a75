use std::fmt;

use crate::common::Result;
use crate::tuple::{CompareOp, Field, Tuple};

/// Right-hand side of a predicate comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A constant value
    Constant(Field),
    /// Another field of the same tuple
    Field(usize),
}

/// Compares one field of a tuple against a constant or another field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    field: usize,
    op: CompareOp,
    operand: Operand,
}

impl Predicate {
    pub fn new(field: usize, op: CompareOp, operand: Operand) -> Self {
        Self { field, op, operand }
    }

    /// Shorthand for a comparison against a constant.
    pub fn constant(field: usize, op: CompareOp, value: impl Into<Field>) -> Self {
        Self::new(field, op, Operand::Constant(value.into()))
    }

    /// Shorthand for a comparison between two fields.
    pub fn fields(field: usize, op: CompareOp, other: usize) -> Self {
        Self::new(field, op, Operand::Field(other))
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Evaluates the predicate on `tuple`.
    pub fn filter(&self, tuple: &Tuple) -> Result<bool> {
        let left = tuple.field(self.field)?;
        let right = match &self.operand {
            Operand::Constant(value) => value,
            Operand::Field(index) => tuple.field(*index)?,
        };
        left.compare(self.op, right)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Operand::Constant(value) => write!(f, "f{} {} {}", self.field, self.op, value),
            Operand::Field(index) => write!(f, "f{} {} f{}", self.field, self.op, index),
        }
    }
}
