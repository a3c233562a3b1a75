use std::fmt;

use crate::common::{HeapError, Result, INT_SIZE, STRING_LEN, STRING_LEN_PREFIX};

use super::Field;

/// Represents the field types supported by the storage engine.
/// Every type has a fixed encoded width so that tuples of one schema
/// always occupy the same number of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// 32-bit signed integer: 4 bytes, big-endian two's complement
    Int,

    /// String of at most STRING_LEN bytes.
    /// Stored as: length (4 bytes) + payload padded with zeros to STRING_LEN
    Str,
}

impl Type {
    /// Returns the encoded size of a field of this type in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            Type::Int => INT_SIZE,
            Type::Str => STRING_LEN_PREFIX + STRING_LEN,
        }
    }

    /// Parses the canonical text form of a field of this type.
    /// This is the inverse of `Field`'s `Display` implementation.
    pub fn parse(&self, text: &str) -> Result<Field> {
        match self {
            Type::Int => text
                .parse::<i32>()
                .map(Field::Int)
                .map_err(|_| HeapError::TypeMismatch {
                    expected: self.to_string(),
                    found: format!("{:?}", text),
                }),
            Type::Str => Ok(Field::string(text)),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "INT"),
            Type::Str => write!(f, "STRING"),
        }
    }
}
