use std::cmp::Ordering;
use std::fmt;

use bytes::{Buf, BufMut};

use crate::common::{HeapError, Result, STRING_LEN};

use super::Type;

/// Comparison operators usable in predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    /// Substring containment for strings, equality for integers
    Like,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Equals => "=",
            CompareOp::NotEquals => "<>",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterThanOrEq => ">=",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEq => "<=",
            CompareOp::Like => "LIKE",
        };
        write!(f, "{}", s)
    }
}

/// Represents a typed value stored in a tuple.
/// Each variant corresponds to a `Type` and holds the actual data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    /// 32-bit signed integer
    Int(i32),

    /// String of at most STRING_LEN bytes
    Str(String),
}

impl Field {
    /// Creates a string field, truncating the payload to STRING_LEN bytes.
    pub fn string(s: impl Into<String>) -> Self {
        let mut s = s.into();
        truncate_to_boundary(&mut s, STRING_LEN);
        Field::Str(s)
    }

    /// Truncates an over-length string payload so the in-memory value matches
    /// what the fixed-width encoding stores.
    pub fn fit_to_width(self) -> Self {
        match self {
            Field::Str(s) if s.len() > STRING_LEN => Field::string(s),
            other => other,
        }
    }

    /// Returns the type of this field.
    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Str(_) => Type::Str,
        }
    }

    /// Returns the integer payload, or a type error for strings.
    pub fn as_int(&self) -> Result<i32> {
        match self {
            Field::Int(v) => Ok(*v),
            Field::Str(_) => Err(HeapError::TypeMismatch {
                expected: Type::Int.to_string(),
                found: Type::Str.to_string(),
            }),
        }
    }

    /// Writes the fixed-width encoding of this field.
    /// Over-length strings are truncated so the width never changes.
    pub fn serialize<B: BufMut>(&self, buf: &mut B) {
        match self {
            Field::Int(v) => buf.put_i32(*v),
            Field::Str(s) => {
                let len = boundary_at_most(s, STRING_LEN);
                buf.put_u32(len as u32);
                buf.put_slice(&s.as_bytes()[..len]);
                buf.put_bytes(0, STRING_LEN - len);
            }
        }
    }

    /// Reads a field of the given type from the front of `data`.
    /// Returns the field and the number of bytes consumed.
    pub fn deserialize(mut data: &[u8], field_type: Type) -> Option<(Self, usize)> {
        let width = field_type.byte_len();
        if data.len() < width {
            return None;
        }

        match field_type {
            Type::Int => Some((Field::Int(data.get_i32()), width)),
            Type::Str => {
                let len = data.get_u32() as usize;
                if len > STRING_LEN {
                    return None;
                }
                let s = String::from_utf8_lossy(&data[..len]).into_owned();
                Some((Field::Str(s), width))
            }
        }
    }

    /// Orders two fields of the same type.
    /// Integers compare numerically, strings lexicographically by bytes.
    pub fn try_cmp(&self, other: &Field) -> Result<Ordering> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => Ok(a.cmp(b)),
            (Field::Str(a), Field::Str(b)) => Ok(a.cmp(b)),
            _ => Err(HeapError::TypeMismatch {
                expected: self.field_type().to_string(),
                found: other.field_type().to_string(),
            }),
        }
    }

    /// Evaluates `self op other`. Fails when the two fields have different types.
    pub fn compare(&self, op: CompareOp, other: &Field) -> Result<bool> {
        if let (CompareOp::Like, Field::Str(a), Field::Str(b)) = (op, self, other) {
            return Ok(a.contains(b.as_str()));
        }

        let ordering = self.try_cmp(other)?;
        Ok(match op {
            CompareOp::Equals | CompareOp::Like => ordering == Ordering::Equal,
            CompareOp::NotEquals => ordering != Ordering::Equal,
            CompareOp::GreaterThan => ordering == Ordering::Greater,
            CompareOp::GreaterThanOrEq => ordering != Ordering::Less,
            CompareOp::LessThan => ordering == Ordering::Less,
            CompareOp::LessThanOrEq => ordering != Ordering::Greater,
        })
    }
}

/// Largest prefix length of `s` that is at most `max` bytes and ends on a char boundary.
fn boundary_at_most(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

fn truncate_to_boundary(s: &mut String, max: usize) {
    let end = boundary_at_most(s, max);
    s.truncate(end);
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Field::Int(v)
    }
}

impl From<String> for Field {
    fn from(v: String) -> Self {
        Field::string(v)
    }
}

impl From<&str> for Field {
    fn from(v: &str) -> Self {
        Field::string(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn encode(field: &Field) -> Vec<u8> {
        let mut buf = BytesMut::new();
        field.serialize(&mut buf);
        buf.to_vec()
    }

    #[test]
    fn test_int_serialization() {
        let val = Field::Int(42);
        let bytes = encode(&val);
        assert_eq!(bytes, vec![0, 0, 0, 42]);

        let (recovered, size) = Field::deserialize(&bytes, Type::Int).unwrap();
        assert_eq!(recovered, val);
        assert_eq!(size, 4);

        let bytes = encode(&Field::Int(-1));
        assert_eq!(bytes, vec![0xFF; 4]);
    }

    #[test]
    fn test_string_serialization() {
        let val = Field::from("hello");
        let bytes = encode(&val);
        assert_eq!(bytes.len(), 4 + STRING_LEN);
        assert_eq!(&bytes[..9], &[0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o']);
        assert!(bytes[9..].iter().all(|&b| b == 0));

        let (recovered, size) = Field::deserialize(&bytes, Type::Str).unwrap();
        assert_eq!(recovered, val);
        assert_eq!(size, 132);
    }

    #[test]
    fn test_string_truncation() {
        let long = "x".repeat(STRING_LEN + 20);
        let field = Field::from(long.as_str());
        assert_eq!(field, Field::Str("x".repeat(STRING_LEN)));

        // Encoding a hand-built over-length value still keeps the fixed width
        let raw = Field::Str(long);
        assert_eq!(encode(&raw).len(), Type::Str.byte_len());

        // Multi-byte characters are never split
        let wide = "é".repeat(STRING_LEN);
        match Field::from(wide.as_str()) {
            Field::Str(s) => {
                assert!(s.len() <= STRING_LEN);
                assert_eq!(s.len() % 2, 0);
            }
            other => panic!("unexpected field {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_short_buffer() {
        assert!(Field::deserialize(&[0, 1], Type::Int).is_none());
        assert!(Field::deserialize(&[0; 10], Type::Str).is_none());
    }

    #[test]
    fn test_comparison() {
        assert!(Field::Int(10).compare(CompareOp::LessThan, &Field::Int(20)).unwrap());
        assert!(Field::Int(10)
            .compare(CompareOp::GreaterThanOrEq, &Field::Int(10))
            .unwrap());
        assert!(Field::from("abc")
            .compare(CompareOp::LessThan, &Field::from("abd"))
            .unwrap());
        assert!(Field::from("hello world")
            .compare(CompareOp::Like, &Field::from("lo w"))
            .unwrap());
        assert!(Field::Int(3).compare(CompareOp::Like, &Field::Int(3)).unwrap());
    }

    #[test]
    fn test_cross_type_comparison_fails() {
        let result = Field::Int(1).compare(CompareOp::Equals, &Field::from("1"));
        assert!(matches!(result, Err(HeapError::TypeMismatch { .. })));
    }

    #[test]
    fn test_display() {
        assert_eq!(Field::Int(-5).to_string(), "-5");
        assert_eq!(Field::from("abc").to_string(), "abc");
    }
}
