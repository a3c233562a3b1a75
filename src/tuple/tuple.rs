use std::fmt;
use std::sync::Arc;

use bytes::BufMut;

use crate::common::{HeapError, RecordId, Result};

use super::{Field, Schema};

/// Represents a single row in a table.
///
/// A tuple holds one field per schema entry and, once stored, the record id
/// of the heap page slot it occupies.
///
/// ## Tuple Binary Format
///
/// ```text
/// +-----------+-----------+-----+-----------+
/// | Field 0   | Field 1   | ... | Field N-1 |
/// +-----------+-----------+-----+-----------+
/// ```
///
/// Every field has the fixed width of its type, so the encoded size is
/// exactly `schema.byte_size()` and no per-tuple header is needed.
#[derive(Debug, Clone)]
pub struct Tuple {
    /// The schema defining the structure of this tuple
    schema: Arc<Schema>,

    /// The values for each field (in schema order)
    fields: Vec<Field>,

    /// Location on disk, unset until the tuple is stored
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a new tuple, checking arity and field types against the schema.
    pub fn new(schema: Arc<Schema>, fields: Vec<Field>) -> Result<Self> {
        if fields.len() != schema.num_fields() {
            return Err(HeapError::SchemaMismatch {
                expected: schema.to_string(),
                found: format!("{} fields", fields.len()),
            });
        }
        for (field, expected) in fields.iter().zip(schema.types()) {
            if field.field_type() != expected {
                return Err(HeapError::TypeMismatch {
                    expected: expected.to_string(),
                    found: field.field_type().to_string(),
                });
            }
        }
        Ok(Self {
            schema,
            fields: fields.into_iter().map(Field::fit_to_width).collect(),
            record_id: None,
        })
    }

    /// Decodes a tuple from its fixed-width encoding.
    pub fn from_bytes(schema: Arc<Schema>, data: &[u8]) -> Option<Self> {
        let mut fields = Vec::with_capacity(schema.num_fields());
        let mut offset = 0;

        for field_type in schema.types() {
            let (field, size) = Field::deserialize(&data[offset..], field_type)?;
            fields.push(field);
            offset += size;
        }

        Some(Self {
            schema,
            fields,
            record_id: None,
        })
    }

    /// Writes the fixed-width encoding of this tuple.
    pub fn serialize<B: BufMut>(&self, buf: &mut B) {
        for field in &self.fields {
            field.serialize(buf);
        }
    }

    /// Returns the schema of this tuple.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Replaces the schema reference without touching the field values.
    pub fn reset_schema(&mut self, schema: Arc<Schema>) {
        self.schema = schema;
    }

    /// Returns the field at the given index.
    pub fn field(&self, index: usize) -> Result<&Field> {
        self.fields.get(index).ok_or(HeapError::FieldIndexOutOfRange {
            index,
            arity: self.fields.len(),
        })
    }

    /// Replaces the field at the given index.
    pub fn set_field(&mut self, index: usize, field: Field) -> Result<()> {
        let expected = self.schema.field_type(index)?;
        if field.field_type() != expected {
            return Err(HeapError::TypeMismatch {
                expected: expected.to_string(),
                found: field.field_type().to_string(),
            });
        }
        self.fields[index] = field.fit_to_width();
        Ok(())
    }

    /// Returns all fields in schema order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Returns the record id, if the tuple is stored on a page.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    /// Sets or clears the record id.
    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Returns the number of fields in this tuple.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if this tuple has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.fields == other.fields
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}
