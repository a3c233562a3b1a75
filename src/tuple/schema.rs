use std::fmt;
use std::sync::Arc;

use crate::common::{HeapError, Result};

use super::Type;

/// A single (type, optional name) entry of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaItem {
    field_type: Type,
    name: Option<String>,
}

impl SchemaItem {
    pub fn new(field_type: Type, name: Option<String>) -> Self {
        Self { field_type, name }
    }

    /// Returns the field type.
    pub fn field_type(&self) -> Type {
        self.field_type
    }

    /// Returns the field name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for SchemaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.field_type, self.name().unwrap_or(""))
    }
}

/// Describes the shape of a tuple: an ordered, fixed-length list of typed fields.
///
/// Two schemas are equal when they have the same length and the same
/// (type, name) sequence in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema {
    /// Ordered list of fields
    items: Vec<SchemaItem>,

    /// Encoded size of one tuple (sum of field widths)
    byte_size: usize,
}

impl Schema {
    /// Creates a new schema from a list of items.
    pub fn new(items: Vec<SchemaItem>) -> Self {
        let byte_size = items.iter().map(|i| i.field_type.byte_len()).sum();
        Self { items, byte_size }
    }

    /// Creates a schema with unnamed fields of the given types.
    pub fn from_types(types: &[Type]) -> Self {
        Self::new(types.iter().map(|&t| SchemaItem::new(t, None)).collect())
    }

    /// Creates a schema builder for fluent construction.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Concatenates the fields of `first` and `second`, in that order.
    pub fn merge(first: &Schema, second: &Schema) -> Schema {
        let mut items = first.items.clone();
        items.extend(second.items.iter().cloned());
        Schema::new(items)
    }

    /// Returns the number of fields.
    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    /// Returns the item at the given index.
    pub fn item(&self, index: usize) -> Result<&SchemaItem> {
        self.items.get(index).ok_or(HeapError::FieldIndexOutOfRange {
            index,
            arity: self.items.len(),
        })
    }

    /// Returns the type of the field at the given index.
    pub fn field_type(&self, index: usize) -> Result<Type> {
        self.item(index).map(|i| i.field_type)
    }

    /// Returns the name of the field at the given index (None for unnamed fields).
    pub fn field_name(&self, index: usize) -> Result<Option<&str>> {
        self.item(index).map(|i| i.name())
    }

    /// Returns the index of the first field with the given name.
    pub fn index_for_field_name(&self, name: &str) -> Result<usize> {
        self.items
            .iter()
            .position(|i| i.name() == Some(name))
            .ok_or_else(|| HeapError::FieldNameNotFound(name.to_string()))
    }

    /// Returns an iterator over all items.
    pub fn items(&self) -> impl Iterator<Item = &SchemaItem> {
        self.items.iter()
    }

    /// Returns an iterator over the field types.
    pub fn types(&self) -> impl Iterator<Item = Type> + '_ {
        self.items.iter().map(|i| i.field_type)
    }

    /// Returns the encoded size of a tuple with this schema.
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Returns a copy of this schema with every name prefixed by `alias.`.
    pub fn with_alias(&self, alias: &str) -> Schema {
        let items = self
            .items
            .iter()
            .map(|i| {
                let name = format!("{}.{}", alias, i.name().unwrap_or("null"));
                SchemaItem::new(i.field_type, Some(name))
            })
            .collect();
        Schema::new(items)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}

/// Builder for constructing schemas fluently.
pub struct SchemaBuilder {
    items: Vec<SchemaItem>,
}

impl SchemaBuilder {
    /// Creates a new schema builder.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Adds a named field.
    pub fn field(mut self, name: impl Into<String>, field_type: Type) -> Self {
        self.items.push(SchemaItem::new(field_type, Some(name.into())));
        self
    }

    /// Adds an unnamed field.
    pub fn unnamed(mut self, field_type: Type) -> Self {
        self.items.push(SchemaItem::new(field_type, None));
        self
    }

    /// Builds the schema.
    pub fn build(self) -> Schema {
        Schema::new(self.items)
    }

    /// Builds the schema wrapped in an Arc for shared ownership.
    pub fn build_arc(self) -> Arc<Schema> {
        Arc::new(self.build())
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
