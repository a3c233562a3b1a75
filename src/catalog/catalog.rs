use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::common::{HeapError, Result, TableId};
use crate::storage::HeapFile;
use crate::tuple::Schema;

/// Metadata kept for one registered table
#[derive(Debug, Clone)]
struct TableInfo {
    file: Arc<HeapFile>,
    name: String,
    primary_key: String,
}

#[derive(Debug, Default)]
struct CatalogInner {
    tables: HashMap<TableId, TableInfo>,
    names: HashMap<String, TableId>,
}

/// Catalog maps table ids and names to their heap files.
///
/// Registering a table whose name or id is already taken replaces the older
/// entry.
#[derive(Debug, Default)]
pub struct Catalog {
    inner: RwLock<CatalogInner>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `file` under `name`. `primary_key` may be empty.
    pub fn register_table(
        &self,
        file: Arc<HeapFile>,
        name: impl Into<String>,
        primary_key: impl Into<String>,
    ) {
        let name = name.into();
        let id = file.id();
        let mut inner = self.inner.write();

        if let Some(old) = inner.tables.remove(&id) {
            warn!(table_id = %id, old_name = %old.name, new_name = %name, "replacing table with same id");
            inner.names.remove(&old.name);
        }
        if let Some(old_id) = inner.names.remove(&name) {
            warn!(table_id = %old_id, %name, "replacing table with same name");
            inner.tables.remove(&old_id);
        }

        debug!(table_id = %id, %name, "registered table");
        inner.names.insert(name.clone(), id);
        inner.tables.insert(
            id,
            TableInfo {
                file,
                name,
                primary_key: primary_key.into(),
            },
        );
    }

    fn with_table<T>(&self, id: TableId, f: impl FnOnce(&TableInfo) -> T) -> Result<T> {
        let inner = self.inner.read();
        inner
            .tables
            .get(&id)
            .map(f)
            .ok_or(HeapError::TableNotFound(id))
    }

    /// Returns the id of the table called `name`.
    pub fn table_id(&self, name: &str) -> Result<TableId> {
        self.inner
            .read()
            .names
            .get(name)
            .copied()
            .ok_or_else(|| HeapError::TableNameNotFound(name.to_string()))
    }

    pub fn table_name(&self, id: TableId) -> Result<String> {
        self.with_table(id, |t| t.name.clone())
    }

    pub fn schema(&self, id: TableId) -> Result<Arc<Schema>> {
        self.with_table(id, |t| t.file.schema().clone())
    }

    pub fn file(&self, id: TableId) -> Result<Arc<HeapFile>> {
        self.with_table(id, |t| t.file.clone())
    }

    pub fn primary_key(&self, id: TableId) -> Result<String> {
        self.with_table(id, |t| t.primary_key.clone())
    }

    /// Returns the ids of every registered table, in no particular order.
    pub fn table_ids(&self) -> Vec<TableId> {
        self.inner.read().tables.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every table.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.tables.clear();
        inner.names.clear();
    }
}
