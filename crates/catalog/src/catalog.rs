//! `Catalog`: lookup surface for tables and indexes within a transaction
//! (spec §4.2). Read-only for the core's purposes (spec §5); DDL mutates it
//! through a path outside this core.

use rustc_hash::FxHashMap;

use crate::error::{CatalogError, Result};
use crate::kv::KvEngine;
use crate::schema::{IndexDef, TableDef};

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: FxHashMap<String, TableDef>,
    indexes: FxHashMap<String, IndexDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: TableDef) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn add_index(&mut self, index: IndexDef) {
        self.indexes.insert(index.name.clone(), index);
    }

    pub fn table(&self, name: &str) -> Result<&TableDef> {
        self.tables.get(name).ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    pub fn index(&self, name: &str) -> Result<&IndexDef> {
        self.indexes.get(name).ok_or_else(|| CatalogError::IndexNotFound(name.to_string()))
    }

    pub fn indexes_for_table<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a IndexDef> + 'a {
        self.indexes.values().filter(move |idx| idx.table == table)
    }

    pub fn allocate_transient_namespace(&self, kv: &mut dyn KvEngine) -> Result<String> {
        kv.allocate_transient_namespace().map_err(Into::into)
    }
}
