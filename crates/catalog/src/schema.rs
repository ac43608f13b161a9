//! Table/column/primary-key metadata (spec §3/§4.2).

use corvid_expr::Expr;
use corvid_row::ColumnSpec;
use corvid_value::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: Type,
    pub nullable: bool,
    pub default: Option<Expr>,
    pub check: Option<Expr>,
}

impl ColumnDef {
    pub fn to_row_spec(&self) -> ColumnSpec {
        ColumnSpec {
            name: self.name.clone(),
            ty: self.ty,
            nullable: self.nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKey {
    pub columns: Vec<String>,
    /// One descending flag per column, per spec §3 ("each ascending or
    /// descending").
    pub desc: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Option<PrimaryKey>,
    /// `primary_key`'s columns resolved to their `ColumnDef`s, in PK order.
    /// Precomputed at construction so `primary_key_columns` can hand back a
    /// plain slice the way spec.md's `Table` interface implies.
    pk_columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>, primary_key: Option<PrimaryKey>) -> Self {
        let pk_columns = match &primary_key {
            None => Vec::new(),
            Some(pk) => pk
                .columns
                .iter()
                .filter_map(|n| columns.iter().find(|c| &c.name == n).cloned())
                .collect(),
        };
        Self {
            name: name.into(),
            columns,
            primary_key,
            pk_columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key_columns(&self) -> &[ColumnDef] {
        &self.pk_columns
    }

    pub fn row_schema(&self) -> corvid_row::RowSchema {
        corvid_row::RowSchema::new(self.columns.iter().map(ColumnDef::to_row_spec).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub desc: Vec<bool>,
    pub unique: bool,
}
