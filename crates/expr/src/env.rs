//! Evaluation environment: row + outer environment + bound parameters
//! (spec §4.4.2, §9 "environment chain").

use corvid_row::Row;
use rustc_hash::FxHashMap;

use crate::error::{ExprError, Result};
use corvid_value::Value;

#[derive(Debug, Clone, Default)]
pub struct Params {
    pub positional: Vec<Value>,
    pub named: FxHashMap<String, Value>,
}

impl Params {
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: FxHashMap::default(),
        }
    }

    pub fn get_positional(&self, n: usize) -> Result<&Value> {
        // `$N` is 1-indexed in SQL convention.
        self.positional
            .get(n.saturating_sub(1))
            .ok_or(ExprError::MissingPositionalParam(n))
    }

    pub fn get_named(&self, name: &str) -> Result<&Value> {
        self.named.get(name).ok_or_else(|| ExprError::MissingNamedParam(name.to_string()))
    }
}

/// An immutable chain: a child environment wraps a parent and never mutates
/// it (spec §9). Used for subquery/grouping contexts where an inner row
/// needs to fall back to an outer one (e.g. `TempTreeSort`'s re-evaluation
/// against the outer environment on `ColumnNotFound`, spec §4.3).
#[derive(Clone, Copy)]
pub struct Environment<'a> {
    row: Option<&'a Row>,
    outer: Option<&'a Environment<'a>>,
    params: &'a Params,
}

impl<'a> Environment<'a> {
    pub fn new(row: Option<&'a Row>, params: &'a Params) -> Self {
        Self { row, outer: None, params }
    }

    pub fn nested(&'a self, row: Option<&'a Row>) -> Environment<'a> {
        Environment {
            row,
            outer: Some(self),
            params: self.params,
        }
    }

    pub fn row(&self) -> Option<&'a Row> {
        self.row
    }

    pub fn outer(&self) -> Option<&Environment<'a>> {
        self.outer
    }

    pub fn params(&self) -> &'a Params {
        self.params
    }

    /// Resolves a column against this environment's row, falling back to
    /// the outer environment's row on `ColumnNotFound`.
    pub fn resolve_column(&self, name: &str) -> Result<Value> {
        match self.row {
            Some(row) => match row.get(name) {
                Ok(v) => Ok(v),
                Err(e) => match self.outer {
                    Some(outer) => outer.resolve_column(name),
                    None => Err(e.into()),
                },
            },
            None => match self.outer {
                Some(outer) => outer.resolve_column(name),
                None => Err(corvid_row::RowError::ColumnNotFound(name.to_string()).into()),
            },
        }
    }
}
