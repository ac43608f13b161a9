//! `Range`/`Ranges` (spec §3, glossary): a bound on leading indexed-column
//! values for a scan, expressed over logical [`Value`]s (byte encoding
//! happens only when a scan is actually driven against a [`crate::kv`]).

use corvid_value::Value;

/// A bound on one or more leading columns of an index (or the primary key).
/// `exact` means an equality match on `min`; otherwise `min..max` with
/// `exclusive` controlling which end(s) are open.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub columns: Vec<String>,
    pub min: Vec<Value>,
    pub max: Vec<Value>,
    pub exact: bool,
    /// `(min_exclusive, max_exclusive)`.
    pub exclusive: (bool, bool),
}

impl Range {
    pub fn full(columns: Vec<String>) -> Self {
        Self {
            columns,
            min: Vec::new(),
            max: Vec::new(),
            exact: false,
            exclusive: (false, false),
        }
    }

    pub fn eq(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            columns,
            min: values,
            max: Vec::new(),
            exact: true,
            exclusive: (false, false),
        }
    }

    pub fn gt(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            columns,
            min: values,
            max: Vec::new(),
            exact: false,
            exclusive: (true, false),
        }
    }

    pub fn gte(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            columns,
            min: values,
            max: Vec::new(),
            exact: false,
            exclusive: (false, false),
        }
    }

    pub fn lt(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            columns,
            min: Vec::new(),
            max: values,
            exact: false,
            exclusive: (false, true),
        }
    }

    pub fn lte(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            columns,
            min: Vec::new(),
            max: values,
            exact: false,
            exclusive: (false, false),
        }
    }

    pub fn between(columns: Vec<String>, lo: Vec<Value>, hi: Vec<Value>) -> Self {
        Self {
            columns,
            min: lo,
            max: hi,
            exact: false,
            exclusive: (false, false),
        }
    }

    pub fn is_full(&self) -> bool {
        self.min.is_empty() && self.max.is_empty()
    }
}

/// An unordered list of [`Range`]s, used to emit `IN`-expansions as multiple
/// disjoint sub-scans.
pub type Ranges = Vec<Range>;
