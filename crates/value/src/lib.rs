//! The typed scalar value model (spec §3, §4.1).
//!
//! `Value` is a closed sum over the relational core's scalar types. It is
//! deliberately *not* generic or extensible — adding a type here means
//! touching comparisons, casts and encoding in one place, which is the
//! point: every other layer (rows, expressions, index ranges) treats values
//! uniformly through this one interface.

pub mod encoding;
pub mod error;
mod ops;
mod timestamp;
mod type_tag;

pub use error::{Result, ValueError};
pub use type_tag::Type;

use std::cmp::Ordering;
use std::fmt;

/// A single typed scalar. See spec §3 for the full invariant list.
#[derive(Debug, Clone, derive_more::From)]
pub enum Value {
    #[from(ignore)]
    Null,
    Boolean(bool),
    /// 32-bit signed integer (`INTEGER`).
    Integer(i32),
    /// 64-bit signed integer (`BIGINT`).
    BigInt(i64),
    /// IEEE-754 double (`DOUBLE`).
    Double(f64),
    /// Microseconds since 2000-01-01 UTC (`TIMESTAMP`). No `From<i64>` impl
    /// (that's claimed by `BigInt`); construct explicitly.
    #[from(ignore)]
    Timestamp(i64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_of(&self) -> Option<Type> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(Type::Boolean),
            Value::Integer(_) => Some(Type::Integer),
            Value::BigInt(_) => Some(Type::BigInt),
            Value::Double(_) => Some(Type::Double),
            Value::Timestamp(_) => Some(Type::Timestamp),
            Value::Text(_) => Some(Type::Text),
            Value::Blob(_) => Some(Type::Blob),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.type_of() {
            Some(t) => t.name(),
            None => "NULL",
        }
    }

    /// `!is_null && !is_zero`, per spec §4.1.
    pub fn is_truthy(&self) -> Result<bool> {
        if self.is_null() {
            return Ok(false);
        }
        Ok(!self.is_zero()?)
    }

    pub fn is_zero(&self) -> Result<bool> {
        Ok(match self {
            Value::Null => false,
            Value::Boolean(b) => !b,
            Value::Integer(i) => *i == 0,
            Value::BigInt(i) => *i == 0,
            Value::Double(d) => *d == 0.0,
            Value::Timestamp(_) | Value::Text(_) | Value::Blob(_) => false,
        })
    }

    pub fn encode(&self, dst: &mut Vec<u8>) -> Result<()> {
        encoding::encode(self, dst)
    }

    pub fn encode_as_key(&self, desc: bool, dst: &mut Vec<u8>) -> Result<()> {
        encoding::encode_as_key(self, desc, dst)
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::BigInt(i) => serde_json::Value::from(*i),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Timestamp(t) => serde_json::Value::String(
                timestamp::format_timestamp(*t).unwrap_or_else(|_| t.to_string()),
            ),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Blob(b) => serde_json::Value::String(encoding::base64_encode(b)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::BigInt(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Timestamp(t) => match timestamp::format_timestamp(*t) {
                Ok(s) => f.write_str(&s),
                Err(_) => write!(f, "TIMESTAMP({t})"),
            },
            Value::Text(s) => write!(f, "{s}"),
            Value::Blob(b) => write!(f, "x'{}'", hex_encode(b)),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Total order used internally for sorting and for deriving
/// [`Value::encode_as_key`]'s correctness; not the same as SQL `ORDER BY`
/// semantics for `NULL` (callers needing those use [`ops::sql_compare`]).
impl Value {
    pub fn total_cmp_same_type(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::BigInt(a), Value::BigInt(b)) => a.cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

pub use ops::sql_compare;
