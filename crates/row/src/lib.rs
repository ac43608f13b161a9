//! Row representations (spec §3/§4.2): an ordered list of `(column, Value)`
//! pairs, surfaced as either a decoded [`ColumnBuffer`] or a lazily-decoding
//! [`EncodedRow`] over raw storage bytes. [`Row`] gives operators one
//! interface regardless of which backs a given row (spec §9).

pub mod column_buffer;
pub mod encoded_row;
pub mod error;

pub use column_buffer::ColumnBuffer;
pub use encoded_row::{ColumnSpec, EncodedRow, RowSchema};
pub use error::{Result, RowError};

use corvid_value::Value;

/// The primary-key handle carried by rows that have already been placed
/// (or are being placed) into a table — the raw encoded key bytes.
pub type Key = Vec<u8>;

#[derive(Debug, Clone)]
enum Backing {
    Buffer(ColumnBuffer),
    Encoded(EncodedRow),
}

/// A row flowing through the execution pipeline. Carries an optional
/// `table_name` (set once a row is associated with a physical table, e.g.
/// after a scan) and an optional primary-key handle (set once the row has
/// been assigned or looked up by key).
#[derive(Debug, Clone)]
pub struct Row {
    backing: Backing,
    table_name: Option<String>,
    key: Option<Key>,
}

impl Row {
    pub fn from_buffer(buffer: ColumnBuffer) -> Self {
        Self {
            backing: Backing::Buffer(buffer),
            table_name: None,
            key: None,
        }
    }

    pub fn from_encoded(row: EncodedRow) -> Self {
        Self {
            backing: Backing::Encoded(row),
            table_name: None,
            key: None,
        }
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn with_key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        match &self.backing {
            Backing::Buffer(b) => b.get(name).map(|v| v.clone()),
            Backing::Encoded(e) => e.get(name),
        }
    }

    /// Forces decode into a plain [`ColumnBuffer`], consuming any
    /// `EncodedRow` backing. Buffer-backed rows return a clone.
    pub fn to_column_buffer(&self) -> Result<ColumnBuffer> {
        match &self.backing {
            Backing::Buffer(b) => Ok(b.clone()),
            Backing::Encoded(e) => e.to_column_buffer(),
        }
    }

    pub fn iterate(&self) -> Result<Vec<(String, Value)>> {
        Ok(self
            .to_column_buffer()?
            .iterate()
            .map(|(n, v)| (n.to_string(), v.clone()))
            .collect())
    }

    #[cfg(feature = "serde")]
    pub fn marshal_json(&self) -> Result<serde_json::Value> {
        Ok(self.to_column_buffer()?.marshal_json())
    }
}
