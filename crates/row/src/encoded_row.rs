//! `EncodedRow`: a lazily-decoding view over a table's raw on-disk row bytes
//! (spec §3/§4.2, §9 "encoded rows... prefer lazy decoding").

use std::cell::RefCell;
use std::sync::Arc;

use corvid_value::{Type, Value};

use crate::column_buffer::ColumnBuffer;
use crate::error::{Result, RowError};

/// The column-type shape `EncodedRow` needs to decode a raw row buffer.
/// Lives in `corvid-row` (below `corvid-catalog` in the dependency order)
/// so catalog's richer `ColumnDef` can simply carry one of these alongside
/// its constraints rather than this crate depending upward on catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: Type,
    pub nullable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RowSchema {
    pub columns: Vec<ColumnSpec>,
}

impl RowSchema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// A row whose column values are decoded from `bytes` on first access.
/// Columns are encoded back-to-back in schema order using
/// `corvid_value::encoding::encode`; decoding column `i` requires having
/// walked columns `0..i` first (the format is not random-access), so this
/// caches both the byte offsets it has discovered and the values it has
/// decoded.
#[derive(Debug, Clone)]
pub struct EncodedRow {
    schema: Arc<RowSchema>,
    bytes: Arc<[u8]>,
    state: RefCell<DecodeState>,
}

#[derive(Debug, Clone, Default)]
struct DecodeState {
    /// `offsets[i]` is the start of column `i`'s encoding in `bytes`.
    offsets: Vec<usize>,
    values: Vec<Option<Value>>,
}

impl EncodedRow {
    pub fn new(schema: Arc<RowSchema>, bytes: Arc<[u8]>) -> Self {
        let n = schema.columns.len();
        Self {
            schema,
            bytes,
            state: RefCell::new(DecodeState {
                offsets: Vec::with_capacity(n),
                values: vec![None; n],
            }),
        }
    }

    pub fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn decode_through(&self, idx: usize) -> Result<()> {
        let mut state = self.state.borrow_mut();
        while state.offsets.len() <= idx {
            let next = state.offsets.len();
            let start = *state.offsets.last().unwrap_or(&0);
            let (value, consumed) = corvid_value::encoding::decode(&self.bytes[start..])?;
            state.offsets.push(start + consumed);
            state.values[next] = Some(value);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        let idx = self
            .schema
            .index_of(name)
            .ok_or_else(|| RowError::ColumnNotFound(name.to_string()))?;
        self.decode_through(idx)?;
        Ok(self.state.borrow().values[idx].clone().expect("decoded above"))
    }

    pub fn get_index(&self, idx: usize) -> Result<Value> {
        self.decode_through(idx)?;
        Ok(self.state.borrow().values[idx].clone().expect("decoded above"))
    }

    /// Forces full decode and materializes an owned [`ColumnBuffer`], for
    /// operators (e.g. `Project(*)`) that need every column at once.
    pub fn to_column_buffer(&self) -> Result<ColumnBuffer> {
        if !self.schema.columns.is_empty() {
            self.decode_through(self.schema.columns.len() - 1)?;
        }
        let state = self.state.borrow();
        let mut buf = ColumnBuffer::with_capacity(self.schema.columns.len());
        for (col, value) in self.schema.columns.iter().zip(state.values.iter()) {
            buf.add(col.name.clone(), value.clone().expect("decoded above"));
        }
        Ok(buf)
    }
}
