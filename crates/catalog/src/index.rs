//! `Index` scan operations (spec §3/§4.2): an index is an ordered KV
//! namespace whose keys are the concatenated encodings of the indexed
//! columns followed by the base row's primary-key encoding (for non-unique
//! indexes), so it can be scanned directly and dereferenced through the
//! owning table.

use corvid_row::Key;
use corvid_value::Value;

use crate::error::Result;
use crate::kv::{ByteRange, KvEngine};
use crate::range::{Range, Ranges};
use crate::schema::IndexDef;
use crate::table::encode_key_columns;

fn namespace_for(index: &str) -> String {
    format!("index:{index}")
}

fn byte_range_for(range: &Range, desc: &[bool]) -> Result<ByteRange> {
    if range.is_full() {
        return Ok(ByteRange::full());
    }
    if range.exact {
        let prefix = encode_key_columns(&range.min, desc)?;
        return Ok(ByteRange::prefix(prefix));
    }
    use std::ops::Bound;
    let start = if range.min.is_empty() {
        Bound::Unbounded
    } else {
        let bytes = encode_key_columns(&range.min, desc)?;
        if range.exclusive.0 {
            Bound::Excluded(bytes)
        } else {
            Bound::Included(bytes)
        }
    };
    let end = if range.max.is_empty() {
        Bound::Unbounded
    } else {
        let bytes = encode_key_columns(&range.max, desc)?;
        if range.exclusive.1 {
            Bound::Excluded(bytes)
        } else {
            Bound::Included(bytes)
        }
    };
    Ok(ByteRange { start, end })
}

impl IndexDef {
    fn namespace(&self) -> String {
        namespace_for(&self.name)
    }

    /// Inserts one entry for `row_key` under the encoding of `column_values`
    /// (DDL/insert-path helper; the core's Insert operator calls this after
    /// writing the base row).
    pub fn put_entry(&self, kv: &mut dyn KvEngine, column_values: &[Value], row_key: &Key) -> Result<()> {
        let mut key = encode_key_columns(column_values, &self.desc)?;
        if !self.unique {
            key.extend_from_slice(row_key);
        }
        kv.put(&self.namespace(), &key, row_key).map_err(Into::into)
    }

    pub fn delete_entry(&self, kv: &mut dyn KvEngine, column_values: &[Value], row_key: &Key) -> Result<()> {
        let mut key = encode_key_columns(column_values, &self.desc)?;
        if !self.unique {
            key.extend_from_slice(row_key);
        }
        kv.delete(&self.namespace(), &key).map_err(Into::into)
    }

    /// Yields base-table primary keys matching `ranges`, in index order.
    /// Uniqueness of the resulting keys is only guaranteed when `self` is
    /// unique and `ranges` are non-overlapping (spec §4.3).
    pub fn scan<'a>(
        &'a self,
        kv: &'a dyn KvEngine,
        ranges: &Ranges,
        reverse: bool,
    ) -> Result<Box<dyn Iterator<Item = Result<Key>> + 'a>> {
        if ranges.is_empty() {
            let it = kv.iterate(&self.namespace(), ByteRange::full(), reverse)?;
            return Ok(Box::new(it.map(|(_, v)| Ok(v))));
        }
        let mut chained: Box<dyn Iterator<Item = Result<Key>> + 'a> = Box::new(std::iter::empty());
        for range in ranges {
            let byte_range = byte_range_for(range, &self.desc)?;
            let it = kv.iterate(&self.namespace(), byte_range, reverse)?;
            let next: Box<dyn Iterator<Item = Result<Key>> + 'a> = Box::new(it.map(|(_, v)| Ok(v)));
            chained = Box::new(chained.chain(next));
        }
        Ok(chained)
    }
}
