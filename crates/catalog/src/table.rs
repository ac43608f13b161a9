//! `Table` scan/mutation operations over a [`KvEngine`] (spec §4.2).

use corvid_expr::{eval, Environment, Params};
use corvid_row::{EncodedRow, Key, Row, RowSchema};
use corvid_value::Value;
use std::ops::Bound;
use std::sync::Arc;

use crate::error::{CatalogError, Result};
use crate::kv::{ByteRange, KvEngine};
use crate::range::{Range, Ranges};
use crate::schema::TableDef;

fn namespace_for(table: &str) -> String {
    format!("table:{table}")
}

fn rowid_counter_key() -> &'static [u8] {
    b"__rowid_counter"
}

/// Encodes a row's column values, in column order, using
/// `corvid_value::encoding::encode` (spec §3: the plain, non order-
/// preserving wire form).
fn encode_row_bytes(def: &TableDef, row: &Row) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for col in &def.columns {
        let v = row.get(&col.name).unwrap_or(Value::Null);
        v.encode(&mut buf)?;
    }
    Ok(buf)
}

/// Encodes the concatenation of `values` (already in the index/PK column
/// order) into an order-preserving key, honoring per-column `desc` flags.
pub fn encode_key_columns(values: &[Value], desc: &[bool]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for (i, v) in values.iter().enumerate() {
        let d = desc.get(i).copied().unwrap_or(false);
        v.encode_as_key(d, &mut buf)?;
    }
    Ok(buf)
}

fn byte_range_for(range: &Range, desc: &[bool]) -> Result<ByteRange> {
    if range.is_full() {
        return Ok(ByteRange::full());
    }
    if range.exact {
        let prefix = encode_key_columns(&range.min, desc)?;
        return Ok(ByteRange::prefix(prefix));
    }
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

impl TableDef {
    fn namespace(&self) -> String {
        namespace_for(&self.name)
    }

    fn pk_desc(&self) -> Vec<bool> {
        self.primary_key.as_ref().map(|pk| pk.desc.clone()).unwrap_or_default()
    }

    fn decode_row(&self, schema: &Arc<RowSchema>, key: &[u8], bytes: &[u8]) -> Row {
        let encoded = EncodedRow::new(schema.clone(), Arc::from(bytes.to_vec().into_boxed_slice()));
        Row::from_encoded(encoded).with_table_name(self.name.clone()).with_key(key.to_vec())
    }

    /// Full or ranged scan over this table's namespace (spec §4.2/§4.3
    /// `TableScan`). Empty `ranges` scans the whole table.
    pub fn scan<'a>(
        &'a self,
        kv: &'a dyn KvEngine,
        ranges: &Ranges,
        reverse: bool,
    ) -> Result<Box<dyn Iterator<Item = Result<(Key, Row)>> + 'a>> {
        let schema = Arc::new(self.row_schema());
        let desc = self.pk_desc();
        let ns = self.namespace();
        if ranges.is_empty() {
            let it = kv.iterate(&ns, ByteRange::full(), reverse)?;
            return Ok(Box::new(it.map(move |(k, v)| Ok((k.clone(), self.decode_row(&schema, &k, &v))))));
        }
        let mut chained: Box<dyn Iterator<Item = Result<(Key, Row)>> + 'a> = Box::new(std::iter::empty());
        for range in ranges {
            let byte_range = byte_range_for(range, &desc)?;
            let it = kv.iterate(&ns, byte_range, reverse)?;
            let schema = schema.clone();
            let next: Box<dyn Iterator<Item = Result<(Key, Row)>> + 'a> =
                Box::new(it.map(move |(k, v)| Ok((k.clone(), self.decode_row(&schema, &k, &v)))));
            chained = Box::new(chained.chain(next));
        }
        Ok(chained)
    }

    pub fn get_by_key(&self, kv: &dyn KvEngine, key: &[u8]) -> Result<Option<Row>> {
        let schema = Arc::new(self.row_schema());
        match kv.get(&self.namespace(), key)? {
            Some(bytes) => Ok(Some(self.decode_row(&schema, key, &bytes))),
            None => Ok(None),
        }
    }

    pub fn exists(&self, kv: &dyn KvEngine, key: &[u8]) -> Result<bool> {
        kv.exists(&self.namespace(), key).map_err(Into::into)
    }

    pub fn encode_row(&self, row: &Row) -> Result<Vec<u8>> {
        encode_row_bytes(self, row)
    }

    /// Computes this row's primary-key bytes, or allocates a fresh rowid if
    /// the table has no declared PK. Returns `(key, is_rowid)`.
    pub fn generate_key(&self, kv: &mut dyn KvEngine, row: &Row) -> Result<(Key, bool)> {
        match &self.primary_key {
            Some(pk) => {
                let values: Result<Vec<Value>> = pk.columns.iter().map(|c| row.get(c).map_err(Into::into)).collect();
                Ok((encode_key_columns(&values?, &pk.desc)?, false))
            }
            None => {
                let ns = self.namespace();
                let current = kv
                    .get(&ns, rowid_counter_key())?
                    .map(|b| i64::from_be_bytes(b.try_into().unwrap_or_default()))
                    .unwrap_or(0);
                let next = current + 1;
                kv.put(&ns, rowid_counter_key(), &next.to_be_bytes())?;
                let mut key = Vec::new();
                Value::BigInt(next).encode_as_key(false, &mut key)?;
                Ok((key, true))
            }
        }
    }

    pub fn insert(&self, kv: &mut dyn KvEngine, row: Row) -> Result<Row> {
        let (key, _) = match row.key() {
            Some(k) => (k.clone(), false),
            None => self.generate_key(kv, &row)?,
        };
        self.put(kv, &key, row.clone())?;
        Ok(row.with_key(key))
    }

    pub fn put(&self, kv: &mut dyn KvEngine, key: &Key, row: Row) -> Result<()> {
        let bytes = self.encode_row(&row)?;
        kv.put(&self.namespace(), key, &bytes).map_err(Into::into)
    }

    pub fn replace(&self, kv: &mut dyn KvEngine, key: &Key, row: Row) -> Result<()> {
        self.put(kv, key, row)
    }

    pub fn delete(&self, kv: &mut dyn KvEngine, key: &Key) -> Result<()> {
        kv.delete(&self.namespace(), key).map_err(Into::into)
    }

    /// Applies `DEFAULT`, then `NOT NULL`, then `CHECK`, in column
    /// declaration order (SPEC_FULL.md §3 supplement), returning the
    /// row with defaults filled in or a `ConstraintViolation`.
    pub fn validate_row(&self, row: Row) -> Result<Row> {
        let mut buf = row.to_column_buffer()?;
        for col in &self.columns {
            let current = buf.try_get(&col.name).cloned().unwrap_or(Value::Null);
            if current.is_null() {
                if let Some(default) = &col.default {
                    let params = Params::default();
                    let env = Environment::new(None, &params);
                    let value = eval(default, &env).map_err(|_| CatalogError::ConstraintViolation {
                        constraint: "DEFAULT".to_string(),
                        table: self.name.clone(),
                        columns: vec![col.name.clone()],
                    })?;
                    buf.replace(&col.name, value);
                }
            }
        }
        for col in &self.columns {
            let value = buf.try_get(&col.name).cloned().unwrap_or(Value::Null);
            if value.is_null() && !col.nullable {
                return Err(CatalogError::ConstraintViolation {
                    constraint: "NOT NULL".to_string(),
                    table: self.name.clone(),
                    columns: vec![col.name.clone()],
                });
            }
        }
        // Re-wrap through the table's real byte encoding before CHECK so a
        // value that passes NOT NULL/DEFAULT but can't actually be encoded
        // (e.g. out of range for its column's width) fails here rather than
        // later inside `insert`/`put`.
        let pre_check = Row::from_buffer(buf.clone());
        let bytes = encode_row_bytes(self, &pre_check)?;
        let schema = Arc::new(self.row_schema());
        let encoded = EncodedRow::new(schema, Arc::from(bytes.into_boxed_slice()));
        let validated = Row::from_encoded(encoded).with_table_name(self.name.clone());
        for col in &self.columns {
            if let Some(check) = &col.check {
                let params = Params::default();
                let env = Environment::new(Some(&validated), &params);
                let ok = eval(check, &env)
                    .map_err(|_| CatalogError::ConstraintViolation {
                        constraint: "CHECK".to_string(),
                        table: self.name.clone(),
                        columns: vec![col.name.clone()],
                    })?
                    .is_truthy()
                    .unwrap_or(false);
                if !ok {
                    return Err(CatalogError::ConstraintViolation {
                        constraint: "CHECK".to_string(),
                        table: self.name.clone(),
                        columns: vec![col.name.clone()],
                    });
                }
            }
        }
        Ok(match row.key() {
            Some(k) => validated.with_key(k.clone()),
            None => validated,
        })
    }
}
