//! The ordered key-value engine contract this core consumes (spec §6): named
//! namespaces, transactional `put`/`get`/`delete`/`iterate`, and transient
//! namespace allocation for sort scratch. The real engine lives outside this
//! workspace; `corvid-catalog` only needs the trait to drive `Table`/`Index`
//! scans and, for tests, ships [`mem::MemKv`].

use std::ops::Bound;

use crate::error::Result;

#[cfg(any(test, feature = "testing"))]
pub mod mem;

/// A half-open, closed, or unbounded byte-key range, as consumed by
/// [`KvEngine::iterate`].
#[derive(Debug, Clone, Default)]
pub struct ByteRange {
    pub start: Bound<Vec<u8>>,
    pub end: Bound<Vec<u8>>,
}

impl ByteRange {
    pub fn full() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    pub fn prefix(prefix: Vec<u8>) -> Self {
        let mut upper = prefix.clone();
        // Bump the last byte to get an exclusive upper bound covering every
        // key starting with `prefix`; if every byte is 0xFF, fall back to
        // unbounded (the prefix already spans to the end of the keyspace).
        match upper.iter().rposition(|&b| b != 0xFF) {
            Some(pos) => {
                upper.truncate(pos + 1);
                upper[pos] += 1;
                Self {
                    start: Bound::Included(prefix),
                    end: Bound::Excluded(upper),
                }
            }
            None => Self {
                start: Bound::Included(prefix),
                end: Bound::Unbounded,
            },
        }
    }
}

/// Minimal ordered KV surface the optimizer/execution layer needs. A real
/// implementation backs this with an on-disk B-tree; transactionality is
/// assumed ambient (one `KvEngine` instance scopes to one transaction), per
/// spec §5's "the catalog is read-only within a transaction" model.
pub trait KvEngine {
    fn put(&mut self, namespace: &str, key: &[u8], value: &[u8]) -> Result<()>;
    fn get(&self, namespace: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn delete(&mut self, namespace: &str, key: &[u8]) -> Result<()>;

    fn exists(&self, namespace: &str, key: &[u8]) -> Result<bool> {
        Ok(self.get(namespace, key)?.is_some())
    }

    /// Iterates `namespace` within `range`, ascending unless `reverse`.
    fn iterate(
        &self,
        namespace: &str,
        range: ByteRange,
        reverse: bool,
    ) -> Result<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>>;

    /// Allocates a fresh, uniquely-named namespace for scratch use (e.g.
    /// `TempTreeSort`'s spill tree). Returns its name.
    fn allocate_transient_namespace(&mut self) -> Result<String>;

    /// Destroys a transient namespace and everything in it. Idempotent.
    fn drop_namespace(&mut self, namespace: &str) -> Result<()>;
}
