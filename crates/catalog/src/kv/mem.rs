//! `MemKv`: a deterministic in-memory [`super::KvEngine`], for tests only.
//! Not a product deliverable — mirrors how the teacher's schema crate ships
//! in-memory fixtures rather than a real storage engine.

use std::collections::BTreeMap;
use std::ops::Bound;

use rustc_hash::FxHashMap;

use super::{ByteRange, KvEngine};
use crate::error::Result;

#[derive(Debug, Default)]
pub struct MemKv {
    namespaces: FxHashMap<String, BTreeMap<Vec<u8>, Vec<u8>>>,
    next_transient_id: u64,
}

impl MemKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvEngine for MemKv {
    fn put(&mut self, namespace: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, namespace: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.namespaces.get(namespace).and_then(|ns| ns.get(key).cloned()))
    }

    fn delete(&mut self, namespace: &str, key: &[u8]) -> Result<()> {
        if let Some(ns) = self.namespaces.get_mut(namespace) {
            ns.remove(key);
        }
        Ok(())
    }

    fn iterate(
        &self,
        namespace: &str,
        range: ByteRange,
        reverse: bool,
    ) -> Result<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>> {
        let Some(ns) = self.namespaces.get(namespace) else {
            return Ok(Box::new(std::iter::empty()));
        };
        let start: Bound<&Vec<u8>> = match &range.start {
            Bound::Included(k) => Bound::Included(k),
            Bound::Excluded(k) => Bound::Excluded(k),
            Bound::Unbounded => Bound::Unbounded,
        };
        let end: Bound<&Vec<u8>> = match &range.end {
            Bound::Included(k) => Bound::Included(k),
            Bound::Excluded(k) => Bound::Excluded(k),
            Bound::Unbounded => Bound::Unbounded,
        };
        let entries: Vec<(Vec<u8>, Vec<u8>)> = ns
            .range((start, end))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if reverse {
            Ok(Box::new(entries.into_iter().rev()))
        } else {
            Ok(Box::new(entries.into_iter()))
        }
    }

    fn allocate_transient_namespace(&mut self) -> Result<String> {
        self.next_transient_id += 1;
        let name = format!("__transient_{}", self.next_transient_id);
        self.namespaces.insert(name.clone(), BTreeMap::new());
        Ok(name)
    }

    fn drop_namespace(&mut self, namespace: &str) -> Result<()> {
        self.namespaces.remove(namespace);
        Ok(())
    }
}
