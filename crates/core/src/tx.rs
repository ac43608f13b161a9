//! `TxMode` (spec §5): distinguishes a read-only transaction handle from a
//! mutating one at the facade boundary, mirroring the teacher's
//! `crate::vm::TxMode` split between `Tx` and `MutTx`. The operators
//! themselves are agnostic to the distinction (every KV access goes through
//! the same `KvEngine` trait); this exists purely so callers can't
//! accidentally hand a read-only handle to a statement that writes.

use std::cell::RefCell;

use corvid_catalog::KvEngine;

pub enum TxMode<'a> {
    /// A transaction that will only run `TableScan`/`IndexScan`-rooted
    /// read statements.
    ReadOnly(&'a RefCell<&'a mut dyn KvEngine>),
    /// A transaction that may also run `Insert`/`Replace`/`Delete`/
    /// `GenerateKey`/`Validate`.
    ReadWrite(&'a RefCell<&'a mut dyn KvEngine>),
}

impl<'a> TxMode<'a> {
    pub fn kv(&self) -> &'a RefCell<&'a mut dyn KvEngine> {
        match self {
            TxMode::ReadOnly(kv) | TxMode::ReadWrite(kv) => *kv,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, TxMode::ReadOnly(_))
    }
}

/// True for the operators that mutate storage (spec §4.3); used to reject a
/// mutating stream handed a [`TxMode::ReadOnly`] handle before it ever
/// touches the KV engine.
pub fn is_write_operator(op: &corvid_plan::Operator) -> bool {
    matches!(
        op,
        corvid_plan::Operator::Insert { .. }
            | corvid_plan::Operator::Replace { .. }
            | corvid_plan::Operator::Delete { .. }
            | corvid_plan::Operator::GenerateKey { .. }
            | corvid_plan::Operator::Validate { .. }
    )
}
