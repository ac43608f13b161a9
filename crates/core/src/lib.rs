//! `corvid-core`: the public facade over the value/row model, the catalog,
//! the rule-based optimizer and the pull-based execution pipeline. Wires
//! `corvid-catalog`, `corvid-expr`, `corvid-planner` and `corvid-plan`
//! together behind [`Engine`] and re-exports the pieces most callers need
//! without reaching into the individual crates.

pub mod engine;
pub mod error;
pub mod tx;

pub use corvid_catalog::{Catalog, ColumnDef, IndexDef, KvEngine, PrimaryKey, Range, Ranges, TableDef};
pub use corvid_expr::{Environment, Expr, Params};
pub use corvid_plan::{ExecCtx, Operator, StreamIterator};
pub use corvid_planner::OptimizerConfig;
pub use engine::Engine;
pub use error::{Error, Result};
pub use tx::TxMode;
