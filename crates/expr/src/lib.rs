//! Expression AST, evaluation environment, and aggregate builders
//! (spec §4.4.2).

pub mod aggregate;
pub mod ast;
pub mod env;
pub mod error;
pub mod eval;

pub use aggregate::{AggregateKind, Aggregator};
pub use ast::{BinaryOp, ColumnRef, Expr, ParamRef};
pub use env::{Environment, Params};
pub use error::{ExprError, Result};
pub use eval::eval;
