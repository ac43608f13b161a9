//! Top-level error aggregation (spec §7), following the teacher's
//! `DBError`/`TableError`/`IndexError` layering: every lower-crate error
//! type gets its own `#[from]` variant here rather than being stringified.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("value error: {0}")]
    Value(#[from] corvid_value::ValueError),

    #[error("row error: {0}")]
    Row(#[from] corvid_row::RowError),

    #[error("catalog error: {0}")]
    Catalog(#[from] corvid_catalog::CatalogError),

    #[error("expr error: {0}")]
    Expr(#[from] corvid_expr::ExprError),

    #[error("plan error: {0}")]
    Plan(#[from] corvid_plan::PlanError),

    #[error("planner error: {0}")]
    Planner(#[from] corvid_planner::PlannerError),
}

pub type Result<T> = std::result::Result<T, Error>;
