use thiserror::Error;

/// Sentinel: cooperative early termination (e.g. `Take` closing its
/// predecessor). Never surfaced to user code — converted to a clean end of
/// iteration at the boundary that raised it (spec §7).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("stream closed")]
pub struct StreamClosed;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error(transparent)]
    Value(#[from] corvid_value::ValueError),

    #[error(transparent)]
    Row(#[from] corvid_row::RowError),

    #[error(transparent)]
    Expr(#[from] corvid_expr::ExprError),

    #[error(transparent)]
    Catalog(#[from] corvid_catalog::CatalogError),

    #[error("{0}")]
    StreamClosed(#[from] StreamClosed),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PlanError>;

/// Debug builds treat an internal invariant violation as a panic (spec
/// §7: "`Internal` for invariant violations; these are panics in debug and
/// errors in release").
#[track_caller]
pub fn internal(message: impl Into<String>) -> PlanError {
    let message = message.into();
    if cfg!(debug_assertions) {
        panic!("internal invariant violation: {message}");
    }
    PlanError::Internal(message)
}
