use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    #[error(transparent)]
    Value(#[from] corvid_value::ValueError),

    #[error(transparent)]
    Expr(#[from] corvid_expr::ExprError),

    #[error(transparent)]
    Catalog(#[from] corvid_catalog::CatalogError),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PlannerError>;

/// Debug builds treat an internal invariant violation as a panic, matching
/// `corvid_plan::internal`'s convention (spec §7).
#[track_caller]
pub fn internal(message: impl Into<String>) -> PlannerError {
    let message = message.into();
    if cfg!(debug_assertions) {
        panic!("internal invariant violation: {message}");
    }
    PlannerError::Internal(message)
}
