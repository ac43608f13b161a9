use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("constraint {constraint} violated on {table}.{columns:?}")]
    ConstraintViolation {
        constraint: String,
        table: String,
        columns: Vec<String>,
    },

    #[error(transparent)]
    Row(#[from] corvid_row::RowError),

    #[error(transparent)]
    Value(#[from] corvid_value::ValueError),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
