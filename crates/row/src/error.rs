use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error(transparent)]
    Value(#[from] corvid_value::ValueError),
}

pub type Result<T> = std::result::Result<T, RowError>;
