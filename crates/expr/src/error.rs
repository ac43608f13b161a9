use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error(transparent)]
    Value(#[from] corvid_value::ValueError),

    #[error(transparent)]
    Row(#[from] corvid_row::RowError),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("aggregate function {0} used outside GroupAggregate")]
    AggregateOutsideGroup(String),

    #[error("missing positional parameter ${0}")]
    MissingPositionalParam(usize),

    #[error("missing named parameter :{0}")]
    MissingNamedParam(String),

    #[error("literal list/record cannot be evaluated to a scalar value here")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, ExprError>;
