use thiserror::Error;

/// Errors raised by [`crate::Value`] operations.
///
/// Mirrors the stable error-kind taxonomy of the surrounding engine
/// (`ColumnNotFound`/`TypeMismatch`/`IntegerOutOfRange`/`CastError`/...)
/// but scoped to what a bare value can go wrong doing on its own.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("type mismatch: cannot {op} {lhs} and {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("integer out of range")]
    IntegerOutOfRange,

    #[error("division by zero")]
    DivisionByZero,

    #[error("cannot cast {from} to {to}: {reason}")]
    CastError {
        from: &'static str,
        to: &'static str,
        reason: String,
    },

    #[error("failed to parse {kind} from {input:?}: {reason}")]
    ParseError {
        kind: &'static str,
        input: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, ValueError>;
