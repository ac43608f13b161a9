use std::fmt;

/// The declared type of a column, or the target of an explicit cast.
///
/// Unlike [`crate::Value`], `Type` has no `NULL` member: nullability is a
/// property of a value, not of a type, matching how `spacetimedb-sats`
/// keeps `AlgebraicType` separate from "is this slot nullable".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Boolean,
    Integer,
    BigInt,
    Double,
    Timestamp,
    Text,
    Blob,
}

impl Type {
    pub fn name(self) -> &'static str {
        match self {
            Type::Boolean => "BOOLEAN",
            Type::Integer => "INTEGER",
            Type::BigInt => "BIGINT",
            Type::Double => "DOUBLE",
            Type::Timestamp => "TIMESTAMP",
            Type::Text => "TEXT",
            Type::Blob => "BLOB",
        }
    }

    /// Ranking used for the fixed cross-type encoding order from spec §4.1:
    /// `NULL < BOOLEAN < INTEGER/BIGINT < DOUBLE < TIMESTAMP < TEXT < BLOB`.
    pub(crate) fn encode_tier(self) -> u8 {
        match self {
            Type::Boolean => 1,
            Type::Integer | Type::BigInt => 2,
            Type::Double => 3,
            Type::Timestamp => 4,
            Type::Text => 5,
            Type::Blob => 6,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
