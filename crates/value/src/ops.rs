//! Comparisons, arithmetic, casts: the operational half of [`crate::Value`].

use std::cmp::Ordering;

use crate::error::ValueError;
use crate::timestamp;
use crate::{Type, Value};

type Result<T> = std::result::Result<T, ValueError>;

enum CompareError {
    /// The two values' types are not in any comparable family at all.
    Unrelated,
    Other(ValueError),
}

impl From<ValueError> for CompareError {
    fn from(e: ValueError) -> Self {
        CompareError::Other(e)
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Integer(i) => Some(*i as f64),
        Value::BigInt(i) => Some(*i as f64),
        Value::Double(d) => Some(*d),
        _ => None,
    }
}

fn as_timestamp_micros(v: &Value) -> Option<Result<i64>> {
    match v {
        Value::Timestamp(t) => Some(Ok(*t)),
        Value::Text(s) => Some(timestamp::parse_timestamp(s)),
        _ => None,
    }
}

/// Compares two non-`NULL` values. Numeric families widen to `f64` and
/// `TIMESTAMP` is comparable with `TEXT` (parsed on the fly), per spec §3.
fn compare_values(a: &Value, b: &Value) -> std::result::Result<Ordering, CompareError> {
    match (a, b) {
        (Value::Boolean(x), Value::Boolean(y)) => Ok(x.cmp(y)),
        (Value::Text(x), Value::Text(y)) => Ok(x.cmp(y)),
        (Value::Blob(x), Value::Blob(y)) => Ok(x.cmp(y)),
        _ => {
            if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
                return Ok(x.total_cmp(&y));
            }
            if matches!(a, Value::Timestamp(_) | Value::Text(_)) && matches!(b, Value::Timestamp(_) | Value::Text(_))
            {
                if let (Some(x), Some(y)) = (as_timestamp_micros(a), as_timestamp_micros(b)) {
                    return Ok(x?.cmp(&y?));
                }
            }
            Err(CompareError::Unrelated)
        }
    }
}

impl Value {
    /// `=`. Never errors: `NULL` equals only `NULL`; unrelated types are
    /// simply unequal.
    pub fn eq(&self, other: &Value) -> Result<bool> {
        if self.is_null() || other.is_null() {
            return Ok(self.is_null() && other.is_null());
        }
        match compare_values(self, other) {
            Ok(ord) => Ok(ord == Ordering::Equal),
            Err(CompareError::Unrelated) => Ok(false),
            Err(CompareError::Other(e)) => Err(e),
        }
    }

    fn ordered(&self, other: &Value, pred: impl Fn(Ordering) -> bool) -> Result<bool> {
        if self.is_null() || other.is_null() {
            return Ok(false);
        }
        match compare_values(self, other) {
            Ok(ord) => Ok(pred(ord)),
            Err(CompareError::Unrelated) => Err(ValueError::TypeMismatch {
                op: "compare",
                lhs: self.type_name(),
                rhs: other.type_name(),
            }),
            Err(CompareError::Other(e)) => Err(e),
        }
    }

    pub fn gt(&self, other: &Value) -> Result<bool> {
        self.ordered(other, |o| o == Ordering::Greater)
    }

    pub fn gte(&self, other: &Value) -> Result<bool> {
        if self.is_null() && other.is_null() {
            return Ok(true);
        }
        self.ordered(other, |o| o != Ordering::Less)
    }

    pub fn lt(&self, other: &Value) -> Result<bool> {
        self.ordered(other, |o| o == Ordering::Less)
    }

    pub fn lte(&self, other: &Value) -> Result<bool> {
        if self.is_null() && other.is_null() {
            return Ok(true);
        }
        self.ordered(other, |o| o != Ordering::Greater)
    }

    /// `BETWEEN lo AND hi`. `false` if any of `self`/`lo`/`hi` is `NULL`.
    pub fn between(&self, lo: &Value, hi: &Value) -> Result<bool> {
        if self.is_null() || lo.is_null() || hi.is_null() {
            return Ok(false);
        }
        Ok(self.gte(lo)? && self.lte(hi)?)
    }
}

#[derive(Copy, Clone)]
enum NumKind {
    Int,
    Big,
    Dbl,
}

fn numeric_kind(a: &Value, b: &Value, op: &'static str) -> Result<NumKind> {
    use Value::*;
    match (a, b) {
        (Double(_), _) | (_, Double(_)) => Ok(NumKind::Dbl),
        (BigInt(_), Integer(_) | BigInt(_)) | (Integer(_), BigInt(_)) => Ok(NumKind::Big),
        (Integer(_), Integer(_)) => Ok(NumKind::Int),
        _ => Err(ValueError::TypeMismatch {
            op,
            lhs: a.type_name(),
            rhs: b.type_name(),
        }),
    }
}

macro_rules! arith_op {
    ($name:ident, $op:literal, $int_op:ident, $big_op:ident, $dbl:expr) => {
        pub fn $name(&self, other: &Value) -> Result<Value> {
            if self.is_null() || other.is_null() {
                return Ok(Value::Null);
            }
            match numeric_kind(self, other, $op)? {
                NumKind::Int => {
                    let (a, b) = (as_i64(self), as_i64(other));
                    let r = a.$int_op(b).ok_or(ValueError::IntegerOutOfRange)?;
                    i32::try_from(r).map(Value::Integer).map_err(|_| ValueError::IntegerOutOfRange)
                }
                NumKind::Big => {
                    let (a, b) = (as_i64(self), as_i64(other));
                    a.$big_op(b).map(Value::BigInt).ok_or(ValueError::IntegerOutOfRange)
                }
                NumKind::Dbl => {
                    let (a, b) = (as_f64(self).unwrap(), as_f64(other).unwrap());
                    Ok(Value::Double($dbl(a, b)))
                }
            }
        }
    };
}

fn as_i64(v: &Value) -> i64 {
    match v {
        Value::Integer(i) => *i as i64,
        Value::BigInt(i) => *i,
        _ => unreachable!("as_i64 called on non-integer value"),
    }
}

impl Value {
    arith_op!(add, "add", checked_add, checked_add, |a: f64, b: f64| a + b);
    arith_op!(sub, "subtract", checked_sub, checked_sub, |a: f64, b: f64| a - b);
    arith_op!(mul, "multiply", checked_mul, checked_mul, |a: f64, b: f64| a * b);

    pub fn div(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        match numeric_kind(self, other, "divide")? {
            NumKind::Int => {
                let (a, b) = (as_i64(self), as_i64(other));
                if b == 0 {
                    return Err(ValueError::DivisionByZero);
                }
                let r = a.checked_div(b).ok_or(ValueError::IntegerOutOfRange)?;
                i32::try_from(r).map(Value::Integer).map_err(|_| ValueError::IntegerOutOfRange)
            }
            NumKind::Big => {
                let (a, b) = (as_i64(self), as_i64(other));
                if b == 0 {
                    return Err(ValueError::DivisionByZero);
                }
                a.checked_div(b).map(Value::BigInt).ok_or(ValueError::IntegerOutOfRange)
            }
            NumKind::Dbl => {
                let (a, b) = (as_f64(self).unwrap(), as_f64(other).unwrap());
                Ok(Value::Double(a / b))
            }
        }
    }

    pub fn modulo(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        match numeric_kind(self, other, "modulo")? {
            NumKind::Int => {
                let (a, b) = (as_i64(self), as_i64(other));
                if b == 0 {
                    return Err(ValueError::DivisionByZero);
                }
                let r = a.checked_rem(b).ok_or(ValueError::IntegerOutOfRange)?;
                i32::try_from(r).map(Value::Integer).map_err(|_| ValueError::IntegerOutOfRange)
            }
            NumKind::Big => {
                let (a, b) = (as_i64(self), as_i64(other));
                if b == 0 {
                    return Err(ValueError::DivisionByZero);
                }
                a.checked_rem(b).map(Value::BigInt).ok_or(ValueError::IntegerOutOfRange)
            }
            NumKind::Dbl => {
                let (a, b) = (as_f64(self).unwrap(), as_f64(other).unwrap());
                Ok(Value::Double(a % b))
            }
        }
    }

    fn bitwise(&self, other: &Value, op: &'static str, f: impl Fn(i64, i64) -> i64) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        use Value::*;
        match (self, other) {
            (Integer(a), Integer(b)) => Ok(Integer(f(*a as i64, *b as i64) as i32)),
            (BigInt(_) | Integer(_), BigInt(_) | Integer(_)) => Ok(BigInt(f(as_i64(self), as_i64(other)))),
            _ => Err(ValueError::TypeMismatch {
                op,
                lhs: self.type_name(),
                rhs: other.type_name(),
            }),
        }
    }

    pub fn bitwise_and(&self, other: &Value) -> Result<Value> {
        self.bitwise(other, "bitwise and", |a, b| a & b)
    }

    pub fn bitwise_or(&self, other: &Value) -> Result<Value> {
        self.bitwise(other, "bitwise or", |a, b| a | b)
    }

    pub fn bitwise_xor(&self, other: &Value) -> Result<Value> {
        self.bitwise(other, "bitwise xor", |a, b| a ^ b)
    }
}

impl Value {
    /// Explicit cast per the table in spec §6. Casting `NULL` always
    /// succeeds and yields `NULL`; every other non-identity entry either
    /// succeeds or returns [`ValueError::CastError`].
    pub fn cast_as(&self, target: Type) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        let fail = |reason: &str| ValueError::CastError {
            from: self.type_name(),
            to: target.name(),
            reason: reason.to_string(),
        };
        match target {
            Type::Boolean => match self {
                Value::Boolean(_) => Ok(self.clone()),
                Value::Integer(i) => Ok(Value::Boolean(*i != 0)),
                Value::BigInt(i) => Ok(Value::Boolean(*i != 0)),
                Value::Text(s) => match s.as_str() {
                    "true" => Ok(Value::Boolean(true)),
                    "false" => Ok(Value::Boolean(false)),
                    _ => Err(fail("expected \"true\" or \"false\"")),
                },
                _ => Err(fail("no conversion defined")),
            },
            Type::Integer => self.cast_to_int64(target).and_then(|i| {
                i32::try_from(i).map(Value::Integer).map_err(|_| fail("out of range for INTEGER"))
            }),
            Type::BigInt => self.cast_to_int64(target).map(Value::BigInt),
            Type::Double => match self {
                Value::Integer(i) => Ok(Value::Double(*i as f64)),
                Value::BigInt(i) => Ok(Value::Double(*i as f64)),
                Value::Double(d) => Ok(Value::Double(*d)),
                Value::Text(s) => s.trim().parse::<f64>().map(Value::Double).map_err(|_| fail("not a decimal number")),
                _ => Err(fail("no conversion defined")),
            },
            Type::Timestamp => match self {
                Value::Timestamp(t) => Ok(Value::Timestamp(*t)),
                Value::Text(s) => timestamp::parse_timestamp(s).map(Value::Timestamp),
                _ => Err(fail("no conversion defined")),
            },
            Type::Text => match self {
                Value::Boolean(b) => Ok(Value::Text(b.to_string())),
                Value::Integer(i) => Ok(Value::Text(i.to_string())),
                Value::BigInt(i) => Ok(Value::Text(i.to_string())),
                Value::Double(d) => Ok(Value::Text(format!("{d}"))),
                Value::Timestamp(t) => timestamp::format_timestamp(*t).map(Value::Text),
                Value::Text(s) => Ok(Value::Text(s.clone())),
                Value::Blob(b) => Ok(Value::Text(crate::encoding::base64_encode(b))),
            },
            Type::Blob => match self {
                Value::Text(s) => crate::encoding::base64_decode(s).map(Value::Blob),
                Value::Blob(b) => Ok(Value::Blob(b.clone())),
                _ => Err(fail("no conversion defined")),
            },
        }
    }

    fn cast_to_int64(&self, target: Type) -> Result<i64> {
        let fail = |reason: &str| ValueError::CastError {
            from: self.type_name(),
            to: target.name(),
            reason: reason.to_string(),
        };
        match self {
            Value::Boolean(b) => Ok(if *b { 1 } else { 0 }),
            Value::Integer(i) => Ok(*i as i64),
            Value::BigInt(i) => Ok(*i),
            Value::Double(d) => {
                if d.is_finite() && *d >= i64::MIN as f64 && *d <= i64::MAX as f64 {
                    Ok(d.trunc() as i64)
                } else {
                    Err(fail("out of range"))
                }
            }
            Value::Text(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Ok(i)
                } else if let Ok(f) = s.parse::<f64>() {
                    if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                        Ok(f.trunc() as i64)
                    } else {
                        Err(fail("out of range"))
                    }
                } else {
                    Err(fail("not a decimal number"))
                }
            }
            _ => Err(fail("no conversion defined")),
        }
    }
}

/// Total-ordering comparison for use by sort/index-key logic, where `NULL`
/// sorts first (spec §8, scenario S6) rather than the boolean-predicate
/// semantics of [`Value::eq`] et al.
pub fn sql_compare(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => match compare_values(a, b) {
            Ok(ord) => ord,
            Err(_) => a.type_name().cmp(b.type_name()),
        },
    }
}
