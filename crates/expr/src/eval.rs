//! Expression evaluation against an [`Environment`] (spec §4.4.2).

use corvid_value::Value;

use crate::ast::{BinaryOp, Expr, ParamRef};
use crate::env::Environment;
use crate::error::{ExprError, Result};

/// Evaluates `expr` under `env`. `AND`/`OR` chains and literal lists are
/// walked with an explicit loop rather than recursing operand-by-operand,
/// bounding stack depth for the common wide cases (spec §9); deeply nested
/// mixed expression trees still recurse through this function per operand.
pub fn eval(expr: &Expr, env: &Environment) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::LiteralList(_) | Expr::LiteralRecord(_) => Err(ExprError::Unsupported),
        Expr::Column(col) => Ok(env.resolve_column(&col.name)?),
        Expr::Wildcard => Err(ExprError::Unsupported),
        Expr::Named { expr, .. } => eval(expr, env),
        Expr::Param(ParamRef::Positional(n)) => Ok(env.params().get_positional(*n)?.clone()),
        Expr::Param(ParamRef::Named(n)) => Ok(env.params().get_named(n)?.clone()),
        Expr::Between { expr, lo, hi } => {
            let v = eval(expr, env)?;
            let lo = eval(lo, env)?;
            let hi = eval(hi, env)?;
            Ok(Value::Boolean(v.between(&lo, &hi)?))
        }
        Expr::In { lhs, list } => eval_in(lhs, list, env),
        Expr::BinaryOp { op: BinaryOp::And, .. } => eval_and_chain(expr, env),
        Expr::BinaryOp { op: BinaryOp::Or, .. } => eval_or_chain(expr, env),
        Expr::BinaryOp { op, lhs, rhs } => {
            let l = eval(lhs, env)?;
            let r = eval(rhs, env)?;
            eval_binary(*op, &l, &r)
        }
        Expr::FunctionCall { name, .. } => Err(ExprError::AggregateOutsideGroup(name.clone())),
    }
}

fn flatten_chain<'a>(op: BinaryOp, expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::BinaryOp { op: inner, lhs, rhs } if *inner == op => {
            flatten_chain(op, lhs, out);
            flatten_chain(op, rhs, out);
        }
        other => out.push(other),
    }
}

fn eval_and_chain(expr: &Expr, env: &Environment) -> Result<Value> {
    let mut operands = Vec::new();
    flatten_chain(BinaryOp::And, expr, &mut operands);
    let mut saw_null = false;
    for operand in operands {
        let v = eval(operand, env)?;
        if v.is_null() {
            saw_null = true;
            continue;
        }
        if !v.is_truthy()? {
            return Ok(Value::Boolean(false));
        }
    }
    Ok(Value::Boolean(!saw_null))
}

fn eval_or_chain(expr: &Expr, env: &Environment) -> Result<Value> {
    let mut operands = Vec::new();
    flatten_chain(BinaryOp::Or, expr, &mut operands);
    let mut saw_null = false;
    for operand in operands {
        let v = eval(operand, env)?;
        if v.is_null() {
            saw_null = true;
            continue;
        }
        if v.is_truthy()? {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(if saw_null { Value::Null } else { Value::Boolean(false) })
}

fn eval_in(lhs: &Expr, list: &Expr, env: &Environment) -> Result<Value> {
    let needle = eval(lhs, env)?;
    let items = match list {
        Expr::LiteralList(items) => items,
        other => {
            let _ = eval(other, env)?;
            return Err(ExprError::Unsupported);
        }
    };
    let mut saw_null = false;
    for item in items {
        let v = eval(item, env)?;
        if v.is_null() {
            saw_null = true;
            continue;
        }
        if needle.eq(&v)? {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(if saw_null { Value::Null } else { Value::Boolean(false) })
}

fn eval_binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    Ok(match op {
        BinaryOp::And | BinaryOp::Or => unreachable!("handled by chain evaluators"),
        BinaryOp::Add => l.add(r)?,
        BinaryOp::Sub => l.sub(r)?,
        BinaryOp::Mul => l.mul(r)?,
        BinaryOp::Div => l.div(r)?,
        BinaryOp::Mod => l.modulo(r)?,
        BinaryOp::BitAnd => l.bitwise_and(r)?,
        BinaryOp::BitOr => l.bitwise_or(r)?,
        BinaryOp::BitXor => l.bitwise_xor(r)?,
        BinaryOp::Eq => Value::Boolean(l.eq(r)?),
        BinaryOp::Neq => Value::Boolean(!l.eq(r)?),
        BinaryOp::Gt => Value::Boolean(l.gt(r)?),
        BinaryOp::Gte => Value::Boolean(l.gte(r)?),
        BinaryOp::Lt => Value::Boolean(l.lt(r)?),
        BinaryOp::Lte => Value::Boolean(l.lte(r)?),
    })
}
