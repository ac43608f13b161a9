use corvid_expr::ast::{BinaryOp, ColumnRef, Expr, ParamRef};
use corvid_expr::{eval, AggregateKind, Environment, Params};
use corvid_row::{ColumnBuffer, Row};
use corvid_value::Value;

fn row_with(pairs: &[(&str, Value)]) -> Row {
    let mut buf = ColumnBuffer::new();
    for (name, value) in pairs {
        buf.add(*name, value.clone());
    }
    Row::from_buffer(buf)
}

#[test]
fn and_chain_short_circuits_on_false_ignores_later_errors() {
    let row = row_with(&[("a", Value::Integer(0))]);
    let params = Params::default();
    let env = Environment::new(Some(&row), &params);
    let expr = Expr::and(
        Expr::Column(ColumnRef::new("a")),
        Expr::Column(ColumnRef::new("does_not_exist")),
    );
    // `a` is falsy (0), so the chain must short-circuit to `false` without
    // ever evaluating the unresolvable second conjunct.
    let result = eval(&expr, &env).unwrap();
    assert!(matches!(result, Value::Boolean(false)));
}

#[test]
fn and_chain_null_propagates_when_no_operand_is_false() {
    let row = row_with(&[("a", Value::Null), ("b", Value::Integer(1))]);
    let params = Params::default();
    let env = Environment::new(Some(&row), &params);
    let expr = Expr::and(Expr::Column(ColumnRef::new("a")), Expr::Column(ColumnRef::new("b")));
    let result = eval(&expr, &env).unwrap();
    assert!(result.is_null());
}

#[test]
fn in_list_with_null_and_no_match_is_null() {
    let row = row_with(&[("a", Value::Integer(5))]);
    let params = Params::default();
    let env = Environment::new(Some(&row), &params);
    let expr = Expr::In {
        lhs: Box::new(Expr::Column(ColumnRef::new("a"))),
        list: Box::new(Expr::LiteralList(vec![
            Expr::Literal(Value::Null),
            Expr::Literal(Value::Integer(1)),
        ])),
    };
    assert!(eval(&expr, &env).unwrap().is_null());
}

#[test]
fn in_list_match_short_circuits_true() {
    let row = row_with(&[("a", Value::Integer(1))]);
    let params = Params::default();
    let env = Environment::new(Some(&row), &params);
    let expr = Expr::In {
        lhs: Box::new(Expr::Column(ColumnRef::new("a"))),
        list: Box::new(Expr::LiteralList(vec![
            Expr::Literal(Value::Integer(1)),
            Expr::Literal(Value::Integer(2)),
        ])),
    };
    assert!(matches!(eval(&expr, &env).unwrap(), Value::Boolean(true)));
}

#[test]
fn positional_param_resolves() {
    let params = Params::positional(vec![Value::Integer(42)]);
    let env = Environment::new(None, &params);
    let expr = Expr::Param(ParamRef::Positional(1));
    assert!(matches!(eval(&expr, &env).unwrap(), Value::Integer(42)));
}

#[test]
fn environment_falls_back_to_outer_on_missing_column() {
    let outer_row = row_with(&[("o", Value::Integer(9))]);
    let params = Params::default();
    let outer_env = Environment::new(Some(&outer_row), &params);
    let inner_row = row_with(&[("i", Value::Integer(1))]);
    let inner_env = outer_env.nested(Some(&inner_row));
    let expr = Expr::Column(ColumnRef::new("o"));
    assert!(matches!(eval(&expr, &inner_env).unwrap(), Value::Integer(9)));
}

#[test]
fn count_star_counts_all_rows_including_null() {
    let mut agg = AggregateKind::Count { star: true }.build();
    agg.update(&Value::Integer(1)).unwrap();
    agg.update(&Value::Null).unwrap();
    assert!(matches!(agg.finalize(), Value::BigInt(2)));
}

#[test]
fn count_empty_group_yields_zero() {
    let agg = AggregateKind::Count { star: true }.build();
    assert!(matches!(agg.finalize(), Value::BigInt(0)));
}

#[test]
fn avg_empty_group_yields_zero_point_zero() {
    let agg = AggregateKind::Avg.build();
    assert!(matches!(agg.finalize(), Value::Double(d) if d == 0.0));
}

#[test]
fn min_max_ignore_nulls() {
    let mut min = AggregateKind::Min.build();
    let mut max = AggregateKind::Max.build();
    for v in [Value::Integer(3), Value::Null, Value::Integer(1), Value::Integer(5)] {
        min.update(&v).unwrap();
        max.update(&v).unwrap();
    }
    assert!(matches!(min.finalize(), Value::Integer(1)));
    assert!(matches!(max.finalize(), Value::Integer(5)));
}

#[test]
fn binary_comparison_eval() {
    let params = Params::default();
    let env = Environment::new(None, &params);
    let expr = Expr::BinaryOp {
        op: BinaryOp::Gt,
        lhs: Box::new(Expr::Literal(Value::Integer(5))),
        rhs: Box::new(Expr::Literal(Value::Integer(3))),
    };
    assert!(matches!(eval(&expr, &env).unwrap(), Value::Boolean(true)));
}
