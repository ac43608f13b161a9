//! Rewrite rules 1-4 (spec §4.4): `SplitANDConditionRule`,
//! `PrecalculateExprRule`, `RemoveUnnecessaryFilterNodesRule`,
//! `RemoveUnnecessaryProjection`. Rule 5, `SelectIndex`, lives in
//! `select_index.rs` since it needs the catalog and the cost model.
//!
//! Each rule is a pure function over an owned `Operator` tree. They're
//! applied as full post-order passes: children (including every `Concat`/
//! `Union` sub-stream) are rewritten before the rule considers the node
//! itself, which is what spec §4.4's "recurse into each sub-stream before
//! running the rules on the containing stream" means in a parent-owned
//! tree shape.

use corvid_expr::{Environment, Expr, Params};
use corvid_plan::Operator;

use crate::error::Result;

/// Walks `op` bottom-up, rewriting every node with `f` after its children
/// have already been rewritten (post-order). `f` never sees a partially
/// rewritten subtree.
fn walk(op: Operator, f: &mut impl FnMut(Operator) -> Operator) -> Operator {
    use Operator::*;
    let op = match op {
        Filter { prev, expr } => Filter {
            prev: Box::new(walk(*prev, f)),
            expr,
        },
        Project { prev, exprs } => Project {
            prev: Box::new(walk(*prev, f)),
            exprs,
        },
        Take { prev, n } => Take {
            prev: Box::new(walk(*prev, f)),
            n,
        },
        Skip { prev, n } => Skip {
            prev: Box::new(walk(*prev, f)),
            n,
        },
        TempTreeSort { prev, expr, desc } => TempTreeSort {
            prev: Box::new(walk(*prev, f)),
            expr,
            desc,
        },
        GroupAggregate {
            prev,
            group_by,
            aggregates,
        } => GroupAggregate {
            prev: Box::new(walk(*prev, f)),
            group_by,
            aggregates,
        },
        Insert { prev, table } => Insert {
            prev: Box::new(walk(*prev, f)),
            table,
        },
        GenerateKey {
            prev,
            table,
            on_conflict,
            on_conflict_do_nothing,
        } => GenerateKey {
            prev: Box::new(walk(*prev, f)),
            table,
            on_conflict: on_conflict.map(|b| Box::new(walk(*b, f))),
            on_conflict_do_nothing,
        },
        Replace { prev, table } => Replace {
            prev: Box::new(walk(*prev, f)),
            table,
        },
        Delete { prev, table } => Delete {
            prev: Box::new(walk(*prev, f)),
            table,
        },
        Validate { prev, table } => Validate {
            prev: Box::new(walk(*prev, f)),
            table,
        },
        Concat { streams } => Concat {
            streams: streams.into_iter().map(|s| walk(s, f)).collect(),
        },
        Union { streams } => Union {
            streams: streams.into_iter().map(|s| walk(s, f)).collect(),
        },
        source @ (TableScan { .. } | IndexScan { .. } | Emit { .. }) => source,
    };
    f(op)
}

/// Same shape as [`walk`] but for a rule whose node-level step can fail
/// (`PrecalculateExprRule`).
fn try_walk(op: Operator, f: &mut impl FnMut(Operator) -> Result<Operator>) -> Result<Operator> {
    use Operator::*;
    let op = match op {
        Filter { prev, expr } => Filter {
            prev: Box::new(try_walk(*prev, f)?),
            expr,
        },
        Project { prev, exprs } => Project {
            prev: Box::new(try_walk(*prev, f)?),
            exprs,
        },
        Take { prev, n } => Take {
            prev: Box::new(try_walk(*prev, f)?),
            n,
        },
        Skip { prev, n } => Skip {
            prev: Box::new(try_walk(*prev, f)?),
            n,
        },
        TempTreeSort { prev, expr, desc } => TempTreeSort {
            prev: Box::new(try_walk(*prev, f)?),
            expr,
            desc,
        },
        GroupAggregate {
            prev,
            group_by,
            aggregates,
        } => GroupAggregate {
            prev: Box::new(try_walk(*prev, f)?),
            group_by,
            aggregates,
        },
        Insert { prev, table } => Insert {
            prev: Box::new(try_walk(*prev, f)?),
            table,
        },
        GenerateKey {
            prev,
            table,
            on_conflict,
            on_conflict_do_nothing,
        } => GenerateKey {
            prev: Box::new(try_walk(*prev, f)?),
            table,
            on_conflict: on_conflict.map(|b| try_walk(*b, f).map(Box::new)).transpose()?,
            on_conflict_do_nothing,
        },
        Replace { prev, table } => Replace {
            prev: Box::new(try_walk(*prev, f)?),
            table,
        },
        Delete { prev, table } => Delete {
            prev: Box::new(try_walk(*prev, f)?),
            table,
        },
        Validate { prev, table } => Validate {
            prev: Box::new(try_walk(*prev, f)?),
            table,
        },
        Concat { streams } => Concat {
            streams: streams.into_iter().map(|s| try_walk(s, f)).collect::<Result<_>>()?,
        },
        Union { streams } => Union {
            streams: streams.into_iter().map(|s| try_walk(s, f)).collect::<Result<_>>()?,
        },
        source @ (TableScan { .. } | IndexScan { .. } | Emit { .. }) => source,
    };
    f(op)
}

/// Rule 1: `Filter(a AND b AND c)` becomes `Filter(a) | Filter(b) | Filter(c)`,
/// provided no `OR` appears at the top of the condition.
pub fn split_and_condition_rule(op: Operator) -> Operator {
    walk(op, &mut |node| match node {
        Operator::Filter { prev, expr } => match expr.split_top_level_and() {
            Some(conjuncts) if conjuncts.len() > 1 => {
                let conjuncts: Vec<Expr> = conjuncts.into_iter().cloned().collect();
                let mut built = *prev;
                for conjunct in conjuncts {
                    built = Operator::Filter {
                        prev: Box::new(built),
                        expr: conjunct,
                    };
                }
                built
            }
            _ => Operator::Filter { prev, expr },
        },
        other => other,
    })
}

/// True if `expr` contains only literal leaves (no column/wildcard/param
/// references, no aggregate calls) and is therefore safe to fold to a single
/// value ahead of time.
fn is_foldable(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(_) => true,
        Expr::LiteralList(items) => items.iter().all(is_foldable),
        Expr::LiteralRecord(fields) => fields.iter().all(|(_, v)| is_foldable(v)),
        Expr::BinaryOp { lhs, rhs, .. } => is_foldable(lhs) && is_foldable(rhs),
        Expr::In { lhs, list } => is_foldable(lhs) && is_foldable(list),
        Expr::Between { expr, lo, hi } => is_foldable(expr) && is_foldable(lo) && is_foldable(hi),
        Expr::Named { expr, .. } => is_foldable(expr),
        Expr::Column(_) | Expr::Wildcard | Expr::Param(_) | Expr::FunctionCall { .. } => false,
    }
}

/// Folds every constant-foldable sub-expression of `expr` to a `Literal`,
/// bottom-up. `LiteralList`/`LiteralRecord` stay as those variants (the
/// value model has no array/object kind to collapse them into, per spec
/// §9's resolved open question) but their children become literals too.
/// Aborts with the first determinate evaluation error encountered, per
/// spec §4.4's "don't silently drop" requirement.
fn fold(expr: Expr, params: &Params) -> Result<Expr> {
    let folded = match expr {
        Expr::Literal(_) | Expr::Column(_) | Expr::Wildcard | Expr::Param(_) => return Ok(expr),
        Expr::LiteralList(items) => {
            let items = items.into_iter().map(|e| fold(e, params)).collect::<Result<Vec<_>>>()?;
            Expr::LiteralList(items)
        }
        Expr::LiteralRecord(fields) => {
            let fields = fields
                .into_iter()
                .map(|(k, v)| Ok((k, fold(v, params)?)))
                .collect::<Result<Vec<_>>>()?;
            Expr::LiteralRecord(fields)
        }
        Expr::Named { expr, alias } => Expr::Named {
            expr: Box::new(fold(*expr, params)?),
            alias,
        },
        Expr::FunctionCall { name, args } => {
            // Out of scope for constant folding (spec §4.4): aggregates need
            // a group context and there are no scalar functions to fold.
            // Still recurse into args so nested literal sub-expressions
            // fold, even though the call itself never collapses.
            let args = args.into_iter().map(|e| fold(e, params)).collect::<Result<Vec<_>>>()?;
            Expr::FunctionCall { name, args }
        }
        Expr::BinaryOp { op, lhs, rhs } => {
            let lhs = fold(*lhs, params)?;
            let rhs = fold(*rhs, params)?;
            if is_foldable(&lhs) && is_foldable(&rhs) {
                let candidate = Expr::BinaryOp {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
                let env = Environment::new(None, params);
                Expr::Literal(corvid_expr::eval(&candidate, &env)?)
            } else {
                Expr::BinaryOp {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }
            }
        }
        Expr::In { lhs, list } => {
            let lhs = fold(*lhs, params)?;
            let list = fold(*list, params)?;
            if is_foldable(&lhs) && is_foldable(&list) {
                let candidate = Expr::In {
                    lhs: Box::new(lhs),
                    list: Box::new(list),
                };
                let env = Environment::new(None, params);
                Expr::Literal(corvid_expr::eval(&candidate, &env)?)
            } else {
                Expr::In {
                    lhs: Box::new(lhs),
                    list: Box::new(list),
                }
            }
        }
        Expr::Between { expr, lo, hi } => {
            let expr = fold(*expr, params)?;
            let lo = fold(*lo, params)?;
            let hi = fold(*hi, params)?;
            if is_foldable(&expr) && is_foldable(&lo) && is_foldable(&hi) {
                let candidate = Expr::Between {
                    expr: Box::new(expr),
                    lo: Box::new(lo),
                    hi: Box::new(hi),
                };
                let env = Environment::new(None, params);
                Expr::Literal(corvid_expr::eval(&candidate, &env)?)
            } else {
                Expr::Between {
                    expr: Box::new(expr),
                    lo: Box::new(lo),
                    hi: Box::new(hi),
                }
            }
        }
    };
    Ok(folded)
}

/// Rule 2: constant-fold every expression reachable from a `Filter` or
/// `Project` node.
pub fn precalculate_expr_rule(op: Operator, params: &Params) -> Result<Operator> {
    try_walk(op, &mut |node| match node {
        Operator::Filter { prev, expr } => Ok(Operator::Filter {
            prev,
            expr: fold(expr, params)?,
        }),
        Operator::Project { prev, exprs } => Ok(Operator::Project {
            prev,
            exprs: exprs.into_iter().map(|e| fold(e, params)).collect::<Result<_>>()?,
        }),
        other => Ok(other),
    })
}

fn is_empty_literal_list(expr: &Expr) -> bool {
    matches!(expr, Expr::LiteralList(items) if items.is_empty())
}

/// Rule 3: drop `Filter(constant truthy)`; replace the whole stream with
/// `Emit([], [])` (the empty stream) on `Filter(constant falsy)` or
/// `Filter(a IN [])`. Assumes rule 2 already folded constants.
pub fn remove_unnecessary_filter_nodes_rule(op: Operator) -> Operator {
    walk(op, &mut |node| match node {
        Operator::Filter { prev, expr } => {
            if is_empty_literal_list_rhs(&expr) {
                return empty_stream();
            }
            match &expr {
                Expr::Literal(v) => match v.is_truthy() {
                    Ok(true) => *prev,
                    _ => empty_stream(),
                },
                _ => Operator::Filter { prev, expr },
            }
        }
        other => other,
    })
}

fn is_empty_literal_list_rhs(expr: &Expr) -> bool {
    matches!(expr, Expr::In { list, .. } if is_empty_literal_list(list))
}

fn empty_stream() -> Operator {
    Operator::Emit {
        columns: Vec::new(),
        rows: Vec::new(),
    }
}

/// Rule 4: a sole wildcard projection (`Project(*)`) is a no-op and is
/// dropped.
pub fn remove_unnecessary_projection(op: Operator) -> Operator {
    walk(op, &mut |node| match node {
        Operator::Project { prev, exprs } if exprs.len() == 1 && matches!(exprs[0], Expr::Wildcard) => *prev,
        other => other,
    })
}
