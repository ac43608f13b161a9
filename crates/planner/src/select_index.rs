//! Rule 5, `SelectIndex` (spec §4.4.1): the central rewrite. Replaces a
//! `TableScan` plus the `Filter`/`TempTreeSort` nodes directly above it with
//! an `IndexScan`/ranged `TableScan` that absorbs as many of those nodes as
//! possible, picked by the pinned cost model in [`crate::config`].

use corvid_catalog::{Catalog, ColumnDef, Range, Ranges, TableDef};
use corvid_expr::{BinaryOp, Expr};
use corvid_plan::Operator;
use corvid_value::{Type, Value};

use crate::config::OptimizerConfig;
use crate::error::Result;

#[derive(Debug, Clone)]
enum ChainNode {
    Filter(Expr),
    Sort(Expr, bool),
}

/// Peels the leading run of `Filter`/`TempTreeSort` nodes off the top of
/// `op`, outermost first, stopping at the first node that is neither.
fn collect_scan_chain(op: Operator) -> (Operator, Vec<ChainNode>) {
    let mut chain = Vec::new();
    let mut cur = op;
    loop {
        match cur {
            Operator::Filter { prev, expr } => {
                chain.push(ChainNode::Filter(expr));
                cur = *prev;
            }
            Operator::TempTreeSort { prev, expr, desc } => {
                chain.push(ChainNode::Sort(expr, desc));
                cur = *prev;
            }
            other => {
                cur = other;
                break;
            }
        }
    }
    (cur, chain)
}

/// Rebuilds a `Filter`/`TempTreeSort` chain (outermost-first, as produced by
/// [`collect_scan_chain`]) on top of `source`.
fn rebuild_chain(source: Operator, chain: Vec<ChainNode>) -> Operator {
    let mut built = source;
    for node in chain.into_iter().rev() {
        built = match node {
            ChainNode::Filter(expr) => Operator::Filter {
                prev: Box::new(built),
                expr,
            },
            ChainNode::Sort(expr, desc) => Operator::TempTreeSort {
                prev: Box::new(built),
                expr,
                desc,
            },
        };
    }
    built
}

/// Applies `SelectIndex` throughout `op`, recursing into every `Concat`/
/// `Union` sub-stream and every operator's predecessor.
pub fn select_index_rule(op: Operator, catalog: &Catalog, config: &OptimizerConfig) -> Result<Operator> {
    match op {
        Operator::Concat { streams } => Ok(Operator::Concat {
            streams: streams
                .into_iter()
                .map(|s| select_index_rule(s, catalog, config))
                .collect::<Result<_>>()?,
        }),
        Operator::Union { streams } => Ok(Operator::Union {
            streams: streams
                .into_iter()
                .map(|s| select_index_rule(s, catalog, config))
                .collect::<Result<_>>()?,
        }),
        other => {
            let (source, chain) = collect_scan_chain(other);
            if chain.is_empty() {
                return recurse_children(source, catalog, config);
            }
            if let Operator::TableScan { table, ranges, reverse } = &source {
                if ranges.is_empty() && !*reverse {
                    if let Some(replacement) = try_select(table, &chain, catalog, config)? {
                        return Ok(replacement);
                    }
                }
            }
            let source = select_index_rule(source, catalog, config)?;
            Ok(rebuild_chain(source, chain))
        }
    }
}

/// Descends into the direct children of an operator that wasn't itself the
/// top of a `Filter`/`TempTreeSort` run (so its own `prev`, if any, may
/// still hide a rewritable scan further down).
fn recurse_children(op: Operator, catalog: &Catalog, config: &OptimizerConfig) -> Result<Operator> {
    use Operator::*;
    Ok(match op {
        Project { prev, exprs } => Project {
            prev: Box::new(select_index_rule(*prev, catalog, config)?),
            exprs,
        },
        Take { prev, n } => Take {
            prev: Box::new(select_index_rule(*prev, catalog, config)?),
            n,
        },
        Skip { prev, n } => Skip {
            prev: Box::new(select_index_rule(*prev, catalog, config)?),
            n,
        },
        GroupAggregate {
            prev,
            group_by,
            aggregates,
        } => GroupAggregate {
            prev: Box::new(select_index_rule(*prev, catalog, config)?),
            group_by,
            aggregates,
        },
        Insert { prev, table } => Insert {
            prev: Box::new(select_index_rule(*prev, catalog, config)?),
            table,
        },
        GenerateKey {
            prev,
            table,
            on_conflict,
            on_conflict_do_nothing,
        } => GenerateKey {
            prev: Box::new(select_index_rule(*prev, catalog, config)?),
            table,
            on_conflict: on_conflict
                .map(|b| select_index_rule(*b, catalog, config).map(Box::new))
                .transpose()?,
            on_conflict_do_nothing,
        },
        Replace { prev, table } => Replace {
            prev: Box::new(select_index_rule(*prev, catalog, config)?),
            table,
        },
        Delete { prev, table } => Delete {
            prev: Box::new(select_index_rule(*prev, catalog, config)?),
            table,
        },
        Validate { prev, table } => Validate {
            prev: Box::new(select_index_rule(*prev, catalog, config)?),
            table,
        },
        unchanged => unchanged,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SargOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Between,
}

struct Sargable {
    chain_idx: usize,
    column: String,
    op: SargOp,
    values: Vec<Value>,
}

fn sarg_op_from_binary(op: BinaryOp, flipped: bool) -> Option<SargOp> {
    use BinaryOp::*;
    Some(match (op, flipped) {
        (Eq, _) => SargOp::Eq,
        (Gt, false) => SargOp::Gt,
        (Gt, true) => SargOp::Lt,
        (Gte, false) => SargOp::Gte,
        (Gte, true) => SargOp::Lte,
        (Lt, false) => SargOp::Lt,
        (Lt, true) => SargOp::Gt,
        (Lte, false) => SargOp::Lte,
        (Lte, true) => SargOp::Gte,
        _ => return None,
    })
}

/// Extracts `<column> <op> <literal>` (or the mirrored form) from a single
/// `Filter` expression, per spec §4.4.1's "only the left operand may be the
/// column for `IN`; for other comparisons either side is allowed".
fn extract_sargable(chain_idx: usize, expr: &Expr) -> Option<Sargable> {
    match expr {
        Expr::BinaryOp { op, lhs, rhs } if op.is_comparison() => {
            if let (Expr::Column(c), Expr::Literal(v)) = (lhs.as_ref(), rhs.as_ref()) {
                let sop = sarg_op_from_binary(*op, false)?;
                return Some(Sargable {
                    chain_idx,
                    column: c.name.clone(),
                    op: sop,
                    values: vec![v.clone()],
                });
            }
            if let (Expr::Literal(v), Expr::Column(c)) = (lhs.as_ref(), rhs.as_ref()) {
                let sop = sarg_op_from_binary(*op, true)?;
                return Some(Sargable {
                    chain_idx,
                    column: c.name.clone(),
                    op: sop,
                    values: vec![v.clone()],
                });
            }
            None
        }
        Expr::In { lhs, list } => {
            let Expr::Column(c) = lhs.as_ref() else { return None };
            let Expr::LiteralList(items) = list.as_ref() else { return None };
            if items.is_empty() {
                return None;
            }
            let values = items
                .iter()
                .map(|e| match e {
                    Expr::Literal(v) => Some(v.clone()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            Some(Sargable {
                chain_idx,
                column: c.name.clone(),
                op: SargOp::In,
                values,
            })
        }
        Expr::Between { expr, lo, hi } => {
            let Expr::Column(c) = expr.as_ref() else { return None };
            let (Expr::Literal(lo), Expr::Literal(hi)) = (lo.as_ref(), hi.as_ref()) else {
                return None;
            };
            Some(Sargable {
                chain_idx,
                column: c.name.clone(),
                op: SargOp::Between,
                values: vec![lo.clone(), hi.clone()],
            })
        }
        _ => None,
    }
}

/// Whether a column of declared type `col_ty` can be order-compared against
/// a literal of `lit`'s type without raising `TypeMismatch` (mirrors
/// `corvid_value::ops::compare_values`'s families).
fn types_comparable(col_ty: Type, lit: &Value) -> bool {
    let Some(lit_ty) = lit.type_of() else { return false };
    if col_ty == lit_ty {
        return true;
    }
    let numeric = |t: Type| matches!(t, Type::Integer | Type::BigInt | Type::Double);
    if numeric(col_ty) && numeric(lit_ty) {
        return true;
    }
    matches!(
        (col_ty, lit_ty),
        (Type::Timestamp, Type::Text) | (Type::Text, Type::Timestamp)
    )
}

fn cross_product(lists: &[Vec<Value>]) -> Vec<Vec<Value>> {
    let mut acc: Vec<Vec<Value>> = vec![Vec::new()];
    for list in lists {
        let mut next = Vec::with_capacity(acc.len() * list.len().max(1));
        for combo in &acc {
            for v in list {
                let mut c = combo.clone();
                c.push(v.clone());
                next.push(c);
            }
        }
        acc = next;
    }
    acc
}

struct Candidate {
    secondary: bool,
    unique: bool,
    index_name: Option<String>,
    ranges: Ranges,
    reverse: bool,
    absorbed_filter_indices: Vec<usize>,
    absorbed_sort_idx: Option<usize>,
    cost: i64,
}

#[allow(clippy::too_many_arguments)]
fn build_candidate(
    columns: &[String],
    desc: &[bool],
    sargables: &[Sargable],
    sort: Option<(usize, &str, bool)>,
    secondary: bool,
    unique: bool,
    config: &OptimizerConfig,
) -> Option<Candidate> {
    let mut prefix_values: Vec<Vec<Value>> = Vec::new();
    let mut absorbed_filter_indices: Vec<usize> = Vec::new();
    let mut tail: Option<(SargOp, Value, Value)> = None;
    let mut used_columns: Vec<String> = Vec::new();

    for (i, col) in columns.iter().enumerate() {
        let candidate_filter = sargables
            .iter()
            .find(|s| s.column == *col && !absorbed_filter_indices.contains(&s.chain_idx));
        let Some(s) = candidate_filter else {
            if i == 0 {
                if let Some((sort_idx, sort_col, sort_desc)) = sort {
                    if sort_col == col {
                        return Some(Candidate {
                            secondary,
                            unique,
                            index_name: None,
                            ranges: Vec::new(),
                            reverse: sort_desc ^ desc.first().copied().unwrap_or(false),
                            absorbed_filter_indices: Vec::new(),
                            absorbed_sort_idx: Some(sort_idx),
                            cost: config.no_range_sort_only_cost
                                + if secondary { config.secondary_index_penalty } else { 0 }
                                - if unique { config.unique_index_bonus } else { 0 },
                        });
                    }
                }
            }
            break;
        };
        match s.op {
            SargOp::Eq => {
                used_columns.push(col.clone());
                prefix_values.push(vec![s.values[0].clone()]);
                absorbed_filter_indices.push(s.chain_idx);
            }
            SargOp::In => {
                used_columns.push(col.clone());
                prefix_values.push(s.values.clone());
                absorbed_filter_indices.push(s.chain_idx);
            }
            // An `exact` range binds only the columns present in `min`; once a
            // leading Eq/In prefix has been absorbed as `exact`, appending a
            // trailing range bound to the same tuple would either keep `exact`
            // (wrongly demanding equality on the range column too) or drop it
            // (wrongly losing the equality guarantee on the prefix columns
            // already absorbed). Only fold a range/`Between` into the tail
            // when nothing ahead of it was already absorbed as an exact
            // prefix; otherwise it stays a residual `Filter`.
            SargOp::Gt | SargOp::Gte | SargOp::Lt | SargOp::Lte => {
                if prefix_values.is_empty() {
                    used_columns.push(col.clone());
                    tail = Some((s.op, s.values[0].clone(), Value::Null));
                    absorbed_filter_indices.push(s.chain_idx);
                }
                break;
            }
            SargOp::Between => {
                if prefix_values.is_empty() {
                    used_columns.push(col.clone());
                    tail = Some((SargOp::Between, s.values[0].clone(), s.values[1].clone()));
                    absorbed_filter_indices.push(s.chain_idx);
                }
                break;
            }
        }
    }

    if prefix_values.is_empty() && tail.is_none() {
        return None;
    }

    let combos = cross_product(&prefix_values);
    let (ranges, cost_base): (Ranges, i64) = match &tail {
        None => {
            let ranges = combos
                .into_iter()
                .map(|combo| Range::eq(used_columns.clone(), combo))
                .collect();
            (ranges, config.exact_cost)
        }
        Some((op, bound, hi)) => {
            let ranges = combos
                .into_iter()
                .map(|combo| {
                    let mut values = combo.clone();
                    values.push(bound.clone());
                    match op {
                        SargOp::Gt => Range::gt(used_columns.clone(), values),
                        SargOp::Gte => Range::gte(used_columns.clone(), values),
                        SargOp::Lt => Range::lt(used_columns.clone(), values),
                        SargOp::Lte => Range::lte(used_columns.clone(), values),
                        SargOp::Between => {
                            let mut hi_values = combo;
                            hi_values.push(hi.clone());
                            Range::between(used_columns.clone(), values, hi_values)
                        }
                        _ => unreachable!("tail op is always a range comparator"),
                    }
                })
                .collect();
            let cost_base = if matches!(op, SargOp::Between) {
                config.between_cost
            } else {
                config.single_bound_cost
            };
            (ranges, cost_base)
        }
    };

    let cost = cost_base
        + if secondary { config.secondary_index_penalty } else { 0 }
        - if unique { config.unique_index_bonus } else { 0 }
        - absorbed_filter_indices.len() as i64;

    Some(Candidate {
        secondary,
        unique,
        index_name: None,
        ranges,
        reverse: false,
        absorbed_filter_indices,
        absorbed_sort_idx: None,
        cost,
    })
}

fn column_type_ok(table_def: &TableDef, sargable: &Sargable) -> bool {
    let Some(col_def): Option<&ColumnDef> = table_def.column(&sargable.column) else {
        return false;
    };
    sargable.values.iter().all(|v| types_comparable(col_def.ty, v))
}

fn try_select(
    table_name: &str,
    chain: &[ChainNode],
    catalog: &Catalog,
    config: &OptimizerConfig,
) -> Result<Option<Operator>> {
    let table_def = catalog.table(table_name)?;

    let mut sargables: Vec<Sargable> = Vec::new();
    let mut sort: Option<(usize, String, bool)> = None;
    let mut sort_count = 0usize;
    for (idx, node) in chain.iter().enumerate() {
        match node {
            ChainNode::Filter(expr) => {
                if let Some(s) = extract_sargable(idx, expr) {
                    if column_type_ok(table_def, &s) {
                        sargables.push(s);
                    }
                }
            }
            ChainNode::Sort(expr, desc) => {
                sort_count += 1;
                if let Expr::Column(c) = expr {
                    sort = Some((idx, c.name.clone(), *desc));
                }
            }
        }
    }
    let sort_ref = if sort_count == 1 {
        sort.as_ref().map(|(idx, col, desc)| (*idx, col.as_str(), *desc))
    } else {
        None
    };

    let mut candidates: Vec<Candidate> = Vec::new();
    if let Some(pk) = &table_def.primary_key {
        if let Some(c) = build_candidate(&pk.columns, &pk.desc, &sargables, sort_ref, false, false, config) {
            candidates.push(c);
        }
    }
    for idx_def in catalog.indexes_for_table(table_name) {
        if let Some(mut c) = build_candidate(
            &idx_def.columns,
            &idx_def.desc,
            &sargables,
            sort_ref,
            true,
            idx_def.unique,
            config,
        ) {
            c.index_name = Some(idx_def.name.clone());
            candidates.push(c);
        }
    }

    let best = candidates.into_iter().max_by(|a, b| {
        a.absorbed_filter_indices
            .len()
            .cmp(&b.absorbed_filter_indices.len())
            .then_with(|| b.cost.cmp(&a.cost))
    });
    let Some(best) = best else { return Ok(None) };

    let residual: Vec<ChainNode> = chain
        .iter()
        .enumerate()
        .filter(|(idx, _)| !best.absorbed_filter_indices.contains(idx) && best.absorbed_sort_idx != Some(*idx))
        .map(|(_, node)| node.clone())
        .collect();

    let source = if best.secondary {
        Operator::IndexScan {
            index: best.index_name.clone().unwrap_or_else(|| {
                unreachable!("secondary candidates always carry their index name")
            }),
            ranges: best.ranges,
            reverse: best.reverse,
        }
    } else {
        Operator::TableScan {
            table: table_name.to_string(),
            ranges: best.ranges,
            reverse: best.reverse,
        }
    };

    Ok(Some(rebuild_chain(source, residual)))
}
