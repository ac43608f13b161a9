//! The `Stream`/`Operator` IR (spec §3/§4.3). `Operator` is a tagged enum;
//! non-source variants own their predecessor directly (`Box<Operator>`) per
//! spec §9's "parent-owned children" option — cloning a stream deep-copies
//! this tree, and there are no reference-counted cycles to worry about.

use corvid_catalog::Ranges;
use corvid_expr::{AggregateKind, Expr};

/// A single named aggregate column in a `GroupAggregate`, e.g. `COUNT(*)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSpec {
    pub output_name: String,
    pub kind: AggregateKind,
    /// The input expression fed to the aggregator; ignored (but still
    /// required, typically `Literal(NULL)`) for `Count { star: true }`.
    pub input: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    TableScan {
        table: String,
        ranges: Ranges,
        reverse: bool,
    },
    IndexScan {
        index: String,
        ranges: Ranges,
        reverse: bool,
    },
    Filter {
        prev: Box<Operator>,
        expr: Expr,
    },
    Project {
        prev: Box<Operator>,
        exprs: Vec<Expr>,
    },
    /// A source that yields literal row expressions, evaluated per call.
    Emit {
        columns: Vec<String>,
        rows: Vec<Vec<Expr>>,
    },
    Take {
        prev: Box<Operator>,
        n: Expr,
    },
    Skip {
        prev: Box<Operator>,
        n: Expr,
    },
    TempTreeSort {
        prev: Box<Operator>,
        expr: Expr,
        desc: bool,
    },
    GroupAggregate {
        prev: Box<Operator>,
        group_by: Option<Expr>,
        aggregates: Vec<AggregateSpec>,
    },
    Insert {
        prev: Box<Operator>,
        table: String,
    },
    GenerateKey {
        prev: Box<Operator>,
        table: String,
        on_conflict: Option<Box<Operator>>,
        on_conflict_do_nothing: bool,
    },
    Replace {
        prev: Box<Operator>,
        table: String,
    },
    Delete {
        prev: Box<Operator>,
        table: String,
    },
    Validate {
        prev: Box<Operator>,
        table: String,
    },
    Concat {
        streams: Vec<Operator>,
    },
    Union {
        streams: Vec<Operator>,
    },
}

impl Operator {
    pub fn prev(&self) -> Option<&Operator> {
        use Operator::*;
        match self {
            TableScan { .. } | IndexScan { .. } | Emit { .. } | Concat { .. } | Union { .. } => None,
            Filter { prev, .. }
            | Project { prev, .. }
            | Take { prev, .. }
            | Skip { prev, .. }
            | TempTreeSort { prev, .. }
            | GroupAggregate { prev, .. }
            | Insert { prev, .. }
            | GenerateKey { prev, .. }
            | Replace { prev, .. }
            | Delete { prev, .. }
            | Validate { prev, .. } => Some(prev),
        }
    }

    pub fn replace_prev(self, new_prev: Operator) -> Operator {
        use Operator::*;
        match self {
            Filter { expr, .. } => Filter {
                prev: Box::new(new_prev),
                expr,
            },
            Project { exprs, .. } => Project {
                prev: Box::new(new_prev),
                exprs,
            },
            Take { n, .. } => Take {
                prev: Box::new(new_prev),
                n,
            },
            Skip { n, .. } => Skip {
                prev: Box::new(new_prev),
                n,
            },
            TempTreeSort { expr, desc, .. } => TempTreeSort {
                prev: Box::new(new_prev),
                expr,
                desc,
            },
            GroupAggregate { group_by, aggregates, .. } => GroupAggregate {
                prev: Box::new(new_prev),
                group_by,
                aggregates,
            },
            Insert { table, .. } => Insert {
                prev: Box::new(new_prev),
                table,
            },
            GenerateKey {
                table,
                on_conflict,
                on_conflict_do_nothing,
                ..
            } => GenerateKey {
                prev: Box::new(new_prev),
                table,
                on_conflict,
                on_conflict_do_nothing,
            },
            Replace { table, .. } => Replace {
                prev: Box::new(new_prev),
                table,
            },
            Delete { table, .. } => Delete {
                prev: Box::new(new_prev),
                table,
            },
            Validate { table, .. } => Validate {
                prev: Box::new(new_prev),
                table,
            },
            source => source,
        }
    }

    /// Textual form used for optimizer idempotence tests (spec §8 property
    /// 2) and for comparing streams in tests generally.
    pub fn to_text(&self) -> String {
        use Operator::*;
        match self {
            TableScan { table, ranges, reverse } => {
                format!("TableScan({table}, {}, reverse={reverse})", ranges_text(ranges))
            }
            IndexScan { index, ranges, reverse } => {
                format!("IndexScan({index}, {}, reverse={reverse})", ranges_text(ranges))
            }
            Filter { prev, expr } => format!("{} | Filter({})", prev.to_text(), expr.to_text()),
            Project { prev, exprs } => format!(
                "{} | Project({})",
                prev.to_text(),
                exprs.iter().map(Expr::to_text).collect::<Vec<_>>().join(", ")
            ),
            Emit { columns, rows } => format!("Emit({columns:?}, {} rows)", rows.len()),
            Take { prev, n } => format!("{} | Take({})", prev.to_text(), n.to_text()),
            Skip { prev, n } => format!("{} | Skip({})", prev.to_text(), n.to_text()),
            TempTreeSort { prev, expr, desc } => {
                format!("{} | TempTreeSort({}, desc={desc})", prev.to_text(), expr.to_text())
            }
            GroupAggregate { prev, group_by, aggregates } => format!(
                "{} | GroupAggregate({:?}, [{}])",
                prev.to_text(),
                group_by.as_ref().map(Expr::to_text),
                aggregates
                    .iter()
                    .map(|a| format!("{}={:?}({})", a.output_name, a.kind, a.input.to_text()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Insert { prev, table } => format!("{} | Insert({table})", prev.to_text()),
            GenerateKey { prev, table, .. } => format!("{} | GenerateKey({table})", prev.to_text()),
            Replace { prev, table } => format!("{} | Replace({table})", prev.to_text()),
            Delete { prev, table } => format!("{} | Delete({table})", prev.to_text()),
            Validate { prev, table } => format!("{} | Validate({table})", prev.to_text()),
            Concat { streams } => format!("Concat({})", streams.iter().map(Operator::to_text).collect::<Vec<_>>().join(" ; ")),
            Union { streams } => format!("Union({})", streams.iter().map(Operator::to_text).collect::<Vec<_>>().join(" ; ")),
        }
    }
}

fn ranges_text(ranges: &Ranges) -> String {
    format!("{ranges:?}")
}
