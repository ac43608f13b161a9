//! The expression tagged variant (spec §4.4.2).

use corvid_value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Gt | BinaryOp::Gte | BinaryOp::Lt | BinaryOp::Lte
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamRef {
    Positional(usize),
    Named(String),
}

/// A node in the expression tree. Evaluated against an [`crate::Environment`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Pre-fold only: a list of sub-expressions. `PrecalculateExprRule`
    /// folds all-literal instances into a flat literal vector used by `IN`;
    /// `Value` itself has no array kind (spec §9), so this variant must
    /// never reach scalar `eval` post-fold.
    LiteralList(Vec<Expr>),
    /// Pre-fold only, same caveat as `LiteralList`: `Value` has no object
    /// kind.
    LiteralRecord(Vec<(String, Expr)>),
    Column(ColumnRef),
    BinaryOp {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    In {
        lhs: Box<Expr>,
        list: Box<Expr>,
    },
    Between {
        expr: Box<Expr>,
        lo: Box<Expr>,
        hi: Box<Expr>,
    },
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
    /// `*` in `Project`/`Count(*)`.
    Wildcard,
    Named {
        expr: Box<Expr>,
        alias: String,
    },
    Param(ParamRef),
}

impl Expr {
    pub fn and(lhs: Expr, rhs: Expr) -> Expr {
        Expr::BinaryOp {
            op: BinaryOp::And,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Splits a top-level chain of `AND`s into its conjuncts, left to right.
    /// Returns `None` if an `OR` appears at the top, per
    /// `SplitANDConditionRule`'s precondition.
    pub fn split_top_level_and(&self) -> Option<Vec<&Expr>> {
        fn contains_top_or(e: &Expr) -> bool {
            match e {
                Expr::BinaryOp { op: BinaryOp::Or, .. } => true,
                Expr::BinaryOp { op: BinaryOp::And, lhs, rhs } => contains_top_or(lhs) || contains_top_or(rhs),
                _ => false,
            }
        }
        if contains_top_or(self) {
            return None;
        }
        fn collect<'a>(e: &'a Expr, out: &mut Vec<&'a Expr>) {
            match e {
                Expr::BinaryOp { op: BinaryOp::And, lhs, rhs } => {
                    collect(lhs, out);
                    collect(rhs, out);
                }
                other => out.push(other),
            }
        }
        let mut out = Vec::new();
        collect(self, &mut out);
        Some(out)
    }

    /// The textual form used for `Named`'s implicit column name and for
    /// stream/plan comparison in optimizer idempotence tests (spec §8
    /// property 2).
    pub fn to_text(&self) -> String {
        match self {
            Expr::Literal(v) => v.to_string(),
            Expr::LiteralList(items) => {
                format!("[{}]", items.iter().map(Expr::to_text).collect::<Vec<_>>().join(", "))
            }
            Expr::LiteralRecord(fields) => {
                let body = fields
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.to_text()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{body}}}")
            }
            Expr::Column(c) => match &c.table {
                Some(t) => format!("{t}.{}", c.name),
                None => c.name.clone(),
            },
            Expr::BinaryOp { op, lhs, rhs } => format!("({} {op:?} {})", lhs.to_text(), rhs.to_text()),
            Expr::In { lhs, list } => format!("({} IN {})", lhs.to_text(), list.to_text()),
            Expr::Between { expr, lo, hi } => {
                format!("({} BETWEEN {} AND {})", expr.to_text(), lo.to_text(), hi.to_text())
            }
            Expr::FunctionCall { name, args } => {
                format!("{name}({})", args.iter().map(Expr::to_text).collect::<Vec<_>>().join(", "))
            }
            Expr::Wildcard => "*".to_string(),
            Expr::Named { expr, alias } => format!("{} AS {alias}", expr.to_text()),
            Expr::Param(ParamRef::Positional(n)) => format!("${n}"),
            Expr::Param(ParamRef::Named(n)) => format!(":{n}"),
        }
    }
}
