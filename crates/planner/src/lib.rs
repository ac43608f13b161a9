//! The rule-based optimizer (spec §4.4): five ordered, idempotent rewrite
//! rules applied to an `Operator` stream before it's handed to the
//! execution engine in `corvid-plan`.

pub mod config;
pub mod error;
mod rules;
mod select_index;

use corvid_catalog::Catalog;
use corvid_expr::Params;
use corvid_plan::Operator;

pub use config::OptimizerConfig;
pub use error::{internal, PlannerError, Result};

/// Runs the full rewrite pipeline over `stream` in the documented order:
/// `SplitANDConditionRule`, `PrecalculateExprRule`,
/// `RemoveUnnecessaryFilterNodesRule`, `RemoveUnnecessaryProjection`,
/// `SelectIndex`. Each rule is a full post-order pass; `SelectIndex` is the
/// only one that needs the catalog and the cost model.
pub fn optimize(stream: Operator, catalog: &Catalog, params: &Params, config: &OptimizerConfig) -> Result<Operator> {
    let stream = rules::split_and_condition_rule(stream);
    let stream = rules::precalculate_expr_rule(stream, params)?;
    let stream = rules::remove_unnecessary_filter_nodes_rule(stream);
    let stream = rules::remove_unnecessary_projection(stream);
    select_index::select_index_rule(stream, catalog, config)
}

/// Same as [`optimize`] but with the pinned default cost model (spec
/// §4.4.1's constants), the form most callers reach for.
pub fn optimize_default(stream: Operator, catalog: &Catalog, params: &Params) -> Result<Operator> {
    optimize(stream, catalog, params, &OptimizerConfig::default())
}
