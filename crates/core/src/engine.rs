//! `Engine`: the public facade wiring `corvid-catalog`, `corvid-expr`,
//! `corvid-planner` and `corvid-plan` together (SPEC_FULL §2, "public
//! facade: `Optimize`, `Engine`, wiring").

use corvid_catalog::Catalog;
use corvid_expr::Params;
use corvid_plan::{open, ExecCtx, Operator, StreamIterator};
use corvid_planner::OptimizerConfig;
use tracing::debug;

use crate::error::{Error, Result};
use crate::tx::{is_write_operator, TxMode};

/// Bundles a [`Catalog`] with the optimizer's cost-model knobs. One `Engine`
/// is built per catalog snapshot; `optimize` and `open` are otherwise
/// stateless and are meant to be called in sequence by the caller.
pub struct Engine {
    catalog: Catalog,
    config: OptimizerConfig,
}

impl Engine {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            config: OptimizerConfig::default(),
        }
    }

    pub fn with_config(catalog: Catalog, config: OptimizerConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// `Optimize(stream, catalog, params) -> Result<Stream>` (spec §6),
    /// applying the five rewrite rules in order.
    #[tracing::instrument(skip_all)]
    pub fn optimize(&self, stream: Operator, params: &Params) -> Result<Operator> {
        let optimized = corvid_planner::optimize(stream, &self.catalog, params, &self.config)?;
        debug!(plan = %optimized.to_text(), "optimized stream");
        Ok(optimized)
    }

    /// Builds the [`ExecCtx`] an already-optimized stream needs to be
    /// `open`ed, rejecting a write-rooted stream handed a read-only
    /// transaction before any KV access happens.
    pub fn exec_ctx<'a>(&'a self, stream: &Operator, tx: TxMode<'a>, params: &'a Params) -> Result<ExecCtx<'a>> {
        if tx.is_read_only() && is_write_operator(stream) {
            return Err(Error::Planner(corvid_planner::internal(
                "write statement executed against a read-only transaction",
            )));
        }
        Ok(ExecCtx {
            catalog: &self.catalog,
            kv: tx.kv(),
            params,
        })
    }

    /// Opens an already-optimized `stream` for execution. Callers run
    /// `optimize` first and keep the result alive for as long as the
    /// returned iterator is in use (see `crates/core/tests` for the usual
    /// two-step shape).
    pub fn open<'a>(&'a self, stream: &'a Operator, tx: TxMode<'a>, params: &'a Params) -> Result<Box<dyn StreamIterator + 'a>> {
        let ctx = self.exec_ctx(stream, tx, params)?;
        open(stream, &ctx).map_err(Error::from)
    }
}
