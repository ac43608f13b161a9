//! Pinned cost-model constants for `SelectIndex` (spec §4.4.1). The exact
//! numeric values are part of the contract the testable properties pin down,
//! not an implementation detail, so they live in one named, documented spot
//! the way `corvid_core`'s `config.rs` keeps runtime knobs in one place.

/// Tunable knobs for the rewrite-rule pipeline's cost model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerConfig {
    /// `range_cost` contribution for an exact (`=`/`IN`) last-used operator.
    pub exact_cost: i64,
    /// `range_cost` contribution for a single-bound (`>`/`>=`/`<`/`<=`)
    /// last-used operator.
    pub single_bound_cost: i64,
    /// `range_cost` contribution for `BETWEEN`.
    pub between_cost: i64,
    /// `range_cost` for a candidate that absorbs no filter at all and only
    /// avoids a sort.
    pub no_range_sort_only_cost: i64,
    /// Added to a candidate's cost when its source is a secondary index
    /// rather than the primary key.
    pub secondary_index_penalty: i64,
    /// Subtracted from a candidate's cost when its index is declared unique.
    pub unique_index_bonus: i64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            exact_cost: 1,
            single_bound_cost: 2,
            between_cost: 3,
            no_range_sort_only_cost: 10_000,
            secondary_index_penalty: 20,
            unique_index_bonus: 10,
        }
    }
}
