//! Rank-based comparison of genes across groups

mod overlap;
mod rank;

pub use overlap::{
    compare_top_sets, overlap_pvalue, GroupValues, OverlapParams, OverlapSummary, PairOverlap, TopSet,
    TripleOverlap,
};
pub use rank::{top_n_genes, top_n_indices, RankMetric, TiePolicy};
