//! Inter-group variability testing

mod dispersion;
mod fdr;
mod permutation;
mod pvalue;

pub use dispersion::{dispersion_across_groups, merge_complete_rows, row_mads, CompleteRows, DispersionSummary};
pub use fdr::benjamini_hochberg;
pub use permutation::{generate_nulls, group_mad_statistic, label_indices, PermutationNulls, PermutationParams};
pub use pvalue::{empirical_pvalue, empirical_pvalues, significant_indices};

use crate::error::Result;
use crate::io::DispersionResults;

/// Default significance threshold on empirical p-values
pub const DEFAULT_SIGNIFICANCE: f64 = 1e-4;

/// Compare observed dispersions to their permutation nulls.
///
/// Null rows are looked up by gene identifier; every observed gene must have
/// a null row.
pub fn assess_significance(observed: &DispersionSummary, nulls: &PermutationNulls) -> Result<DispersionResults> {
    let null_rows = nulls.rows_for(&observed.gene_ids)?;
    let pvalues = empirical_pvalues(&observed.mad, null_rows.view())?;
    let padj = benjamini_hochberg(&pvalues);
    log::info!(
        "Computed empirical p-values for {} genes from {} replicates",
        pvalues.len(),
        nulls.n_replicates()
    );
    Ok(DispersionResults {
        gene_ids: observed.gene_ids.clone(),
        mad: observed.mad.clone(),
        pvalues,
        padj,
        n_replicates: nulls.n_replicates(),
    })
}
