//! rust_sccv: coefficient-of-variation analysis of single-cell RNA-seq data
//!
//! Per-gene CVs are computed for every batch or individual, adjusted against
//! a rolling-median trend of log10(CV^2) over mean abundance, compared across
//! groups by top-N overlap and tested for inter-group dispersion with
//! permutation-based empirical p-values.
//!
//! # Example
//!
//! ```ignore
//! use rust_sccv::prelude::*;
//!
//! let matrix = read_expression_matrix("log2cpm.tsv", ValueScale::Log2)?;
//! let annotation = read_annotation("annotation.tsv")?;
//!
//! let analysis = run_cv_analysis(&matrix, None, &annotation, &CvParams::default())?;
//! let nulls = generate_nulls(&matrix, &analysis.labels, &analysis.trend, &PermutationParams::default())?;
//! let results = assess_significance(&analysis.dispersion, &nulls)?;
//! ```

pub mod cli;
pub mod compare;
pub mod cv;
pub mod data;
pub mod error;
pub mod io;
pub mod normalization;
pub mod rng;
pub mod stats;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::compare::{compare_top_sets, GroupValues, OverlapParams, OverlapSummary, RankMetric, TiePolicy};
    pub use crate::cv::{
        abundance_correlation, adjust_all, compute_stats_by_group, fit_trend, fit_trend_excluding, AdjustedCv,
        GroupStats, Trend, TrendParams,
    };
    pub use crate::data::{Annotation, ExpressionMatrix, GeneSymbols, GroupBy, ValueScale};
    pub use crate::error::{CvError, Result};
    pub use crate::io::{
        read_annotation, read_expression_matrix, read_gene_symbols, read_permutation_nulls, DispersionResults,
        GroupSummary, RunSummary,
    };
    pub use crate::normalization::{normalize_log2_cpm, CpmParams};
    pub use crate::testing::{
        assess_significance, dispersion_across_groups, generate_nulls, merge_complete_rows, CompleteRows,
        DispersionSummary, PermutationNulls, PermutationParams, DEFAULT_SIGNIFICANCE,
    };
    pub use crate::{run_cv_analysis, CvAnalysis, CvParams};
}

use prelude::*;

/// Settings of a CV analysis run
#[derive(Debug, Clone)]
pub struct CvParams {
    pub group_by: GroupBy,
    /// Batch left out of the trend fit
    pub excluded_batch: Option<String>,
    pub trend: TrendParams,
}

impl Default for CvParams {
    fn default() -> Self {
        Self {
            group_by: GroupBy::Individual,
            excluded_batch: None,
            trend: TrendParams::default(),
        }
    }
}

/// Everything computed by [`run_cv_analysis`]
#[derive(Debug, Clone)]
pub struct CvAnalysis {
    pub gene_ids: Vec<String>,
    /// Group label of every matrix column
    pub labels: Vec<String>,
    pub stats: Vec<GroupStats>,
    pub trend: Trend,
    pub adjusted: Vec<AdjustedCv>,
    pub complete: CompleteRows,
    pub dispersion: DispersionSummary,
    pub summary: RunSummary,
}

impl CvAnalysis {
    /// Per-group values of `metric`, aligned with `gene_ids`
    pub fn group_values(&self, metric: RankMetric) -> Vec<GroupValues> {
        match metric {
            RankMetric::Adjusted => self
                .adjusted
                .iter()
                .map(|a| GroupValues {
                    group: a.group.clone(),
                    values: a.values.clone(),
                })
                .collect(),
            RankMetric::Cv => self
                .stats
                .iter()
                .map(|s| GroupValues {
                    group: s.group.clone(),
                    values: s.cvs.clone(),
                })
                .collect(),
            RankMetric::Mean => self
                .stats
                .iter()
                .map(|s| GroupValues {
                    group: s.group.clone(),
                    values: s.means.clone(),
                })
                .collect(),
        }
    }
}

/// Run the CV pipeline: per-group statistics, trend, adjusted CVs and the
/// MAD of adjusted CVs across groups.
///
/// The annotation and the optional raw counts are aligned to the matrix
/// columns by sample ID. The excluded batch only leaves the trend fit; its
/// samples still count towards their group.
pub fn run_cv_analysis(
    matrix: &ExpressionMatrix,
    raw_counts: Option<&ExpressionMatrix>,
    annotation: &Annotation,
    params: &CvParams,
) -> Result<CvAnalysis> {
    let annotation = annotation.align_to(matrix.sample_ids())?;
    let raw = match raw_counts {
        Some(raw) => {
            matrix.ensure_same_genes(raw, "raw count matrix")?;
            Some(raw.align_samples_to(matrix.sample_ids())?)
        }
        None => None,
    };

    let stats = compute_stats_by_group(matrix, raw.as_ref(), &annotation, params.group_by)?;
    log::info!(
        "Computed CVs for {} genes in {} groups",
        matrix.n_genes(),
        stats.len()
    );

    let trend = fit_trend_excluding(matrix, &annotation, params.excluded_batch.as_deref(), &params.trend)?;
    let adjusted = adjust_all(&stats, &trend)?;

    let mut groups = Vec::with_capacity(stats.len());
    for (s, a) in stats.iter().zip(adjusted.iter()) {
        let rho = abundance_correlation(a, s)?;
        log::info!("Group '{}': Spearman(adjusted CV, log10 mean) = {:.3}", s.group, rho);
        groups.push(GroupSummary {
            group: s.group.clone(),
            n_samples: s.n_samples,
            undefined_cv: s.n_undefined(),
            abundance_correlation: rho,
        });
    }

    let complete = merge_complete_rows(&adjusted)?;
    let dispersion = dispersion_across_groups(&complete);

    let summary = RunSummary {
        n_genes: matrix.n_genes(),
        n_samples: matrix.n_samples(),
        excluded_batch: params.excluded_batch.clone(),
        trend_samples: trend.n_samples(),
        trend_window: params.trend.window,
        trend_step: params.trend.step,
        trend_median_filled: trend.n_median_filled(),
        groups,
        complete_genes: complete.n_genes(),
        dropped_genes: complete.n_dropped(),
        dropped_gene_ids: complete.dropped.clone(),
    };

    Ok(CvAnalysis {
        gene_ids: matrix.gene_ids().to_vec(),
        labels: annotation.labels(params.group_by),
        stats,
        trend,
        adjusted,
        complete,
        dispersion,
        summary,
    })
}
