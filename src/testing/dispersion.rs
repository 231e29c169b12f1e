//! Inter-group dispersion of adjusted CVs

use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cv::AdjustedCv;
use crate::data::ensure_same_gene_ids;
use crate::error::{CvError, Result};
use crate::stats::mad;

/// Genes x groups matrix of adjusted CVs restricted to genes defined in every group
#[derive(Debug, Clone)]
pub struct CompleteRows {
    pub gene_ids: Vec<String>,
    pub groups: Vec<String>,
    pub values: Array2<f64>,
    /// Genes removed because at least one group had no finite value
    pub dropped: Vec<String>,
}

impl CompleteRows {
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    pub fn n_dropped(&self) -> usize {
        self.dropped.len()
    }
}

/// Align adjusted CVs of all groups into one matrix, dropping incomplete genes.
///
/// The number of dropped genes is logged; every group must share the same
/// gene identifiers in the same order.
pub fn merge_complete_rows(adjusted: &[AdjustedCv]) -> Result<CompleteRows> {
    let first = adjusted.first().ok_or_else(|| CvError::EmptyData {
        reason: "No groups to merge".to_string(),
    })?;
    for other in &adjusted[1..] {
        ensure_same_gene_ids(
            &first.gene_ids,
            &other.gene_ids,
            &format!("group '{}'", first.group),
            &format!("group '{}'", other.group),
        )?;
    }

    let n_genes = first.gene_ids.len();
    let keep: Vec<usize> = (0..n_genes)
        .filter(|&i| adjusted.iter().all(|a| a.values[i].is_finite()))
        .collect();
    let dropped: Vec<String> = (0..n_genes)
        .filter(|i| keep.binary_search(i).is_err())
        .map(|i| first.gene_ids[i].clone())
        .collect();

    let values = Array2::from_shape_fn((keep.len(), adjusted.len()), |(r, c)| adjusted[c].values[keep[r]]);

    if !dropped.is_empty() {
        log::warn!(
            "Dropped {} of {} genes without a defined adjusted CV in every group",
            dropped.len(),
            n_genes
        );
    }
    if keep.is_empty() {
        return Err(CvError::EmptyData {
            reason: "No gene has a defined adjusted CV in every group".to_string(),
        });
    }

    Ok(CompleteRows {
        gene_ids: keep.iter().map(|&i| first.gene_ids[i].clone()).collect(),
        groups: adjusted.iter().map(|a| a.group.clone()).collect(),
        values,
        dropped,
    })
}

/// Median absolute deviation of each row
pub fn row_mads(values: ArrayView2<'_, f64>) -> Vec<f64> {
    (0..values.len_of(Axis(0)))
        .into_par_iter()
        .map(|i| {
            let row: Vec<f64> = values.row(i).to_vec();
            mad(&row)
        })
        .collect()
}

/// Per-gene MAD of adjusted CV across groups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispersionSummary {
    pub gene_ids: Vec<String>,
    pub mad: Vec<f64>,
}

/// Compute the inter-group MAD for every complete gene
pub fn dispersion_across_groups(rows: &CompleteRows) -> DispersionSummary {
    DispersionSummary {
        gene_ids: rows.gene_ids.clone(),
        mad: row_mads(rows.values.view()),
    }
}
