//! log2 counts-per-million
//!
//! Each sample gets a prior count scaled by its library size relative to the
//! average library size, and the library size is enlarged by twice that
//! prior so that zero counts map to a finite value:
//!
//!   p_j   = prior_count * L_j / mean(L)
//!   value = log2((x_ij + p_j) / (L_j + 2 p_j) * 1e6)

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::data::{ExpressionMatrix, ValueScale};
use crate::error::{CvError, Result};

/// log2 CPM settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpmParams {
    /// Average prior count added to every value
    pub prior_count: f64,
}

impl Default for CpmParams {
    fn default() -> Self {
        Self { prior_count: 0.25 }
    }
}

/// log2 CPM of a natural-scale count matrix (genes x samples)
pub fn log2_cpm(counts: ArrayView2<'_, f64>, params: &CpmParams) -> Result<Array2<f64>> {
    let (n_genes, n_samples) = counts.dim();
    if n_genes == 0 || n_samples == 0 {
        return Err(CvError::EmptyData {
            reason: "Count matrix is empty".to_string(),
        });
    }
    if params.prior_count < 0.0 {
        return Err(CvError::InvalidInput {
            reason: format!("Prior count must be non-negative, got {}", params.prior_count),
        });
    }

    let lib_sizes: Vec<f64> = counts.axis_iter(Axis(1)).map(|col| col.sum()).collect();
    if let Some(j) = lib_sizes.iter().position(|&l| l <= 0.0) {
        return Err(CvError::InvalidMatrix {
            reason: format!("Sample {} has a library size of zero", j),
        });
    }
    let mean_lib = lib_sizes.iter().sum::<f64>() / n_samples as f64;

    let mut out = counts.to_owned();
    for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
        let prior = params.prior_count * lib_sizes[j] / mean_lib;
        let lib = lib_sizes[j] + 2.0 * prior;
        col.mapv_inplace(|x| ((x + prior) / lib * 1e6).log2());
    }
    Ok(out)
}

/// Convert a raw count matrix into a log2 CPM matrix with the same identifiers
pub fn normalize_log2_cpm(raw: &ExpressionMatrix, params: &CpmParams) -> Result<ExpressionMatrix> {
    if raw.scale() != ValueScale::Natural {
        return Err(CvError::InvalidInput {
            reason: "log2 CPM expects raw counts on the natural scale".to_string(),
        });
    }
    let values = log2_cpm(raw.values(), params)?;
    ExpressionMatrix::new(
        values,
        raw.gene_ids().to_vec(),
        raw.sample_ids().to_vec(),
        ValueScale::Log2,
    )
}
