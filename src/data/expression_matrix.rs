//! Gene x sample expression matrix

use std::collections::HashSet;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{CvError, Result};

/// Scale on which matrix values are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueScale {
    /// log2-transformed values; exponentiated before computing CVs
    Log2,
    /// Counts on their natural scale
    Natural,
}

impl ValueScale {
    /// Convert a stored value back to the natural count scale
    #[inline]
    pub fn to_natural(self, value: f64) -> f64 {
        match self {
            ValueScale::Log2 => value.exp2(),
            ValueScale::Natural => value,
        }
    }
}

impl std::str::FromStr for ValueScale {
    type Err = CvError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "log2" => Ok(ValueScale::Log2),
            "natural" | "counts" => Ok(ValueScale::Natural),
            other => Err(CvError::InvalidInput {
                reason: format!("Unknown value scale '{}'. Use 'log2' or 'natural'.", other),
            }),
        }
    }
}

/// Expression values for genes (rows) across samples (columns)
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    values: Array2<f64>,
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
    scale: ValueScale,
}

impl ExpressionMatrix {
    /// Create a new matrix, validating dimensions and identifier uniqueness
    pub fn new(
        values: Array2<f64>,
        gene_ids: Vec<String>,
        sample_ids: Vec<String>,
        scale: ValueScale,
    ) -> Result<Self> {
        let (n_genes, n_samples) = values.dim();

        if gene_ids.len() != n_genes {
            return Err(CvError::DimensionMismatch {
                expected: format!("{} gene IDs", n_genes),
                got: format!("{} gene IDs", gene_ids.len()),
            });
        }

        if sample_ids.len() != n_samples {
            return Err(CvError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }

        let mut seen = HashSet::with_capacity(gene_ids.len());
        for id in &gene_ids {
            if !seen.insert(id.as_str()) {
                return Err(CvError::InvalidMatrix {
                    reason: format!("Duplicate gene ID '{}'", id),
                });
            }
        }

        if scale == ValueScale::Natural && values.iter().any(|&x| x < 0.0) {
            return Err(CvError::InvalidMatrix {
                reason: "Natural-scale values must be non-negative".to_string(),
            });
        }

        if values.iter().any(|x| x.is_nan()) {
            log::warn!("Expression matrix contains NaN values; affected genes will be undefined");
        }

        Ok(Self {
            values,
            gene_ids,
            sample_ids,
            scale,
        })
    }

    pub fn n_genes(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.values.ncols()
    }

    pub fn scale(&self) -> ValueScale {
        self.scale
    }

    /// Get the stored values as a view
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get stored values for a specific gene
    pub fn gene_values(&self, gene_idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(gene_idx)
    }

    /// Values converted back to the natural count scale
    pub fn natural_values(&self) -> Array2<f64> {
        let scale = self.scale;
        self.values.mapv(|x| scale.to_natural(x))
    }

    pub fn gene_index(&self, gene_id: &str) -> Option<usize> {
        self.gene_ids.iter().position(|id| id == gene_id)
    }

    pub fn sample_index(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|id| id == sample_id)
    }

    /// Subset to specific samples, keeping gene order
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        if sample_indices.is_empty() {
            return Err(CvError::EmptyData {
                reason: "Sample subset is empty".to_string(),
            });
        }
        let new_values = self.values.select(Axis(1), sample_indices);
        let new_sample_ids: Vec<String> = sample_indices
            .iter()
            .map(|&i| self.sample_ids[i].clone())
            .collect();

        Self::new(new_values, self.gene_ids.clone(), new_sample_ids, self.scale)
    }

    /// Reorder columns to follow `sample_ids`; every listed sample must be present
    pub fn align_samples_to(&self, sample_ids: &[String]) -> Result<Self> {
        let mut cols = Vec::with_capacity(sample_ids.len());
        for id in sample_ids {
            let j = self.sample_index(id).ok_or_else(|| CvError::InvalidMatrix {
                reason: format!("Sample '{}' not found", id),
            })?;
            cols.push(j);
        }
        self.subset_samples(&cols)
    }

    /// Fail unless `other` has exactly the same gene identifiers in the same order
    pub fn ensure_same_genes(&self, other: &ExpressionMatrix, what: &str) -> Result<()> {
        ensure_same_gene_ids(&self.gene_ids, other.gene_ids(), "expression matrix", what)
    }
}

/// Exact-match check of two gene identifier sequences
pub fn ensure_same_gene_ids(left: &[String], right: &[String], left_name: &str, right_name: &str) -> Result<()> {
    if left.len() != right.len() {
        return Err(CvError::GeneUniverseMismatch {
            left: left_name.to_string(),
            right: right_name.to_string(),
            details: format!("{} genes vs {} genes", left.len(), right.len()),
        });
    }
    if let Some((i, (a, b))) = left
        .iter()
        .zip(right.iter())
        .enumerate()
        .find(|(_, (a, b))| a != b)
    {
        return Err(CvError::GeneUniverseMismatch {
            left: left_name.to_string(),
            right: right_name.to_string(),
            details: format!("row {} is '{}' vs '{}'", i, a, b),
        });
    }
    Ok(())
}
