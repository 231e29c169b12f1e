//! Permutation-null statistics for inter-group dispersion
//!
//! Each replicate shuffles the group labels across samples, recomputes the
//! per-group CVs, adjusts them against the fixed trend and takes the MAD
//! across groups. Replicates are independent and run in parallel.

use ndarray::{Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cv::{gene_moments, Trend};
use crate::data::{ensure_same_gene_ids, ExpressionMatrix};
use crate::error::{CvError, Result};
use crate::rng::MersenneTwister;
use crate::stats::mad;

/// Permutation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermutationParams {
    /// Number of label shuffles
    pub replicates: usize,
    /// Seed of the first replicate; replicate r uses seed + r
    pub seed: u32,
}

impl Default for PermutationParams {
    fn default() -> Self {
        Self {
            replicates: 1000,
            seed: 1,
        }
    }
}

/// Null statistics, genes x replicates
#[derive(Debug, Clone)]
pub struct PermutationNulls {
    pub gene_ids: Vec<String>,
    pub values: Array2<f64>,
}

impl PermutationNulls {
    pub fn new(gene_ids: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != gene_ids.len() {
            return Err(CvError::DimensionMismatch {
                expected: format!("{} null rows", gene_ids.len()),
                got: format!("{} null rows", values.nrows()),
            });
        }
        Ok(Self { gene_ids, values })
    }

    pub fn n_replicates(&self) -> usize {
        self.values.ncols()
    }

    /// Rows for `gene_ids`, in that order; every gene must be present
    pub fn rows_for(&self, gene_ids: &[String]) -> Result<Array2<f64>> {
        let index: std::collections::HashMap<&str, usize> = self
            .gene_ids
            .iter()
            .enumerate()
            .map(|(i, g)| (g.as_str(), i))
            .collect();
        let mut rows = Vec::with_capacity(gene_ids.len());
        for g in gene_ids {
            match index.get(g.as_str()) {
                Some(&i) => rows.push(i),
                None => {
                    return Err(CvError::GeneUniverseMismatch {
                        left: "observed statistics".to_string(),
                        right: "permutation nulls".to_string(),
                        details: format!("gene '{}' has no null statistics", g),
                    })
                }
            }
        }
        Ok(self.values.select(ndarray::Axis(0), &rows))
    }
}

/// Map labels to group indices in order of first appearance
pub fn label_indices(labels: &[String]) -> (Vec<usize>, Vec<String>) {
    let mut groups: Vec<String> = Vec::new();
    let idx = labels
        .iter()
        .map(|l| match groups.iter().position(|g| g == l) {
            Some(i) => i,
            None => {
                groups.push(l.clone());
                groups.len() - 1
            }
        })
        .collect();
    (idx, groups)
}

/// Per-gene MAD across groups of adjusted CV for one labelling of the samples.
///
/// `natural` is genes x samples on the natural scale. Genes without a finite
/// adjusted CV in every group get NaN.
pub fn group_mad_statistic(
    natural: ArrayView2<'_, f64>,
    labels: &[usize],
    n_groups: usize,
    trend: &[f64],
) -> Vec<f64> {
    let members: Vec<Vec<usize>> = (0..n_groups)
        .map(|g| (0..labels.len()).filter(|&s| labels[s] == g).collect())
        .collect();

    (0..natural.nrows())
        .map(|i| {
            let row = natural.row(i);
            let mut adjusted = Vec::with_capacity(n_groups);
            for cols in &members {
                let vals: Vec<f64> = cols.iter().map(|&c| row[c]).collect();
                let (_, _, cv) = gene_moments(ArrayView1::from(&vals[..]));
                let a = (cv * cv).log10() - trend[i];
                if !a.is_finite() {
                    return f64::NAN;
                }
                adjusted.push(a);
            }
            mad(&adjusted)
        })
        .collect()
}

/// Generate permutation-null MAD statistics.
///
/// `labels` gives the group of every column of `matrix`; the trend stays
/// fixed across replicates.
pub fn generate_nulls(
    matrix: &ExpressionMatrix,
    labels: &[String],
    trend: &Trend,
    params: &PermutationParams,
) -> Result<PermutationNulls> {
    ensure_same_gene_ids(matrix.gene_ids(), trend.gene_ids(), "expression matrix", "trend")?;
    if labels.len() != matrix.n_samples() {
        return Err(CvError::DimensionMismatch {
            expected: format!("{} sample labels", matrix.n_samples()),
            got: format!("{} sample labels", labels.len()),
        });
    }
    if params.replicates == 0 {
        return Err(CvError::InvalidInput {
            reason: "At least one permutation replicate is required".to_string(),
        });
    }

    let (label_idx, groups) = label_indices(labels);
    log::info!(
        "Generating {} permutation replicates over {} samples in {} groups",
        params.replicates,
        labels.len(),
        groups.len()
    );

    let natural = matrix.natural_values();
    let trend_values = trend.values();
    let columns: Vec<Vec<f64>> = (0..params.replicates)
        .into_par_iter()
        .map(|r| {
            let mut rng = MersenneTwister::new(params.seed.wrapping_add(r as u32));
            let shuffled = rng.shuffled(&label_idx);
            group_mad_statistic(natural.view(), &shuffled, groups.len(), trend_values)
        })
        .collect();

    let n_genes = matrix.n_genes();
    let values = Array2::from_shape_fn((n_genes, params.replicates), |(g, r)| columns[r][g]);
    PermutationNulls::new(matrix.gene_ids().to_vec(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::{adjust_all, compute_stats_by_group, fit_trend, TrendParams};
    use crate::data::{Annotation, GroupBy, SampleRecord, ValueScale};
    use crate::testing::dispersion::{dispersion_across_groups, merge_complete_rows};

    fn toy() -> (ExpressionMatrix, Annotation) {
        let n_genes = 8;
        let n_samples = 9;
        let values = Array2::from_shape_fn((n_genes, n_samples), |(g, s)| {
            1.0 + g as f64 * 0.5 + ((g * 5 + s * 7) % 9) as f64 * 0.3
        });
        let genes: Vec<String> = (0..n_genes).map(|g| format!("g{}", g)).collect();
        let samples: Vec<String> = (0..n_samples).map(|s| format!("s{}", s)).collect();
        let m = ExpressionMatrix::new(values, genes, samples, ValueScale::Log2).unwrap();
        let ann = Annotation::new(
            (0..n_samples)
                .map(|s| SampleRecord {
                    sample_id: format!("s{}", s),
                    individual: format!("ind{}", s / 3),
                    batch: format!("ind{}.r1", s / 3),
                    well: "A01".to_string(),
                })
                .collect(),
        )
        .unwrap();
        (m, ann)
    }

    #[test]
    fn test_label_indices() {
        let labels: Vec<String> = ["b", "a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let (idx, groups) = label_indices(&labels);
        assert_eq!(idx, vec![0, 1, 0, 2]);
        assert_eq!(groups, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_unpermuted_statistic_matches_observed() {
        let (m, ann) = toy();
        let trend = fit_trend(&m, &TrendParams { window: 4, step: 2 }).unwrap();
        let stats = compute_stats_by_group(&m, None, &ann, GroupBy::Individual).unwrap();
        let adjusted = adjust_all(&stats, &trend).unwrap();
        let observed = dispersion_across_groups(&merge_complete_rows(&adjusted).unwrap());

        let (idx, groups) = label_indices(&ann.labels(GroupBy::Individual));
        let natural = m.natural_values();
        let stat = group_mad_statistic(natural.view(), &idx, groups.len(), trend.values());

        assert_eq!(observed.gene_ids.len(), 8);
        for (a, b) in observed.mad.iter().zip(stat.iter()) {
            assert!((a - b).abs() < 1e-12, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_generate_nulls_shape_and_determinism() {
        let (m, ann) = toy();
        let trend = fit_trend(&m, &TrendParams { window: 4, step: 2 }).unwrap();
        let labels = ann.labels(GroupBy::Individual);
        let params = PermutationParams {
            replicates: 5,
            seed: 11,
        };
        let a = generate_nulls(&m, &labels, &trend, &params).unwrap();
        let b = generate_nulls(&m, &labels, &trend, &params).unwrap();
        assert_eq!(a.values.dim(), (8, 5));
        assert_eq!(a.n_replicates(), 5);
        assert!(a.values.iter().zip(b.values.iter()).all(|(x, y)| x == y || (x.is_nan() && y.is_nan())));
        assert!(a.values.iter().all(|v| v.is_nan() || *v >= 0.0));
    }

    #[test]
    fn test_rows_for_missing_gene() {
        let nulls = PermutationNulls::new(vec!["g1".to_string()], Array2::zeros((1, 3))).unwrap();
        assert!(nulls.rows_for(&["g1".to_string()]).is_ok());
        assert!(nulls.rows_for(&["g2".to_string()]).is_err());
    }

    #[test]
    fn test_label_count_mismatch() {
        let (m, _) = toy();
        let trend = fit_trend(&m, &TrendParams::default()).unwrap();
        let labels = vec!["a".to_string(); 3];
        assert!(generate_nulls(&m, &labels, &trend, &PermutationParams::default()).is_err());
    }
}
