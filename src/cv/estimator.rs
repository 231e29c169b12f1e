//! Per-gene mean, standard deviation, CV and sparsity for a set of samples

use ndarray::{ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::data::{Annotation, ExpressionMatrix, GroupBy, ValueScale};
use crate::error::{CvError, Result};

/// Per-gene statistics for one group of samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupStats {
    /// Group label (batch or individual)
    pub group: String,
    /// Gene identifiers, in matrix order
    pub gene_ids: Vec<String>,
    /// Mean on the natural scale
    pub means: Vec<f64>,
    /// Sample standard deviation on the natural scale
    pub sds: Vec<f64>,
    /// sd / mean; NaN where the mean is zero
    pub cvs: Vec<f64>,
    /// Fraction of samples with a zero count; NaN for log2 input without raw counts
    pub sparsity: Vec<f64>,
    /// Number of samples in the group
    pub n_samples: usize,
}

impl GroupStats {
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    /// log10(cv^2) per gene
    pub fn log10_cv2(&self) -> Vec<f64> {
        self.cvs.iter().map(|&cv| log10_cv2(cv)).collect()
    }

    /// Number of genes whose CV is undefined
    pub fn n_undefined(&self) -> usize {
        self.cvs.iter().filter(|cv| !cv.is_finite()).count()
    }
}

#[inline]
pub(crate) fn log10_cv2(cv: f64) -> f64 {
    (cv * cv).log10()
}

/// Mean, sd and CV of one gene's natural-scale values
pub(crate) fn gene_moments(natural: ArrayView1<'_, f64>) -> (f64, f64, f64) {
    let mean = natural.iter().mean();
    let sd = natural.iter().std_dev();
    let cv = if mean == 0.0 || !mean.is_finite() {
        f64::NAN
    } else {
        sd / mean
    };
    (mean, sd, cv)
}

/// Compute per-gene statistics across all columns of `matrix`.
///
/// Log2 values are exponentiated before mean and sd are taken. Sparsity is
/// measured on `raw_counts` when supplied (its gene universe must match),
/// otherwise on a natural-scale `matrix` itself. Log2 input without raw
/// counts gets NaN sparsity.
pub fn compute_group_stats(
    matrix: &ExpressionMatrix,
    raw_counts: Option<&ExpressionMatrix>,
    group: &str,
) -> Result<GroupStats> {
    if matrix.n_samples() == 0 {
        return Err(CvError::EmptyData {
            reason: format!("Group '{}' has no samples", group),
        });
    }
    if let Some(raw) = raw_counts {
        matrix.ensure_same_genes(raw, "raw count matrix")?;
        if raw.n_samples() != matrix.n_samples() {
            return Err(CvError::DimensionMismatch {
                expected: format!("{} raw count samples", matrix.n_samples()),
                got: format!("{} raw count samples", raw.n_samples()),
            });
        }
    }
    if matrix.n_samples() < 2 {
        log::warn!("Group '{}' has a single sample; all CVs are undefined", group);
    }

    let natural = matrix.natural_values();
    let moments: Vec<(f64, f64, f64)> = (0..natural.nrows())
        .into_par_iter()
        .map(|i| gene_moments(natural.row(i)))
        .collect();

    let sparsity_source = match (raw_counts, matrix.scale()) {
        (Some(raw), _) => Some(raw.natural_values()),
        (None, ValueScale::Natural) => Some(natural),
        // zero counts cannot be told apart after a log2 transform
        (None, ValueScale::Log2) => None,
    };
    let sparsity: Vec<f64> = match sparsity_source {
        Some(source) => {
            let n = source.ncols() as f64;
            source
                .axis_iter(Axis(0))
                .map(|row| row.iter().filter(|&&x| x == 0.0).count() as f64 / n)
                .collect()
        }
        None => {
            log::warn!(
                "Group '{}': log2 values without raw counts; sparsity is undefined",
                group
            );
            vec![f64::NAN; matrix.n_genes()]
        }
    };

    let (means, rest): (Vec<f64>, Vec<(f64, f64)>) =
        moments.into_iter().map(|(m, s, c)| (m, (s, c))).unzip();
    let (sds, cvs): (Vec<f64>, Vec<f64>) = rest.into_iter().unzip();

    let stats = GroupStats {
        group: group.to_string(),
        gene_ids: matrix.gene_ids().to_vec(),
        means,
        sds,
        cvs,
        sparsity,
        n_samples: matrix.n_samples(),
    };
    log::debug!(
        "Group '{}': {} samples, {} genes with undefined CV",
        group,
        stats.n_samples,
        stats.n_undefined()
    );
    Ok(stats)
}

/// Compute per-gene statistics separately for every group.
///
/// Groups are returned in order of first appearance in the annotation. The
/// annotation must already be aligned to the matrix columns.
pub fn compute_stats_by_group(
    matrix: &ExpressionMatrix,
    raw_counts: Option<&ExpressionMatrix>,
    annotation: &Annotation,
    by: GroupBy,
) -> Result<Vec<GroupStats>> {
    if annotation.n_samples() != matrix.n_samples() {
        return Err(CvError::DimensionMismatch {
            expected: format!("{} annotation records", matrix.n_samples()),
            got: format!("{} annotation records", annotation.n_samples()),
        });
    }

    annotation
        .groups(by)
        .iter()
        .map(|group| {
            let cols = annotation.samples_in(by, group);
            let sub = matrix.subset_samples(&cols)?;
            let raw_sub = raw_counts.map(|r| r.subset_samples(&cols)).transpose()?;
            compute_group_stats(&sub, raw_sub.as_ref(), group)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SampleRecord, ValueScale};
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_cv_on_natural_scale() {
        // log2 values 1, 2, 3 -> natural 2, 4, 8
        let values = array![[1.0, 2.0, 3.0]];
        let m = ExpressionMatrix::new(values, ids("g", 1), ids("s", 3), ValueScale::Log2).unwrap();
        let stats = compute_group_stats(&m, None, "b1").unwrap();

        let mean = 14.0 / 3.0;
        let var = ((2.0 - mean) * (2.0f64 - mean) + (4.0 - mean) * (4.0 - mean) + (8.0 - mean) * (8.0 - mean)) / 2.0;
        let sd = var.sqrt();
        assert!((stats.means[0] - mean).abs() < 1e-12);
        assert!((stats.sds[0] - sd).abs() < 1e-12);
        assert!((stats.cvs[0] - sd / mean).abs() < 1e-12);
        assert!((stats.cvs[0] - stats.sds[0] / stats.means[0]).abs() < 1e-15);
    }

    #[test]
    fn test_zero_mean_gives_nan_cv() {
        let values = array![[0.0, 0.0, 0.0], [1.0, 3.0, 5.0]];
        let m = ExpressionMatrix::new(values, ids("g", 2), ids("s", 3), ValueScale::Natural).unwrap();
        let stats = compute_group_stats(&m, None, "b1").unwrap();
        assert!(stats.cvs[0].is_nan());
        assert_eq!(stats.sparsity[0], 1.0);
        assert_eq!(stats.sparsity[1], 0.0);
        assert_eq!(stats.n_undefined(), 1);
        assert!((stats.cvs[1] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_sparsity_from_raw_counts() {
        let values = array![[1.0, 2.0, 3.0, 4.0]];
        let raw = array![[0.0, 3.0, 0.0, 7.0]];
        let m = ExpressionMatrix::new(values, ids("g", 1), ids("s", 4), ValueScale::Log2).unwrap();
        let r = ExpressionMatrix::new(raw, ids("g", 1), ids("s", 4), ValueScale::Natural).unwrap();
        let stats = compute_group_stats(&m, Some(&r), "b1").unwrap();
        assert_eq!(stats.sparsity[0], 0.5);
    }

    #[test]
    fn test_sparsity_undefined_for_log2_without_raw_counts() {
        let counts = ExpressionMatrix::new(
            array![[0.0, 0.0, 0.0, 5.0], [10.0, 20.0, 30.0, 40.0]],
            ids("g", 2),
            ids("s", 4),
            ValueScale::Natural,
        )
        .unwrap();
        let log_cpm = crate::normalization::normalize_log2_cpm(&counts, &Default::default()).unwrap();

        let stats = compute_group_stats(&log_cpm, None, "b1").unwrap();
        assert!(stats.sparsity.iter().all(|s| s.is_nan()));
        assert!(stats.cvs.iter().all(|cv| cv.is_finite()));

        let with_raw = compute_group_stats(&log_cpm, Some(&counts), "b1").unwrap();
        assert_eq!(with_raw.sparsity, vec![0.75, 0.0]);
        let natural = compute_group_stats(&counts, None, "b1").unwrap();
        assert_eq!(natural.sparsity, vec![0.75, 0.0]);
    }

    #[test]
    fn test_raw_counts_gene_mismatch_fails() {
        let m = ExpressionMatrix::new(array![[1.0, 2.0]], ids("g", 1), ids("s", 2), ValueScale::Log2).unwrap();
        let r = ExpressionMatrix::new(array![[1.0, 2.0]], ids("x", 1), ids("s", 2), ValueScale::Natural).unwrap();
        assert!(matches!(
            compute_group_stats(&m, Some(&r), "b1"),
            Err(CvError::GeneUniverseMismatch { .. })
        ));
    }

    #[test]
    fn test_stats_by_group() {
        let values = array![[1.0, 2.0, 3.0, 5.0], [2.0, 2.0, 4.0, 4.0]];
        let m = ExpressionMatrix::new(values, ids("g", 2), ids("s", 4), ValueScale::Natural).unwrap();
        let ann = Annotation::new(
            (1..=4)
                .map(|i| SampleRecord {
                    sample_id: format!("s{}", i),
                    individual: if i <= 2 { "A".to_string() } else { "B".to_string() },
                    batch: format!("b{}", i),
                    well: "A01".to_string(),
                })
                .collect(),
        )
        .unwrap();
        let stats = compute_stats_by_group(&m, None, &ann, GroupBy::Individual).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].group, "A");
        assert_eq!(stats[1].n_samples, 2);
        assert_eq!(stats[0].cvs[1], 0.0);
        assert!((stats[1].means[0] - 4.0).abs() < 1e-12);
    }
}
