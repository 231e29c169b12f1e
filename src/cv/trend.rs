//! Data-wide CV trend over mean abundance
//!
//! The pooled log10(CV^2) of every gene is ordered by pooled mean, smoothed
//! with a strided rolling median and scattered back to the original gene
//! order through an explicit index permutation.

use serde::{Deserialize, Serialize};

use crate::cv::estimator::compute_group_stats;
use crate::data::{ensure_same_gene_ids, Annotation, ExpressionMatrix};
use crate::error::{CvError, Result};
use crate::stats::{cmp_f64, median, median_ignore_nan};

/// Rolling-median parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendParams {
    /// Number of genes in each median window
    pub window: usize,
    /// Distance between consecutive window starts
    pub step: usize,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self { window: 50, step: 25 }
    }
}

impl TrendParams {
    fn validate(&self) -> Result<()> {
        if self.window == 0 || self.step == 0 {
            return Err(CvError::InvalidInput {
                reason: format!(
                    "Trend window ({}) and step ({}) must both be positive",
                    self.window, self.step
                ),
            });
        }
        Ok(())
    }
}

/// Smoothed log10(CV^2) per gene, in the original gene order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trend {
    gene_ids: Vec<String>,
    values: Vec<f64>,
    pooled_means: Vec<f64>,
    pooled_log10_cv2: Vec<f64>,
    n_samples: usize,
    n_median_filled: usize,
}

impl Trend {
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    /// Smoothed log10(CV^2), aligned with `gene_ids`
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Pooled natural-scale mean per gene
    pub fn pooled_means(&self) -> &[f64] {
        &self.pooled_means
    }

    /// Pooled (unsmoothed) log10(CV^2) per gene
    pub fn pooled_log10_cv2(&self) -> &[f64] {
        &self.pooled_log10_cv2
    }

    /// Number of samples pooled to build the trend
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Number of genes that received the global-median fallback
    pub fn n_median_filled(&self) -> usize {
        self.n_median_filled
    }

    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }
}

/// Gene indices ordered by ascending mean; ties keep their original order
pub fn abundance_order(means: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..means.len()).collect();
    order.sort_by(|&a, &b| cmp_f64(&means[a], &means[b]));
    order
}

/// Smooth an abundance-ordered sequence.
///
/// Windows of `window` values start every `step` positions while a full
/// window fits; each median lands on the window center. Other positions are
/// filled in two tiers: first by extension (leading positions take the first
/// evaluated value, trailing positions the last, interior positions are
/// interpolated between their two evaluated neighbours), then anything still
/// undefined takes the median of the whole sequence. Returns the smoothed
/// sequence and the number of positions filled by the second tier.
pub fn rolling_median_trend(ordered: &[f64], params: &TrendParams) -> Result<(Vec<f64>, usize)> {
    params.validate()?;
    let n = ordered.len();
    let w = params.window;

    let mut evaluated: Vec<(usize, f64)> = Vec::new();
    let mut start = 0;
    while start + w <= n {
        evaluated.push((start + (w - 1) / 2, median(&ordered[start..start + w])));
        start += params.step;
    }

    let mut smoothed = vec![f64::NAN; n];
    if let (Some(&(first_pos, first_val)), Some(&(last_pos, last_val))) = (evaluated.first(), evaluated.last()) {
        for v in &mut smoothed[..first_pos] {
            *v = first_val;
        }
        for v in &mut smoothed[last_pos + 1..] {
            *v = last_val;
        }
        for pair in evaluated.windows(2) {
            let (a, va) = pair[0];
            let (b, vb) = pair[1];
            for (offset, v) in smoothed[a..b].iter_mut().enumerate() {
                *v = interpolate(va, vb, offset as f64 / (b - a) as f64);
            }
        }
        smoothed[last_pos] = last_val;
    }

    let global = median_ignore_nan(ordered);
    let mut n_filled = 0;
    for v in smoothed.iter_mut().filter(|v| v.is_nan()) {
        *v = global;
        n_filled += 1;
    }
    Ok((smoothed, n_filled))
}

fn interpolate(a: f64, b: f64, frac: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if frac == 0.0 || a == b {
        return a;
    }
    a + (b - a) * frac
}

/// Scatter values computed in `order` back to the original positions.
///
/// `order[k]` is the original index of the k-th ordered value. Fails unless
/// `order` is a permutation of `0..ordered.len()`.
pub fn scatter_to_original(order: &[usize], ordered: &[f64]) -> Result<Vec<f64>> {
    if order.len() != ordered.len() {
        return Err(CvError::TrendReindex {
            reason: format!("{} ordered values for {} indices", ordered.len(), order.len()),
        });
    }
    let n = order.len();
    let mut out: Vec<Option<f64>> = vec![None; n];
    for (&i, &v) in order.iter().zip(ordered.iter()) {
        if i >= n {
            return Err(CvError::TrendReindex {
                reason: format!("index {} out of range for {} genes", i, n),
            });
        }
        if out[i].is_some() {
            return Err(CvError::TrendReindex {
                reason: format!("gene index {} appears more than once", i),
            });
        }
        out[i] = Some(v);
    }
    // every slot is filled once lengths match and no index repeats
    Ok(out.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Build the trend from every column of `pooled`
pub fn fit_trend(pooled: &ExpressionMatrix, params: &TrendParams) -> Result<Trend> {
    let stats = compute_group_stats(pooled, None, "pooled")?;
    let log_cv2 = stats.log10_cv2();
    let order = abundance_order(&stats.means);

    let ordered_values: Vec<f64> = order.iter().map(|&i| log_cv2[i]).collect();
    let (smoothed, n_median_filled) = rolling_median_trend(&ordered_values, params)?;
    let values = scatter_to_original(&order, &smoothed)?;

    // the scattered identifiers must reproduce the input sequence exactly
    let ordered_ids: Vec<String> = order.iter().map(|&i| stats.gene_ids[i].clone()).collect();
    let mut scattered_ids = vec![String::new(); ordered_ids.len()];
    for (&i, id) in order.iter().zip(ordered_ids) {
        scattered_ids[i] = id;
    }
    ensure_same_gene_ids(&scattered_ids, pooled.gene_ids(), "trend", "pooled matrix").map_err(|e| {
        CvError::TrendReindex {
            reason: e.to_string(),
        }
    })?;

    if n_median_filled > 0 {
        log::info!(
            "Trend: {} of {} genes took the global median log10(CV^2)",
            n_median_filled,
            values.len()
        );
    }

    Ok(Trend {
        gene_ids: scattered_ids,
        values,
        pooled_means: stats.means,
        pooled_log10_cv2: log_cv2,
        n_samples: pooled.n_samples(),
        n_median_filled,
    })
}

/// Build the trend from every batch except `excluded_batch`
pub fn fit_trend_excluding(
    matrix: &ExpressionMatrix,
    annotation: &Annotation,
    excluded_batch: Option<&str>,
    params: &TrendParams,
) -> Result<Trend> {
    let cols = annotation.samples_excluding_batch(excluded_batch);
    if let Some(batch) = excluded_batch {
        let removed = annotation.n_samples() - cols.len();
        if removed == 0 {
            return Err(CvError::UnknownGroup {
                group: batch.to_string(),
            });
        }
        log::info!("Excluding batch '{}' ({} samples) from the trend", batch, removed);
    }
    let pooled = matrix.subset_samples(&cols)?;
    fit_trend(&pooled, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ValueScale;
    use ndarray::Array2;

    #[test]
    fn test_abundance_order_stable() {
        assert_eq!(abundance_order(&[3.0, 1.0, 3.0, 2.0]), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_rolling_median_extend_and_interpolate() {
        // window 3, step 2 over 7 values: windows at 0, 2, 4 -> centers 1, 3, 5
        let seq = [1.0, 2.0, 3.0, 10.0, 5.0, 6.0, 7.0];
        let params = TrendParams { window: 3, step: 2 };
        let (smoothed, filled) = rolling_median_trend(&seq, &params).unwrap();
        // medians: [1,2,3] -> 2, [3,10,5] -> 5, [5,6,7] -> 6
        assert_eq!(filled, 0);
        assert_eq!(smoothed, vec![2.0, 2.0, 3.5, 5.0, 5.5, 6.0, 6.0]);
    }

    #[test]
    fn test_rolling_median_step_one_is_dense() {
        let seq = [4.0, 1.0, 3.0, 2.0];
        let params = TrendParams { window: 3, step: 1 };
        let (smoothed, _) = rolling_median_trend(&seq, &params).unwrap();
        assert_eq!(smoothed, vec![3.0, 3.0, 2.0, 2.0]);
    }

    #[test]
    fn test_short_sequence_uses_global_median() {
        let seq = [1.0, 5.0, 3.0];
        let (smoothed, filled) = rolling_median_trend(&seq, &TrendParams::default()).unwrap();
        assert_eq!(filled, 3);
        assert_eq!(smoothed, vec![3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_undefined_window_falls_back_to_global_median() {
        // first window holds a NaN, so the leading end has no value after extension
        let seq = [f64::NAN, 1.0, 2.0, 3.0, 4.0, 5.0];
        let params = TrendParams { window: 2, step: 2 };
        let (smoothed, filled) = rolling_median_trend(&seq, &params).unwrap();
        // windows: [NaN,1] -> NaN @0, [2,3] -> 2.5 @2, [4,5] -> 4.5 @4
        assert_eq!(filled, 2);
        assert_eq!(smoothed[0], 3.0);
        assert_eq!(smoothed[1], 3.0);
        assert_eq!(smoothed[2], 2.5);
        assert_eq!(smoothed[3], 3.5);
        assert_eq!(smoothed[4], 4.5);
        assert_eq!(smoothed[5], 4.5);
    }

    #[test]
    fn test_invalid_params() {
        let params = TrendParams { window: 0, step: 1 };
        assert!(rolling_median_trend(&[1.0], &params).is_err());
    }

    #[test]
    fn test_scatter_is_bijection() {
        let order = vec![2, 0, 1];
        let out = scatter_to_original(&order, &[10.0, 20.0, 30.0]).unwrap();
        assert_eq!(out, vec![20.0, 30.0, 10.0]);

        assert!(matches!(
            scatter_to_original(&[0, 0, 1], &[1.0, 2.0, 3.0]),
            Err(CvError::TrendReindex { .. })
        ));
        assert!(scatter_to_original(&[0, 5, 1], &[1.0, 2.0, 3.0]).is_err());
        assert!(scatter_to_original(&[0, 1], &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_fit_trend_preserves_gene_order() {
        let n_genes = 60;
        let n_samples = 4;
        let values = Array2::from_shape_fn((n_genes, n_samples), |(g, s)| {
            // descending abundance with gene index, varying noise
            (n_genes - g) as f64 * 0.1 + ((g * 7 + s * 3) % 5) as f64 * 0.2
        });
        let gene_ids: Vec<String> = (0..n_genes).map(|g| format!("ENSG{:05}", g)).collect();
        let sample_ids: Vec<String> = (0..n_samples).map(|s| format!("s{}", s)).collect();
        let m = ExpressionMatrix::new(values, gene_ids.clone(), sample_ids, ValueScale::Log2).unwrap();

        let trend = fit_trend(&m, &TrendParams { window: 10, step: 5 }).unwrap();
        assert_eq!(trend.n_genes(), n_genes);
        assert_eq!(trend.gene_ids(), gene_ids.as_slice());
        assert!(trend.values().iter().all(|v| v.is_finite()));
        assert_eq!(trend.n_median_filled(), 0);
    }
}
