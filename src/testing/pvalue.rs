//! Empirical p-values from permutation-null statistics

use ndarray::ArrayView2;
use rayon::prelude::*;

use crate::error::{CvError, Result};

/// Continuity-corrected empirical p-value (b + 1) / (m + 1).
///
/// `b` counts null statistics strictly greater than `observed`; `m` counts
/// the finite null statistics. The result is never below 1 / (m + 1).
/// Returns NaN when `observed` is NaN.
pub fn empirical_pvalue(observed: f64, nulls: &[f64]) -> f64 {
    if observed.is_nan() {
        return f64::NAN;
    }
    let (exceed, total) = nulls
        .iter()
        .filter(|v| v.is_finite())
        .fold((0usize, 0usize), |(b, m), &v| (b + usize::from(v > observed), m + 1));
    (exceed as f64 + 1.0) / (total as f64 + 1.0)
}

/// Empirical p-value for every gene against its own row of null statistics.
///
/// `nulls` is genes x replicates, rows aligned with `observed`.
pub fn empirical_pvalues(observed: &[f64], nulls: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
    if observed.len() != nulls.nrows() {
        return Err(CvError::DimensionMismatch {
            expected: format!("{} null rows", observed.len()),
            got: format!("{} null rows", nulls.nrows()),
        });
    }
    Ok((0..observed.len())
        .into_par_iter()
        .map(|i| {
            let row: Vec<f64> = nulls.row(i).to_vec();
            empirical_pvalue(observed[i], &row)
        })
        .collect())
}

/// Indices of p-values below `threshold`, ordered by ascending p-value
pub fn significant_indices(pvalues: &[f64], threshold: f64) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..pvalues.len())
        .filter(|&i| pvalues[i].is_finite() && pvalues[i] < threshold)
        .collect();
    // stable: equal p-values keep gene order
    idx.sort_by(|&a, &b| crate::stats::cmp_f64(&pvalues[a], &pvalues[b]));
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_no_exceedances() {
        let nulls = [0.1, 0.2, 0.3, 0.1, 0.2, 0.3, 0.1, 0.2, 0.3];
        let p = empirical_pvalue(5.0, &nulls);
        assert!((p - 0.1).abs() < 1e-15);
        assert!(p > 0.0);
    }

    #[test]
    fn test_all_exceed() {
        let nulls = [1.0; 9];
        assert_eq!(empirical_pvalue(0.5, &nulls), 1.0);
    }

    #[test]
    fn test_ties_do_not_count() {
        let nulls = [1.0, 1.0, 2.0];
        // only 2.0 exceeds 1.0
        assert_eq!(empirical_pvalue(1.0, &nulls), 0.5);
    }

    #[test]
    fn test_non_finite_nulls_ignored() {
        let nulls = [f64::NAN, 2.0, 0.0];
        assert!((empirical_pvalue(1.0, &nulls) - 2.0 / 3.0).abs() < 1e-15);
        assert!(empirical_pvalue(f64::NAN, &nulls).is_nan());
        assert_eq!(empirical_pvalue(1.0, &[]), 1.0);
    }

    #[test]
    fn test_pvalues_per_gene() {
        let nulls = array![[0.0, 0.0, 0.0], [5.0, 5.0, 0.0]];
        let p = empirical_pvalues(&[1.0, 1.0], nulls.view()).unwrap();
        assert_eq!(p, vec![0.25, 0.75]);
        assert!(matches!(
            empirical_pvalues(&[1.0], nulls.view()),
            Err(CvError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_significant_sorted() {
        let p = [0.5, 1e-5, f64::NAN, 1e-6, 1e-4];
        assert_eq!(significant_indices(&p, 1e-4), vec![3, 1]);
    }
}
