//! Statistical utility functions shared across modules
//!
//! Median, median absolute deviation, ranking with tie handling and
//! Spearman correlation. All functions take plain slices and treat NaN
//! explicitly rather than relying on partial ordering.

use std::cmp::Ordering;

use crate::error::{CvError, Result};

/// Total order on f64 used for sorting; NaN sorts last
#[inline]
pub(crate) fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or_else(|| match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        _ => Ordering::Less,
    })
}

/// Median of `values`. Returns NaN if the slice is empty or contains a NaN.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(cmp_f64);
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Median of the non-NaN entries of `values`
pub fn median_ignore_nan(values: &[f64]) -> f64 {
    let kept: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    median(&kept)
}

/// Median absolute deviation about the median, without a consistency constant.
///
/// `[1, 2, 3]` gives 1.
pub fn mad(values: &[f64]) -> f64 {
    let center = median(values);
    if center.is_nan() {
        return f64::NAN;
    }
    let deviations: Vec<f64> = values.iter().map(|&v| (v - center).abs()).collect();
    median(&deviations)
}

/// 1-based ranks where tied values share their average rank.
///
/// Input must not contain NaN.
pub fn rank_average(values: &[f64]) -> Vec<f64> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| cmp_f64(&values[a], &values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < idx.len() {
        let start = i;
        let val = values[idx[i]];
        while i < idx.len() && values[idx[i]] == val {
            i += 1;
        }
        let avg = (start + i - 1) as f64 / 2.0 + 1.0;
        for &j in &idx[start..i] {
            ranks[j] = avg;
        }
    }
    ranks
}

/// 1-based ranks with ties broken by position (a strict total order)
pub fn rank_first(values: &[f64]) -> Vec<f64> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    // sort_by is stable, so equal values keep their input order
    idx.sort_by(|&a, &b| cmp_f64(&values[a], &values[b]));

    let mut ranks = vec![0.0; values.len()];
    for (r, &j) in idx.iter().enumerate() {
        ranks[j] = (r + 1) as f64;
    }
    ranks
}

/// Spearman rank correlation over pairwise-finite entries.
///
/// NaN with fewer than three complete pairs or zero variance; unequal
/// lengths are an error.
pub fn spearman(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(CvError::DimensionMismatch {
            expected: format!("{} paired values", x.len()),
            got: format!("{} paired values", y.len()),
        });
    }
    let (xv, yv): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .unzip();
    if xv.len() < 3 {
        return Ok(f64::NAN);
    }
    Ok(pearson(&rank_average(&xv), &rank_average(&yv)))
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut sx = 0.0;
    let mut sy = 0.0;
    for (a, b) in x.iter().zip(y.iter()) {
        let dx = a - mx;
        let dy = b - my;
        num += dx * dy;
        sx += dx * dx;
        sy += dy * dy;
    }
    let den = (sx * sy).sqrt();
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}
