//! Multiple-testing adjustment of empirical p-values

use crate::stats::cmp_f64;

/// Benjamini-Hochberg adjusted p-values.
///
/// NaN entries stay NaN and do not count towards the number of tests.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let mut tested: Vec<usize> = (0..pvalues.len()).filter(|&i| !pvalues[i].is_nan()).collect();
    tested.sort_by(|&a, &b| cmp_f64(&pvalues[a], &pvalues[b]));

    let m = tested.len() as f64;
    let mut padj = vec![f64::NAN; pvalues.len()];
    let mut running_min = 1.0_f64;
    for (pos, &i) in tested.iter().enumerate().rev() {
        let rank = (pos + 1) as f64;
        running_min = running_min.min(pvalues[i] * m / rank);
        padj[i] = running_min;
    }
    padj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bh_hand_computed() {
        // sorted p: 0.001, 0.002, 0.03, 0.5 with m = 4
        let padj = benjamini_hochberg(&[0.03, 0.001, 0.5, 0.002]);
        let expected = [0.04, 0.004, 0.5, 0.004];
        for (a, e) in padj.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-12, "{} vs {}", a, e);
        }
    }

    #[test]
    fn test_bh_nan_excluded() {
        let padj = benjamini_hochberg(&[0.01, f64::NAN, 0.02]);
        assert!(padj[1].is_nan());
        assert!((padj[0] - 0.02).abs() < 1e-12);
        assert!((padj[2] - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_bh_capped_at_one() {
        let padj = benjamini_hochberg(&[0.9, 1.0, 0.95]);
        assert!(padj.iter().all(|&p| p <= 1.0));
        assert!(benjamini_hochberg(&[]).is_empty());
    }
}
