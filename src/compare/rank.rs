//! Top-N gene selection by within-group rank

use serde::{Deserialize, Serialize};

use crate::error::{CvError, Result};
use crate::stats::{rank_average, rank_first};

/// How tied values are ranked at the top-N boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiePolicy {
    /// Ties share their average rank; the selection may hold more or fewer than N genes
    #[default]
    Average,
    /// Ties broken by gene order; the selection holds exactly min(N, total) genes
    First,
}

impl std::str::FromStr for TiePolicy {
    type Err = CvError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "average" => Ok(TiePolicy::Average),
            "first" => Ok(TiePolicy::First),
            other => Err(CvError::InvalidInput {
                reason: format!("Unknown tie policy '{}'. Use 'average' or 'first'.", other),
            }),
        }
    }
}

/// Per-group quantity that genes are ranked by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankMetric {
    /// log10(CV^2) minus the data-wide trend
    #[default]
    Adjusted,
    /// Unadjusted CV
    Cv,
    /// Mean abundance
    Mean,
}

impl std::str::FromStr for RankMetric {
    type Err = CvError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "adjusted" => Ok(RankMetric::Adjusted),
            "cv" => Ok(RankMetric::Cv),
            "mean" => Ok(RankMetric::Mean),
            other => Err(CvError::InvalidInput {
                reason: format!("Unknown metric '{}'. Use 'adjusted', 'cv' or 'mean'.", other),
            }),
        }
    }
}

/// Indices of the top `n` values.
///
/// Finite values are ranked ascending and those with rank > total - n are
/// kept, where total is the number of finite values. Non-finite values are
/// never ranked. Returned indices are in input order.
pub fn top_n_indices(values: &[f64], n: usize, policy: TiePolicy) -> Vec<usize> {
    let finite: Vec<usize> = (0..values.len()).filter(|&i| values[i].is_finite()).collect();
    let kept: Vec<f64> = finite.iter().map(|&i| values[i]).collect();
    let ranks = match policy {
        TiePolicy::Average => rank_average(&kept),
        TiePolicy::First => rank_first(&kept),
    };
    let cutoff = kept.len().saturating_sub(n) as f64;

    finite
        .iter()
        .zip(ranks.iter())
        .filter(|(_, &r)| r > cutoff)
        .map(|(&i, _)| i)
        .collect()
}

/// Gene identifiers of the top `n` values
pub fn top_n_genes(gene_ids: &[String], values: &[f64], n: usize, policy: TiePolicy) -> Vec<String> {
    top_n_indices(values, n, policy)
        .into_iter()
        .map(|i| gene_ids[i].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_three_distinct() {
        let values = [5.0, 1.0, 9.0, 3.0, 7.0, 2.0, 10.0, 4.0, 6.0, 8.0];
        let top = top_n_indices(&values, 3, TiePolicy::Average);
        // 10, 9, 8 at positions 6, 2, 9
        assert_eq!(top, vec![2, 6, 9]);
        assert_eq!(top_n_indices(&values, 3, TiePolicy::First), vec![2, 6, 9]);
    }

    #[test]
    fn test_ties_straddling_cutoff_include_extra() {
        // sorted: 1..6, 7, 7, 9, 10 -> the two 7s share rank 7.5 > 7
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 7.0, 9.0, 10.0];
        let top = top_n_indices(&values, 3, TiePolicy::Average);
        assert_eq!(top, vec![6, 7, 8, 9]);
        assert_eq!(top_n_indices(&values, 3, TiePolicy::First), vec![7, 8, 9]);
    }

    #[test]
    fn test_ties_below_cutoff_drop_out() {
        // three 6s at sorted positions 6, 7, 8 share rank 7, which is not > 7
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 6.0, 6.0, 9.0, 10.0];
        let top = top_n_indices(&values, 3, TiePolicy::Average);
        assert_eq!(top, vec![8, 9]);
    }

    #[test]
    fn test_non_finite_never_selected() {
        let values = [f64::NAN, 1.0, f64::INFINITY, 2.0, 3.0];
        let top = top_n_indices(&values, 2, TiePolicy::Average);
        assert_eq!(top, vec![3, 4]);
    }

    #[test]
    fn test_n_larger_than_total() {
        let values = [1.0, 2.0];
        assert_eq!(top_n_indices(&values, 5, TiePolicy::Average), vec![0, 1]);
    }

    #[test]
    fn test_top_n_genes() {
        let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(top_n_genes(&ids, &[0.1, 0.9, 0.5], 1, TiePolicy::Average), vec!["b"]);
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!("cv".parse::<RankMetric>().unwrap(), RankMetric::Cv);
        assert_eq!(RankMetric::default(), RankMetric::Adjusted);
        assert!("variance".parse::<RankMetric>().is_err());
    }
}
