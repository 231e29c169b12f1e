//! Mean-adjusted CV: distance of each gene's log10(CV^2) from the trend

use serde::{Deserialize, Serialize};

use crate::cv::estimator::{log10_cv2, GroupStats};
use crate::cv::trend::Trend;
use crate::data::ensure_same_gene_ids;
use crate::error::Result;
use crate::stats::spearman;

/// Adjusted CV values for one group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustedCv {
    pub group: String,
    pub gene_ids: Vec<String>,
    /// log10(cv^2) - trend; NaN wherever either operand is undefined
    pub values: Vec<f64>,
}

impl AdjustedCv {
    pub fn n_defined(&self) -> usize {
        self.values.iter().filter(|v| v.is_finite()).count()
    }
}

/// Subtract the trend from a group's log10(CV^2)
pub fn adjust_cv(stats: &GroupStats, trend: &Trend) -> Result<AdjustedCv> {
    ensure_same_gene_ids(&stats.gene_ids, trend.gene_ids(), &format!("group '{}'", stats.group), "trend")?;

    let values = stats
        .cvs
        .iter()
        .zip(trend.values().iter())
        .map(|(&cv, &t)| {
            if cv.is_nan() || t.is_nan() {
                f64::NAN
            } else {
                log10_cv2(cv) - t
            }
        })
        .collect();

    Ok(AdjustedCv {
        group: stats.group.clone(),
        gene_ids: stats.gene_ids.clone(),
        values,
    })
}

/// Adjust every group against the same trend
pub fn adjust_all(stats: &[GroupStats], trend: &Trend) -> Result<Vec<AdjustedCv>> {
    stats.iter().map(|s| adjust_cv(s, trend)).collect()
}

/// Spearman correlation between adjusted CV and log10 mean abundance.
///
/// Values near zero mean the trend removed the abundance dependence.
pub fn abundance_correlation(adjusted: &AdjustedCv, stats: &GroupStats) -> Result<f64> {
    let log_means: Vec<f64> = stats.means.iter().map(|m| m.log10()).collect();
    spearman(&adjusted.values, &log_means)
}
