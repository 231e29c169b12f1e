//! Coefficient of variation estimation and mean-abundance adjustment

mod adjusted;
mod estimator;
mod trend;

pub use adjusted::{abundance_correlation, adjust_all, adjust_cv, AdjustedCv};
pub use estimator::{compute_group_stats, compute_stats_by_group, GroupStats};
pub use trend::{
    abundance_order, fit_trend, fit_trend_excluding, rolling_median_trend, scatter_to_original, Trend,
    TrendParams,
};

pub(crate) use estimator::gene_moments;
