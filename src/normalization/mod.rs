//! Normalization of raw molecule counts

mod cpm;

pub use cpm::{log2_cpm, normalize_log2_cpm, CpmParams};
