//! Overlap of top-N gene sets across groups

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use statrs::distribution::{DiscreteCDF, Hypergeometric};

use crate::compare::rank::{top_n_genes, TiePolicy};
use crate::error::{CvError, Result};

/// Parameters for top-N overlap comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapParams {
    /// Number of top genes per group
    pub top_n: usize,
    /// Tie handling at the cutoff
    pub tie_policy: TiePolicy,
}

impl Default for OverlapParams {
    fn default() -> Self {
        Self {
            top_n: 1000,
            tie_policy: TiePolicy::Average,
        }
    }
}

/// Values of one metric (adjusted CV, CV or mean) for one group
#[derive(Debug, Clone)]
pub struct GroupValues {
    pub group: String,
    pub values: Vec<f64>,
}

/// Top-N genes of one group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopSet {
    pub group: String,
    pub genes: BTreeSet<String>,
}

/// Intersection of two groups' top sets with hypergeometric enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairOverlap {
    pub first: String,
    pub second: String,
    pub first_size: usize,
    pub second_size: usize,
    pub shared: usize,
    /// Genes with a finite value in both groups
    pub universe: usize,
    /// P(X >= shared) under random draws from the universe
    pub pvalue: f64,
}

/// Intersection of three groups' top sets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripleOverlap {
    pub groups: [String; 3],
    pub shared: usize,
}

/// All top sets and their pairwise and three-way intersections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapSummary {
    pub top_n: usize,
    pub tie_policy: TiePolicy,
    pub sets: Vec<TopSet>,
    pub pairs: Vec<PairOverlap>,
    pub triples: Vec<TripleOverlap>,
}

/// Upper-tail hypergeometric probability of seeing at least `shared` genes
/// in common between sets of `first` and `second` genes out of `universe`
pub fn overlap_pvalue(universe: usize, first: usize, second: usize, shared: usize) -> f64 {
    if shared == 0 {
        return 1.0;
    }
    match Hypergeometric::new(universe as u64, first as u64, second as u64) {
        Ok(dist) => dist.sf(shared as u64 - 1),
        Err(e) => {
            log::debug!("Hypergeometric({}, {}, {}) rejected: {}", universe, first, second, e);
            f64::NAN
        }
    }
}

/// Select top-N genes per group and intersect every pair and triple of groups
pub fn compare_top_sets(
    gene_ids: &[String],
    groups: &[GroupValues],
    params: &OverlapParams,
) -> Result<OverlapSummary> {
    for g in groups {
        if g.values.len() != gene_ids.len() {
            return Err(CvError::DimensionMismatch {
                expected: format!("{} values for group '{}'", gene_ids.len(), g.group),
                got: format!("{} values", g.values.len()),
            });
        }
    }

    let sets: Vec<TopSet> = groups
        .iter()
        .map(|g| {
            let genes: BTreeSet<String> = top_n_genes(gene_ids, &g.values, params.top_n, params.tie_policy)
                .into_iter()
                .collect();
            if genes.len() != params.top_n {
                log::debug!(
                    "Group '{}': {} genes selected for top {}",
                    g.group,
                    genes.len(),
                    params.top_n
                );
            }
            TopSet {
                group: g.group.clone(),
                genes,
            }
        })
        .collect();

    let mut pairs = Vec::new();
    for i in 0..groups.len() {
        for j in (i + 1)..groups.len() {
            let universe = groups[i]
                .values
                .iter()
                .zip(groups[j].values.iter())
                .filter(|(a, b)| a.is_finite() && b.is_finite())
                .count();
            let shared = sets[i].genes.intersection(&sets[j].genes).count();
            let first_size = sets[i].genes.len();
            let second_size = sets[j].genes.len();
            pairs.push(PairOverlap {
                first: sets[i].group.clone(),
                second: sets[j].group.clone(),
                first_size,
                second_size,
                shared,
                universe,
                pvalue: overlap_pvalue(universe, first_size, second_size, shared),
            });
        }
    }

    let mut triples = Vec::new();
    for i in 0..groups.len() {
        for j in (i + 1)..groups.len() {
            for k in (j + 1)..groups.len() {
                let shared = sets[i]
                    .genes
                    .iter()
                    .filter(|g| sets[j].genes.contains(*g) && sets[k].genes.contains(*g))
                    .count();
                triples.push(TripleOverlap {
                    groups: [
                        sets[i].group.clone(),
                        sets[j].group.clone(),
                        sets[k].group.clone(),
                    ],
                    shared,
                });
            }
        }
    }

    Ok(OverlapSummary {
        top_n: params.top_n,
        tie_policy: params.tie_policy,
        sets,
        pairs,
        triples,
    })
}
