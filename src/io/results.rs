//! Result structures written at the end of an analysis

use serde::{Deserialize, Serialize};

use crate::data::GeneSymbols;
use crate::testing::significant_indices;

/// Inter-group dispersion test results, one entry per complete gene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispersionResults {
    pub gene_ids: Vec<String>,
    /// MAD of adjusted CV across groups
    pub mad: Vec<f64>,
    /// Empirical permutation p-values
    pub pvalues: Vec<f64>,
    /// Benjamini-Hochberg adjusted p-values
    pub padj: Vec<f64>,
    /// Permutation replicates per gene
    pub n_replicates: usize,
}

/// One significant gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificantGene {
    pub gene_id: String,
    pub symbol: String,
    pub pvalue: f64,
}

impl DispersionResults {
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    /// Genes with p-value below `threshold`, sorted by ascending p-value
    pub fn significant_genes(&self, threshold: f64, symbols: &GeneSymbols) -> Vec<SignificantGene> {
        significant_indices(&self.pvalues, threshold)
            .into_iter()
            .map(|i| SignificantGene {
                gene_id: self.gene_ids[i].clone(),
                symbol: symbols.symbol_or_na(&self.gene_ids[i]).to_string(),
                pvalue: self.pvalues[i],
            })
            .collect()
    }

    pub fn summary(&self, threshold: f64) -> ResultsSummary {
        ResultsSummary {
            genes_tested: self.pvalues.iter().filter(|p| p.is_finite()).count(),
            significant: self
                .pvalues
                .iter()
                .filter(|&&p| p.is_finite() && p < threshold)
                .count(),
            min_pvalue: 1.0 / (self.n_replicates as f64 + 1.0),
            n_replicates: self.n_replicates,
            threshold,
        }
    }
}

/// Summary of a dispersion test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub genes_tested: usize,
    pub significant: usize,
    /// Smallest attainable p-value, 1 / (replicates + 1)
    pub min_pvalue: f64,
    pub n_replicates: usize,
    pub threshold: f64,
}

impl std::fmt::Display for ResultsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dispersion Test Summary")?;
        writeln!(f, "=======================")?;
        writeln!(f, "Genes tested: {}", self.genes_tested)?;
        writeln!(f, "Permutation replicates: {}", self.n_replicates)?;
        writeln!(f, "Smallest attainable p-value: {:.3e}", self.min_pvalue)?;
        writeln!(f, "Significant (p < {}): {}", self.threshold, self.significant)?;
        Ok(())
    }
}

/// Per-group entry of the run summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: String,
    pub n_samples: usize,
    pub undefined_cv: usize,
    /// Spearman correlation of adjusted CV with log10 mean
    pub abundance_correlation: f64,
}

/// Machine-readable summary of a `cv` run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub n_genes: usize,
    pub n_samples: usize,
    pub excluded_batch: Option<String>,
    pub trend_samples: usize,
    pub trend_window: usize,
    pub trend_step: usize,
    pub trend_median_filled: usize,
    pub groups: Vec<GroupSummary>,
    pub complete_genes: usize,
    pub dropped_genes: usize,
    pub dropped_gene_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> DispersionResults {
        DispersionResults {
            gene_ids: vec!["g1".to_string(), "g2".to_string(), "g3".to_string(), "g4".to_string()],
            mad: vec![0.1, 0.9, 0.5, 0.7],
            pvalues: vec![0.5, 1e-5, f64::NAN, 1e-6],
            padj: vec![0.5, 2e-5, f64::NAN, 3e-6],
            n_replicates: 999_999,
        }
    }

    #[test]
    fn test_significant_sorted_by_pvalue() {
        let mut symbols = GeneSymbols::new();
        symbols.insert("g4", "TP53");
        let sig = results().significant_genes(1e-4, &symbols);
        assert_eq!(sig.len(), 2);
        assert_eq!(sig[0].gene_id, "g4");
        assert_eq!(sig[0].symbol, "TP53");
        assert_eq!(sig[1].gene_id, "g2");
        assert_eq!(sig[1].symbol, "NA");
    }

    #[test]
    fn test_summary_counts() {
        let summary = results().summary(1e-4);
        assert_eq!(summary.genes_tested, 3);
        assert_eq!(summary.significant, 2);
        assert!((summary.min_pvalue - 1e-6).abs() < 1e-18);
        assert!(summary.to_string().contains("Significant (p < 0.0001): 2"));
    }
}
