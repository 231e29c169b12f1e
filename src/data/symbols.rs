//! Gene identifier to external symbol lookup

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Map from stable gene identifier (e.g. Ensembl ID) to display symbol
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneSymbols {
    symbols: HashMap<String, String>,
}

impl GeneSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, gene_id: &str, symbol: &str) {
        if let Some(prev) = self.symbols.insert(gene_id.to_string(), symbol.to_string()) {
            if prev != symbol {
                log::warn!("Gene '{}' mapped to both '{}' and '{}'; keeping the latter", gene_id, prev, symbol);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn get(&self, gene_id: &str) -> Option<&str> {
        self.symbols.get(gene_id).map(|s| s.as_str())
    }

    /// Symbol for `gene_id`, or "NA" when unknown
    pub fn symbol_or_na(&self, gene_id: &str) -> &str {
        self.get(gene_id).unwrap_or("NA")
    }
}

impl FromIterator<(String, String)> for GeneSymbols {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut out = GeneSymbols::new();
        for (id, sym) in iter {
            out.insert(&id, &sym);
        }
        out
    }
}
