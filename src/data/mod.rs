//! Data structures for CV analysis

mod annotation;
mod expression_matrix;
mod symbols;

pub use annotation::{Annotation, GroupBy, SampleRecord};
pub use expression_matrix::{ensure_same_gene_ids, ExpressionMatrix, ValueScale};
pub use symbols::GeneSymbols;
