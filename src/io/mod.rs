//! Reading inputs and writing analysis results

mod results;
mod tsv;

pub use results::{DispersionResults, GroupSummary, ResultsSummary, RunSummary, SignificantGene};
pub use tsv::{
    read_annotation, read_expression_matrix, read_gene_symbols, read_permutation_nulls, write_adjusted_all,
    write_adjusted_table, write_dispersion_results, write_group_stats, write_matrix, write_nulls, write_overlaps,
    write_significant_genes, write_summary_json, write_top_sets,
};
