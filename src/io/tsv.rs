//! Tab-delimited reading and writing of matrices, annotation and results
//!
//! Readers accept tabs or, when the header holds no tab, commas. Headers
//! written by R without a leading row-name column (one field fewer than the
//! data rows) are accepted as well. `NA`, `NaN` and empty cells read as NaN.

use std::path::Path;

use ndarray::Array2;
use serde::Serialize;

use crate::compare::OverlapSummary;
use crate::cv::{AdjustedCv, GroupStats, Trend};
use crate::data::{Annotation, ExpressionMatrix, GeneSymbols, SampleRecord, ValueScale};
use crate::error::{CvError, Result};
use crate::io::results::{DispersionResults, SignificantGene};
use crate::testing::{CompleteRows, DispersionSummary, PermutationNulls};

/// Header and data rows of a delimited file
struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Column names that label the data fields after the first column
    fn value_columns(&self) -> Result<Vec<String>> {
        let width = match self.rows.first() {
            Some(row) => row.len(),
            None => self.header.len(),
        };
        if width < 2 {
            return Err(CvError::InvalidMatrix {
                reason: "Not enough columns in table".to_string(),
            });
        }
        if self.header.len() == width {
            Ok(self.header[1..].to_vec())
        } else if self.header.len() + 1 == width {
            Ok(self.header.clone())
        } else {
            Err(CvError::InvalidMatrix {
                reason: format!("Header has {} columns but rows have {}", self.header.len(), width),
            })
        }
    }
}

fn read_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let first_line = content.lines().next().ok_or_else(|| CvError::EmptyData {
        reason: format!("{} is empty", path.as_ref().display()),
    })?;
    let delimiter = if first_line.contains('\t') { b'\t' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let header: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }
    Ok(Table { header, rows })
}

fn parse_value(field: &str) -> Result<f64> {
    match field {
        "" | "NA" | "NaN" | "nan" => Ok(f64::NAN),
        _ => field.parse::<f64>().map_err(|_| CvError::InvalidMatrix {
            reason: format!("Invalid numeric value: {}", field),
        }),
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else {
        value.to_string()
    }
}

fn format_pvalue(value: f64) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else {
        format!("{:.6e}", value)
    }
}

/// Row identifiers, column names and values of a numeric table
fn read_numeric<P: AsRef<Path>>(path: P) -> Result<(Vec<String>, Vec<String>, Array2<f64>)> {
    let table = read_table(path)?;
    let columns = table.value_columns()?;
    let n_cols = columns.len();

    let mut row_ids = Vec::with_capacity(table.rows.len());
    let mut data = Vec::with_capacity(table.rows.len() * n_cols);
    for row in &table.rows {
        if row.len() != n_cols + 1 {
            return Err(CvError::InvalidMatrix {
                reason: format!("Row has {} columns, expected {}", row.len(), n_cols + 1),
            });
        }
        row_ids.push(row[0].clone());
        for field in &row[1..] {
            data.push(parse_value(field)?);
        }
    }
    if row_ids.is_empty() {
        return Err(CvError::EmptyData {
            reason: "No genes found in table".to_string(),
        });
    }

    let values = Array2::from_shape_vec((row_ids.len(), n_cols), data).map_err(|e| CvError::InvalidMatrix {
        reason: e.to_string(),
    })?;
    Ok((row_ids, columns, values))
}

/// Read a gene x sample matrix: first column gene IDs, first row sample IDs
pub fn read_expression_matrix<P: AsRef<Path>>(path: P, scale: ValueScale) -> Result<ExpressionMatrix> {
    let (gene_ids, sample_ids, values) = read_numeric(path)?;
    log::debug!("Read {} genes x {} samples", gene_ids.len(), sample_ids.len());
    ExpressionMatrix::new(values, gene_ids, sample_ids, scale)
}

/// Read the sample annotation.
///
/// The first column holds sample IDs; `individual` and `batch` columns are
/// located by header name (case-insensitive), `well` is optional.
pub fn read_annotation<P: AsRef<Path>>(path: P) -> Result<Annotation> {
    let table = read_table(path)?;
    let columns = table.value_columns().map_err(|e| CvError::InvalidAnnotation {
        reason: e.to_string(),
    })?;
    let find = |name: &str| columns.iter().position(|c| c.eq_ignore_ascii_case(name));

    let individual = find("individual").ok_or_else(|| CvError::InvalidAnnotation {
        reason: "Missing 'individual' column".to_string(),
    })?;
    let batch = find("batch").ok_or_else(|| CvError::InvalidAnnotation {
        reason: "Missing 'batch' column".to_string(),
    })?;
    let well = find("well");

    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        if row.len() != columns.len() + 1 {
            return Err(CvError::InvalidAnnotation {
                reason: format!("Row has {} columns, expected {}", row.len(), columns.len() + 1),
            });
        }
        let field = |i: usize| row[i + 1].clone();
        records.push(SampleRecord {
            sample_id: row[0].clone(),
            individual: field(individual),
            batch: field(batch),
            well: well.map(field).unwrap_or_default(),
        });
    }
    Annotation::new(records)
}

/// Read a two-column gene ID to symbol table
pub fn read_gene_symbols<P: AsRef<Path>>(path: P) -> Result<GeneSymbols> {
    let table = read_table(path)?;
    let mut symbols = GeneSymbols::new();
    for row in &table.rows {
        if row.len() < 2 {
            return Err(CvError::InvalidInput {
                reason: format!("Gene symbol row has {} columns, expected 2", row.len()),
            });
        }
        if row[1].is_empty() || row[1] == "NA" {
            continue;
        }
        symbols.insert(&row[0], &row[1]);
    }
    log::debug!("Read {} gene symbols", symbols.len());
    Ok(symbols)
}

/// Read permutation-null statistics: gene ID then one column per replicate
pub fn read_permutation_nulls<P: AsRef<Path>>(path: P) -> Result<PermutationNulls> {
    let (gene_ids, _, values) = read_numeric(path)?;
    PermutationNulls::new(gene_ids, values)
}

fn writer<P: AsRef<Path>>(path: P) -> Result<csv::Writer<std::fs::File>> {
    Ok(csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?)
}

/// Write a matrix with its gene and sample identifiers
pub fn write_matrix<P: AsRef<Path>>(path: P, matrix: &ExpressionMatrix) -> Result<()> {
    let mut wtr = writer(path)?;
    let mut header = vec!["gene_id".to_string()];
    header.extend(matrix.sample_ids().iter().cloned());
    wtr.write_record(&header)?;

    for (i, gene_id) in matrix.gene_ids().iter().enumerate() {
        let mut record = vec![gene_id.clone()];
        record.extend(matrix.gene_values(i).iter().map(|&v| format_value(v)));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write per-group statistics in long format, one row per group and gene
pub fn write_group_stats<P: AsRef<Path>>(path: P, stats: &[GroupStats], trend: &Trend) -> Result<()> {
    let mut wtr = writer(path)?;
    wtr.write_record(["group", "gene_id", "mean", "sd", "cv", "log10_cv2", "sparsity", "trend"])?;
    for s in stats {
        let log_cv2 = s.log10_cv2();
        for i in 0..s.n_genes() {
            wtr.write_record(&[
                s.group.clone(),
                s.gene_ids[i].clone(),
                format_value(s.means[i]),
                format_value(s.sds[i]),
                format_value(s.cvs[i]),
                format_value(log_cv2[i]),
                format_value(s.sparsity[i]),
                format_value(trend.values()[i]),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Write adjusted CVs of every gene, one column per group
pub fn write_adjusted_all<P: AsRef<Path>>(path: P, adjusted: &[AdjustedCv]) -> Result<()> {
    let first = adjusted.first().ok_or_else(|| CvError::EmptyData {
        reason: "No adjusted CVs to write".to_string(),
    })?;
    let mut wtr = writer(path)?;
    let mut header = vec!["gene_id".to_string()];
    header.extend(adjusted.iter().map(|a| a.group.clone()));
    wtr.write_record(&header)?;

    for (i, gene_id) in first.gene_ids.iter().enumerate() {
        let mut record = vec![gene_id.clone()];
        record.extend(adjusted.iter().map(|a| format_value(a.values[i])));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the complete-gene adjusted-CV table with the MAD across groups
pub fn write_adjusted_table<P: AsRef<Path>>(
    path: P,
    rows: &CompleteRows,
    dispersion: &DispersionSummary,
) -> Result<()> {
    crate::data::ensure_same_gene_ids(&rows.gene_ids, &dispersion.gene_ids, "adjusted table", "dispersion")?;

    let mut wtr = writer(path)?;
    let mut header = vec!["gene_id".to_string()];
    header.extend(rows.groups.iter().cloned());
    header.push("mad".to_string());
    wtr.write_record(&header)?;

    for (i, gene_id) in rows.gene_ids.iter().enumerate() {
        let mut record = vec![gene_id.clone()];
        record.extend(rows.values.row(i).iter().map(|&v| format_value(v)));
        record.push(format_value(dispersion.mad[i]));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the full dispersion test table
pub fn write_dispersion_results<P: AsRef<Path>>(
    path: P,
    results: &DispersionResults,
    symbols: &GeneSymbols,
) -> Result<()> {
    let mut wtr = writer(path)?;
    wtr.write_record(["gene_id", "symbol", "mad", "pvalue", "padj"])?;
    for (i, gene_id) in results.gene_ids.iter().enumerate() {
        wtr.write_record(&[
            gene_id.clone(),
            symbols.symbol_or_na(gene_id).to_string(),
            format_value(results.mad[i]),
            format_pvalue(results.pvalues[i]),
            format_pvalue(results.padj[i]),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write significant genes in the order given
pub fn write_significant_genes<P: AsRef<Path>>(path: P, genes: &[SignificantGene]) -> Result<()> {
    let mut wtr = writer(path)?;
    wtr.write_record(["gene_id", "symbol", "pvalue"])?;
    for g in genes {
        wtr.write_record(&[g.gene_id.clone(), g.symbol.clone(), format_pvalue(g.pvalue)])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write pairwise and three-way overlaps of top-N sets
pub fn write_overlaps<P: AsRef<Path>>(path: P, summary: &OverlapSummary) -> Result<()> {
    let mut wtr = writer(path)?;
    wtr.write_record(["groups", "set_sizes", "shared", "universe", "pvalue"])?;
    for p in &summary.pairs {
        wtr.write_record(&[
            format!("{},{}", p.first, p.second),
            format!("{},{}", p.first_size, p.second_size),
            p.shared.to_string(),
            p.universe.to_string(),
            format_pvalue(p.pvalue),
        ])?;
    }
    for t in &summary.triples {
        let sizes: Vec<String> = t
            .groups
            .iter()
            .map(|g| {
                summary
                    .sets
                    .iter()
                    .find(|s| &s.group == g)
                    .map_or(0, |s| s.genes.len())
                    .to_string()
            })
            .collect();
        wtr.write_record(&[
            t.groups.join(","),
            sizes.join(","),
            t.shared.to_string(),
            "NA".to_string(),
            "NA".to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the members of every top-N set in long format
pub fn write_top_sets<P: AsRef<Path>>(path: P, summary: &OverlapSummary) -> Result<()> {
    let mut wtr = writer(path)?;
    wtr.write_record(["group", "gene_id"])?;
    for set in &summary.sets {
        for gene in &set.genes {
            wtr.write_record([set.group.as_str(), gene.as_str()])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Write permutation-null statistics, genes x replicates
pub fn write_nulls<P: AsRef<Path>>(path: P, nulls: &PermutationNulls) -> Result<()> {
    let mut wtr = writer(path)?;
    let mut header = vec!["gene_id".to_string()];
    header.extend((1..=nulls.n_replicates()).map(|r| format!("perm{}", r)));
    wtr.write_record(&header)?;

    for (i, gene_id) in nulls.gene_ids.iter().enumerate() {
        let mut record = vec![gene_id.clone()];
        record.extend(nulls.values.row(i).iter().map(|&v| format_value(v)));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write any serializable summary as pretty-printed JSON
pub fn write_summary_json<P: AsRef<Path>, T: Serialize>(path: P, summary: &T) -> Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_expression_matrix_tab() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene_id\ts1\ts2\ts3").unwrap();
        writeln!(file, "ENSG1\t1.5\t2.0\tNA").unwrap();
        writeln!(file, "ENSG2\t0\t3\t4").unwrap();

        let m = read_expression_matrix(file.path(), ValueScale::Log2).unwrap();
        assert_eq!(m.n_genes(), 2);
        assert_eq!(m.n_samples(), 3);
        assert_eq!(m.sample_ids(), &["s1", "s2", "s3"]);
        assert!(m.values()[[0, 2]].is_nan());
        assert_eq!(m.values()[[1, 2]], 4.0);
    }

    #[test]
    fn test_read_r_style_header_with_commas() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "\"s1\",\"s2\"").unwrap();
        writeln!(file, "\"ENSG1\",1,2").unwrap();

        let m = read_expression_matrix(file.path(), ValueScale::Natural).unwrap();
        assert_eq!(m.gene_ids(), &["ENSG1"]);
        assert_eq!(m.sample_ids(), &["s1", "s2"]);
    }

    #[test]
    fn test_read_ragged_row_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene_id\ts1\ts2").unwrap();
        writeln!(file, "ENSG1\t1\t2").unwrap();
        writeln!(file, "ENSG2\t1").unwrap();
        assert!(read_expression_matrix(file.path(), ValueScale::Natural).is_err());
    }

    #[test]
    fn test_read_annotation_by_column_name() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\twell\tbatch\tindividual").unwrap();
        writeln!(file, "s1\tA01\tNA19098.r1\tNA19098").unwrap();
        writeln!(file, "s2\tA02\tNA19101.r1\tNA19101").unwrap();

        let ann = read_annotation(file.path()).unwrap();
        assert_eq!(ann.n_samples(), 2);
        assert_eq!(ann.records()[1].individual, "NA19101");
        assert_eq!(ann.records()[0].batch, "NA19098.r1");
        assert_eq!(ann.records()[0].well, "A01");
    }

    #[test]
    fn test_read_annotation_missing_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tbatch").unwrap();
        writeln!(file, "s1\tb1").unwrap();
        assert!(matches!(
            read_annotation(file.path()),
            Err(CvError::InvalidAnnotation { .. })
        ));
    }

    #[test]
    fn test_gene_symbols_skip_na() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ensembl_gene_id\thgnc_symbol").unwrap();
        writeln!(file, "ENSG00000111640\tGAPDH").unwrap();
        writeln!(file, "ENSG00000000000\tNA").unwrap();

        let symbols = read_gene_symbols(file.path()).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols.symbol_or_na("ENSG00000111640"), "GAPDH");
        assert_eq!(symbols.symbol_or_na("ENSG00000000000"), "NA");
    }

    #[test]
    fn test_matrix_written_and_read_back() {
        let m = ExpressionMatrix::new(
            ndarray::array![[0.25, f64::NAN], [3.0, 1e-7]],
            vec!["g1".to_string(), "g2".to_string()],
            vec!["a".to_string(), "b".to_string()],
            ValueScale::Log2,
        )
        .unwrap();
        let file = NamedTempFile::new().unwrap();
        write_matrix(file.path(), &m).unwrap();
        let back = read_expression_matrix(file.path(), ValueScale::Log2).unwrap();
        assert_eq!(back.gene_ids(), m.gene_ids());
        assert!(back.values()[[0, 1]].is_nan());
        assert_eq!(back.values()[[1, 1]], 1e-7);
    }

    #[test]
    fn test_nulls_written_and_read_back() {
        let nulls = PermutationNulls::new(
            vec!["g1".to_string(), "g2".to_string()],
            ndarray::array![[0.1, 0.2, f64::NAN], [1.0, 2.0, 3.0]],
        )
        .unwrap();
        let file = NamedTempFile::new().unwrap();
        write_nulls(file.path(), &nulls).unwrap();
        let back = read_permutation_nulls(file.path()).unwrap();
        assert_eq!(back.n_replicates(), 3);
        assert_eq!(back.values[[1, 2]], 3.0);
        assert!(back.values[[0, 2]].is_nan());
    }

    #[test]
    fn test_significant_genes_file() {
        let genes = vec![SignificantGene {
            gene_id: "ENSG1".to_string(),
            symbol: "NA".to_string(),
            pvalue: 1e-6,
        }];
        let file = NamedTempFile::new().unwrap();
        write_significant_genes(file.path(), &genes).unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "gene_id\tsymbol\tpvalue");
        assert_eq!(lines[1], "ENSG1\tNA\t1.000000e-6");
    }

    #[test]
    fn test_summary_json() {
        #[derive(Serialize)]
        struct Small {
            n_genes: usize,
        }
        let file = NamedTempFile::new().unwrap();
        write_summary_json(file.path(), &Small { n_genes: 3 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(value["n_genes"], 3);
    }
}
