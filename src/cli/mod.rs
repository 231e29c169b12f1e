//! Command-line interface for rust_sccv

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rust_sccv")]
#[command(version)]
#[command(about = "Coefficient-of-variation analysis of single-cell RNA-seq data")]
#[command(disable_help_flag = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Number of threads (0 = auto) [default: 0]
    #[arg(short = 't', long, global = true, default_value = "0")]
    pub threads: usize,
}

/// Inputs and trend settings shared by every analysis subcommand
#[derive(Args, Debug, Clone)]
pub struct AnalysisArgs {
    /// Path to expression matrix (genes x samples)
    #[arg(short, long,
        long_help = "Path to the expression matrix.\n\
            Format: first column = gene IDs, remaining columns = one value per sample.\n\
            Tab-delimited; comma is accepted when the header holds no tab.")]
    pub matrix: String,

    /// Scale of the matrix values [default: log2]
    #[arg(long, default_value = "log2",
        long_help = "Scale of the matrix values.\n\
            log2:    log2 CPM or similar; exponentiated before computing CVs\n\
            natural: counts on their natural scale")]
    pub scale: String,

    /// Path to sample annotation
    #[arg(short, long,
        long_help = "Path to the sample annotation.\n\
            Format: first column = sample IDs (matching matrix columns),\n\
            plus 'individual' and 'batch' columns; 'well' is optional.")]
    pub annotation: String,

    /// Raw count matrix used for sparsity
    #[arg(long,
        long_help = "Raw molecule count matrix used to measure the fraction of zero\n\
            counts per gene. Must hold the same genes in the same order as --matrix.\n\
            Without it, sparsity is measured on --matrix when --scale is natural\n\
            and reported as NA when --scale is log2.")]
    pub raw_counts: Option<String>,

    /// Group samples by batch or individual [default: individual]
    #[arg(short, long, default_value = "individual")]
    pub group_by: String,

    /// Batch left out of the trend
    #[arg(long, value_name = "BATCH",
        long_help = "Batch excluded when fitting the data-wide CV trend.\n\
            Its samples still contribute to the per-group statistics.")]
    pub exclude_batch: Option<String>,

    /// Rolling median window, in genes [default: 50]
    #[arg(long, default_value = "50")]
    pub window: usize,

    /// Distance between window starts, in genes [default: 25]
    #[arg(long, default_value = "25")]
    pub step: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert raw counts to log2 CPM
    #[command(
        long_about = "Convert a raw count matrix to log2 counts-per-million.\n\n\
            A prior count scaled by relative library size is added to every value.",
        after_long_help = "\
Examples:
  rust_sccv normalize -c molecules.tsv -o log2cpm.tsv
  rust_sccv normalize -c molecules.tsv -o log2cpm.tsv --prior-count 1"
    )]
    Normalize {
        /// Path to raw count matrix
        #[arg(short, long)]
        counts: String,

        /// Output file path
        #[arg(short, long)]
        output: String,

        /// Average prior count [default: 0.25]
        #[arg(long, default_value = "0.25")]
        prior_count: f64,
    },

    /// Compute per-group CVs, the trend and adjusted CVs
    #[command(
        long_about = "Compute per-group coefficients of variation.\n\n\
            Fits a rolling-median trend of log10(CV^2) over mean abundance on the\n\
            pooled samples, subtracts it from every group's log10(CV^2) and\n\
            measures the MAD of the adjusted values across groups.",
        after_long_help = "\
Examples:
  rust_sccv cv -m log2cpm.tsv -a annotation.tsv -o cv_out
  rust_sccv cv -m log2cpm.tsv -a annotation.tsv --exclude-batch NA19098.r2 \\
    --raw-counts molecules.tsv -o cv_out"
    )]
    Cv {
        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Output directory [default: sccv_out]
        #[arg(short, long, default_value = "sccv_out",
            long_help = "Output directory. Receives group_stats.tsv, adjusted_cv.tsv,\n\
                adjusted_complete.tsv and summary.json.")]
        output_dir: String,
    },

    /// Overlap of top-N genes across groups
    #[command(
        long_about = "Select the N highest-ranked genes per group and intersect the\n\
            sets for every pair and triple of groups. Pairwise overlaps carry a\n\
            hypergeometric enrichment p-value.",
        after_long_help = "\
Examples:
  rust_sccv overlap -m log2cpm.tsv -a annotation.tsv --top-n 1000 -o overlaps.tsv
  rust_sccv overlap -m log2cpm.tsv -a annotation.tsv --metric mean --ties first"
    )]
    Overlap {
        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Genes per top set [default: 1000]
        #[arg(short = 'n', long, default_value = "1000")]
        top_n: usize,

        /// Ranked quantity [default: adjusted]
        #[arg(long, default_value = "adjusted",
            long_help = "Quantity ranked within each group.\n\
                adjusted: mean-adjusted CV\n\
                cv:       unadjusted CV\n\
                mean:     mean abundance")]
        metric: String,

        /// Tie handling at the cutoff [default: average]
        #[arg(long, default_value = "average",
            long_help = "Tie handling at the top-N cutoff.\n\
                average: tied genes share their average rank; set sizes may differ from N\n\
                first:   ties broken by gene order; exactly N genes per set")]
        ties: String,

        /// Output file path [default: overlaps.tsv]
        #[arg(short, long, default_value = "overlaps.tsv")]
        output: String,

        /// Write top-set members to this file
        #[arg(long)]
        sets: Option<String>,
    },

    /// Generate permutation-null dispersion statistics
    #[command(
        long_about = "Shuffle group labels across samples and recompute the MAD of\n\
            adjusted CVs per gene. Replicates run in parallel and are reproducible:\n\
            replicate r uses seed + r.",
        after_long_help = "\
Examples:
  rust_sccv permute -m log2cpm.tsv -a annotation.tsv --replicates 10000 -o nulls.tsv
  rust_sccv permute -m log2cpm.tsv -a annotation.tsv --seed 42 -t 8 -o nulls.tsv"
    )]
    Permute {
        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Number of permutation replicates [default: 1000]
        #[arg(short, long, default_value = "1000")]
        replicates: usize,

        /// Seed of the first replicate [default: 1]
        #[arg(long, default_value = "1")]
        seed: u32,

        /// Output file path [default: nulls.tsv]
        #[arg(short, long, default_value = "nulls.tsv")]
        output: String,
    },

    /// Test inter-group dispersion against permutation nulls
    #[command(
        long_about = "Compare each gene's MAD of adjusted CVs across groups to its\n\
            permutation nulls and report empirical p-values (b + 1) / (m + 1).\n\
            Nulls are read from --nulls or generated in-process.",
        after_long_help = "\
Examples:
  rust_sccv test -m log2cpm.tsv -a annotation.tsv --nulls nulls.tsv \\
    --symbols symbols.tsv -o dispersion.tsv --significant significant.tsv
  rust_sccv test -m log2cpm.tsv -a annotation.tsv --replicates 10000 --threshold 1e-3"
    )]
    Test {
        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Precomputed permutation nulls
        #[arg(long)]
        nulls: Option<String>,

        /// Replicates generated when --nulls is absent [default: 1000]
        #[arg(short, long, default_value = "1000")]
        replicates: usize,

        /// Seed of the first generated replicate [default: 1]
        #[arg(long, default_value = "1")]
        seed: u32,

        /// Gene ID to symbol table
        #[arg(long)]
        symbols: Option<String>,

        /// Significance threshold on empirical p-values [default: 1e-4]
        #[arg(long, default_value_t = crate::testing::DEFAULT_SIGNIFICANCE)]
        threshold: f64,

        /// Output file path [default: dispersion.tsv]
        #[arg(short, long, default_value = "dispersion.tsv")]
        output: String,

        /// Write significant genes to this file
        #[arg(long)]
        significant: Option<String>,
    },
}
