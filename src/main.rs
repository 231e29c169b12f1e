//! rust_sccv command-line interface

use std::path::Path;

use clap::Parser;
use log::{info, LevelFilter};

use rust_sccv::cli::{AnalysisArgs, Cli, Commands};
use rust_sccv::io::{
    write_adjusted_all, write_adjusted_table, write_dispersion_results, write_group_stats, write_matrix, write_nulls,
    write_overlaps, write_significant_genes, write_summary_json, write_top_sets,
};
use rust_sccv::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let subcommands = ["normalize", "cv", "overlap", "permute", "test", "help"];
    let has_subcommand = first_positional.map_or(false, |a| subcommands.contains(&a.as_str()));

    if !has_subcommand {
        if args.len() == 1 {
            print_no_args();
            return;
        }
        if args.iter().any(|a| a == "--help") {
            print_long_help();
            return;
        }
        if args.iter().any(|a| a == "-h") {
            print_short_help();
            return;
        }
        if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("rust_sccv {}", VERSION);
            return;
        }
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .ok();
    }

    let result = match cli.command {
        Some(Commands::Normalize {
            counts,
            output,
            prior_count,
        }) => run_normalize(&counts, &output, prior_count),
        Some(Commands::Cv { analysis, output_dir }) => run_cv(&analysis, &output_dir),
        Some(Commands::Overlap {
            analysis,
            top_n,
            metric,
            ties,
            output,
            sets,
        }) => run_overlap(&analysis, top_n, &metric, &ties, &output, sets.as_deref()),
        Some(Commands::Permute {
            analysis,
            replicates,
            seed,
            output,
        }) => run_permute(&analysis, replicates, seed, &output),
        Some(Commands::Test {
            analysis,
            nulls,
            replicates,
            seed,
            symbols,
            threshold,
            output,
            significant,
        }) => run_test(
            &analysis,
            nulls.as_deref(),
            replicates,
            seed,
            symbols.as_deref(),
            threshold,
            &output,
            significant.as_deref(),
        ),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Custom help output
// ---------------------------------------------------------------------------

fn print_no_args() {
    println!("rust_sccv v{}", VERSION);
    println!("Run `rust_sccv -h` for usage or `rust_sccv --help` for detailed information.");
}

fn print_short_help() {
    println!("rust_sccv v{}", VERSION);
    println!();
    println!("Usage: rust_sccv <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  normalize  Convert raw counts to log2 CPM");
    println!("  cv         Per-group CVs, trend and adjusted CVs");
    println!("  overlap    Overlap of top-N genes across groups");
    println!("  permute    Generate permutation-null statistics");
    println!("  test       Empirical p-values for inter-group dispersion");
    println!();
    println!("Run `rust_sccv <COMMAND> -h` for command-specific options.");
}

fn print_long_help() {
    println!("rust_sccv v{}", VERSION);
    println!("Coefficient-of-variation analysis of single-cell RNA-seq data");
    println!();
    println!("Usage: rust_sccv <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  normalize  Convert raw counts to log2 CPM with a library-scaled prior count");
    println!("  cv         Compute per-group CVs and adjust them for mean abundance");
    println!("               - grouping by batch or individual");
    println!("               - rolling-median trend of log10(CV^2), optional outlier batch exclusion");
    println!("               - MAD of adjusted CVs across groups");
    println!("  overlap    Intersect top-N genes of every pair and triple of groups");
    println!("  permute    Shuffle group labels and record null MAD statistics");
    println!("  test       Compare observed MADs with permutation nulls");
    println!();
    println!("Global Options:");
    println!("  -v, --verbose    Enable verbose output");
    println!("  -t, --threads    Number of threads (0 = auto)");
    println!("  -h               Print short help");
    println!("      --help       Print detailed help");
    println!("  -V, --version    Print version");
    println!();
    println!("Examples:");
    println!("  rust_sccv normalize -c molecules.tsv -o log2cpm.tsv");
    println!();
    println!("  rust_sccv cv -m log2cpm.tsv -a annotation.tsv --exclude-batch NA19098.r2 -o cv_out");
    println!();
    println!("  rust_sccv test -m log2cpm.tsv -a annotation.tsv --nulls nulls.tsv \\");
    println!("    --symbols symbols.tsv --significant significant.tsv");
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

struct LoadedInputs {
    matrix: ExpressionMatrix,
    raw_counts: Option<ExpressionMatrix>,
    annotation: Annotation,
    params: CvParams,
}

fn load_inputs(args: &AnalysisArgs) -> Result<LoadedInputs> {
    let scale: ValueScale = args.scale.parse()?;
    let group_by: GroupBy = args.group_by.parse()?;

    info!("Loading expression matrix from: {}", args.matrix);
    let matrix = read_expression_matrix(&args.matrix, scale)?;
    info!("  {} genes, {} samples", matrix.n_genes(), matrix.n_samples());

    info!("Loading annotation from: {}", args.annotation);
    let annotation = read_annotation(&args.annotation)?;

    let raw_counts = match &args.raw_counts {
        Some(path) => {
            info!("Loading raw counts from: {}", path);
            Some(read_expression_matrix(path, ValueScale::Natural)?)
        }
        None => None,
    };

    Ok(LoadedInputs {
        matrix,
        raw_counts,
        annotation,
        params: CvParams {
            group_by,
            excluded_batch: args.exclude_batch.clone(),
            trend: TrendParams {
                window: args.window,
                step: args.step,
            },
        },
    })
}

fn analyze(inputs: &LoadedInputs) -> Result<CvAnalysis> {
    run_cv_analysis(
        &inputs.matrix,
        inputs.raw_counts.as_ref(),
        &inputs.annotation,
        &inputs.params,
    )
}

fn run_normalize(counts_path: &str, output_path: &str, prior_count: f64) -> Result<()> {
    info!("Loading count matrix from: {}", counts_path);
    let counts = read_expression_matrix(counts_path, ValueScale::Natural)?;
    info!("  {} genes, {} samples", counts.n_genes(), counts.n_samples());

    info!("Computing log2 CPM (prior count {})...", prior_count);
    let log_cpm = normalize_log2_cpm(&counts, &CpmParams { prior_count })?;

    info!("Writing log2 CPM to: {}", output_path);
    write_matrix(output_path, &log_cpm)?;
    info!("Done!");
    Ok(())
}

fn run_cv(args: &AnalysisArgs, output_dir: &str) -> Result<()> {
    let inputs = load_inputs(args)?;
    let analysis = analyze(&inputs)?;

    let dir = Path::new(output_dir);
    std::fs::create_dir_all(dir)?;
    info!("Writing results to: {}", dir.display());
    write_group_stats(dir.join("group_stats.tsv"), &analysis.stats, &analysis.trend)?;
    write_adjusted_all(dir.join("adjusted_cv.tsv"), &analysis.adjusted)?;
    write_adjusted_table(dir.join("adjusted_complete.tsv"), &analysis.complete, &analysis.dispersion)?;
    write_summary_json(dir.join("summary.json"), &analysis.summary)?;

    println!(
        "\n{} of {} genes have an adjusted CV in all {} groups ({} dropped)",
        analysis.summary.complete_genes,
        analysis.summary.n_genes,
        analysis.stats.len(),
        analysis.summary.dropped_genes
    );
    Ok(())
}

fn run_overlap(
    args: &AnalysisArgs,
    top_n: usize,
    metric: &str,
    ties: &str,
    output_path: &str,
    sets_path: Option<&str>,
) -> Result<()> {
    let metric: RankMetric = metric.parse()?;
    let tie_policy: TiePolicy = ties.parse()?;
    let inputs = load_inputs(args)?;
    let analysis = analyze(&inputs)?;

    info!("Selecting top {} genes per group by {:?}...", top_n, metric);
    let summary = compare_top_sets(
        &analysis.gene_ids,
        &analysis.group_values(metric),
        &OverlapParams { top_n, tie_policy },
    )?;

    info!("Writing overlaps to: {}", output_path);
    write_overlaps(output_path, &summary)?;
    if let Some(path) = sets_path {
        info!("Writing top sets to: {}", path);
        write_top_sets(path, &summary)?;
    }

    println!();
    for pair in &summary.pairs {
        println!(
            "{} / {}: {} shared (p = {:.3e})",
            pair.first, pair.second, pair.shared, pair.pvalue
        );
    }
    Ok(())
}

fn run_permute(args: &AnalysisArgs, replicates: usize, seed: u32, output_path: &str) -> Result<()> {
    let inputs = load_inputs(args)?;
    let analysis = analyze(&inputs)?;

    let nulls = generate_nulls(
        &inputs.matrix,
        &analysis.labels,
        &analysis.trend,
        &PermutationParams { replicates, seed },
    )?;

    info!("Writing permutation nulls to: {}", output_path);
    write_nulls(output_path, &nulls)?;
    info!("Done!");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_test(
    args: &AnalysisArgs,
    nulls_path: Option<&str>,
    replicates: usize,
    seed: u32,
    symbols_path: Option<&str>,
    threshold: f64,
    output_path: &str,
    significant_path: Option<&str>,
) -> Result<()> {
    let inputs = load_inputs(args)?;
    let analysis = analyze(&inputs)?;

    let nulls = match nulls_path {
        Some(path) => {
            info!("Loading permutation nulls from: {}", path);
            read_permutation_nulls(path)?
        }
        None => generate_nulls(
            &inputs.matrix,
            &analysis.labels,
            &analysis.trend,
            &PermutationParams { replicates, seed },
        )?,
    };

    let symbols = match symbols_path {
        Some(path) => read_gene_symbols(path)?,
        None => GeneSymbols::new(),
    };

    let results = assess_significance(&analysis.dispersion, &nulls)?;

    info!("Writing dispersion results to: {}", output_path);
    write_dispersion_results(output_path, &results, &symbols)?;

    let significant = results.significant_genes(threshold, &symbols);
    if let Some(path) = significant_path {
        info!("Writing {} significant genes to: {}", significant.len(), path);
        write_significant_genes(path, &significant)?;
    }

    println!("\n{}", results.summary(threshold));
    Ok(())
}
