//! CLI entry point for the descriptor featurization pipeline.

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use lex_descriptors::{
    FeaturizeConfig, FeaturizeResult, NormalizationMethod, OutputFormat,
    Pipeline, PolicyRevision, RunReport, report_path, write_report,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info};

/// CLI-compatible normalization enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliNormalization {
    /// Leave descriptor values unchanged
    #[value(name = "False", aliases = ["none", "identity"])]
    Identity,
    /// Fractional rank within each column, in (0, 1]
    #[value(name = "percentile-rank", aliases = ["CDF", "percentile"])]
    PercentileRank,
    /// Rescale each column to [0, 1]
    #[value(name = "min-max", aliases = ["minmax"])]
    MinMax,
    /// Center on the mean and divide by the standard deviation
    #[value(name = "z-score", aliases = ["standardscaler", "zscore"])]
    ZScore,
    /// Center on the median and divide by the IQR
    #[value(name = "robust", aliases = ["robustscaler"])]
    Robust,
}

impl From<CliNormalization> for NormalizationMethod {
    fn from(cli: CliNormalization) -> Self {
        match cli {
            CliNormalization::Identity => NormalizationMethod::Identity,
            CliNormalization::PercentileRank => NormalizationMethod::PercentileRank,
            CliNormalization::MinMax => NormalizationMethod::MinMax,
            CliNormalization::ZScore => NormalizationMethod::ZScore,
            CliNormalization::Robust => NormalizationMethod::Robust,
        }
    }
}

/// CLI-compatible policy revision enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPolicy {
    /// Mean imputation; no robust scaler
    V1,
    /// Median imputation; all transforms
    V2,
}

impl From<CliPolicy> for PolicyRevision {
    fn from(cli: CliPolicy) -> Self {
        match cli {
            CliPolicy::V1 => PolicyRevision::V1,
            CliPolicy::V2 => PolicyRevision::V2,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Molecular descriptor featurization for SMILES tables",
    long_about = "Computes a fixed set of molecular descriptors for every SMILES string in a CSV \
                  table, reconciles missing values and writes the feature table.\n\n\
                  EXAMPLES:\n  \
                  # Descriptors as CSV\n  \
                  lex-descriptors --input molecules.csv --output_type csv --output_file features\n\n  \
                  # Median-imputed, rank-normalized Parquet\n  \
                  lex-descriptors --input molecules.csv --output_type parquet \\\n    \
                  --output_file out/features --fill_nan true --normalization percentile-rank"
)]
struct Args {
    /// Path to the CSV file with a SMILES column
    #[arg(short, long)]
    input: PathBuf,

    /// Output format: csv or parquet
    #[arg(long = "output_type", alias = "output-type")]
    output_type: String,

    /// Output file name without extension
    #[arg(long = "output_file", alias = "output-file")]
    output_file: PathBuf,

    /// Column-wise transform applied after reconciliation
    #[arg(long, value_enum, ignore_case = true, default_value = "False")]
    normalization: CliNormalization,

    /// Fill missing descriptor values with the column median (mean under policy v1)
    #[arg(
        long = "fill_nan",
        alias = "fill-nan",
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true"
    )]
    fill_nan: bool,

    /// Name of the identifier column
    #[arg(long, default_value = "SMILES")]
    smiles_column: String,

    /// Reconciliation policy revision
    #[arg(long, value_enum, ignore_case = true, default_value = "v2")]
    policy: CliPolicy,

    /// Per-molecule time limit for descriptor computation
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and the final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output the run report as JSON on stdout instead of a human-readable summary
    ///
    /// Disables all logs so the output can be piped, e.g. `... --json | jq .summary`
    #[arg(long)]
    json: bool,

    /// Write the run report next to the output as <output_file>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout carries only JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    // .env may set RUST_LOG, so load it before the subscriber reads the environment
    dotenv().ok();
    init_logging(&args.log_level, args.quiet, args.json);

    match run(&args) {
        Ok(()) => Ok(()),
        Err(e) => {
            if args.json {
                println!("{}", serde_json::json!({ "error": e }));
            } else if e.is_input_error() {
                error!("Invalid input: {}", e);
            } else {
                error!("Featurization failed: {}", e);
            }
            Err(e.into())
        }
    }
}

fn run(args: &Args) -> lex_descriptors::Result<()> {
    // fail on a bad output type before any descriptor work
    let output_format = OutputFormat::from_str(&args.output_type)?;

    let mut builder = FeaturizeConfig::builder()
        .smiles_column(&args.smiles_column)
        .fill_missing(args.fill_nan)
        .normalization(args.normalization.into())
        .policy(args.policy.into())
        .output_format(output_format)
        .output_stem(&args.output_file);
    if let Some(timeout) = args.timeout_ms {
        builder = builder.descriptor_timeout_ms(timeout);
    }
    let config = builder.build()?;

    let pipeline = Pipeline::builder().config(config.clone()).build()?;

    info!("{}", "=".repeat(80));
    info!("Starting descriptor featurization...");
    info!("{}", "=".repeat(80));

    let result = pipeline.run(&args.input)?;

    let report = RunReport::new(
        &args.input,
        pipeline.descriptor_source_name(),
        pipeline.feature_names(),
        &config,
        &result.summary,
    );

    if args.emit_report {
        let path = report_path(&config.output_stem);
        write_report(&report, &path)?;
        info!("Report written to: {}", path.display());
    }

    if args.json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    print_human_readable_summary(&result, &args.input);
    Ok(())
}

/// Print a human-readable summary of the run.
fn print_human_readable_summary(result: &FeaturizeResult, input: &Path) {
    let summary = &result.summary;

    println!();
    println!("{}", "=".repeat(80));
    println!("FEATURIZATION COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!("Input:  {} ({} molecules)", input.display(), summary.rows);
    match &summary.output_path {
        Some(path) => println!(
            "Output: {} ({} rows x {} columns)",
            path.display(),
            result.features.height(),
            result.features.width()
        ),
        None => println!("Output: not written"),
    }
    println!();

    println!("Summary:");
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Featurized: {}/{} ({:.1}%)",
        summary.rows - summary.failed_row_count(),
        summary.rows,
        summary.success_rate() * 100.0
    );
    println!(
        "  Missing cells: {} null, {} non-finite -> {} after reconciliation",
        summary.missing_cells_before, summary.non_finite_cells, summary.missing_cells_after
    );
    if let Some(statistic) = summary.imputation {
        println!(
            "  Imputed cells: {} (column {})",
            summary.imputed_cells,
            statistic.as_str()
        );
    }
    println!("  Normalization: {}", summary.normalization);

    if !summary.notices.is_empty() {
        println!();
        println!("Notices:");
        for notice in &summary.notices {
            println!("  - {}", notice);
        }
    }

    if !summary.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &summary.warnings {
            println!("  - {}", warning);
        }
    }
    println!();
}
