//! Integration tests for the featurization pipeline.
//!
//! These tests run the pipeline end to end against files on disk, using a
//! deterministic descriptor source so expected values can be written down.

use lex_descriptors::{
    ColumnSpec, DescriptorSource, DescriptorType, DescriptorVector, FeaturizeConfig,
    FeaturizeError, InvalidReason, NormalizationMethod, OutputFormat, Pipeline, PipelineStage,
    PolicyRevision, read_table,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Length, carbon count, oxygen count and a constant, derived from the
/// identifier text. Identifiers containing '!' are rejected, '?' yields NaN
/// and 'X' panics.
struct TextSource;

impl DescriptorSource for TextSource {
    fn name(&self) -> &str {
        "Text"
    }

    fn schema(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("Text_calculated", DescriptorType::Bool),
            ColumnSpec::new("Length", DescriptorType::Int),
            ColumnSpec::new("Carbons", DescriptorType::Int),
            ColumnSpec::new("Oxygens", DescriptorType::Int),
            ColumnSpec::float("Constant"),
        ]
    }

    fn process(&self, smiles: &str) -> DescriptorVector {
        if smiles.contains('!') {
            return DescriptorVector::Invalid(InvalidReason::rejected("not a molecule"));
        }
        if smiles.contains('X') {
            panic!("engine crashed on {}", smiles);
        }
        let oxygens = if smiles.contains('?') {
            f64::NAN
        } else {
            smiles.matches('O').count() as f64
        };
        DescriptorVector::Valid(vec![
            smiles.len() as f64,
            smiles.matches('C').count() as f64,
            oxygens,
            1.0,
        ])
    }
}

fn write_input(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("input.csv");
    fs::write(&path, content).expect("Failed to write input");
    path
}

fn config(dir: &TempDir) -> lex_descriptors::FeaturizeConfigBuilder {
    FeaturizeConfig::builder().output_stem(dir.path().join("features"))
}

fn text_pipeline(config: FeaturizeConfig) -> Pipeline {
    Pipeline::builder()
        .config(config)
        .descriptor_source(Arc::new(TextSource))
        .build()
        .expect("Failed to build pipeline")
}

fn values(df: &DataFrame, col: &str) -> Vec<Option<f64>> {
    df.column(col)
        .unwrap()
        .as_materialized_series()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

fn assert_close(actual: &[Option<f64>], expected: &[Option<f64>]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        match (a, e) {
            (Some(a), Some(e)) => assert!((a - e).abs() < 1e-9, "{:?} != {:?}", actual, expected),
            (None, None) => {}
            _ => panic!("{:?} != {:?}", actual, expected),
        }
    }
}

const SCENARIO_A: &str = "SMILES\nCCO\nnot_a_molecule!!\nCCN\n";

// ============================================================================
// End-to-end Scenarios
// ============================================================================

#[test]
fn test_failed_row_is_imputed_with_column_medians() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, SCENARIO_A);
    let config = config(&dir).fill_missing(true).build().unwrap();

    let result = text_pipeline(config).run(&input).unwrap();

    assert_eq!(result.features.height(), 3);
    assert_close(
        &values(&result.features, "Length"),
        &[Some(3.0), Some(3.0), Some(3.0)],
    );
    assert_close(
        &values(&result.features, "Oxygens"),
        &[Some(1.0), Some(0.5), Some(0.0)],
    );
    assert_eq!(result.summary.failed_row_count(), 1);
    assert_eq!(result.summary.failed_rows[0].row, 1);
    assert_eq!(result.summary.missing_cells_after, 0);

    // the persisted table matches the in-memory one
    let written = read_table(&dir.path().join("features.csv")).unwrap();
    assert_eq!(written.shape(), (3, 4));
    assert_close(&values(&written, "Oxygens"), &[Some(1.0), Some(0.5), Some(0.0)]);
}

#[test]
fn test_failed_row_stays_missing_without_fill() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, SCENARIO_A);
    let config = config(&dir).build().unwrap();

    let result = text_pipeline(config).run(&input).unwrap();

    assert_eq!(
        result.summary.notices,
        vec![
            "There are missing (NaN) values in the data.".to_string(),
            "Leaving the missing values as they are.".to_string(),
        ]
    );

    let written = read_table(&dir.path().join("features.csv")).unwrap();
    assert_eq!(written.height(), 3);
    for col in ["Length", "Carbons", "Oxygens", "Constant"] {
        assert_eq!(values(&written, col)[1], None, "column {}", col);
    }
}

#[test]
fn test_missing_identifier_column_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "smiles_string,name\nCCO,ethanol\n");
    let config = config(&dir).build().unwrap();

    let err = text_pipeline(config).run(&input).unwrap_err();

    assert!(matches!(err, FeaturizeError::Schema(ref col) if col == "SMILES"));
    assert!(!dir.path().join("features.csv").exists());
}

#[test]
fn test_empty_identifier_is_a_data_error() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "SMILES,name\nCCO,ethanol\n,unknown\nCCN,ethylamine\n");
    let config = config(&dir).build().unwrap();

    let err = text_pipeline(config).run(&input).unwrap_err();

    match err {
        FeaturizeError::Data {
            column,
            count,
            first_row,
        } => {
            assert_eq!(column, "SMILES");
            assert_eq!(count, 1);
            assert_eq!(first_row, 1);
        }
        other => panic!("Expected a data error, got {}", other),
    }
    assert!(!dir.path().join("features.csv").exists());
}

#[test]
fn test_min_max_on_constant_column_is_zero() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "SMILES\nC\nCC\nCCCO\n");
    let config = config(&dir)
        .normalization(NormalizationMethod::MinMax)
        .build()
        .unwrap();

    let result = text_pipeline(config).run(&input).unwrap();

    assert_close(
        &values(&result.features, "Constant"),
        &[Some(0.0), Some(0.0), Some(0.0)],
    );
    assert_close(
        &values(&result.features, "Length"),
        &[Some(0.0), Some(1.0 / 3.0), Some(1.0)],
    );
}

#[test]
fn test_csv_and_parquet_outputs_agree() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "SMILES\nCCO\nc1ccccc1\nCC(=O)O\nbad!\n");

    let mut tables = Vec::new();
    for format in [OutputFormat::Csv, OutputFormat::Parquet] {
        let config = config(&dir)
            .output_format(format)
            .normalization(NormalizationMethod::ZScore)
            .build()
            .unwrap();
        let result = text_pipeline(config).run(&input).unwrap();
        let path = result.summary.output_path.expect("output path is recorded");
        assert_eq!(path, format.output_path(&dir.path().join("features")));
        tables.push(read_table(&path).unwrap());
    }

    let (csv, parquet) = (&tables[0], &tables[1]);
    assert_eq!(csv.get_column_names(), parquet.get_column_names());
    for col in ["Length", "Carbons", "Oxygens", "Constant"] {
        assert_close(&values(csv, col), &values(parquet, col));
    }
}

// ============================================================================
// Failure Isolation and Reconciliation
// ============================================================================

#[test]
fn test_engine_panic_is_isolated_to_its_row() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "SMILES\nCCO\nCXC\nCCN\n");
    let config = config(&dir).build().unwrap();

    let result = text_pipeline(config).run(&input).unwrap();

    assert_eq!(result.features.height(), 3);
    assert_eq!(result.summary.failed_rows[0].reason, InvalidReason::Panicked);
    assert_eq!(values(&result.features, "Length")[1], None);
}

#[test]
fn test_non_finite_values_are_reconciled() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "SMILES\nCCO\nCC?\nOCCO\n");
    let config = config(&dir).fill_missing(true).build().unwrap();

    let result = text_pipeline(config).run(&input).unwrap();

    assert_eq!(result.summary.non_finite_cells, 1);
    assert_eq!(result.summary.failed_row_count(), 0);
    assert_close(
        &values(&result.features, "Oxygens"),
        &[Some(1.0), Some(1.5), Some(2.0)],
    );
}

#[test]
fn test_mean_imputation_under_v1() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "SMILES\nC\nbad!\nCC\nCCCCCC\n");
    let config = config(&dir)
        .policy(PolicyRevision::V1)
        .fill_missing(true)
        .build()
        .unwrap();

    let result = text_pipeline(config).run(&input).unwrap();

    assert_close(&values(&result.features, "Carbons")[1..2], &[Some(3.0)]);
    assert!(
        result
            .summary
            .notices
            .contains(&"Filling missing values with the mean of each column...".to_string())
    );
}

#[test]
fn test_percentile_rank_output_range() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "SMILES\nC\nCC\nCC\nCCCC\nOCO\n");
    let config = config(&dir)
        .normalization(NormalizationMethod::PercentileRank)
        .build()
        .unwrap();

    let result = text_pipeline(config).run(&input).unwrap();

    for col in ["Length", "Carbons", "Oxygens", "Constant"] {
        for value in values(&result.features, col).into_iter().flatten() {
            assert!(value > 0.0 && value <= 1.0, "{} = {}", col, value);
        }
    }
}

#[test]
fn test_non_csv_input_is_a_format_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.tsv");
    fs::write(&input, "SMILES\nCCO\n").unwrap();
    let config = config(&dir).build().unwrap();

    let err = text_pipeline(config).run(&input).unwrap_err();
    assert_eq!(err.error_code(), "FORMAT_ERROR");
}

#[test]
fn test_unsupported_output_type_string() {
    let err = "xlsx".parse::<OutputFormat>().unwrap_err();
    assert!(matches!(err, FeaturizeError::UnsupportedFormat(_)));
}

#[test]
fn test_progress_covers_every_stage() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, SCENARIO_A);
    let extraction_updates = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&extraction_updates);
    let stages = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);

    let pipeline = Pipeline::builder()
        .config(
            config(&dir)
                .normalization(NormalizationMethod::Robust)
                .build()
                .unwrap(),
        )
        .descriptor_source(Arc::new(TextSource))
        .on_progress(move |update| {
            if update.stage == PipelineStage::Extracting {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            let mut stages = sink.lock().unwrap();
            if stages.last() != Some(&update.stage) {
                stages.push(update.stage);
            }
        })
        .build()
        .unwrap();

    pipeline.run(&input).unwrap();

    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            PipelineStage::Loading,
            PipelineStage::ValidatingSchema,
            PipelineStage::Extracting,
            PipelineStage::Reconciling,
            PipelineStage::Normalizing,
            PipelineStage::Persisting,
            PipelineStage::Complete,
        ]
    );
    // initial update plus one per row
    assert_eq!(extraction_updates.load(Ordering::SeqCst), 4);
}

// ============================================================================
// Built-in Descriptor Engine
// ============================================================================

#[test]
fn test_graph_descriptors_on_fixture() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir)
        .fill_missing(true)
        .output_format(OutputFormat::Parquet)
        .build()
        .unwrap();
    let pipeline = Pipeline::builder().config(config).build().unwrap();

    let result = pipeline
        .run(&fixtures_path().join("molecules.csv"))
        .unwrap();

    assert_eq!(result.features.height(), 8);
    assert_eq!(result.features.width(), pipeline.feature_names().len());
    assert_eq!(result.summary.failed_row_count(), 1);
    assert_eq!(result.summary.failed_rows[0].identifier, "not_a_molecule!!");
    assert_eq!(result.summary.missing_cells_after, 0);

    let written = read_table(&dir.path().join("features.parquet")).unwrap();
    assert_eq!(
        written
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>(),
        pipeline.feature_names()
    );
    assert!(!written.get_column_names().iter().any(|c| c.ends_with("_calculated")));
}

#[test]
fn test_timeout_config_is_honored() {
    let config = FeaturizeConfig::builder()
        .descriptor_timeout_ms(5_000)
        .save_to_disk(false)
        .build()
        .unwrap();
    let table = df!["SMILES" => ["CCO", "c1ccccc1"]].unwrap();

    let result = Pipeline::builder()
        .config(config)
        .build()
        .unwrap()
        .process(table)
        .unwrap();

    assert_eq!(result.summary.failed_row_count(), 0);
    assert!(result.summary.output_path.is_none());
}
