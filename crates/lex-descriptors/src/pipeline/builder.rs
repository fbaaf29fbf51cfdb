//! Featurization pipeline and its builder.
//!
//! Stages run in a fixed order: LOAD, VALIDATE_SCHEMA, EXTRACT, RECONCILE,
//! NORMALIZE (skipped for identity), PERSIST (skipped when not saving).
//! Each stage returns a new `DataFrame`; row `i` of the feature table
//! always corresponds to row `i` of the input.

use crate::config::FeaturizeConfig;
use crate::descriptors::{DescriptorAdapter, DescriptorSource, GraphDescriptorSource};
use crate::error::{FeaturizeError, Result, ResultExt};
use crate::io;
use crate::normalize::Normalizer;
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::reconcile::Reconciler;
use crate::types::{DescriptorVector, FeaturizeResult, RowFailure, RunSummary};
use crate::utils::float_series;
use polars::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Number of progress updates emitted during extraction.
const EXTRACTION_PROGRESS_STEPS: usize = 100;

/// The featurization pipeline.
///
/// Use [`Pipeline::builder()`] to create a pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use lex_descriptors::{FeaturizeConfig, NormalizationMethod, Pipeline};
/// use std::path::Path;
///
/// let config = FeaturizeConfig::builder()
///     .fill_missing(true)
///     .normalization(NormalizationMethod::PercentileRank)
///     .output_stem("results/features")
///     .build()?;
///
/// let result = Pipeline::builder()
///     .config(config)
///     .on_progress(|update| println!("[{:.0}%] {}", update.progress * 100.0, update.message))
///     .build()?
///     .run(Path::new("molecules.csv"))?;
///
/// println!("{} rows, {} failed", result.summary.rows, result.summary.failed_row_count());
/// ```
pub struct Pipeline {
    config: FeaturizeConfig,
    adapter: DescriptorAdapter,
    reconciler: Reconciler,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &FeaturizeConfig {
        &self.config
    }

    /// Name of the descriptor engine.
    pub fn descriptor_source_name(&self) -> &str {
        self.adapter.source_name()
    }

    /// Names of the feature columns this pipeline produces.
    pub fn feature_names(&self) -> Vec<String> {
        self.adapter.feature_names()
    }

    /// Load a CSV file, featurize it and persist the feature table.
    ///
    /// Nothing is written when any stage before PERSIST fails.
    pub fn run(&self, input: &Path) -> Result<FeaturizeResult> {
        self.finish(self.run_internal(input))
    }

    /// Featurize an in-memory table without touching the filesystem.
    pub fn process(&self, table: DataFrame) -> Result<FeaturizeResult> {
        let start_time = Instant::now();
        self.finish(self.process_table(&table).map(|(features, mut summary)| {
            summary.duration_ms = start_time.elapsed().as_millis() as u64;
            FeaturizeResult { features, summary }
        }))
    }

    fn finish(&self, result: Result<FeaturizeResult>) -> Result<FeaturizeResult> {
        match result {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete(format!(
                    "Featurized {} molecules",
                    result.summary.rows
                )));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self, input: &Path) -> Result<FeaturizeResult> {
        let start_time = Instant::now();

        info!("Step 1: Loading {}", input.display());
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            0.0,
            format!("Loading {}", input.display()),
        ));
        let table = io::load_table(input)?;

        let (mut features, mut summary) = self.process_table(&table)?;

        if self.config.save_to_disk {
            let output_path = self.config.output_path();
            info!("Step 6: Writing {}", output_path.display());
            self.report_progress(ProgressUpdate::new(
                PipelineStage::Persisting,
                0.0,
                format!("Writing {}", output_path.display()),
            ));
            let written = io::write_table(&mut features, self.config.output_format, &output_path)
                .context(format!("Writing {}", output_path.display()))?;
            summary.output_path = Some(written);
        } else {
            debug!("Skipping persistence (save_to_disk = false)");
        }

        summary.duration_ms = start_time.elapsed().as_millis() as u64;
        Ok(FeaturizeResult { features, summary })
    }

    /// VALIDATE_SCHEMA, EXTRACT, RECONCILE and NORMALIZE.
    fn process_table(&self, table: &DataFrame) -> Result<(DataFrame, RunSummary)> {
        info!("Step 2: Validating identifier column '{}'", self.config.smiles_column);
        self.report_progress(ProgressUpdate::new(
            PipelineStage::ValidatingSchema,
            0.0,
            "Validating input table",
        ));
        let identifiers = self.validate_schema(table)?;

        let mut summary = RunSummary::new(identifiers.len(), self.adapter.width());

        info!(
            "Step 3: Computing {} descriptors with '{}' for {} molecules",
            self.adapter.width(),
            self.adapter.source_name(),
            identifiers.len()
        );
        let features = self.extract(&identifiers, &mut summary)?;

        info!("Step 4: Reconciling missing values");
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Reconciling,
            0.0,
            "Checking for missing values",
        ));
        let (features, reconcile_report) =
            self.reconciler.reconcile(&features, self.config.fill_missing)?;

        summary.missing_cells_before = reconcile_report.scan.null_cells;
        summary.non_finite_cells = reconcile_report.scan.non_finite_cells;
        summary.missing_cells_after = reconcile_report.missing_after;
        summary.imputed_cells = reconcile_report.imputation.imputed_cells;
        summary.imputation = reconcile_report.imputation.statistic;
        summary
            .undefined_statistics
            .extend(reconcile_report.imputation.undefined);
        for notice in reconcile_report.notices {
            summary.add_notice(notice);
        }
        for warning in reconcile_report.warnings {
            summary.add_warning(warning);
        }

        let method = self.config.normalization;
        summary.normalization = method;
        let features = if method.is_identity() {
            info!("Step 5: Skipping normalization");
            features
        } else if features.height() == 0 {
            info!("Step 5: Skipping normalization of an empty table");
            features
        } else {
            info!("Step 5: Applying {} normalization", method);
            self.report_progress(ProgressUpdate::new(
                PipelineStage::Normalizing,
                0.0,
                format!("Applying {} normalization", method),
            ));
            let (normalized, report) = Normalizer::apply(&features, method)?;
            for column in report.degenerate_columns() {
                summary.add_warning(format!(
                    "Column '{}' has zero spread; scaled with 1 around its center",
                    column
                ));
            }
            for undefined in &report.undefined {
                summary.add_warning(format!(
                    "Column '{}' has no valid values and was not normalized",
                    undefined.column
                ));
            }
            summary.undefined_statistics.extend(report.undefined);
            normalized
        };

        if features.height() != summary.rows {
            return Err(FeaturizeError::Internal(format!(
                "feature table has {} rows for {} input rows",
                features.height(),
                summary.rows
            )));
        }

        Ok((features, summary))
    }

    /// Check the identifier column and return its values.
    ///
    /// Fails with `Schema` when the column is absent and with `Data` when
    /// any cell is null or blank.
    fn validate_schema(&self, table: &DataFrame) -> Result<Vec<String>> {
        let col_name = &self.config.smiles_column;
        let column = table
            .column(col_name)
            .map_err(|_| FeaturizeError::Schema(col_name.clone()))?;

        let as_strings = column
            .as_materialized_series()
            .cast(&DataType::String)
            .context(format!("Reading column '{}'", col_name))?;
        let cells = as_strings.str().context(format!("Reading column '{}'", col_name))?;

        let mut identifiers = Vec::with_capacity(cells.len());
        let mut empty_rows = Vec::new();
        for (row, cell) in cells.into_iter().enumerate() {
            match cell.map(str::trim) {
                Some(smiles) if !smiles.is_empty() => identifiers.push(smiles.to_string()),
                _ => empty_rows.push(row),
            }
        }

        if let Some(&first_row) = empty_rows.first() {
            return Err(FeaturizeError::Data {
                column: col_name.clone(),
                count: empty_rows.len(),
                first_row,
            });
        }

        debug!("Identifier column '{}' has {} entries", col_name, identifiers.len());
        Ok(identifiers)
    }

    /// Compute one descriptor vector per identifier and assemble the
    /// feature matrix. Invalid rows become all-null rows.
    fn extract(&self, identifiers: &[String], summary: &mut RunSummary) -> Result<DataFrame> {
        let total = identifiers.len();
        let width = self.adapter.width();
        let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(total); width];
        let report_every = (total / EXTRACTION_PROGRESS_STEPS).max(1);

        self.report_progress(ProgressUpdate::with_items(
            PipelineStage::Extracting,
            0,
            total,
            "Computing descriptors",
        ));

        for (row, smiles) in identifiers.iter().enumerate() {
            match self.adapter.compute(smiles) {
                DescriptorVector::Valid(values) => {
                    for (column, value) in columns.iter_mut().zip(values) {
                        column.push(Some(value));
                    }
                }
                DescriptorVector::Invalid(reason) => {
                    debug!("Row {} ('{}') produced no descriptors: {}", row, smiles, reason);
                    for column in columns.iter_mut() {
                        column.push(None);
                    }
                    summary.failed_rows.push(RowFailure {
                        row,
                        identifier: smiles.clone(),
                        reason,
                    });
                }
            }

            let done = row + 1;
            if done % report_every == 0 || done == total {
                self.report_progress(ProgressUpdate::with_items(
                    PipelineStage::Extracting,
                    done,
                    total,
                    format!("Computed descriptors for {}/{} molecules", done, total),
                ));
            }
        }

        if let Some(first) = summary.failed_rows.first() {
            let message = format!(
                "{} of {} molecules could not be featurized (first: row {} '{}', {})",
                summary.failed_rows.len(),
                total,
                first.row,
                first.identifier,
                first.reason
            );
            warn!("{}", message);
            summary.add_warning(message);
        }

        let columns: Vec<Column> = self
            .adapter
            .feature_names()
            .iter()
            .zip(columns)
            .map(|(name, values)| float_series(name, values).into_column())
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<FeaturizeConfig>,
    descriptor_source: Option<Arc<dyn DescriptorSource>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: FeaturizeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the descriptor engine. Defaults to [`GraphDescriptorSource`].
    pub fn descriptor_source(mut self, source: Arc<dyn DescriptorSource>) -> Self {
        self.descriptor_source = Some(source);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration does not validate and
    /// `DescriptorSchema` if the descriptor source reports no columns.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let source = self
            .descriptor_source
            .unwrap_or_else(|| Arc::new(GraphDescriptorSource::new()));
        let adapter = DescriptorAdapter::new(source)?.with_timeout(config.descriptor_timeout());

        Ok(Pipeline {
            reconciler: Reconciler::new(config.policy),
            config,
            adapter,
            progress_reporter: self.progress_reporter,
        })
    }
}
