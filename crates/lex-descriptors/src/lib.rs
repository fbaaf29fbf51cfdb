//! Molecular Descriptor Featurization Library
//!
//! Turns a table of SMILES strings into a fixed-width numeric feature table
//! built with Rust and Polars.
//!
//! # Overview
//!
//! - **Descriptor extraction**: one descriptor vector per molecule through a
//!   pluggable [`DescriptorSource`]; engine failures are isolated per row
//! - **Reconciliation**: NaN and infinite values become missing, missing
//!   values are optionally imputed with the column median (or mean)
//! - **Normalization**: percentile rank, min-max, z-score or robust scaling
//! - **Output**: CSV or Parquet, written atomically
//! - **Progress Reporting**: per-stage and per-row progress updates
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_descriptors::{FeaturizeConfig, NormalizationMethod, OutputFormat, Pipeline};
//! use std::path::Path;
//!
//! let config = FeaturizeConfig::builder()
//!     .fill_missing(true)
//!     .normalization(NormalizationMethod::PercentileRank)
//!     .output_format(OutputFormat::Parquet)
//!     .output_stem("results/features")
//!     .build()?;
//!
//! let result = Pipeline::builder()
//!     .config(config)
//!     .build()?
//!     .run(Path::new("molecules.csv"))?;
//!
//! println!("{:?}", result.features.shape());
//! ```
//!
//! # Descriptor Sources
//!
//! The default source is [`GraphDescriptorSource`], which parses SMILES
//! itself and computes constitutional and topological descriptors. Any
//! other engine can be plugged in by implementing [`DescriptorSource`]:
//!
//! ```rust,ignore
//! let pipeline = Pipeline::builder()
//!     .descriptor_source(Arc::new(MyEngine::new()))
//!     .build()?;
//! ```

pub mod config;
pub mod descriptors;
pub mod error;
pub mod io;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod reporting;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{
    ConfigValidationError, FeaturizeConfig, FeaturizeConfigBuilder, ImputationStatistic,
    NormalizationMethod, OutputFormat, PolicyRevision,
};
pub use descriptors::{DescriptorAdapter, DescriptorSource, GraphDescriptorSource};
pub use error::{FeaturizeError, Result, ResultExt};
pub use io::{load_table, read_table, write_table};
pub use normalize::{NormalizeReport, Normalizer};
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineStage, ProgressReporter,
    ProgressUpdate,
};
pub use reconcile::{ImputationReport, MissingScan, ReconcileReport, Reconciler};
pub use reporting::{RunReport, report_path, write_report};
pub use types::{
    ColumnSpec, DescriptorType, DescriptorVector, FeaturizeResult, InvalidReason, RowFailure,
    RunSummary, StatisticStage, UndefinedStatistic,
};
