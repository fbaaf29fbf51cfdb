//! JSON run reports.
//!
//! A [`RunReport`] bundles the configuration, the feature column names and
//! the [`RunSummary`] of a run. The CLI prints it with `--json` and writes
//! it next to the feature table with `--emit-report`.

use crate::config::FeaturizeConfig;
use crate::error::Result;
use crate::types::RunSummary;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything about one run, ready for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    pub input_file: String,
    /// Path to the feature table, if one was written
    pub output_file: Option<String>,
    /// Name of the descriptor engine
    pub descriptor_source: String,
    pub feature_columns: Vec<String>,
    pub config: FeaturizeConfig,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn new(
        input_file: &Path,
        descriptor_source: impl Into<String>,
        feature_columns: Vec<String>,
        config: &FeaturizeConfig,
        summary: &RunSummary,
    ) -> Self {
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input_file: input_file.display().to_string(),
            output_file: summary
                .output_path
                .as_ref()
                .map(|p| p.display().to_string()),
            descriptor_source: descriptor_source.into(),
            feature_columns,
            config: config.clone(),
            summary: summary.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Report location for an output stem: `results/features` -> `results/features_report.json`.
pub fn report_path(output_stem: &Path) -> PathBuf {
    let mut name = output_stem.as_os_str().to_os_string();
    name.push("_report.json");
    PathBuf::from(name)
}

/// Write a report as pretty-printed JSON.
pub fn write_report(report: &RunReport, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(report.to_json()?.as_bytes())?;

    info!("Report saved: {}", path.display());
    Ok(path.to_path_buf())
}
