//! Shared types for the featurization pipeline.

use crate::config::{ImputationStatistic, NormalizationMethod};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Descriptor Types
// ============================================================================

/// Value type of a descriptor schema entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorType {
    Bool,
    Int,
    Float,
}

/// One entry of a descriptor source's column schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: DescriptorType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, dtype: DescriptorType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, DescriptorType::Float)
    }
}

/// Why a molecule produced no descriptor vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidReason {
    /// The engine could not process the identifier.
    Rejected { message: String },
    /// The engine panicked while processing the identifier.
    Panicked,
    /// The engine did not finish within the configured time limit.
    TimedOut { limit_ms: u64 },
    /// The engine returned a vector of the wrong length.
    WidthMismatch { expected: usize, actual: usize },
}

impl InvalidReason {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { message } => write!(f, "rejected: {}", message),
            Self::Panicked => f.write_str("descriptor engine panicked"),
            Self::TimedOut { limit_ms } => write!(f, "timed out after {} ms", limit_ms),
            Self::WidthMismatch { expected, actual } => {
                write!(f, "expected {} values, got {}", expected, actual)
            }
        }
    }
}

/// Result of computing descriptors for one identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorVector {
    /// Ordered descriptor values, one per feature column.
    Valid(Vec<f64>),
    /// No values could be computed; the whole row becomes missing.
    Invalid(InvalidReason),
}

impl DescriptorVector {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Values if valid.
    pub fn values(&self) -> Option<&[f64]> {
        match self {
            Self::Valid(values) => Some(values),
            Self::Invalid(_) => None,
        }
    }
}

// ============================================================================
// Report Types
// ============================================================================

/// A row whose descriptor computation failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFailure {
    /// Zero-based row index in the input table
    pub row: usize,
    /// The identifier that failed
    pub identifier: String,
    pub reason: InvalidReason,
}

/// Stage at which a column statistic was needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticStage {
    Imputation,
    Normalization,
}

/// A column for which no central tendency or spread could be computed
/// because it has no valid values. Its cells are left missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndefinedStatistic {
    pub column: String,
    pub stage: StatisticStage,
}

/// Summary of a single featurization run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of input rows (always equal to the number of output rows)
    pub rows: usize,
    /// Number of descriptor columns in the feature table
    pub feature_columns: usize,
    /// Rows whose extraction failed
    pub failed_rows: Vec<RowFailure>,
    /// Missing cells right after extraction (null, not counting non-finite)
    pub missing_cells_before: usize,
    /// Non-finite cells right after extraction
    pub non_finite_cells: usize,
    /// Missing cells after reconciliation
    pub missing_cells_after: usize,
    /// Number of cells filled by imputation
    pub imputed_cells: usize,
    /// Statistic used for imputation, if imputation ran
    pub imputation: Option<ImputationStatistic>,
    /// Transform applied to the feature table
    pub normalization: NormalizationMethod,
    /// Columns whose statistic was undefined
    pub undefined_statistics: Vec<UndefinedStatistic>,
    /// Human-readable data quality notices
    pub notices: Vec<String>,
    /// Warnings raised during the run
    pub warnings: Vec<String>,
    /// Where the feature table was written, if it was
    pub output_path: Option<PathBuf>,
    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn new(rows: usize, feature_columns: usize) -> Self {
        Self {
            rows,
            feature_columns,
            ..Default::default()
        }
    }

    pub fn failed_row_count(&self) -> usize {
        self.failed_rows.len()
    }

    /// Fraction of rows that produced descriptors (1.0 for an empty table).
    pub fn success_rate(&self) -> f64 {
        if self.rows == 0 {
            return 1.0;
        }
        (self.rows - self.failed_rows.len()) as f64 / self.rows as f64
    }

    pub fn add_notice(&mut self, notice: impl Into<String>) {
        self.notices.push(notice.into());
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Output of a pipeline run: the feature table and what happened.
#[derive(Debug, Clone)]
pub struct FeaturizeResult {
    /// One row per input row, one `Float64` column per descriptor
    pub features: DataFrame,
    pub summary: RunSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_vector_values() {
        let valid = DescriptorVector::Valid(vec![1.0, 2.0]);
        assert!(valid.is_valid());
        assert_eq!(valid.values(), Some(&[1.0, 2.0][..]));

        let invalid = DescriptorVector::Invalid(InvalidReason::Panicked);
        assert!(!invalid.is_valid());
        assert!(invalid.values().is_none());
    }

    #[test]
    fn test_invalid_reason_display() {
        let reason = InvalidReason::WidthMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(reason.to_string(), "expected 3 values, got 2");
        assert_eq!(
            InvalidReason::TimedOut { limit_ms: 50 }.to_string(),
            "timed out after 50 ms"
        );
    }

    #[test]
    fn test_invalid_reason_serialization() {
        let json = serde_json::to_string(&InvalidReason::rejected("bad ring")).unwrap();
        assert!(json.contains("\"kind\":\"rejected\""));
        assert!(json.contains("bad ring"));
    }

    #[test]
    fn test_success_rate() {
        let mut summary = RunSummary::new(4, 10);
        assert_eq!(summary.success_rate(), 1.0);

        summary.failed_rows.push(RowFailure {
            row: 2,
            identifier: "X".to_string(),
            reason: InvalidReason::Panicked,
        });
        assert_eq!(summary.failed_row_count(), 1);
        assert_eq!(summary.success_rate(), 0.75);

        assert_eq!(RunSummary::new(0, 10).success_rate(), 1.0);
    }
}
