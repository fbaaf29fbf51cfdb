//! Configuration types for the featurization pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use crate::error::FeaturizeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Column-wise transform applied after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizationMethod {
    /// Leave values unchanged
    #[default]
    Identity,
    /// Fractional rank within the column, ties averaged, in (0, 1]
    PercentileRank,
    /// (x - min) / (max - min)
    MinMax,
    /// (x - mean) / std
    ZScore,
    /// (x - median) / IQR
    Robust,
}

impl NormalizationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::PercentileRank => "percentile-rank",
            Self::MinMax => "min-max",
            Self::ZScore => "z-score",
            Self::Robust => "robust",
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }
}

impl fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted table format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma-separated values with a header row
    #[default]
    Csv,
    /// Apache Parquet
    Parquet,
}

impl OutputFormat {
    /// File extension used for this format (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }

    /// Output path for a file stem, e.g. `results/features` -> `results/features.csv`.
    pub fn output_path(&self, stem: &Path) -> PathBuf {
        let mut name = stem.as_os_str().to_os_string();
        name.push(".");
        name.push(self.extension());
        PathBuf::from(name)
    }
}

impl FromStr for OutputFormat {
    type Err = FeaturizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            _ => Err(FeaturizeError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Statistic used to fill missing numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImputationStatistic {
    /// Median of the non-missing values (robust to heavy-tailed descriptors)
    Median,
    /// Arithmetic mean of the non-missing values
    Mean,
}

impl ImputationStatistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Median => "median",
            Self::Mean => "mean",
        }
    }
}

/// Reconciliation and scaling policy revision.
///
/// `V1` imputes with the column mean and offers three transforms.
/// `V2` imputes with the column median and adds the robust scaler.
/// Both revisions rewrite non-finite values to missing before any
/// statistic is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PolicyRevision {
    V1,
    #[default]
    V2,
}

impl PolicyRevision {
    /// Statistic used for imputation under this revision.
    pub fn imputation_statistic(&self) -> ImputationStatistic {
        match self {
            Self::V1 => ImputationStatistic::Mean,
            Self::V2 => ImputationStatistic::Median,
        }
    }

    /// Whether this revision offers the given transform.
    pub fn supports(&self, method: NormalizationMethod) -> bool {
        match self {
            Self::V1 => method != NormalizationMethod::Robust,
            Self::V2 => true,
        }
    }
}

/// Configuration for the featurization pipeline.
///
/// Use [`FeaturizeConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lex_descriptors::config::{FeaturizeConfig, NormalizationMethod, OutputFormat};
///
/// let config = FeaturizeConfig::builder()
///     .fill_missing(true)
///     .normalization(NormalizationMethod::MinMax)
///     .output_format(OutputFormat::Parquet)
///     .output_stem("results/features")
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturizeConfig {
    /// Name of the column holding the SMILES identifiers.
    /// Default: "SMILES"
    pub smiles_column: String,

    /// Whether to impute missing values after extraction.
    /// Default: false
    pub fill_missing: bool,

    /// Transform applied after reconciliation.
    /// Default: Identity
    pub normalization: NormalizationMethod,

    /// Reconciliation policy revision.
    /// Default: V2
    pub policy: PolicyRevision,

    /// Persisted table format.
    /// Default: Csv
    pub output_format: OutputFormat,

    /// Output path without extension.
    /// Default: "features"
    pub output_stem: PathBuf,

    /// Per-molecule time limit for the descriptor engine in milliseconds.
    /// A molecule exceeding it is treated as invalid.
    /// Default: None (no limit)
    pub descriptor_timeout_ms: Option<u64>,

    /// Whether `Pipeline::run` writes the feature table to disk.
    /// Default: true
    pub save_to_disk: bool,
}

impl Default for FeaturizeConfig {
    fn default() -> Self {
        Self {
            smiles_column: "SMILES".to_string(),
            fill_missing: false,
            normalization: NormalizationMethod::default(),
            policy: PolicyRevision::default(),
            output_format: OutputFormat::default(),
            output_stem: PathBuf::from("features"),
            descriptor_timeout_ms: None,
            save_to_disk: true,
        }
    }
}

impl FeaturizeConfig {
    /// Create a new configuration builder.
    pub fn builder() -> FeaturizeConfigBuilder {
        FeaturizeConfigBuilder::default()
    }

    /// Full output path: `output_stem` plus the format's extension.
    pub fn output_path(&self) -> PathBuf {
        self.output_format.output_path(&self.output_stem)
    }

    /// Descriptor timeout as a `Duration`, if set.
    pub fn descriptor_timeout(&self) -> Option<Duration> {
        self.descriptor_timeout_ms.map(Duration::from_millis)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.smiles_column.trim().is_empty() {
            return Err(ConfigValidationError::EmptyColumnName);
        }

        if self.descriptor_timeout_ms == Some(0) {
            return Err(ConfigValidationError::ZeroTimeout);
        }

        if !self.policy.supports(self.normalization) {
            return Err(ConfigValidationError::UnsupportedNormalization {
                method: self.normalization,
                policy: self.policy,
            });
        }

        if self.save_to_disk && self.output_stem.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyOutputStem);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Identifier column name must not be empty")]
    EmptyColumnName,

    #[error("Descriptor timeout must be at least 1 ms")]
    ZeroTimeout,

    #[error("Normalization '{method}' is not available under policy {policy:?}")]
    UnsupportedNormalization {
        method: NormalizationMethod,
        policy: PolicyRevision,
    },

    #[error("Output file name must not be empty")]
    EmptyOutputStem,
}

/// Builder for [`FeaturizeConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct FeaturizeConfigBuilder {
    smiles_column: Option<String>,
    fill_missing: Option<bool>,
    normalization: Option<NormalizationMethod>,
    policy: Option<PolicyRevision>,
    output_format: Option<OutputFormat>,
    output_stem: Option<PathBuf>,
    descriptor_timeout_ms: Option<u64>,
    save_to_disk: Option<bool>,
}

impl FeaturizeConfigBuilder {
    /// Set the name of the identifier column.
    pub fn smiles_column(mut self, column: impl Into<String>) -> Self {
        self.smiles_column = Some(column.into());
        self
    }

    /// Enable or disable imputation of missing values.
    pub fn fill_missing(mut self, fill: bool) -> Self {
        self.fill_missing = Some(fill);
        self
    }

    /// Set the normalization transform.
    pub fn normalization(mut self, method: NormalizationMethod) -> Self {
        self.normalization = Some(method);
        self
    }

    /// Set the reconciliation policy revision.
    pub fn policy(mut self, policy: PolicyRevision) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Set the persisted table format.
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Set the output path without extension.
    pub fn output_stem(mut self, stem: impl Into<PathBuf>) -> Self {
        self.output_stem = Some(stem.into());
        self
    }

    /// Set a per-molecule time limit for the descriptor engine.
    pub fn descriptor_timeout_ms(mut self, millis: u64) -> Self {
        self.descriptor_timeout_ms = Some(millis);
        self
    }

    /// Enable or disable writing the feature table to disk.
    ///
    /// When false, `Pipeline::run` keeps results in memory only.
    pub fn save_to_disk(mut self, save: bool) -> Self {
        self.save_to_disk = Some(save);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `FeaturizeConfig` or an error if validation fails.
    pub fn build(self) -> Result<FeaturizeConfig, ConfigValidationError> {
        let config = FeaturizeConfig {
            smiles_column: self.smiles_column.unwrap_or_else(|| "SMILES".to_string()),
            fill_missing: self.fill_missing.unwrap_or(false),
            normalization: self.normalization.unwrap_or_default(),
            policy: self.policy.unwrap_or_default(),
            output_format: self.output_format.unwrap_or_default(),
            output_stem: self
                .output_stem
                .unwrap_or_else(|| PathBuf::from("features")),
            descriptor_timeout_ms: self.descriptor_timeout_ms,
            save_to_disk: self.save_to_disk.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FeaturizeConfig::default();
        assert_eq!(config.smiles_column, "SMILES");
        assert!(!config.fill_missing);
        assert_eq!(config.normalization, NormalizationMethod::Identity);
        assert_eq!(config.policy, PolicyRevision::V2);
        assert_eq!(config.output_format, OutputFormat::Csv);
        assert!(config.descriptor_timeout().is_none());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = FeaturizeConfig::builder()
            .smiles_column("smiles")
            .fill_missing(true)
            .normalization(NormalizationMethod::ZScore)
            .output_format(OutputFormat::Parquet)
            .output_stem("out/features")
            .descriptor_timeout_ms(250)
            .build()
            .unwrap();

        assert_eq!(config.smiles_column, "smiles");
        assert!(config.fill_missing);
        assert_eq!(config.normalization, NormalizationMethod::ZScore);
        assert_eq!(config.output_path(), PathBuf::from("out/features.parquet"));
        assert_eq!(config.descriptor_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_validation_empty_column() {
        let result = FeaturizeConfig::builder().smiles_column("  ").build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyColumnName
        ));
    }

    #[test]
    fn test_validation_zero_timeout() {
        let result = FeaturizeConfig::builder().descriptor_timeout_ms(0).build();
        assert!(matches!(result.unwrap_err(), ConfigValidationError::ZeroTimeout));
    }

    #[test]
    fn test_robust_requires_v2() {
        let result = FeaturizeConfig::builder()
            .policy(PolicyRevision::V1)
            .normalization(NormalizationMethod::Robust)
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::UnsupportedNormalization { .. }
        ));

        assert!(
            FeaturizeConfig::builder()
                .policy(PolicyRevision::V2)
                .normalization(NormalizationMethod::Robust)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_policy_statistics() {
        assert_eq!(
            PolicyRevision::V1.imputation_statistic(),
            ImputationStatistic::Mean
        );
        assert_eq!(
            PolicyRevision::V2.imputation_statistic(),
            ImputationStatistic::Median
        );
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!(
            "Parquet".parse::<OutputFormat>().unwrap(),
            OutputFormat::Parquet
        );

        let err = "xlsx".parse::<OutputFormat>().unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "smiles_column": "SMILES",
            "fill_missing": true,
            "normalization": "percentile-rank",
            "policy": "v2",
            "output_format": "parquet",
            "output_stem": "custom/out",
            "descriptor_timeout_ms": 1000,
            "save_to_disk": false
        }"#;

        let config: FeaturizeConfig =
            serde_json::from_str(json).expect("Should deserialize from JSON");

        assert!(config.fill_missing);
        assert_eq!(config.normalization, NormalizationMethod::PercentileRank);
        assert_eq!(config.output_format, OutputFormat::Parquet);
        assert_eq!(config.descriptor_timeout_ms, Some(1000));
        assert!(!config.save_to_disk);
    }
}
