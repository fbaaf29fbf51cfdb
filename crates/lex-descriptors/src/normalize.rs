//! Column-wise normalization of the feature matrix.
//!
//! Every transform is fitted on the column it rewrites, keeps the column
//! name and height, and leaves null cells null. Constant columns, and
//! columns whose spread is negligible next to their magnitude, use a scale
//! of 1 centered on the constant, so the affine transforms map them to 0.

use crate::config::NormalizationMethod;
use crate::error::Result;
use crate::types::{StatisticStage, UndefinedStatistic};
use crate::utils::{average_ranks, column_names, column_values, finite_series, finite_values, float_series};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Spreads at or below this fraction of the column magnitude
/// (`max(|min|, |max|, 1)`) are treated as zero.
pub const ZERO_SPREAD_TOLERANCE: f64 = 10.0 * f64::EPSILON;

/// Location and scale a column was transformed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScaling {
    pub column: String,
    pub center: f64,
    pub scale: f64,
    /// Spread was zero and the scale fell back to 1
    pub degenerate: bool,
}

/// What normalization did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub method: NormalizationMethod,
    /// Fitted parameters per column (empty for identity and percentile rank)
    pub scalings: Vec<ColumnScaling>,
    /// Columns left missing because they had no valid values
    pub undefined: Vec<UndefinedStatistic>,
}

impl NormalizeReport {
    /// Columns whose spread was zero.
    pub fn degenerate_columns(&self) -> Vec<&str> {
        self.scalings
            .iter()
            .filter(|s| s.degenerate)
            .map(|s| s.column.as_str())
            .collect()
    }
}

/// Applies a [`NormalizationMethod`] to every column of a feature matrix.
pub struct Normalizer;

impl Normalizer {
    pub fn apply(df: &DataFrame, method: NormalizationMethod) -> Result<(DataFrame, NormalizeReport)> {
        let mut report = NormalizeReport {
            method,
            ..Default::default()
        };
        if method.is_identity() {
            return Ok((df.clone(), report));
        }

        info!("Applying {} normalization", method);
        let mut result = df.clone();

        for col_name in column_names(df) {
            let values = column_values(df, &col_name)?;
            let valid = finite_series(&col_name, &values);

            if valid.is_empty() {
                warn!(
                    "Column '{}' has no valid values; {} normalization leaves it missing",
                    col_name, method
                );
                report.undefined.push(UndefinedStatistic {
                    column: col_name.clone(),
                    stage: StatisticStage::Normalization,
                });
                let nulls: Vec<Option<f64>> = vec![None; values.len()];
                result.replace(&col_name, float_series(&col_name, nulls))?;
                continue;
            }

            let transformed = match method {
                NormalizationMethod::Identity => values,
                NormalizationMethod::PercentileRank => percentile_rank(&values),
                NormalizationMethod::MinMax | NormalizationMethod::ZScore | NormalizationMethod::Robust => {
                    let scaling = fit_scaling(&col_name, &valid, method)?;
                    if scaling.degenerate {
                        debug!("Column '{}' has zero spread; using scale 1", col_name);
                    }
                    let scaled = values
                        .iter()
                        .map(|v| {
                            v.filter(|x| x.is_finite())
                                .map(|x| (x - scaling.center) / scaling.scale)
                        })
                        .collect();
                    report.scalings.push(scaling);
                    scaled
                }
            };

            result.replace(&col_name, float_series(&col_name, transformed))?;
        }

        Ok((result, report))
    }
}

/// Fractional rank among valid values, ties averaged, in (0, 1].
fn percentile_rank(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let valid = finite_values(values);
    let count = valid.len() as f64;
    let mut ranks = average_ranks(&valid).into_iter();

    values
        .iter()
        .map(|v| match v {
            Some(x) if x.is_finite() => ranks.next().map(|r| r / count),
            _ => None,
        })
        .collect()
}

/// Center and scale for the affine transforms. `valid` is the non-empty,
/// null-free Float64 series of the column's finite values.
fn fit_scaling(col_name: &str, valid: &Series, method: NormalizationMethod) -> Result<ColumnScaling> {
    let ca = valid.f64()?;
    let min = ca.min().unwrap_or(0.0);
    let max = ca.max().unwrap_or(0.0);

    let (center, spread) = match method {
        NormalizationMethod::MinMax => (min, max - min),
        NormalizationMethod::ZScore => (valid.mean().unwrap_or(0.0), valid.std(0).unwrap_or(0.0)),
        _ => {
            let q1 = ca.quantile(0.25, QuantileMethod::Linear)?.unwrap_or(0.0);
            let q3 = ca.quantile(0.75, QuantileMethod::Linear)?.unwrap_or(0.0);
            (valid.median().unwrap_or(0.0), q3 - q1)
        }
    };

    // rounding in mean/std leaves a residual spread on constant columns
    let magnitude = min.abs().max(max.abs()).max(1.0);
    let constant = min == max;
    let degenerate = constant || spread.abs() <= ZERO_SPREAD_TOLERANCE * magnitude;

    Ok(ColumnScaling {
        column: col_name.to_string(),
        center: if constant { min } else { center },
        scale: if degenerate { 1.0 } else { spread },
        degenerate,
    })
}
