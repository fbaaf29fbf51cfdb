//! Shared utilities for the featurization pipeline.
//!
//! Column access helpers for `Float64` feature columns. Column statistics
//! come from polars aggregations on [`finite_series`]; only the tie-averaged
//! ranking is computed here.

use polars::prelude::*;

// =============================================================================
// Column Utilities
// =============================================================================

/// Column names of a DataFrame as owned strings.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Read a column as `Option<f64>` cells, casting to Float64 when needed.
///
/// NaN and infinities are returned as-is; only nulls become `None`.
pub fn column_values(df: &DataFrame, col_name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = df.column(col_name)?.as_materialized_series();
    let casted = series.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

/// Build a Float64 series from optional cells.
pub fn float_series(col_name: &str, values: Vec<Option<f64>>) -> Series {
    Series::new(col_name.into(), values)
}

/// Whether a cell counts as missing: null, NaN or infinite.
#[inline]
pub fn is_missing(value: Option<f64>) -> bool {
    !matches!(value, Some(v) if v.is_finite())
}

/// Finite values of a column, in row order.
pub fn finite_values(values: &[Option<f64>]) -> Vec<f64> {
    values
        .iter()
        .filter_map(|v| v.filter(|x| x.is_finite()))
        .collect()
}

/// Finite cells of a column as a null-free Float64 series, ready for the
/// polars aggregations (`median`, `mean`, `std`, `quantile`).
pub fn finite_series(col_name: &str, values: &[Option<f64>]) -> Series {
    Series::new(col_name.into(), finite_values(values))
}

// =============================================================================
// Ranking
// =============================================================================

/// Average ranks (1-based) of `values`, ties receiving the mean of their ranks.
///
/// Returned ranks are in the same order as the input.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        // positions start..=end share the rank ((start + 1) + (end + 1)) / 2
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = rank;
        }
        start = end + 1;
    }
    ranks
}

// =============================================================================
// Tests
// =============================================================================
