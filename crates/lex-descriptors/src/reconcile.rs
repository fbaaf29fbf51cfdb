//! Missing and invalid value reconciliation.
//!
//! Descriptor engines can emit nulls (failed rows) as well as NaN or
//! infinite values (e.g. a division inside a descriptor). The reconciler
//! treats both kinds as missing: non-finite cells are rewritten to null
//! before any column statistic is computed, then nulls are optionally
//! filled with the column median (policy V2) or mean (policy V1).

use crate::config::{ImputationStatistic, PolicyRevision};
use crate::error::Result;
use crate::types::{StatisticStage, UndefinedStatistic};
use crate::utils::{column_names, column_values, finite_series, float_series, is_missing};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const NO_MISSING_NOTICE: &str = "There are no missing values in the data.";
pub const MISSING_NOTICE: &str = "There are missing (NaN) values in the data.";
pub const LEAVING_NOTICE: &str = "Leaving the missing values as they are.";

/// Notice emitted when imputation is about to run.
pub fn filling_notice(statistic: ImputationStatistic) -> String {
    format!(
        "Filling missing values with the {} of each column...",
        statistic.as_str()
    )
}

/// Result of scanning a feature matrix for missing cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingScan {
    /// Null cells
    pub null_cells: usize,
    /// NaN or infinite cells
    pub non_finite_cells: usize,
    /// Columns with at least one missing cell, in table order
    pub affected_columns: Vec<String>,
}

impl MissingScan {
    pub fn has_missing(&self) -> bool {
        self.null_cells + self.non_finite_cells > 0
    }

    pub fn total_missing(&self) -> usize {
        self.null_cells + self.non_finite_cells
    }
}

/// What imputation did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImputationReport {
    /// Statistic used, `None` when imputation was disabled
    pub statistic: Option<ImputationStatistic>,
    /// Cells that were filled
    pub imputed_cells: usize,
    /// `(column, fill value)` for every column that was filled
    pub fill_values: Vec<(String, f64)>,
    /// Columns left missing because they had no valid values
    pub undefined: Vec<UndefinedStatistic>,
}

/// Everything reconciliation observed and changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub scan: MissingScan,
    pub imputation: ImputationReport,
    /// Missing cells left after reconciliation
    pub missing_after: usize,
    pub notices: Vec<String>,
    pub warnings: Vec<String>,
}

/// Detects, normalizes and optionally imputes missing feature values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    policy: PolicyRevision,
}

impl Reconciler {
    pub fn new(policy: PolicyRevision) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PolicyRevision {
        self.policy
    }

    /// Count null and non-finite cells per column.
    pub fn scan(df: &DataFrame) -> Result<MissingScan> {
        let mut scan = MissingScan::default();

        for col_name in column_names(df) {
            let values = column_values(df, &col_name)?;
            let nulls = values.iter().filter(|v| v.is_none()).count();
            let non_finite = values
                .iter()
                .filter(|v| matches!(v, Some(x) if !x.is_finite()))
                .count();

            if nulls + non_finite > 0 {
                scan.affected_columns.push(col_name);
            }
            scan.null_cells += nulls;
            scan.non_finite_cells += non_finite;
        }

        Ok(scan)
    }

    /// Whether any cell is null, NaN or infinite.
    pub fn detect(df: &DataFrame) -> Result<bool> {
        Ok(Self::scan(df)?.has_missing())
    }

    /// Rewrite every NaN and infinite cell to null.
    ///
    /// Idempotent; columns without non-finite values are left untouched.
    pub fn normalize_sentinels(df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();

        for col_name in column_names(df) {
            let values = column_values(df, &col_name)?;
            if !values.iter().any(|v| matches!(v, Some(x) if !x.is_finite())) {
                continue;
            }

            let cleaned: Vec<Option<f64>> = values
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect();
            result.replace(&col_name, float_series(&col_name, cleaned))?;
            debug!("Rewrote non-finite values in '{}' to null", col_name);
        }

        Ok(result)
    }

    /// Fill missing cells with each column's statistic.
    ///
    /// When `enabled` is false the matrix is returned unchanged. A column
    /// with no valid values cannot be filled; it stays missing and is
    /// reported as an undefined statistic.
    pub fn impute(&self, df: &DataFrame, enabled: bool) -> Result<(DataFrame, ImputationReport)> {
        let mut report = ImputationReport::default();
        if !enabled {
            return Ok((df.clone(), report));
        }

        let statistic = self.policy.imputation_statistic();
        report.statistic = Some(statistic);
        let mut result = df.clone();

        for col_name in column_names(df) {
            let values = column_values(df, &col_name)?;
            let missing = values.iter().filter(|v| is_missing(**v)).count();
            if missing == 0 {
                continue;
            }

            let valid = finite_series(&col_name, &values);
            let fill_value = match statistic {
                ImputationStatistic::Median => valid.median(),
                ImputationStatistic::Mean => valid.mean(),
            };

            let Some(fill_value) = fill_value else {
                warn!(
                    "Column '{}' has no valid values; its {} is undefined and it stays missing",
                    col_name,
                    statistic.as_str()
                );
                report.undefined.push(UndefinedStatistic {
                    column: col_name,
                    stage: StatisticStage::Imputation,
                });
                continue;
            };

            let filled: Vec<Option<f64>> = values
                .into_iter()
                .map(|v| if is_missing(v) { Some(fill_value) } else { v })
                .collect();
            result.replace(&col_name, float_series(&col_name, filled))?;

            debug!(
                "Filled {} cells in '{}' with {} {:.4}",
                missing,
                col_name,
                statistic.as_str(),
                fill_value
            );
            report.imputed_cells += missing;
            report.fill_values.push((col_name, fill_value));
        }

        Ok((result, report))
    }

    /// Scan, report, normalize sentinels and optionally impute.
    pub fn reconcile(&self, df: &DataFrame, enabled: bool) -> Result<(DataFrame, ReconcileReport)> {
        let mut report = ReconcileReport {
            scan: Self::scan(df)?,
            ..Default::default()
        };

        if !report.scan.has_missing() {
            info!("{}", NO_MISSING_NOTICE);
            report.notices.push(NO_MISSING_NOTICE.to_string());
            return Ok((df.clone(), report));
        }

        info!("{}", MISSING_NOTICE);
        report.notices.push(MISSING_NOTICE.to_string());
        if enabled {
            let notice = filling_notice(self.policy.imputation_statistic());
            info!("{}", notice);
            report.notices.push(notice);
        } else {
            info!("{}", LEAVING_NOTICE);
            report.notices.push(LEAVING_NOTICE.to_string());
        }

        let cleaned = Self::normalize_sentinels(df)?;
        let (imputed, imputation) = self.impute(&cleaned, enabled)?;

        for undefined in &imputation.undefined {
            report.warnings.push(format!(
                "Column '{}' has no valid values and was left missing",
                undefined.column
            ));
        }

        report.missing_after = Self::scan(&imputed)?.total_missing();
        report.imputation = imputation;
        Ok((imputed, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> DataFrame {
        df![
            "MolWt" => [Some(46.0), None, Some(45.0), Some(100.0)],
            "TPSA" => [Some(20.0), None, Some(f64::NAN), Some(26.0)],
            "Chi0" => [Some(1.0), None, Some(2.0), Some(f64::INFINITY)],
        ]
        .unwrap()
    }

    #[test]
    fn test_scan_counts_nulls_and_non_finite() {
        let scan = Reconciler::scan(&sample()).unwrap();
        assert_eq!(scan.null_cells, 3);
        assert_eq!(scan.non_finite_cells, 2);
        assert_eq!(scan.affected_columns, vec!["MolWt", "TPSA", "Chi0"]);
        assert!(Reconciler::detect(&sample()).unwrap());
    }

    #[test]
    fn test_detect_clean_matrix() {
        let df = df!["a" => [1.0, 2.0], "b" => [3.0, 4.0]].unwrap();
        assert!(!Reconciler::detect(&df).unwrap());
    }

    #[test]
    fn test_detect_infinity_only() {
        let df = df!["a" => [1.0, f64::NEG_INFINITY]].unwrap();
        assert!(Reconciler::detect(&df).unwrap());
    }

    #[test]
    fn test_normalize_sentinels_is_idempotent() {
        let once = Reconciler::normalize_sentinels(&sample()).unwrap();
        let scan = Reconciler::scan(&once).unwrap();
        assert_eq!(scan.non_finite_cells, 0);
        assert_eq!(scan.null_cells, 5);

        let twice = Reconciler::normalize_sentinels(&once).unwrap();
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn test_impute_disabled_is_identity() {
        let df = df!["a" => [Some(1.0), None, Some(3.0)]].unwrap();
        let (result, report) = Reconciler::default().impute(&df, false).unwrap();
        assert!(result.equals_missing(&df));
        assert_eq!(report.imputed_cells, 0);
        assert!(report.statistic.is_none());
    }

    #[test]
    fn test_impute_median_v2() {
        let df = Reconciler::normalize_sentinels(&sample()).unwrap();
        let (result, report) = Reconciler::new(PolicyRevision::V2).impute(&df, true).unwrap();

        assert_eq!(
            column_values(&result, "MolWt").unwrap(),
            vec![Some(46.0), Some(46.0), Some(45.0), Some(100.0)]
        );
        assert_eq!(
            column_values(&result, "TPSA").unwrap(),
            vec![Some(20.0), Some(23.0), Some(23.0), Some(26.0)]
        );
        assert_eq!(report.imputed_cells, 5);
        assert_eq!(report.statistic, Some(ImputationStatistic::Median));
        assert!(!Reconciler::detect(&result).unwrap());
    }

    #[test]
    fn test_impute_mean_v1() {
        let df = df!["a" => [Some(1.0), None, Some(2.0), Some(6.0)]].unwrap();
        let (result, _) = Reconciler::new(PolicyRevision::V1).impute(&df, true).unwrap();
        assert_eq!(
            column_values(&result, "a").unwrap(),
            vec![Some(1.0), Some(3.0), Some(2.0), Some(6.0)]
        );
    }

    #[test]
    fn test_impute_all_missing_column_is_undefined() {
        let df = df![
            "empty" => [None::<f64>, None, None],
            "full" => [Some(1.0), None, Some(3.0)],
        ]
        .unwrap();
        let (result, report) = Reconciler::default().impute(&df, true).unwrap();

        assert_eq!(result.column("empty").unwrap().null_count(), 3);
        assert_eq!(result.column("full").unwrap().null_count(), 0);
        assert_eq!(
            report.undefined,
            vec![UndefinedStatistic {
                column: "empty".to_string(),
                stage: StatisticStage::Imputation,
            }]
        );
    }

    #[test]
    fn test_reconcile_notices_no_missing() {
        let df = df!["a" => [1.0, 2.0]].unwrap();
        let (_, report) = Reconciler::default().reconcile(&df, true).unwrap();
        assert_eq!(report.notices, vec![NO_MISSING_NOTICE.to_string()]);
    }

    #[test]
    fn test_reconcile_notices_fill() {
        let (result, report) = Reconciler::default().reconcile(&sample(), true).unwrap();
        assert_eq!(
            report.notices,
            vec![
                MISSING_NOTICE.to_string(),
                "Filling missing values with the median of each column...".to_string(),
            ]
        );
        assert_eq!(report.scan.total_missing(), 5);
        assert_eq!(report.missing_after, 0);
        assert_eq!(result.height(), 4);
    }

    #[test]
    fn test_reconcile_notices_leave() {
        let (result, report) = Reconciler::default().reconcile(&sample(), false).unwrap();
        assert_eq!(
            report.notices,
            vec![MISSING_NOTICE.to_string(), LEAVING_NOTICE.to_string()]
        );
        // non-finite cells are still rewritten to null
        let scan = Reconciler::scan(&result).unwrap();
        assert_eq!(scan.non_finite_cells, 0);
        assert_eq!(scan.null_cells, 5);
        assert_eq!(report.missing_after, 5);
    }
}
