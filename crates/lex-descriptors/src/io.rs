//! Table input and output.
//!
//! Inputs are CSV files with a header row. Feature tables are written as
//! CSV or Parquet through a temporary file in the destination directory
//! that is renamed into place once fully written, so a failed run never
//! leaves a partial output behind.

use crate::config::OutputFormat;
use crate::error::{FeaturizeError, Result};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Load a CSV input table.
///
/// # Errors
///
/// Returns [`FeaturizeError::Format`] if the path does not end in `.csv`,
/// does not exist, or cannot be parsed as CSV.
pub fn load_table(path: &Path) -> Result<DataFrame> {
    if !has_extension(path, "csv") {
        return Err(FeaturizeError::Format(format!(
            "{} does not have a .csv extension",
            path.display()
        )));
    }

    if !path.is_file() {
        return Err(FeaturizeError::Format(format!(
            "{} does not exist",
            path.display()
        )));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .try_into_reader_with_file_path(Some(path.into()))
        .and_then(|reader| reader.finish())
        .map_err(|e| FeaturizeError::Format(format!("{}: {}", path.display(), e)))?;

    info!(
        "Loaded {}: {} rows x {} columns",
        path.display(),
        df.height(),
        df.width()
    );
    Ok(df)
}

/// Write a table atomically in the given format.
///
/// The parent directory is created if missing. Data goes to a hidden
/// temporary file next to `path` first; on failure that file is removed.
pub fn write_table(df: &mut DataFrame, format: OutputFormat, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(path);
    debug!("Writing {} table to {}", format, temp_path.display());

    if let Err(e) = write_to(df, format, &temp_path) {
        // best effort, the original error is what matters
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(FeaturizeError::Io(e));
    }

    info!("Feature table saved: {}", path.display());
    Ok(path.to_path_buf())
}

fn write_to(df: &mut DataFrame, format: OutputFormat, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    match format {
        OutputFormat::Csv => {
            CsvWriter::new(&mut file)
                .include_header(true)
                .with_separator(b',')
                .finish(df)?;
        }
        OutputFormat::Parquet => {
            ParquetWriter::new(&mut file).finish(df)?;
        }
    }
    file.sync_all()?;
    Ok(())
}

/// Read back a table written by [`write_table`], choosing the reader by
/// file extension.
pub fn read_table(path: &Path) -> Result<DataFrame> {
    if has_extension(path, "parquet") {
        let file = File::open(path)?;
        return Ok(ParquetReader::new(file).finish()?);
    }
    if has_extension(path, "csv") {
        return Ok(CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.into()))?
            .finish()?);
    }
    Err(FeaturizeError::UnsupportedFormat(
        path.extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default(),
    ))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(extension))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}
