//! Per-indicator forecast table (long format CSV).
//!
//! Columns: `date,value,lower,upper,model`. Missing bounds are empty cells and
//! `model` holds the stable tag key (`actual`, `ensemble`, `bayesian_ridge`, `ai`).

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::domain::{ForecastRow, Indicator};
use crate::error::AppError;

/// `<output_dir>/<indicator>.csv`
pub fn forecast_table_path(output_dir: &Path, indicator: Indicator) -> PathBuf {
    output_dir.join(format!("{}.csv", indicator.target_column()))
}

/// Write the table, creating the parent directory when needed.
pub fn write_forecast_table(path: &Path, rows: &[ForecastRow]) -> Result<(), AppError> {
    ensure_unique(rows)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::new(2, format!("Failed to create directory '{}': {e}", parent.display())))?;
    }

    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create forecast table '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::new(2, format!("Failed to write forecast row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush forecast table: {e}")))?;

    info!(path = %path.display(), rows = rows.len(), "forecast table written");
    Ok(())
}

pub fn read_forecast_table(path: &Path) -> Result<Vec<ForecastRow>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open forecast table '{}': {e}", path.display())))?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let mut rows = Vec::new();
    for (idx, result) in reader.deserialize::<ForecastRow>().enumerate() {
        let row = result.map_err(|e| {
            AppError::new(
                2,
                format!("Invalid row {} in forecast table '{}': {e}", idx + 2, path.display()),
            )
        })?;
        rows.push(row);
    }
    ensure_unique(&rows)?;
    Ok(rows)
}

fn ensure_unique(rows: &[ForecastRow]) -> Result<(), AppError> {
    let mut seen = HashSet::with_capacity(rows.len());
    for row in rows {
        if !seen.insert((row.date, row.model)) {
            return Err(AppError::new(
                2,
                format!("Duplicate forecast row for {} / {:?}.", row.date, row.model),
            ));
        }
    }
    Ok(())
}
