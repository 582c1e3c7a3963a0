//! History export: target joined with the theory features.
//!
//! The file is context for the AI forecast, so it is written in plain CSV with
//! a `date` column first and empty cells for missing values.

use std::fs::{self, File};
use std::path::Path;

use tracing::info;

use crate::data::TimeFrame;
use crate::error::AppError;

/// Write `y` left-joined with `features` (rows are y's dates).
pub fn write_history(path: &Path, y: &TimeFrame, features: &TimeFrame) -> Result<(), AppError> {
    let joined = y.outer_join(features)?.reindex(y.index())?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::new(2, format!("Failed to create directory '{}': {e}", parent.display())))?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create history CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);

    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write history CSV: {e}"));
    let mut header = vec!["date".to_string()];
    header.extend(joined.column_names().iter().cloned());
    writer.write_record(&header).map_err(write_err)?;

    for (pos, date) in joined.index().iter().enumerate() {
        let mut record = vec![date.format("%Y-%m-%d").to_string()];
        record.extend(
            joined
                .row(pos)
                .into_iter()
                .map(|(_, v)| v.map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush history CSV: {e}")))?;

    info!(path = %path.display(), rows = joined.len(), "history exported");
    Ok(())
}
