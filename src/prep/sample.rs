//! Training-sample filtering and gap imputation.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::data::TimeFrame;
use crate::error::AppError;

/// Target, features, and theory features restricted to the training window.
#[derive(Debug, Clone)]
pub struct PreparedSample {
    /// Target, observed months on or after the training start.
    pub y: TimeFrame,
    /// Transformed features with high-missingness columns dropped, gaps filled.
    pub x: TimeFrame,
    /// Theory features over the same window, gaps filled.
    pub theory: TimeFrame,
    /// Feature columns dropped for missingness.
    pub dropped_columns: Vec<String>,
}

/// Restrict to the training window, drop sparse columns, and fill gaps.
///
/// - y keeps observed months at or after `train_start`
/// - x and theory keep `[train_start, last y date]`
/// - a column of x is dropped when `missing / len(y) >= na_threshold`
/// - remaining gaps are filled backward, then forward
pub fn filter_sample(
    y: &TimeFrame,
    x: &TimeFrame,
    theory: &TimeFrame,
    target: &str,
    train_start: NaiveDate,
    na_threshold: f64,
) -> Result<PreparedSample, AppError> {
    let y = drop_missing(&y.select(&[target])?.filter_dates(Some(train_start), None), target)?;
    let Some(y_end) = y.last_date() else {
        return Err(AppError::new(
            3,
            format!("No observations of `{target}` on or after {train_start}."),
        ));
    };

    let mut x = x.filter_dates(Some(train_start), Some(y_end));
    let theory = theory.filter_dates(Some(train_start), Some(y_end));

    let n_y = y.len() as f64;
    let dropped_columns: Vec<String> = x
        .missing_counts()
        .into_iter()
        .filter(|(_, missing)| *missing as f64 / n_y >= na_threshold)
        .map(|(name, _)| name.to_string())
        .collect();
    for name in &dropped_columns {
        debug!(column = %name, "dropping sparse feature");
    }
    x.drop_columns(&dropped_columns);

    let x = x.bfill().ffill();
    let theory = theory.bfill().ffill();

    info!(
        observations = y.len(),
        features = x.column_names().len(),
        dropped = dropped_columns.len(),
        "training sample ready"
    );

    Ok(PreparedSample {
        y,
        x,
        theory,
        dropped_columns,
    })
}

fn drop_missing(frame: &TimeFrame, column: &str) -> Result<TimeFrame, AppError> {
    let values = frame.require(column)?;
    let (index, kept): (Vec<NaiveDate>, Vec<Option<f64>>) = frame
        .index()
        .iter()
        .zip(values)
        .filter(|(_, v)| v.is_some())
        .map(|(d, v)| (*d, *v))
        .unzip();
    TimeFrame::from_columns(index, vec![(column.to_string(), kept)])
}
