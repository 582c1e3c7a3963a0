//! Exogenous scenario over the forecast horizon.
//!
//! Two groups of drivers:
//!
//! - **constant**: every theory feature except the inflation gap is frozen at
//!   its last in-sample value
//! - **inflation gap**: survey expectations (monthly means, carried forward)
//!   minus the inflation target, with the target held at its last known value
//!
//! The result has exactly one row per horizon month and the theory table's
//! column order, which is what the fitted forecaster expects.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::data::focus::monthly_means;
use crate::data::frame::{ffill, last_valid};
use crate::data::{Expectation, Series, TimeFrame, add_months, month_range};
use crate::error::AppError;
use crate::prep::INFLATION_GAP;

/// Months of survey history fetched before the first horizon month.
pub const SURVEY_LOOKBACK_MONTHS: i32 = 3;

/// The `horizon` month starts following `last_observation`.
pub fn horizon_dates(last_observation: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    if horizon == 0 {
        return Vec::new();
    }
    month_range(add_months(last_observation, 1), add_months(last_observation, horizon as i32))
}

/// First survey release date needed for the scenario.
pub fn survey_start(dates: &[NaiveDate]) -> Option<NaiveDate> {
    dates.first().map(|d| add_months(*d, -SURVEY_LOOKBACK_MONTHS))
}

/// Last row of every theory column except the inflation gap, repeated over `dates`.
pub fn constant_scenario(theory: &TimeFrame, dates: &[NaiveDate]) -> Result<TimeFrame, AppError> {
    let mut out = TimeFrame::new(dates.to_vec())?;
    for name in theory.column_names().iter().filter(|n| n.as_str() != INFLATION_GAP) {
        let last = ffill(theory.require(name)?).last().copied().flatten();
        out.set_column(name, vec![last; dates.len()])?;
    }
    Ok(out)
}

/// Expected inflation minus the target over `dates`.
///
/// Monthly survey means are joined with the `2h` months from the first horizon
/// month, carried forward, and restricted to the horizon. The target is the
/// last known value carried forward, so its `h`-month lead is that same value.
pub fn inflation_gap_path(
    expectations: &[Expectation],
    inflation_target: f64,
    dates: &[NaiveDate],
) -> Result<Series, AppError> {
    let Some(&first) = dates.first() else {
        return Ok(Vec::new());
    };
    let h = dates.len() as i32;

    let means = monthly_means(expectations);
    let mut union: Vec<NaiveDate> = means.keys().copied().collect();
    union.extend(month_range(first, add_months(first, 2 * h - 1)));
    union.sort();
    union.dedup();

    let observed: Series = union.iter().map(|d| means.get(d).copied()).collect();
    let filled = ffill(&observed);
    let expected: Series = dates
        .iter()
        .map(|d| union.binary_search(d).ok().and_then(|i| filled[i]))
        .collect();

    let gap: Series = expected.iter().map(|e| e.map(|e| e - inflation_target)).collect();
    debug!(
        months = dates.len(),
        survey_months = means.len(),
        target = inflation_target,
        "inflation gap path built"
    );
    Ok(gap)
}

/// Join both groups into the scenario table, in the theory table's column order.
///
/// Any cell still missing is an error: the forecaster cannot run on gaps.
pub fn build_scenario(
    theory: &TimeFrame,
    last_observation: NaiveDate,
    horizon: usize,
    expectations: &[Expectation],
    inflation_target: f64,
) -> Result<TimeFrame, AppError> {
    let dates = horizon_dates(last_observation, horizon);
    let constant = constant_scenario(theory, &dates)?;

    let mut out = TimeFrame::new(dates.clone())?;
    for name in theory.column_names() {
        let values = if name == INFLATION_GAP {
            inflation_gap_path(expectations, inflation_target, &dates)?
        } else {
            constant.require(name)?.to_vec()
        };
        if let Some(pos) = values.iter().position(Option::is_none) {
            return Err(AppError::new(
                4,
                format!("Scenario for `{name}` has no value at {}.", dates[pos]),
            ));
        }
        out.set_column(name, values)?;
    }

    info!(
        start = %dates.first().map(|d| d.to_string()).unwrap_or_default(),
        months = dates.len(),
        "scenario built"
    );
    Ok(out)
}

/// Last known inflation target in the aligned table.
pub fn last_inflation_target(aligned: &TimeFrame, column: &str) -> Result<f64, AppError> {
    last_valid(aligned.require(column)?)
        .ok_or_else(|| AppError::new(4, format!("Column `{column}` has no observations.")))
}
