//! Frequency alignment of monthly and annual raw tables.

use tracing::debug;

use crate::data::{TimeFrame, month_range};
use crate::error::AppError;

/// Combine monthly and annual tables on one contiguous month-start index.
///
/// - monthly data is re-indexed to a contiguous calendar (no fill)
/// - annual data is re-indexed monthly over its own span and forward-filled
/// - the two are outer-joined and re-indexed over the union span
///
/// Nothing is ever filled backward: a value only appears at or after the
/// date it was observed.
pub fn align_frequencies(monthly: &TimeFrame, annual: &TimeFrame) -> Result<TimeFrame, AppError> {
    let monthly = monthly.to_monthly()?;
    let annual = annual.to_monthly()?.ffill();
    let joined = monthly.outer_join(&annual)?;

    let out = match (joined.first_date(), joined.last_date()) {
        (Some(first), Some(last)) => joined.reindex(&month_range(first, last))?,
        _ => joined,
    };
    debug!(rows = out.len(), columns = out.column_names().len(), "aligned monthly and annual data");
    Ok(out)
}
