//! Theory-driven exogenous features.
//!
//! The model conditions on a small, fixed set of drivers computed from the
//! aligned (untransformed) data:
//!
//! - `<target>_lag1`, `<target>_lag2`: the target one and two months back
//! - `pib_hiato`: output gap, `(output / potential - 1) * 100`, with potential
//!   the HP trend of the forward-filled 12-month cumulative GDP
//! - `pib_hiato_lag1`: the output gap one month back
//! - `inflacao_hiato`: 12-month expected inflation minus the inflation target
//!   12 months ahead

use tracing::debug;

use crate::data::frame::{ffill, shift};
use crate::data::{Series, TimeFrame};
use crate::error::AppError;
use crate::math::hp_trend;

/// 12-month cumulative GDP column.
pub const OUTPUT_COLUMN: &str = "pib_acum12m";
/// 12-month-ahead inflation expectations column.
pub const EXPECTATIONS_COLUMN: &str = "expec_ipca_12m";
/// Policy inflation target column.
pub const INFLATION_TARGET_COLUMN: &str = "meta_inflacao";

pub const OUTPUT_GAP: &str = "pib_hiato";
pub const OUTPUT_GAP_LAG1: &str = "pib_hiato_lag1";
pub const INFLATION_GAP: &str = "inflacao_hiato";

/// Months between an expectation and the target it is compared against.
const EXPECTATION_HORIZON: isize = 12;

/// Names of the theory feature columns for `target`, in model order.
pub fn theory_columns(target: &str) -> Vec<String> {
    vec![
        format!("{target}_lag1"),
        format!("{target}_lag2"),
        OUTPUT_GAP.to_string(),
        OUTPUT_GAP_LAG1.to_string(),
        INFLATION_GAP.to_string(),
    ]
}

/// Build the five-column theory feature table.
///
/// `x` is the aligned raw table without the target; `y` holds the target
/// (observed values only). The result spans the union of both indexes.
pub fn theory_features(x: &TimeFrame, y: &TimeFrame, target: &str, hp_lambda: f64) -> Result<TimeFrame, AppError> {
    let joined = x.outer_join(y)?;
    let target_values = joined.require(target)?;
    let output = joined.require(OUTPUT_COLUMN)?;

    let potential = output_potential(output, hp_lambda)?;
    let gap: Series = output
        .iter()
        .zip(&potential)
        .map(|(o, p)| match (o, p) {
            (Some(o), Some(p)) if *p != 0.0 => Some((o / p - 1.0) * 100.0),
            _ => None,
        })
        .collect();

    let expectations = joined.require(EXPECTATIONS_COLUMN)?;
    let target_ahead = shift(joined.require(INFLATION_TARGET_COLUMN)?, -EXPECTATION_HORIZON);
    let inflation_gap: Series = expectations
        .iter()
        .zip(&target_ahead)
        .map(|(e, m)| Some((*e)? - (*m)?))
        .collect();

    let gap_lag1 = shift(&gap, 1);
    let names = theory_columns(target);
    let columns = vec![
        (names[0].clone(), shift(target_values, 1)),
        (names[1].clone(), shift(target_values, 2)),
        (names[2].clone(), gap),
        (names[3].clone(), gap_lag1),
        (names[4].clone(), inflation_gap),
    ];
    let out = TimeFrame::from_columns(joined.index().to_vec(), columns)?;
    debug!(rows = out.len(), "built theory features");
    Ok(out)
}

/// HP trend of the forward-filled output series.
///
/// The filter runs from the first observation onward; earlier months have no
/// potential.
fn output_potential(output: &[Option<f64>], lambda: f64) -> Result<Series, AppError> {
    let filled = ffill(output);
    let Some(first) = filled.iter().position(|v| v.is_some()) else {
        return Err(AppError::new(3, format!("Column `{OUTPUT_COLUMN}` has no observations.")));
    };
    let span: Vec<f64> = filled[first..].iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    let trend = hp_trend(&span, lambda)?;

    let mut out = vec![None; first];
    out.extend(trend.into_iter().map(Some));
    Ok(out)
}
