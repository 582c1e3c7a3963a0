//! Stationarity transforms driven by the metadata table.
//!
//! Each indicator has a transform code "1".."6":
//!
//! | code | transform                |
//! |------|--------------------------|
//! | 1    | identity                 |
//! | 2    | first difference         |
//! | 3    | second difference        |
//! | 4    | natural log              |
//! | 5    | log, then first diff     |
//! | 6    | log, then second diff    |
//!
//! Missing values propagate; the log of a non-positive value is missing.

use std::collections::HashMap;
use std::str::FromStr;

use tracing::debug;

use crate::data::{Series, TimeFrame};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformCode {
    Level,
    Diff,
    Diff2,
    Log,
    LogDiff,
    LogDiff2,
}

impl TransformCode {
    pub const ALL: [TransformCode; 6] = [
        TransformCode::Level,
        TransformCode::Diff,
        TransformCode::Diff2,
        TransformCode::Log,
        TransformCode::LogDiff,
        TransformCode::LogDiff2,
    ];

    /// Parse a metadata code. Anything but "1".."6" is an invalid argument.
    pub fn from_code(code: &str) -> Result<Self, AppError> {
        match code.trim() {
            "1" => Ok(TransformCode::Level),
            "2" => Ok(TransformCode::Diff),
            "3" => Ok(TransformCode::Diff2),
            "4" => Ok(TransformCode::Log),
            "5" => Ok(TransformCode::LogDiff),
            "6" => Ok(TransformCode::LogDiff2),
            other => Err(AppError::new(
                2,
                format!("Invalid transform code '{other}' (expected 1-6)."),
            )),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            TransformCode::Level => "1",
            TransformCode::Diff => "2",
            TransformCode::Diff2 => "3",
            TransformCode::Log => "4",
            TransformCode::LogDiff => "5",
            TransformCode::LogDiff2 => "6",
        }
    }

    pub fn apply(self, values: &[Option<f64>]) -> Series {
        match self {
            TransformCode::Level => values.to_vec(),
            TransformCode::Diff => diff(values),
            TransformCode::Diff2 => diff(&diff(values)),
            TransformCode::Log => ln(values),
            TransformCode::LogDiff => diff(&ln(values)),
            TransformCode::LogDiff2 => diff(&diff(&ln(values))),
        }
    }
}

impl FromStr for TransformCode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
    }
}

/// Indicator name -> raw transform code, as read from the metadata sheet.
///
/// Codes are kept raw and validated when applied, so an unused indicator with a
/// bad code does not fail the run.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    codes: HashMap<String, String>,
}

impl Metadata {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            codes: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Transform for `indicator`; a missing entry or invalid code is an error.
    pub fn transform_for(&self, indicator: &str) -> Result<TransformCode, AppError> {
        let raw = self.codes.get(indicator).ok_or_else(|| {
            AppError::new(2, format!("Missing metadata: no transform code for `{indicator}`."))
        })?;
        TransformCode::from_code(raw)
            .map_err(|e| AppError::new(e.exit_code(), format!("{} (indicator `{indicator}`)", e.message())))
    }
}

/// Apply each column's metadata transform, skipping `excluded` columns.
pub fn transform_features(x: &TimeFrame, metadata: &Metadata, excluded: &[String]) -> Result<TimeFrame, AppError> {
    let mut out = x.clone();
    for name in x.column_names() {
        if excluded.contains(name) {
            continue;
        }
        let code = metadata.transform_for(name)?;
        debug!(column = %name, code = code.code(), "transforming");
        out.set_column(name, code.apply(x.require(name)?))?;
    }
    Ok(out)
}

fn diff(values: &[Option<f64>]) -> Series {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let v = match (i.checked_sub(1).and_then(|j| values[j]), values[i]) {
            (Some(prev), Some(cur)) => Some(cur - prev),
            _ => None,
        };
        out.push(v);
    }
    out
}

fn ln(values: &[Option<f64>]) -> Series {
    values
        .iter()
        .map(|v| v.filter(|x| *x > 0.0).map(f64::ln))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn close(a: Option<f64>, b: Option<f64>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => (a - b).abs() < 1e-12,
            (None, None) => true,
            _ => false,
        }
    }

    #[test]
    fn every_code_matches_its_formula() {
        let x = vec![Some(1.0), Some(2.0), Some(4.0), Some(8.0)];
        let l2 = 2f64.ln();

        let expected: [Vec<Option<f64>>; 6] = [
            x.clone(),
            vec![None, Some(1.0), Some(2.0), Some(4.0)],
            vec![None, None, Some(1.0), Some(2.0)],
            vec![Some(0.0), Some(l2), Some(2.0 * l2), Some(3.0 * l2)],
            vec![None, Some(l2), Some(l2), Some(l2)],
            vec![None, None, Some(0.0), Some(0.0)],
        ];

        for (code, want) in TransformCode::ALL.iter().zip(expected.iter()) {
            let got = code.apply(&x);
            assert_eq!(got.len(), want.len());
            assert!(
                got.iter().zip(want).all(|(g, w)| close(*g, *w)),
                "code {} produced {got:?}",
                code.code()
            );
            // Deterministic.
            assert_eq!(code.apply(&x), got);
        }
    }

    #[test]
    fn codes_round_trip_and_reject_others() {
        for code in TransformCode::ALL {
            assert_eq!(TransformCode::from_code(code.code()).unwrap(), code);
        }
        for bad in ["0", "7", "", "log", "1.0"] {
            let err = TransformCode::from_code(bad).unwrap_err();
            assert_eq!(err.exit_code(), 2, "code {bad:?}");
        }
    }

    #[test]
    fn log_of_non_positive_is_missing() {
        let got = TransformCode::Log.apply(&[Some(-1.0), Some(0.0), None, Some(1.0)]);
        assert_eq!(got, vec![None, None, None, Some(0.0)]);
    }

    #[test]
    fn transform_features_requires_metadata_except_excluded() {
        let d = |m| NaiveDate::from_ymd_opt(2024, m, 1).unwrap();
        let x = TimeFrame::from_columns(
            vec![d(1), d(2)],
            vec![
                ("ibc".to_string(), vec![Some(1.0), Some(3.0)]),
                ("saldo_caged_novo".to_string(), vec![Some(5.0), Some(6.0)]),
            ],
        )
        .unwrap();
        let excluded = vec!["saldo_caged_novo".to_string()];

        let meta = Metadata::from_pairs([("ibc", "2")]);
        let out = transform_features(&x, &meta, &excluded).unwrap();
        assert_eq!(out.column("ibc").unwrap(), &[None, Some(2.0)]);
        assert_eq!(out.column("saldo_caged_novo").unwrap(), &[Some(5.0), Some(6.0)]);

        let err = transform_features(&x, &Metadata::default(), &excluded).unwrap_err();
        assert!(err.message().contains("ibc"));

        let bad = Metadata::from_pairs([("ibc", "9")]);
        assert_eq!(transform_features(&x, &bad, &excluded).unwrap_err().exit_code(), 2);
    }
}
