//! Date-indexed table of named series.
//!
//! `TimeFrame` is the only tabular type in the pipeline. Missing values are
//! `None`; the index is sorted and free of duplicates.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::data::calendar::month_range;
use crate::error::AppError;

/// One column of a `TimeFrame`.
pub type Series = Vec<Option<f64>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeFrame {
    index: Vec<NaiveDate>,
    names: Vec<String>,
    columns: Vec<Series>,
}

impl TimeFrame {
    /// Empty table over `index` (must be strictly increasing).
    pub fn new(index: Vec<NaiveDate>) -> Result<Self, AppError> {
        if index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AppError::new(2, "Table index must be strictly increasing."));
        }
        Ok(Self {
            index,
            names: Vec::new(),
            columns: Vec::new(),
        })
    }

    pub fn from_columns(index: Vec<NaiveDate>, columns: Vec<(String, Series)>) -> Result<Self, AppError> {
        let mut frame = Self::new(index)?;
        for (name, values) in columns {
            if frame.column(&name).is_some() {
                return Err(AppError::new(2, format!("Duplicate column `{name}`.")));
            }
            frame.set_column(&name, values)?;
        }
        Ok(frame)
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.index.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.index.last().copied()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Like `column`, but a missing column is an input error.
    pub fn require(&self, name: &str) -> Result<&[Option<f64>], AppError> {
        self.column(name)
            .ok_or_else(|| AppError::new(2, format!("Missing required column `{name}`.")))
    }

    /// Insert or replace a column.
    pub fn set_column(&mut self, name: &str, values: Series) -> Result<(), AppError> {
        if values.len() != self.index.len() {
            return Err(AppError::new(
                2,
                format!(
                    "Column `{name}` has {} values but the index has {} dates.",
                    values.len(),
                    self.index.len()
                ),
            ));
        }
        match self.names.iter().position(|n| n == name) {
            Some(i) => self.columns[i] = values,
            None => {
                self.names.push(name.to_string());
                self.columns.push(values);
            }
        }
        Ok(())
    }

    pub fn drop_columns(&mut self, drop: &[String]) {
        let mut i = 0;
        while i < self.names.len() {
            if drop.contains(&self.names[i]) {
                self.names.remove(i);
                self.columns.remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// New table with only `names`, in that order.
    pub fn select(&self, names: &[&str]) -> Result<TimeFrame, AppError> {
        let mut out = TimeFrame {
            index: self.index.clone(),
            ..Default::default()
        };
        for name in names {
            out.set_column(name, self.require(name)?.to_vec())?;
        }
        Ok(out)
    }

    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.index.binary_search(&date).ok()
    }

    /// Value of `name` at `date` (None when the date, column, or value is missing).
    pub fn value(&self, name: &str, date: NaiveDate) -> Option<f64> {
        let pos = self.position(date)?;
        self.column(name)?[pos]
    }

    /// Row at `pos` as `(name, value)` pairs.
    pub fn row(&self, pos: usize) -> Vec<(&str, Option<f64>)> {
        self.names
            .iter()
            .zip(&self.columns)
            .map(|(n, c)| (n.as_str(), c.get(pos).copied().flatten()))
            .collect()
    }

    /// Re-index onto `index`; dates not present before become missing.
    pub fn reindex(&self, index: &[NaiveDate]) -> Result<TimeFrame, AppError> {
        let positions: Vec<Option<usize>> = index.iter().map(|d| self.position(*d)).collect();
        let mut out = TimeFrame::new(index.to_vec())?;
        for (name, values) in self.names.iter().zip(&self.columns) {
            let col = positions.iter().map(|p| p.and_then(|i| values[i])).collect();
            out.set_column(name, col)?;
        }
        Ok(out)
    }

    /// Re-index onto the contiguous month-start calendar spanning the table.
    pub fn to_monthly(&self) -> Result<TimeFrame, AppError> {
        match (self.first_date(), self.last_date()) {
            (Some(first), Some(last)) => self.reindex(&month_range(first, last)),
            _ => Ok(self.clone()),
        }
    }

    /// Outer join on the date index. Column names must not overlap.
    pub fn outer_join(&self, other: &TimeFrame) -> Result<TimeFrame, AppError> {
        let union: BTreeSet<NaiveDate> = self.index.iter().chain(other.index.iter()).copied().collect();
        let index: Vec<NaiveDate> = union.into_iter().collect();
        let mut out = self.reindex(&index)?;
        let right = other.reindex(&index)?;
        for (name, values) in right.names.into_iter().zip(right.columns) {
            if out.column(&name).is_some() {
                return Err(AppError::new(2, format!("Column `{name}` exists on both sides of a join.")));
            }
            out.set_column(&name, values)?;
        }
        Ok(out)
    }

    /// Rows with `start <= date <= end` (either bound optional).
    pub fn filter_dates(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> TimeFrame {
        let keep: Vec<usize> = self
            .index
            .iter()
            .enumerate()
            .filter(|(_, d)| start.is_none_or(|s| **d >= s) && end.is_none_or(|e| **d <= e))
            .map(|(i, _)| i)
            .collect();
        TimeFrame {
            index: keep.iter().map(|&i| self.index[i]).collect(),
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| keep.iter().map(|&i| c[i]).collect())
                .collect(),
        }
    }

    pub fn ffill(&self) -> TimeFrame {
        self.map_columns(ffill)
    }

    pub fn bfill(&self) -> TimeFrame {
        self.map_columns(bfill)
    }

    /// Missing-value count per column.
    pub fn missing_counts(&self) -> Vec<(&str, usize)> {
        self.names
            .iter()
            .zip(&self.columns)
            .map(|(n, c)| (n.as_str(), c.iter().filter(|v| v.is_none()).count()))
            .collect()
    }

    fn map_columns(&self, f: impl Fn(&[Option<f64>]) -> Series) -> TimeFrame {
        TimeFrame {
            index: self.index.clone(),
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| f(c)).collect(),
        }
    }
}

/// Carry the last observed value forward over gaps.
pub fn ffill(values: &[Option<f64>]) -> Series {
    let mut last = None;
    values
        .iter()
        .map(|v| {
            if v.is_some() {
                last = *v;
            }
            last
        })
        .collect()
}

/// Fill gaps with the next observed value.
pub fn bfill(values: &[Option<f64>]) -> Series {
    let mut out = values.to_vec();
    let mut next = None;
    for v in out.iter_mut().rev() {
        if v.is_some() {
            next = *v;
        } else {
            *v = next;
        }
    }
    out
}

/// Shift by `periods` rows: positive lags (`out[i] = values[i - k]`),
/// negative leads (`out[i] = values[i + k]`).
pub fn shift(values: &[Option<f64>], periods: isize) -> Series {
    let n = values.len() as isize;
    (0..n)
        .map(|i| {
            let src = i - periods;
            if (0..n).contains(&src) { values[src as usize] } else { None }
        })
        .collect()
}

pub fn last_valid(values: &[Option<f64>]) -> Option<f64> {
    values.iter().rev().find_map(|v| *v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn fills_and_shifts() {
        let s = vec![None, Some(1.0), None, Some(3.0), None];
        assert_eq!(ffill(&s), vec![None, Some(1.0), Some(1.0), Some(3.0), Some(3.0)]);
        assert_eq!(bfill(&s), vec![Some(1.0), Some(1.0), Some(3.0), Some(3.0), None]);
        assert_eq!(shift(&s, 1), vec![None, None, Some(1.0), None, Some(3.0)]);
        assert_eq!(shift(&s, -1), vec![Some(1.0), None, Some(3.0), None, None]);
        assert_eq!(last_valid(&s), Some(3.0));
    }

    #[test]
    fn outer_join_unions_index() {
        let a = TimeFrame::from_columns(vec![d(2024, 1), d(2024, 2)], vec![("a".into(), vec![Some(1.0), Some(2.0)])])
            .unwrap();
        let b = TimeFrame::from_columns(vec![d(2024, 2), d(2024, 3)], vec![("b".into(), vec![Some(5.0), Some(6.0)])])
            .unwrap();
        let j = a.outer_join(&b).unwrap();
        assert_eq!(j.index(), &[d(2024, 1), d(2024, 2), d(2024, 3)]);
        assert_eq!(j.column("a").unwrap(), &[Some(1.0), Some(2.0), None]);
        assert_eq!(j.column("b").unwrap(), &[None, Some(5.0), Some(6.0)]);
        assert!(a.outer_join(&a).is_err());
    }

    #[test]
    fn to_monthly_inserts_missing_months() {
        let a = TimeFrame::from_columns(vec![d(2024, 1), d(2024, 4)], vec![("a".into(), vec![Some(1.0), Some(4.0)])])
            .unwrap();
        let m = a.to_monthly().unwrap();
        assert_eq!(m.len(), 4);
        assert_eq!(m.column("a").unwrap(), &[Some(1.0), None, None, Some(4.0)]);
    }

    #[test]
    fn rejects_unsorted_index() {
        assert!(TimeFrame::new(vec![d(2024, 2), d(2024, 1)]).is_err());
    }
}
