//! Strict parser for the AI's CSV reply.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::debug;

use crate::data::calendar::month_start;
use crate::error::AppError;
use crate::io::ingest::parse_date;

/// Parse a `date,value` reply into month-start points.
///
/// Code fences and blank lines are ignored and the first remaining line is
/// taken as the header. Every other line must hold a date and a number; any
/// malformed line, a repeated month, or an empty body fails.
pub fn parse_ai_forecast(text: &str) -> Result<Vec<(NaiveDate, f64)>, AppError> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("```"));

    if lines.next().is_none() {
        return Err(AppError::new(4, "AI response contains no CSV."));
    }

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for (idx, line) in lines.enumerate() {
        let row = idx + 1;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(line.as_bytes());
        let record = reader
            .records()
            .next()
            .transpose()
            .map_err(|e| AppError::new(4, format!("AI row {row} is not CSV: {e}")))?
            .ok_or_else(|| AppError::new(4, format!("AI row {row} is empty.")))?;

        let (Some(raw_date), Some(raw_value)) = (record.get(0), record.get(1)) else {
            return Err(AppError::new(4, format!("AI row {row} needs a date and a value: '{line}'.")));
        };
        let date = parse_date(raw_date).map_err(|e| AppError::new(4, format!("AI row {row}: {e}")))?;
        let value = parse_value(raw_value)
            .ok_or_else(|| AppError::new(4, format!("AI row {row}: invalid value '{raw_value}'.")))?;

        let date = month_start(date);
        if !seen.insert(date) {
            return Err(AppError::new(4, format!("AI response repeats month {date}.")));
        }
        out.push((date, value));
    }

    if out.is_empty() {
        return Err(AppError::new(4, "AI response has a header but no rows."));
    }
    debug!(rows = out.len(), "AI forecast parsed");
    Ok(out)
}

fn parse_value(raw: &str) -> Option<f64> {
    let v = raw.trim().trim_end_matches('%').replace(',', ".").parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn strips_fences_and_header() {
        let text = "```csv\ndate,selic\n2024-07-01,10.50\n\n2024-08,10.25\n09/2024,\"10,00\"\n```\n";
        let rows = parse_ai_forecast(text).unwrap();
        assert_eq!(rows, vec![(d(2024, 7), 10.5), (d(2024, 8), 10.25), (d(2024, 9), 10.0)]);
    }

    #[test]
    fn malformed_rows_fail() {
        for text in [
            "",
            "```\n```",
            "date,value\n",
            "date,value\nJuly 2024,10.5\n",
            "date,value\n2024-07-01,high\n",
            "date,value\n2024-07-01\n",
            "date,value\n2024-07-01,1\n2024-07-15,2\n",
        ] {
            let err = parse_ai_forecast(text).unwrap_err();
            assert_eq!(err.exit_code(), 4, "{text:?}");
        }
    }
}
