//! CSV ingest of raw series and the transform metadata sheet.
//!
//! Raw tables are date-indexed: a `date` column (or, failing that, the first
//! column) plus one numeric column per indicator. Dates are normalised to the
//! first of their month. Empty cells, `NA`, `NaN` and `.` are missing values.
//!
//! Design goals:
//! - **Strict schema**: unreadable files, unparseable dates or numbers and
//!   duplicated months are input errors (exit code 2)
//! - **Deterministic behavior**: rows are sorted by date, columns keep file order
//! - **Separation of concerns**: no transformation logic here

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::data::calendar::month_start;
use crate::data::{Series, TimeFrame};
use crate::error::AppError;
use crate::prep::Metadata;

const METADATA_ID_COLUMN: &str = "identificador";
const METADATA_CODE_COLUMNS: [&str; 2] = ["transformação", "transformacao"];

/// Load a raw series table from a CSV file.
pub fn load_raw_table(path: &Path) -> Result<TimeFrame, AppError> {
    let body = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read CSV '{}': {e}", path.display())))?;
    let frame = parse_raw_table(&body)
        .map_err(|e| AppError::new(e.exit_code(), format!("{}: {}", path.display(), e.message())))?;
    info!(
        path = %path.display(),
        rows = frame.len(),
        columns = frame.column_names().len(),
        "raw table loaded"
    );
    Ok(frame)
}

/// Parse a raw series table from CSV text.
pub fn parse_raw_table(body: &str) -> Result<TimeFrame, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    if headers.is_empty() {
        return Err(AppError::new(2, "CSV has no columns."));
    }

    let header_map = build_header_map(&headers);
    let date_idx = header_map.get("date").copied().unwrap_or(0);
    let value_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != date_idx)
        .map(|(i, name)| (i, normalize_header_name(name)))
        .collect();

    let mut rows: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header, lines are 1-based
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("CSV parse error on line {line}: {e}")))?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let date = record
            .get(date_idx)
            .ok_or_else(|| AppError::new(2, format!("Missing date on line {line}.")))
            .and_then(|s| parse_date(s).map_err(|e| AppError::new(2, format!("Line {line}: {e}"))))?;

        let mut values = Vec::with_capacity(value_columns.len());
        for (col, name) in &value_columns {
            let cell = record.get(*col).unwrap_or("");
            let v = parse_cell(cell)
                .map_err(|e| AppError::new(2, format!("Line {line}, column `{name}`: {e}")))?;
            values.push(v);
        }
        rows.push((month_start(date), values));
    }

    rows.sort_by_key(|(d, _)| *d);
    if let Some(w) = rows.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(AppError::new(2, format!("Duplicate month {} in raw table.", w[0].0)));
    }

    let index: Vec<NaiveDate> = rows.iter().map(|(d, _)| *d).collect();
    let columns: Vec<(String, Series)> = value_columns
        .iter()
        .enumerate()
        .map(|(j, (_, name))| (name.clone(), rows.iter().map(|(_, vals)| vals[j]).collect()))
        .collect();
    TimeFrame::from_columns(index, columns)
}

/// Load the metadata sheet from a local path or an http(s) URL.
pub fn load_metadata(source: &str) -> Result<Metadata, AppError> {
    let body = if source.starts_with("http://") || source.starts_with("https://") {
        debug!(url = %source, "fetching metadata");
        let resp = Client::new()
            .get(source)
            .send()
            .map_err(|e| AppError::new(4, format!("Metadata request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::new(
                4,
                format!("Metadata request failed with status {}.", resp.status()),
            ));
        }
        resp.text()
            .map_err(|e| AppError::new(4, format!("Failed to read metadata response: {e}")))?
    } else {
        fs::read_to_string(source).map_err(|e| AppError::new(2, format!("Failed to read metadata '{source}': {e}")))?
    };

    let metadata = parse_metadata_csv(&body)?;
    info!(entries = metadata.len(), "metadata loaded");
    Ok(metadata)
}

/// Parse the metadata sheet (`Identificador`, `Transformação` columns).
pub fn parse_metadata_csv(body: &str) -> Result<Metadata, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read metadata headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let id_idx = *header_map
        .get(METADATA_ID_COLUMN)
        .ok_or_else(|| AppError::new(2, "Metadata is missing the `Identificador` column."))?;
    let code_idx = METADATA_CODE_COLUMNS
        .iter()
        .find_map(|c| header_map.get(*c).copied())
        .ok_or_else(|| AppError::new(2, "Metadata is missing the `Transformação` column."))?;

    let mut pairs = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| AppError::new(2, format!("Metadata parse error: {e}")))?;
        let id = record.get(id_idx).unwrap_or("");
        if id.is_empty() {
            continue;
        }
        pairs.push((id.to_string(), record.get(code_idx).unwrap_or("").to_string()));
    }
    Ok(Metadata::from_pairs(pairs))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often carry a BOM on the first header.
    name.trim().trim_start_matches('\u{feff}').to_lowercase()
}

/// Parse a date in one of the accepted layouts (day optional).
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%Y-%m-%d %H:%M:%S"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    // `YYYY-MM` and `MM/YYYY` carry no day.
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        let padded = if fmt.starts_with("%Y") { format!("{s}-01") } else { format!("01/{s}") };
        if let Ok(d) = NaiveDate::parse_from_str(&padded, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, YYYY/MM/DD, DD/MM/YYYY, YYYY-MM, MM/YYYY."
    ))
}

fn parse_cell(s: &str) -> Result<Option<f64>, String> {
    if s.is_empty() || s == "." || s.eq_ignore_ascii_case("na") || s.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let v = s.parse::<f64>().map_err(|_| format!("invalid number '{s}'"))?;
    Ok(if v.is_finite() { Some(v) } else { None })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn raw_table_normalises_dates_and_missing_values() {
        let body = "\u{feff}date,Selic,ipca\n2024-02-15,10.5,NA\n2024-01-31,11.0,0.42\n2024-03-01,,.\n";
        let frame = parse_raw_table(body).unwrap();
        assert_eq!(frame.index(), &[d(2024, 1), d(2024, 2), d(2024, 3)]);
        assert_eq!(frame.column_names(), &["selic".to_string(), "ipca".to_string()]);
        assert_eq!(frame.column("selic").unwrap(), &[Some(11.0), Some(10.5), None]);
        assert_eq!(frame.column("ipca").unwrap(), &[Some(0.42), None, None]);
    }

    #[test]
    fn raw_table_rejects_duplicate_months_and_bad_numbers() {
        let dup = parse_raw_table("date,a\n2024-01-01,1\n2024-01-20,2\n").unwrap_err();
        assert_eq!(dup.exit_code(), 2);
        let bad = parse_raw_table("date,a\n2024-01-01,abc\n").unwrap_err();
        assert_eq!(bad.exit_code(), 2);
        assert!(bad.message().contains("column `a`"));
    }

    #[test]
    fn accepts_month_only_dates() {
        assert_eq!(parse_date("2024-05").unwrap(), d(2024, 5));
        assert_eq!(parse_date("05/2024").unwrap(), d(2024, 5));
        assert!(parse_date("May 2024").is_err());
    }

    #[test]
    fn metadata_reads_identifier_and_code() {
        let body = "Identificador,Nome,Transformação\nipca,Inflação,1\ncambio,Câmbio,5\n,,\n";
        let meta = parse_metadata_csv(body).unwrap();
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.transform_for("cambio").unwrap().code(), "5");
        assert_eq!(meta.transform_for("selic").unwrap_err().exit_code(), 2);
    }

    #[test]
    fn metadata_without_code_column_is_rejected() {
        let err = parse_metadata_csv("Identificador,Nome\nipca,x\n").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
