//! BCB Focus survey integration (12-month-ahead IPCA expectations).
//!
//! The Olinda OData service returns CSV with Brazilian number formatting
//! (decimal comma, quoted). Parsing is kept separate from the HTTP call so it
//! can be tested without the network.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::data::calendar::month_start;
use crate::error::AppError;

const BASE_URL: &str =
    "https://olinda.bcb.gov.br/olinda/servico/Expectativas/versao/v1/odata/ExpectativasMercadoInflacao12Meses";

/// One survey observation (daily release date, median expectation in %).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expectation {
    pub date: NaiveDate,
    pub median: f64,
}

pub struct FocusClient {
    client: Client,
}

impl FocusClient {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }

    /// Smoothed IPCA expectations (calculation base 0) released on or after `since`.
    pub fn fetch_expectations(&self, since: NaiveDate) -> Result<Vec<Expectation>, AppError> {
        let url = format!(
            "{BASE_URL}?$filter=Indicador%20eq%20'IPCA'%20and%20Suavizada%20eq%20'S'%20and%20baseCalculo%20eq%200%20and%20Data%20ge%20'{}'&$format=text/csv",
            since.format("%Y-%m-%d")
        );
        debug!(%url, "fetching survey expectations");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| AppError::new(4, format!("Survey request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::new(
                4,
                format!("Survey request failed with status {}.", resp.status()),
            ));
        }

        let body = resp
            .text()
            .map_err(|e| AppError::new(4, format!("Failed to read survey response: {e}")))?;
        let out = parse_expectations_csv(&body)?;
        info!(observations = out.len(), since = %since, "survey expectations fetched");
        Ok(out)
    }
}

impl Default for FocusClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the Olinda CSV body (`Data` and `Mediana` columns).
pub fn parse_expectations_csv(body: &str) -> Result<Vec<Expectation>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(4, format!("Failed to read survey CSV headers: {e}")))?
        .clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
            .ok_or_else(|| AppError::new(4, format!("Survey CSV is missing the `{name}` column.")))
    };
    let date_idx = find("Data")?;
    let median_idx = find("Mediana")?;

    let mut out = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2;
        let record = record.map_err(|e| AppError::new(4, format!("Survey CSV parse error on line {line}: {e}")))?;
        let raw_date = record.get(date_idx).unwrap_or("");
        let raw_median = record.get(median_idx).unwrap_or("");

        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|e| AppError::new(4, format!("Invalid survey date '{raw_date}' on line {line}: {e}")))?;
        let median = parse_decimal_comma(raw_median)
            .ok_or_else(|| AppError::new(4, format!("Invalid survey median '{raw_median}' on line {line}.")))?;
        out.push(Expectation { date, median });
    }
    Ok(out)
}

/// Average same-month observations, keyed by month start.
pub fn monthly_means(observations: &[Expectation]) -> BTreeMap<NaiveDate, f64> {
    let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for obs in observations {
        let entry = sums.entry(month_start(obs.date)).or_insert((0.0, 0));
        entry.0 += obs.median;
        entry.1 += 1;
    }
    sums.into_iter().map(|(d, (s, n))| (d, s / n as f64)).collect()
}

fn parse_decimal_comma(raw: &str) -> Option<f64> {
    let v = raw.trim().replace(',', ".").parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "Indicador,Data,Suavizada,Media,Mediana,DesvioPadrao,Minimo,Maximo,numeroRespondentes,baseCalculo\n\
IPCA,2024-05-03,S,\"3,71\",\"3,70\",\"0,3\",\"3,0\",\"4,5\",80,0\n\
IPCA,2024-05-10,S,\"3,75\",\"3,80\",\"0,3\",\"3,0\",\"4,5\",80,0\n\
IPCA,2024-06-07,S,\"3,90\",\"3,95\",\"0,3\",\"3,0\",\"4,5\",80,0\n";

    #[test]
    fn parses_decimal_comma_medians() {
        let obs = parse_expectations_csv(BODY).unwrap();
        assert_eq!(obs.len(), 3);
        assert!((obs[0].median - 3.70).abs() < 1e-12);
        assert_eq!(obs[2].date, NaiveDate::from_ymd_opt(2024, 6, 7).unwrap());
    }

    #[test]
    fn averages_same_month_observations() {
        let obs = parse_expectations_csv(BODY).unwrap();
        let means = monthly_means(&obs);
        let may = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let june = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(means.len(), 2);
        assert!((means[&may] - 3.75).abs() < 1e-12);
        assert!((means[&june] - 3.95).abs() < 1e-12);
    }

    #[test]
    fn missing_median_column_is_an_error() {
        let err = parse_expectations_csv("Data,Media\n2024-01-02,\"1,0\"\n").unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
