//! Shared domain types.
//!
//! These types are intentionally kept small and serializable so they can be:
//!
//! - passed between pipeline stages by value
//! - persisted to the per-indicator forecast CSV
//! - reloaded by the dashboard

use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Default forecast horizon (months).
pub const DEFAULT_HORIZON: usize = 12;
/// Default seed for every stochastic component (SVR shuffle, bootstrap).
pub const DEFAULT_SEED: u64 = 1984;
/// Default number of bootstrap paths per interval forecast.
pub const DEFAULT_N_BOOT: usize = 5000;
/// Columns with at least this share of missing values (relative to y) are dropped.
pub const DEFAULT_NA_THRESHOLD: f64 = 0.2;
/// HP smoothing penalty for monthly output data.
pub const DEFAULT_HP_LAMBDA: f64 = 14_400.0;
/// Autoregressive lags of the target.
pub const DEFAULT_LAGS: usize = 2;
/// Lower/upper percentiles of the prediction interval.
pub const DEFAULT_INTERVAL: [f64; 2] = [5.0, 95.0];
/// Raw columns that are never transformed (they have no metadata entry).
pub const DEFAULT_EXCLUDED_COLUMNS: [&str; 2] = ["saldo_caged_antigo", "saldo_caged_novo"];
/// Default generative model used for the AI forecast.
pub const DEFAULT_AI_MODEL: &str = "gemini-1.5-pro";

/// First month of the training sample.
pub fn default_train_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2004, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Forecast target indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    Selic,
    Ipca,
    Cambio,
    Pib,
}

impl Indicator {
    /// Panel order used by the dashboard.
    pub const ALL: [Indicator; 4] = [Indicator::Ipca, Indicator::Cambio, Indicator::Pib, Indicator::Selic];

    /// Column holding the target series in the raw tables.
    pub fn target_column(self) -> &'static str {
        match self {
            Indicator::Selic => "selic",
            Indicator::Ipca => "ipca",
            Indicator::Cambio => "cambio",
            Indicator::Pib => "pib",
        }
    }

    /// Short label; also the display name of the actual series.
    pub fn label(self) -> &'static str {
        match self {
            Indicator::Selic => "Selic",
            Indicator::Ipca => "IPCA",
            Indicator::Cambio => "Câmbio",
            Indicator::Pib => "PIB",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Indicator::Selic => "Taxa de Juros (SELIC)",
            Indicator::Ipca => "Inflação (IPCA)",
            Indicator::Cambio => "Taxa de Câmbio (BRL/USD)",
            Indicator::Pib => "Atividade Econômica (PIB)",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Indicator::Selic => "% a.a.",
            Indicator::Ipca => "Var. %",
            Indicator::Cambio => "R$/US$",
            Indicator::Pib => "Var. % anual",
        }
    }

    /// Whether the chart draws a dashed zero line.
    pub fn zero_line(self) -> bool {
        matches!(self, Indicator::Ipca | Indicator::Pib)
    }

    pub fn frequency(self) -> DateFreq {
        match self {
            Indicator::Pib => DateFreq::Quarterly,
            _ => DateFreq::Monthly,
        }
    }

    /// Natural-language description used in the AI prompt.
    pub fn description(self) -> &'static str {
        match self {
            Indicator::Selic => {
                "Selic Target Interest Rate for Brazil, measured in % per annum and published by Banco Central do Brasil"
            }
            Indicator::Ipca => {
                "IPCA consumer price inflation for Brazil, measured as monthly % change and published by IBGE"
            }
            Indicator::Cambio => {
                "BRL/USD exchange rate, measured in Brazilian reais per US dollar and published by Banco Central do Brasil"
            }
            Indicator::Pib => "GDP growth for Brazil, measured as annual % change and published by IBGE",
        }
    }
}

/// Display frequency of dates in forecast tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFreq {
    Monthly,
    Quarterly,
}

impl DateFreq {
    /// Format a date as `MM/YYYY` (monthly) or `T<q>/YYYY` (quarterly).
    pub fn format(self, date: NaiveDate) -> String {
        match self {
            DateFreq::Monthly => date.format("%m/%Y").to_string(),
            DateFreq::Quarterly => format!("T{}/{}", (date.month() - 1) / 3 + 1, date.year()),
        }
    }
}

/// Closed set of series labels in a forecast table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTag {
    Actual,
    Ensemble,
    BayesianRidge,
    Ai,
}

impl ModelTag {
    /// Every tag that labels a forecast (everything but `Actual`).
    pub const FORECASTS: [ModelTag; 3] = [ModelTag::Ensemble, ModelTag::BayesianRidge, ModelTag::Ai];

    /// Human-readable label; the actual series takes the indicator's name.
    pub fn display_name(self, indicator: Indicator) -> &'static str {
        match self {
            ModelTag::Actual => indicator.label(),
            ModelTag::Ensemble => "Ensemble",
            ModelTag::BayesianRidge => "Bayesian Ridge",
            ModelTag::Ai => "IA",
        }
    }

    /// Label that does not depend on the indicator (for model pickers).
    pub fn model_name(self) -> &'static str {
        match self {
            ModelTag::Actual => "Actual",
            ModelTag::Ensemble => "Ensemble",
            ModelTag::BayesianRidge => "Bayesian Ridge",
            ModelTag::Ai => "IA",
        }
    }
}

/// One row of the long-format forecast table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub value: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub model: ModelTag,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults) and passed to every stage.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub indicator: Indicator,
    /// Forecast horizon `h` in months.
    pub horizon: usize,
    pub train_start: NaiveDate,
    pub seed: u64,
    pub n_boot: usize,
    /// Lower/upper percentiles of the bootstrap interval.
    pub interval: [f64; 2],
    pub na_threshold: f64,
    pub hp_lambda: f64,
    pub lags: usize,
    pub excluded_columns: Vec<String>,

    /// Directory with `df_mensal.csv` / `df_anual.csv`; the AI history export lands here too.
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Local path or http(s) URL of the metadata CSV.
    pub metadata_source: String,

    pub ai_enabled: bool,
    pub ai_model: String,
    /// Date the AI prompt treats as "today".
    pub today: NaiveDate,
}

impl ForecastConfig {
    pub fn new(indicator: Indicator, today: NaiveDate) -> Self {
        Self {
            indicator,
            horizon: DEFAULT_HORIZON,
            train_start: default_train_start(),
            seed: DEFAULT_SEED,
            n_boot: DEFAULT_N_BOOT,
            interval: DEFAULT_INTERVAL,
            na_threshold: DEFAULT_NA_THRESHOLD,
            hp_lambda: DEFAULT_HP_LAMBDA,
            lags: DEFAULT_LAGS,
            excluded_columns: DEFAULT_EXCLUDED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            data_dir: PathBuf::from("dados"),
            output_dir: PathBuf::from("previsao"),
            metadata_source: "dados/metadados.csv".to_string(),
            ai_enabled: true,
            ai_model: DEFAULT_AI_MODEL.to_string(),
            today,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarterly_format_uses_quarter_number() {
        let d = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        assert_eq!(DateFreq::Quarterly.format(d), "T3/2024");
        assert_eq!(DateFreq::Monthly.format(d), "08/2024");
    }

    #[test]
    fn actual_tag_takes_indicator_label() {
        assert_eq!(ModelTag::Actual.display_name(Indicator::Cambio), "Câmbio");
        assert_eq!(ModelTag::Ai.display_name(Indicator::Cambio), "IA");
    }
}
