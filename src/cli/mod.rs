//! Command-line parsing for the macro forecaster.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::data::month_start;
use crate::domain::{
    DEFAULT_AI_MODEL, DEFAULT_HORIZON, DEFAULT_HP_LAMBDA, DEFAULT_LAGS, DEFAULT_N_BOOT, DEFAULT_NA_THRESHOLD,
    DEFAULT_SEED, Indicator,
};
use crate::io::ingest::parse_date;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "mf", version, about = "Brazilian macro forecaster (Selic, IPCA, Câmbio, PIB)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the models for one indicator and write its forecast table.
    Forecast(ForecastArgs),
    /// Print the forecasts stored in an indicator's table.
    Table(TableArgs),
    /// Launch the interactive dashboard over the stored tables.
    Dashboard(DashboardArgs),
}

/// Options for a forecast run.
#[derive(Debug, Parser, Clone)]
pub struct ForecastArgs {
    /// Indicator to forecast.
    #[arg(short = 'i', long, value_enum)]
    pub indicator: Indicator,

    /// Forecast horizon in months.
    #[arg(long, default_value_t = DEFAULT_HORIZON)]
    pub horizon: usize,

    /// First month of the training sample (YYYY-MM or YYYY-MM-DD).
    #[arg(long, value_parser = parse_month, default_value = "2004-01-01")]
    pub train_start: NaiveDate,

    /// Seed for the SVR shuffle and the bootstrap.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Bootstrap paths per interval forecast.
    #[arg(long, default_value_t = DEFAULT_N_BOOT)]
    pub n_boot: usize,

    /// Lower percentile of the prediction interval.
    #[arg(long, default_value_t = 5.0)]
    pub lower_pct: f64,

    /// Upper percentile of the prediction interval.
    #[arg(long, default_value_t = 95.0)]
    pub upper_pct: f64,

    /// Drop features whose missing share (relative to the target) reaches this value.
    #[arg(long, default_value_t = DEFAULT_NA_THRESHOLD)]
    pub na_threshold: f64,

    /// HP filter smoothing penalty for output potential.
    #[arg(long, default_value_t = DEFAULT_HP_LAMBDA)]
    pub hp_lambda: f64,

    /// Autoregressive lags of the target.
    #[arg(long, default_value_t = DEFAULT_LAGS)]
    pub lags: usize,

    /// Raw columns left untransformed (repeatable; replaces the defaults).
    #[arg(long = "exclude", value_name = "COLUMN")]
    pub exclude: Vec<String>,

    /// Directory with df_mensal.csv and df_anual.csv.
    #[arg(long, default_value = "dados")]
    pub data_dir: PathBuf,

    /// Directory for the forecast tables.
    #[arg(long, default_value = "previsao")]
    pub output_dir: PathBuf,

    /// Metadata CSV (local path or http(s) URL).
    #[arg(long, default_value = "dados/metadados.csv")]
    pub metadata: String,

    /// Skip the generative-AI forecast.
    #[arg(long)]
    pub no_ai: bool,

    /// Generative model used for the AI forecast.
    #[arg(long, default_value = DEFAULT_AI_MODEL)]
    pub ai_model: String,

    /// Date the AI prompt treats as today (defaults to the local date).
    #[arg(long, value_parser = parse_day)]
    pub today: Option<NaiveDate>,
}

/// Options for printing a stored table.
#[derive(Debug, Parser, Clone)]
pub struct TableArgs {
    /// Indicator whose table to print.
    #[arg(short = 'i', long, value_enum)]
    pub indicator: Indicator,

    /// Directory with the forecast tables.
    #[arg(long, default_value = "previsao")]
    pub output_dir: PathBuf,
}

/// Options for the dashboard.
#[derive(Debug, Parser, Clone)]
pub struct DashboardArgs {
    /// Directory with the forecast tables.
    #[arg(long, default_value = "previsao")]
    pub output_dir: PathBuf,

    /// Reference date for the default chart start (defaults to the local date).
    #[arg(long, value_parser = parse_day)]
    pub today: Option<NaiveDate>,
}

fn parse_month(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).map(month_start)
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date '{s}' (expected YYYY-MM-DD): {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forecast_defaults_match_the_pipeline_constants() {
        let cli = Cli::parse_from(["mf", "forecast", "-i", "selic"]);
        let Command::Forecast(args) = cli.command else {
            panic!("expected forecast");
        };
        assert_eq!(args.indicator, Indicator::Selic);
        assert_eq!(args.horizon, 12);
        assert_eq!(args.train_start, NaiveDate::from_ymd_opt(2004, 1, 1).unwrap());
        assert_eq!(args.seed, 1984);
        assert_eq!(args.n_boot, 5000);
        assert!(args.exclude.is_empty());
        assert!(!args.no_ai);
    }

    #[test]
    fn train_start_accepts_a_bare_month() {
        let cli = Cli::parse_from(["mf", "forecast", "-i", "pib", "--train-start", "2010-07", "--no-ai"]);
        let Command::Forecast(args) = cli.command else {
            panic!("expected forecast");
        };
        assert_eq!(args.train_start, NaiveDate::from_ymd_opt(2010, 7, 1).unwrap());
        assert!(args.no_ai);
    }
}
