//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - installs the tracing subscriber
//! - runs the forecast pipeline or loads stored tables
//! - prints reports or hands over to the dashboard

use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Command, DashboardArgs, ForecastArgs, TableArgs};
use crate::domain::{DEFAULT_EXCLUDED_COLUMNS, ForecastConfig};
use crate::error::AppError;
use crate::io::{forecast_table_path, read_forecast_table};

pub mod pipeline;

/// Entry point for the `mf` binary.
pub fn run() -> Result<(), AppError> {
    // `mf` alone opens the dashboard. Clap requires a subcommand name, so the
    // argv list is rewritten before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Forecast(args) => {
            init_tracing("info");
            handle_forecast(args)
        }
        Command::Table(args) => {
            init_tracing("info");
            handle_table(args)
        }
        Command::Dashboard(args) => {
            // Log lines would tear the alternate screen.
            init_tracing("warn");
            handle_dashboard(args)
        }
    }
}

/// Install a stderr subscriber; `RUST_LOG` overrides `default_level`.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());
    // A second init (tests, embedding) is not an error worth surfacing.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn handle_forecast(args: ForecastArgs) -> Result<(), AppError> {
    let config = config_from_args(&args, Local::now().date_naive())?;
    let run = pipeline::run_forecast(&config)?;

    println!("{}", crate::report::format_run_summary(&run, &config));
    println!("{}", crate::report::format_forecast_table(&run.rows, config.indicator));
    Ok(())
}

fn handle_table(args: TableArgs) -> Result<(), AppError> {
    let path = forecast_table_path(&args.output_dir, args.indicator);
    let rows = read_forecast_table(&path)?;
    println!("{}", crate::report::format_forecast_table(&rows, args.indicator));
    Ok(())
}

fn handle_dashboard(args: DashboardArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    crate::dashboard::run(&args.output_dir, today)
}

/// Build the pipeline configuration from parsed flags.
///
/// `local_today` is only used when `--today` is absent.
pub fn config_from_args(args: &ForecastArgs, local_today: NaiveDate) -> Result<ForecastConfig, AppError> {
    if args.horizon == 0 {
        return Err(AppError::new(2, "--horizon must be at least 1."));
    }
    if args.n_boot == 0 {
        return Err(AppError::new(2, "--n-boot must be at least 1."));
    }
    let in_range = |p: f64| (0.0..=100.0).contains(&p);
    if !in_range(args.lower_pct) || !in_range(args.upper_pct) || args.lower_pct >= args.upper_pct {
        return Err(AppError::new(
            2,
            "Interval percentiles must satisfy 0 <= --lower-pct < --upper-pct <= 100.",
        ));
    }
    if !(args.na_threshold > 0.0 && args.na_threshold <= 1.0) {
        return Err(AppError::new(2, "--na-threshold must be in (0, 1]."));
    }
    if !(args.hp_lambda > 0.0) {
        return Err(AppError::new(2, "--hp-lambda must be positive."));
    }
    if args.lags == 0 {
        return Err(AppError::new(2, "--lags must be at least 1."));
    }

    let excluded_columns = if args.exclude.is_empty() {
        DEFAULT_EXCLUDED_COLUMNS.iter().map(|c| c.to_string()).collect()
    } else {
        args.exclude.clone()
    };

    Ok(ForecastConfig {
        indicator: args.indicator,
        horizon: args.horizon,
        train_start: args.train_start,
        seed: args.seed,
        n_boot: args.n_boot,
        interval: [args.lower_pct, args.upper_pct],
        na_threshold: args.na_threshold,
        hp_lambda: args.hp_lambda,
        lags: args.lags,
        excluded_columns,
        data_dir: args.data_dir.clone(),
        output_dir: args.output_dir.clone(),
        metadata_source: args.metadata.clone(),
        ai_enabled: !args.no_ai,
        ai_model: args.ai_model.clone(),
        today: args.today.unwrap_or(local_today),
    })
}

/// Rewrite argv so `mf` defaults to `mf dashboard`.
///
/// Rules:
/// - `mf`                      -> `mf dashboard`
/// - `mf --output-dir X ...`   -> `mf dashboard --output-dir X ...`
/// - `mf --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("dashboard".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "forecast" | "table" | "dashboard");
    if is_subcommand {
        return argv;
    }

    // A leading flag is a dashboard flag.
    if arg1.starts_with('-') {
        argv.insert(1, "dashboard".to_string());
        return argv;
    }

    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::domain::Indicator;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn forecast_args(extra: &[&str]) -> ForecastArgs {
        let mut argv = vec!["mf", "forecast", "-i", "ipca"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Forecast(a) => a,
            _ => panic!("expected forecast"),
        }
    }

    #[test]
    fn bare_invocation_opens_dashboard() {
        assert_eq!(rewrite_args(args(&["mf"])), args(&["mf", "dashboard"]));
        assert_eq!(
            rewrite_args(args(&["mf", "--output-dir", "out"])),
            args(&["mf", "dashboard", "--output-dir", "out"])
        );
        assert_eq!(rewrite_args(args(&["mf", "--help"])), args(&["mf", "--help"]));
        assert_eq!(
            rewrite_args(args(&["mf", "table", "-i", "pib"])),
            args(&["mf", "table", "-i", "pib"])
        );
    }

    #[test]
    fn config_uses_default_exclusions_and_local_date() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let config = config_from_args(&forecast_args(&[]), today).unwrap();
        assert_eq!(config.indicator, Indicator::Ipca);
        assert_eq!(config.excluded_columns, vec!["saldo_caged_antigo", "saldo_caged_novo"]);
        assert_eq!(config.interval, [5.0, 95.0]);
        assert_eq!(config.today, today);
        assert!(config.ai_enabled);
    }

    #[test]
    fn explicit_flags_override_defaults() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let a = forecast_args(&[
            "--exclude",
            "x1",
            "--exclude",
            "x2",
            "--today",
            "2024-12-31",
            "--lower-pct",
            "10",
            "--upper-pct",
            "90",
            "--no-ai",
        ]);
        let config = config_from_args(&a, today).unwrap();
        assert_eq!(config.excluded_columns, vec!["x1", "x2"]);
        assert_eq!(config.today, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(config.interval, [10.0, 90.0]);
        assert!(!config.ai_enabled);
    }

    #[test]
    fn invalid_interval_or_horizon_is_rejected() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let inverted = forecast_args(&["--lower-pct", "95", "--upper-pct", "5"]);
        assert_eq!(config_from_args(&inverted, today).unwrap_err().exit_code(), 2);
        let zero = forecast_args(&["--horizon", "0"]);
        assert_eq!(config_from_args(&zero, today).unwrap_err().exit_code(), 2);
    }
}
