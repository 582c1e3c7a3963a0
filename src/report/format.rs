//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the pipeline code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::app::pipeline::RunOutput;
use crate::domain::{ForecastConfig, ForecastRow, Indicator, ModelTag};

/// Format the run summary (sample, scenario window, output location).
pub fn format_run_summary(run: &RunOutput, config: &ForecastConfig) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== mf - {} ===\n", config.indicator.title()));
    out.push_str(&format!(
        "Sample: n={} | {} .. {}\n",
        run.observations,
        config.train_start.format("%Y-%m"),
        run.last_observation.format("%Y-%m"),
    ));
    if !run.dropped_columns.is_empty() {
        out.push_str(&format!("Dropped (missing): {}\n", run.dropped_columns.join(", ")));
    }
    if let (Some(first), Some(last)) = (run.horizon.first(), run.horizon.last()) {
        out.push_str(&format!(
            "Horizon: {} months | {} .. {}\n",
            run.horizon.len(),
            first.format("%Y-%m"),
            last.format("%Y-%m"),
        ));
    }
    out.push_str(&format!(
        "Interval: p{}-p{} | n_boot={} | seed={}\n",
        fmt_pct(config.interval[0]),
        fmt_pct(config.interval[1]),
        config.n_boot,
        config.seed,
    ));

    let counts: Vec<String> = ModelTag::FORECASTS
        .iter()
        .filter(|tag| run.count(**tag) > 0)
        .map(|tag| format!("{}={}", tag.display_name(config.indicator), run.count(*tag)))
        .collect();
    out.push_str(&format!("Forecasts: {}\n", counts.join(" ")));
    out.push_str(&format!("Table: {}\n", run.table_path.display()));
    out.push_str(&format!("History: {}\n", run.history_path.display()));

    out
}

/// Format the forecast rows of a table (actuals are skipped).
///
/// Rows are grouped by model, then ordered by date. Values are rounded to two
/// decimals and dates follow the indicator's frequency.
pub fn format_forecast_table(rows: &[ForecastRow], indicator: Indicator) -> String {
    let mut forecasts: Vec<&ForecastRow> = rows.iter().filter(|r| r.model != ModelTag::Actual).collect();
    forecasts.sort_by_key(|r| (r.model, r.date));

    let mut out = String::new();
    out.push_str(&format!("{} ({})\n", indicator.title(), indicator.unit()));
    if forecasts.is_empty() {
        out.push_str("(no forecasts)\n");
        return out;
    }

    out.push_str(format!("{:<10} {:<16} {:>10} {:>10} {:>10}", "date", "model", "value", "lower", "upper").trim_end());
    out.push('\n');
    out.push_str(&format!("{:-<10} {:-<16} {:-<10} {:-<10} {:-<10}\n", "", "", "", "", ""));

    let freq = indicator.frequency();
    for r in forecasts {
        out.push_str(&format!(
            "{:<10} {:<16} {:>10} {:>10} {:>10}\n",
            freq.format(r.date),
            r.model.display_name(indicator),
            format!("{:.2}", r.value),
            fmt_bound(r.lower),
            fmt_bound(r.upper),
        ));
    }

    out
}

fn fmt_bound(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "-".to_string())
}

fn fmt_pct(p: f64) -> String {
    if p.fract() == 0.0 { format!("{p:.0}") } else { format!("{p}") }
}
