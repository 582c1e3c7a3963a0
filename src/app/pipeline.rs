//! Shared forecast pipeline used by the `forecast` command.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ingest -> align -> theory features -> transform -> sample filter ->
//! fit -> scenario -> forecasts -> history export -> AI forecast -> persist
//!
//! The network-bound steps (survey expectations, AI call) sit at the edges so
//! the modelling core can run on in-memory inputs.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::ai::{GeminiClient, PromptContext, build_prompt, parse_ai_forecast};
use crate::data::{Expectation, FocusClient, TimeFrame};
use crate::domain::{ForecastConfig, ForecastRow, ModelTag};
use crate::error::AppError;
use crate::io::{forecast_table_path, load_metadata, load_raw_table, write_forecast_table, write_history};
use crate::models::{build_forecaster, to_rows};
use crate::prep::features::INFLATION_TARGET_COLUMN;
use crate::prep::{Metadata, PreparedSample, align_frequencies, filter_sample, theory_features, transform_features};
use crate::scenario::{build_scenario, horizon_dates, last_inflation_target, survey_start};

/// Raw inputs of a run.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub monthly: TimeFrame,
    pub annual: TimeFrame,
    pub metadata: Metadata,
}

/// Aligned data plus the filtered training sample.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub aligned: TimeFrame,
    pub sample: PreparedSample,
}

impl Prepared {
    pub fn last_observation(&self) -> Result<NaiveDate, AppError> {
        self.sample
            .y
            .last_date()
            .ok_or_else(|| AppError::new(3, "The training sample is empty."))
    }
}

/// All computed outputs of a single `mf forecast` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub rows: Vec<ForecastRow>,
    pub table_path: PathBuf,
    pub history_path: PathBuf,
    pub observations: usize,
    pub dropped_columns: Vec<String>,
    pub last_observation: NaiveDate,
    pub horizon: Vec<NaiveDate>,
}

impl RunOutput {
    pub fn count(&self, tag: ModelTag) -> usize {
        self.rows.iter().filter(|r| r.model == tag).count()
    }
}

/// Execute the full pipeline and write the forecast table.
pub fn run_forecast(config: &ForecastConfig) -> Result<RunOutput, AppError> {
    // 1) Load raw inputs.
    let inputs = PipelineInputs {
        metadata: load_metadata(&config.metadata_source)?,
        monthly: load_raw_table(&config.data_dir.join("df_mensal.csv"))?,
        annual: load_raw_table(&config.data_dir.join("df_anual.csv"))?,
    };

    // 2) Align, build features, filter the sample.
    let prepared = prepare(config, &inputs)?;
    let last_observation = prepared.last_observation()?;
    let horizon = horizon_dates(last_observation, config.horizon);

    // 3) Survey expectations for the inflation-gap scenario.
    let since = survey_start(&horizon).ok_or_else(|| AppError::new(2, "The forecast horizon must be at least 1."))?;
    let expectations = FocusClient::new().fetch_expectations(since)?;

    // 4) Statistical forecasts.
    let mut rows = actual_rows(config, &prepared.sample)?;
    rows.extend(model_forecasts(config, &prepared, &expectations)?);

    // 5) History export, AI forecast, forecast table.
    let persisted = persist_run(config, &prepared.sample, &horizon, rows, |path, horizon| {
        ai_forecast(config, path, horizon)
    })?;

    Ok(RunOutput {
        rows: persisted.rows,
        table_path: persisted.table_path,
        history_path: persisted.history_path,
        observations: prepared.sample.y.len(),
        dropped_columns: prepared.sample.dropped_columns.clone(),
        last_observation,
        horizon,
    })
}

/// Rows and file locations after persisting a run.
#[derive(Debug, Clone)]
pub struct Persisted {
    pub rows: Vec<ForecastRow>,
    pub history_path: PathBuf,
    pub table_path: PathBuf,
}

/// Export the training history, append the AI forecast when enabled, and
/// write the forecast table.
///
/// The history lands in `data_dir/<target>.csv` whether or not the AI step
/// runs; `ai` receives its path and the horizon.
pub fn persist_run<F>(
    config: &ForecastConfig,
    sample: &PreparedSample,
    horizon: &[NaiveDate],
    mut rows: Vec<ForecastRow>,
    ai: F,
) -> Result<Persisted, AppError>
where
    F: FnOnce(&Path, &[NaiveDate]) -> Result<Vec<ForecastRow>, AppError>,
{
    let history_path = config
        .data_dir
        .join(format!("{}.csv", config.indicator.target_column()));
    write_history(&history_path, &sample.y, &sample.theory)?;

    if config.ai_enabled {
        rows.extend(ai(&history_path, horizon)?);
    } else {
        info!("AI forecast disabled");
    }

    let table_path = forecast_table_path(&config.output_dir, config.indicator);
    write_forecast_table(&table_path, &rows)?;

    Ok(Persisted {
        rows,
        history_path,
        table_path,
    })
}

/// Align frequencies, derive the theory features, transform, and filter.
pub fn prepare(config: &ForecastConfig, inputs: &PipelineInputs) -> Result<Prepared, AppError> {
    let target = config.indicator.target_column();
    let aligned = align_frequencies(&inputs.monthly, &inputs.annual)?;

    let y = aligned.select(&[target])?;
    let mut x = aligned.clone();
    x.drop_columns(&[target.to_string()]);

    let theory = theory_features(&x, &y, target, config.hp_lambda)?;
    let x = transform_features(&x, &inputs.metadata, &config.excluded_columns)?;
    let sample = filter_sample(&y, &x, &theory, target, config.train_start, config.na_threshold)?;

    info!(
        indicator = target,
        observations = sample.y.len(),
        first = %sample.y.first_date().map(|d| d.to_string()).unwrap_or_default(),
        last = %sample.y.last_date().map(|d| d.to_string()).unwrap_or_default(),
        "data prepared"
    );
    Ok(Prepared { aligned, sample })
}

/// Fit both statistical models and forecast them over the scenario.
pub fn model_forecasts(
    config: &ForecastConfig,
    prepared: &Prepared,
    expectations: &[Expectation],
) -> Result<Vec<ForecastRow>, AppError> {
    let target = config.indicator.target_column();
    let sample = &prepared.sample;
    let exog = sample.theory.reindex(sample.y.index())?;
    let last_observation = prepared.last_observation()?;

    let inflation_target = last_inflation_target(&prepared.aligned, INFLATION_TARGET_COLUMN)?;
    let scenario = build_scenario(
        &sample.theory,
        last_observation,
        config.horizon,
        expectations,
        inflation_target,
    )?;

    let mut rows = Vec::new();
    for tag in [ModelTag::Ensemble, ModelTag::BayesianRidge] {
        let mut model = build_forecaster(tag, config.lags, config.seed)?;
        model.fit(&sample.y, target, &exog)?;
        let forecasts = model.predict_interval(config.horizon, &scenario, config.n_boot, config.seed, config.interval)?;
        info!(model = tag.model_name(), steps = forecasts.len(), "forecast produced");
        rows.extend(to_rows(&forecasts, tag));
    }
    Ok(rows)
}

/// Observed target over the training window, tagged as actual.
pub fn actual_rows(config: &ForecastConfig, sample: &PreparedSample) -> Result<Vec<ForecastRow>, AppError> {
    let values = sample.y.require(config.indicator.target_column())?;
    Ok(sample
        .y
        .index()
        .iter()
        .zip(values)
        .filter_map(|(date, v)| {
            v.map(|value| ForecastRow {
                date: *date,
                value,
                lower: None,
                upper: None,
                model: ModelTag::Actual,
            })
        })
        .collect())
}

fn ai_forecast(config: &ForecastConfig, history_path: &Path, horizon: &[NaiveDate]) -> Result<Vec<ForecastRow>, AppError> {
    let (Some(&first_month), Some(&last_month)) = (horizon.first(), horizon.last()) else {
        return Ok(Vec::new());
    };
    let client = GeminiClient::from_env(&config.ai_model)?;

    let history = fs::read_to_string(history_path)
        .map_err(|e| AppError::new(2, format!("Failed to read history '{}': {e}", history_path.display())))?;
    let file_name = history_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("history.csv");
    let prompt = build_prompt(&PromptContext {
        indicator: config.indicator,
        today: config.today,
        first_month,
        last_month,
        file_name,
    });

    let text = client.generate(&prompt, &history)?;
    let points = parse_ai_forecast(&text)?;
    info!(model = client.model(), rows = points.len(), "AI forecast parsed");

    Ok(points
        .into_iter()
        .map(|(date, value)| ForecastRow {
            date,
            value,
            lower: None,
            upper: None,
            model: ModelTag::Ai,
        })
        .collect())
}
