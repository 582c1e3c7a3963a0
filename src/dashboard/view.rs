//! Pure view functions behind the dashboard.
//!
//! Nothing here touches the terminal: the TUI feeds loaded tables and the
//! current [`FilterState`] in and draws whatever comes out. That keeps the
//! filtering rules testable on their own.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};

use crate::data::{add_months, month_start};
use crate::domain::{ForecastRow, Indicator, ModelTag};

/// Earliest month the start-date picker allows.
pub const START_FLOOR: (i32, u32) = (2004, 1);
/// Years of history shown by default.
const DEFAULT_LOOKBACK_YEARS: i32 = 6;

/// A forecast-table row as the dashboard sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub row: ForecastRow,
    /// Synthetic row joining a forecast line to the last actual point.
    pub seam: bool,
}

/// User selection shared by every panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub selected: BTreeSet<ModelTag>,
    pub start: NaiveDate,
    pub show_ci: bool,
}

/// One line of a chart, with its optional interval band.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub tag: ModelTag,
    pub label: &'static str,
    pub points: Vec<(NaiveDate, f64)>,
    /// `(date, lower, upper)`; empty when intervals are hidden or absent.
    pub band: Vec<(NaiveDate, f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub series: Vec<ChartSeries>,
    pub x_bounds: Option<[NaiveDate; 2]>,
    pub y_bounds: [f64; 2],
    pub zero_line: bool,
}

/// A formatted row of the forecast table panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub date: String,
    pub model: &'static str,
    pub value: String,
    pub lower: String,
    pub upper: String,
}

/// Mark rows and append seam rows.
///
/// Each forecast tag except the AI one gets a copy of the last actual
/// observation (bounds equal to the value), so its line starts where the
/// history ends.
pub fn prepare_table(rows: Vec<ForecastRow>) -> Vec<ViewRow> {
    let last_actual = rows
        .iter()
        .filter(|r| r.model == ModelTag::Actual)
        .max_by_key(|r| r.date)
        .cloned();
    let seam_tags: BTreeSet<ModelTag> = rows
        .iter()
        .map(|r| r.model)
        .filter(|t| !matches!(t, ModelTag::Actual | ModelTag::Ai))
        .collect();

    let mut out: Vec<ViewRow> = rows.into_iter().map(|row| ViewRow { row, seam: false }).collect();
    if let Some(last) = last_actual {
        for tag in seam_tags {
            out.push(ViewRow {
                row: ForecastRow {
                    date: last.date,
                    value: last.value,
                    lower: Some(last.value),
                    upper: Some(last.value),
                    model: tag,
                },
                seam: true,
            });
        }
    }
    out
}

/// Series for the actual data plus every selected model, from `state.start` on.
pub fn chart_view(table: &[ViewRow], indicator: Indicator, state: &FilterState) -> ChartView {
    let mut grouped: BTreeMap<ModelTag, Vec<&ForecastRow>> = BTreeMap::new();
    for r in table {
        let row = &r.row;
        let visible = row.model == ModelTag::Actual || state.selected.contains(&row.model);
        if visible && row.date >= state.start {
            grouped.entry(row.model).or_default().push(row);
        }
    }

    let mut series = Vec::with_capacity(grouped.len());
    for (tag, mut rows) in grouped {
        rows.sort_by_key(|r| r.date);
        let points = rows.iter().map(|r| (r.date, r.value)).collect();
        let band = if state.show_ci {
            rows.iter()
                .filter_map(|r| Some((r.date, r.lower?, r.upper?)))
                .collect()
        } else {
            Vec::new()
        };
        series.push(ChartSeries {
            tag,
            label: tag.display_name(indicator),
            points,
            band,
        });
    }

    let x_bounds = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.0))
        .fold(None, |acc: Option<[NaiveDate; 2]>, d| match acc {
            None => Some([d, d]),
            Some([lo, hi]) => Some([lo.min(d), hi.max(d)]),
        });

    ChartView {
        y_bounds: y_bounds(&series, indicator.zero_line()),
        series,
        x_bounds,
        zero_line: indicator.zero_line(),
    }
}

/// Forecast rows for the table panel: no actuals, no seam rows.
pub fn table_view(table: &[ViewRow], indicator: Indicator) -> Vec<TableRow> {
    let freq = indicator.frequency();
    let fmt = |v: Option<f64>| v.map(|x| format!("{x:.2}")).unwrap_or_default();

    let mut rows: Vec<&ForecastRow> = table
        .iter()
        .filter(|r| !r.seam && r.row.model != ModelTag::Actual)
        .map(|r| &r.row)
        .collect();
    rows.sort_by_key(|r| (r.model, r.date));

    rows.into_iter()
        .map(|r| TableRow {
            date: freq.format(r.date),
            model: r.model.display_name(indicator),
            value: format!("{:.2}", r.value),
            lower: fmt(r.lower),
            upper: fmt(r.upper),
        })
        .collect()
}

/// Every non-actual tag across the loaded tables, in display order.
pub fn model_list<'a>(tables: impl IntoIterator<Item = &'a [ViewRow]>) -> Vec<ModelTag> {
    let tags: BTreeSet<ModelTag> = tables
        .into_iter()
        .flat_map(|t| t.iter().map(|r| r.row.model))
        .filter(|t| *t != ModelTag::Actual)
        .collect();
    tags.into_iter().collect()
}

/// Range of the start-date picker: the floor month up to the latest date of
/// the reference table (clamped so the range is never inverted).
pub fn date_bounds(reference: &[ViewRow]) -> [NaiveDate; 2] {
    let floor = NaiveDate::from_ymd_opt(START_FLOOR.0, START_FLOOR.1, 1).unwrap_or(NaiveDate::MIN);
    let latest = reference
        .iter()
        .map(|r| month_start(r.row.date))
        .max()
        .unwrap_or(floor);
    [floor, latest.max(floor)]
}

/// January 1st six years before `today`, clamped to `bounds`.
pub fn default_start(today: NaiveDate, bounds: [NaiveDate; 2]) -> NaiveDate {
    let start = NaiveDate::from_ymd_opt(today.year() - DEFAULT_LOOKBACK_YEARS, 1, 1).unwrap_or(bounds[0]);
    start.clamp(bounds[0], bounds[1])
}

/// Move `start` by `months`, staying inside `bounds`.
pub fn step_start(start: NaiveDate, months: i32, bounds: [NaiveDate; 2]) -> NaiveDate {
    add_months(start, months).clamp(bounds[0], bounds[1])
}

/// Last computed chart for one panel; recomputed only when the state changes.
#[derive(Debug, Default)]
pub struct ViewCache {
    entry: Option<(FilterState, ChartView)>,
    computations: usize,
}

impl ViewCache {
    pub fn chart(&mut self, table: &[ViewRow], indicator: Indicator, state: &FilterState) -> &ChartView {
        if !matches!(&self.entry, Some((key, _)) if key == state) {
            self.entry = None;
        }
        let (_, view) = self.entry.get_or_insert_with(|| {
            self.computations += 1;
            (state.clone(), chart_view(table, indicator, state))
        });
        view
    }

    /// Number of times a view was actually computed.
    pub fn computations(&self) -> usize {
        self.computations
    }
}

fn y_bounds(series: &[ChartSeries], zero_line: bool) -> [f64; 2] {
    let values = series.iter().flat_map(|s| {
        s.points
            .iter()
            .map(|p| p.1)
            .chain(s.band.iter().flat_map(|b| [b.1, b.2]))
    });
    let (mut lo, mut hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if zero_line && lo.is_finite() {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return [0.0, 1.0];
    }
    if hi <= lo {
        return [lo - 1.0, hi + 1.0];
    }
    let pad = (hi - lo) * 0.05;
    [lo - pad, hi + pad]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn row(date: NaiveDate, value: f64, bounds: Option<(f64, f64)>, model: ModelTag) -> ForecastRow {
        ForecastRow {
            date,
            value,
            lower: bounds.map(|b| b.0),
            upper: bounds.map(|b| b.1),
            model,
        }
    }

    /// Actuals through 2024-03; two interval models and the AI line after.
    fn table() -> Vec<ViewRow> {
        prepare_table(vec![
            row(d(2024, 1), 11.75, None, ModelTag::Actual),
            row(d(2024, 2), 11.25, None, ModelTag::Actual),
            row(d(2024, 3), 10.75, None, ModelTag::Actual),
            row(d(2024, 4), 10.5, Some((10.0, 11.0)), ModelTag::Ensemble),
            row(d(2024, 5), 10.25, Some((9.5, 11.0)), ModelTag::Ensemble),
            row(d(2024, 4), 10.6, Some((10.1, 11.1)), ModelTag::BayesianRidge),
            row(d(2024, 5), 10.4, Some((9.7, 11.2)), ModelTag::BayesianRidge),
            row(d(2024, 4), 10.5, None, ModelTag::Ai),
        ])
    }

    fn state(selected: &[ModelTag], show_ci: bool) -> FilterState {
        FilterState {
            selected: selected.iter().copied().collect(),
            start: d(2024, 1),
            show_ci,
        }
    }

    #[test]
    fn seam_rows_join_interval_models_to_the_last_actual() {
        let t = table();
        let seams: Vec<&ViewRow> = t.iter().filter(|r| r.seam).collect();
        assert_eq!(seams.len(), 2);
        for s in &seams {
            assert_eq!(s.row.date, d(2024, 3));
            assert_eq!(s.row.value, 10.75);
            assert_eq!(s.row.lower, Some(10.75));
            assert_eq!(s.row.upper, Some(10.75));
            assert!(matches!(s.row.model, ModelTag::Ensemble | ModelTag::BayesianRidge));
        }
    }

    #[test]
    fn chart_shows_actual_plus_selected_models_only() {
        let view = chart_view(&table(), Indicator::Selic, &state(&[ModelTag::Ensemble], true));
        let tags: Vec<ModelTag> = view.series.iter().map(|s| s.tag).collect();
        assert_eq!(tags, vec![ModelTag::Actual, ModelTag::Ensemble]);

        let ensemble = &view.series[1];
        assert_eq!(ensemble.label, "Ensemble");
        assert_eq!(ensemble.points.first(), Some(&(d(2024, 3), 10.75)));
        assert_eq!(ensemble.points.len(), 3);
        assert_eq!(ensemble.band.len(), 3);
        assert_eq!(view.x_bounds, Some([d(2024, 1), d(2024, 5)]));
    }

    #[test]
    fn start_date_filters_rows() {
        let mut s = state(&[ModelTag::BayesianRidge], false);
        s.start = d(2024, 3);
        let view = chart_view(&table(), Indicator::Selic, &s);
        let actual = &view.series[0];
        assert_eq!(actual.points, vec![(d(2024, 3), 10.75)]);
    }

    #[test]
    fn hiding_intervals_removes_bands_but_keeps_lines() {
        let selected = [ModelTag::Ensemble, ModelTag::BayesianRidge];
        let with_ci = chart_view(&table(), Indicator::Selic, &state(&selected, true));
        let without_ci = chart_view(&table(), Indicator::Selic, &state(&selected, false));

        assert!(with_ci.series.iter().any(|s| !s.band.is_empty()));
        assert!(without_ci.series.iter().all(|s| s.band.is_empty()));
        for (a, b) in with_ci.series.iter().zip(&without_ci.series) {
            assert_eq!(a.tag, b.tag);
            assert_eq!(a.points, b.points);
        }
    }

    #[test]
    fn table_view_drops_actuals_and_seams() {
        let rows = table_view(&table(), Indicator::Selic);
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.date != "03/2024"));
        assert_eq!(rows[0].model, "Ensemble");
        assert_eq!(rows[0].value, "10.50");
        assert_eq!(rows[4].model, "IA");
        assert_eq!(rows[4].lower, "");
    }

    #[test]
    fn zero_line_pulls_bounds_to_zero() {
        let t = prepare_table(vec![row(d(2024, 1), 4.0, None, ModelTag::Actual)]);
        let s = state(&[], true);
        let view = chart_view(&t, Indicator::Ipca, &s);
        assert!(view.zero_line);
        assert!(view.y_bounds[0] <= 0.0 && view.y_bounds[1] >= 4.0);
    }

    #[test]
    fn model_list_is_the_union_of_forecast_tags() {
        let a = table();
        let b = prepare_table(vec![row(d(2024, 4), 1.0, None, ModelTag::Ai)]);
        let models = model_list([a.as_slice(), b.as_slice()]);
        assert_eq!(models, vec![ModelTag::Ensemble, ModelTag::BayesianRidge, ModelTag::Ai]);
    }

    #[test]
    fn start_picker_is_bounded_and_defaults_six_years_back() {
        let bounds = date_bounds(&table());
        assert_eq!(bounds, [d(2004, 1), d(2024, 5)]);

        let today = NaiveDate::from_ymd_opt(2025, 8, 20).unwrap();
        assert_eq!(default_start(today, bounds), d(2019, 1));
        // Too far back clamps to the floor; too far forward to the latest date.
        assert_eq!(default_start(NaiveDate::from_ymd_opt(2008, 3, 1).unwrap(), bounds), d(2004, 1));
        assert_eq!(default_start(NaiveDate::from_ymd_opt(2035, 3, 1).unwrap(), bounds), d(2024, 5));

        assert_eq!(step_start(d(2024, 4), 12, bounds), d(2024, 5));
        assert_eq!(step_start(d(2004, 6), -12, bounds), d(2004, 1));
        assert_eq!(step_start(d(2010, 6), 1, bounds), d(2010, 7));
    }

    #[test]
    fn cache_recomputes_only_on_state_change() {
        let t = table();
        let mut cache = ViewCache::default();
        let s1 = state(&[ModelTag::Ensemble], true);

        let first = cache.chart(&t, Indicator::Selic, &s1).clone();
        let again = cache.chart(&t, Indicator::Selic, &s1).clone();
        assert_eq!(first, again);
        assert_eq!(cache.computations(), 1);

        let s2 = state(&[ModelTag::Ensemble], false);
        cache.chart(&t, Indicator::Selic, &s2);
        assert_eq!(cache.computations(), 2);
    }
}
