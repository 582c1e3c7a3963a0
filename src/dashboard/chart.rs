//! Plotters-powered forecast chart widget for Ratatui.
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.
//! Dates become day numbers on the x axis; labels convert them back.

use chrono::{Datelike, NaiveDate};
use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use super::view::ChartView;
use crate::domain::ModelTag;

/// Render-only chart over a precomputed [`ChartView`].
pub struct ForecastChart<'a> {
    pub view: &'a ChartView,
}

struct PlotLine {
    points: Vec<(f64, f64)>,
    color: RGBColor,
}

impl<'a> Widget for ForecastChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters may fail to build a chart in a tiny area.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let Some([first, last]) = self.view.x_bounds else {
            buf.set_string(area.x, area.y, "No data.", Style::default().fg(Color::Yellow));
            return;
        };
        let x0 = day_number(first);
        // A single month still needs a non-empty range.
        let x1 = day_number(last).max(x0 + 1.0);
        let [y0, y1] = self.view.y_bounds;
        if !(y0.is_finite() && y1.is_finite()) || y1 <= y0 {
            return;
        }

        // Bands first so the point lines draw over them.
        let mut lines = Vec::new();
        for s in &self.view.series {
            if !s.band.is_empty() {
                let color = band_color(s.tag);
                lines.push(PlotLine {
                    points: s.band.iter().map(|b| (day_number(b.0), b.1)).collect(),
                    color,
                });
                lines.push(PlotLine {
                    points: s.band.iter().map(|b| (day_number(b.0), b.2)).collect(),
                    color,
                });
            }
        }
        for s in &self.view.series {
            lines.push(PlotLine {
                points: s.points.iter().map(|p| (day_number(p.0), p.1)).collect(),
                color: line_color(s.tag),
            });
        }
        let zero_line = self.view.zero_line && y0 < 0.0 && y1 > 0.0;

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_labels(4)
                .y_labels(5)
                .x_label_formatter(&|v| fmt_day(*v))
                .y_label_formatter(&|v| format!("{v:.1}"))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            if zero_line {
                chart.draw_series(LineSeries::new([(x0, 0.0), (x1, 0.0)], &RGBColor(128, 128, 128)))?;
            }
            for line in &lines {
                chart.draw_series(LineSeries::new(line.points.iter().copied(), &line.color))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}

/// Terminal color of a model's line (also used for the legend).
pub fn tag_color(tag: ModelTag) -> Color {
    let RGBColor(r, g, b) = line_color(tag);
    Color::Rgb(r, g, b)
}

fn line_color(tag: ModelTag) -> RGBColor {
    match tag {
        ModelTag::Actual => RGBColor(255, 255, 255),
        ModelTag::Ensemble => RGBColor(0, 255, 255),
        ModelTag::BayesianRidge => RGBColor(255, 0, 255),
        ModelTag::Ai => RGBColor(255, 255, 0),
    }
}

fn band_color(tag: ModelTag) -> RGBColor {
    let RGBColor(r, g, b) = line_color(tag);
    RGBColor(r / 2, g / 2, b / 2)
}

fn day_number(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

fn fmt_day(v: f64) -> String {
    NaiveDate::from_num_days_from_ce_opt(v.round() as i32)
        .map(|d| d.format("%m/%Y").to_string())
        .unwrap_or_default()
}
