//! Ratatui-based forecast dashboard.
//!
//! A sidebar picks the models, the chart start month, and whether intervals
//! are drawn; four panels (one per indicator) show either a chart or the
//! forecast table. Tables are read once at startup from the output directory.

use std::io;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table},
};
use tracing::warn;

use crate::domain::{Indicator, ModelTag};
use crate::error::AppError;
use crate::io::{forecast_table_path, read_forecast_table};

mod chart;
pub mod view;

use chart::{ForecastChart, tag_color};
use view::{FilterState, TableRow, ViewCache, ViewRow};

/// Start the dashboard over the tables in `output_dir`.
pub fn run(output_dir: &Path, today: NaiveDate) -> Result<(), AppError> {
    // Load before touching the terminal so errors print normally.
    let mut app = App::load(output_dir, today)?;

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal =
        Terminal::new(backend).map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelMode {
    Chart,
    Table,
}

struct Panel {
    indicator: Indicator,
    /// `None` when the indicator has no table on disk.
    table: Option<Vec<ViewRow>>,
    rows: Vec<TableRow>,
    cache: ViewCache,
    mode: PanelMode,
}

/// Sidebar entries after the model checklist.
const EXTRA_ITEMS: usize = 2;

struct App {
    panels: Vec<Panel>,
    models: Vec<ModelTag>,
    state: FilterState,
    bounds: [NaiveDate; 2],
    cursor: usize,
    status: String,
}

impl App {
    fn load(output_dir: &Path, today: NaiveDate) -> Result<Self, AppError> {
        let mut panels = Vec::with_capacity(Indicator::ALL.len());
        for indicator in Indicator::ALL {
            let path = forecast_table_path(output_dir, indicator);
            let table = if path.exists() {
                Some(view::prepare_table(read_forecast_table(&path)?))
            } else {
                warn!(path = %path.display(), "forecast table not found");
                None
            };
            let rows = table
                .as_deref()
                .map(|t| view::table_view(t, indicator))
                .unwrap_or_default();
            panels.push(Panel {
                indicator,
                table,
                rows,
                cache: ViewCache::default(),
                mode: PanelMode::Chart,
            });
        }
        if panels.iter().all(|p| p.table.is_none()) {
            return Err(AppError::new(
                2,
                format!("No forecast tables found in '{}'.", output_dir.display()),
            ));
        }

        let models = view::model_list(panels.iter().filter_map(|p| p.table.as_deref()));
        // The Selic table bounds the picker; fall back to any loaded table.
        let reference = panels
            .iter()
            .find(|p| p.indicator == Indicator::Selic && p.table.is_some())
            .or_else(|| panels.iter().find(|p| p.table.is_some()))
            .and_then(|p| p.table.as_deref())
            .unwrap_or(&[]);
        let bounds = view::date_bounds(reference);
        let state = FilterState {
            selected: models.iter().copied().collect(),
            start: view::default_start(today, bounds),
            show_ci: true,
        };

        Ok(Self {
            panels,
            models,
            state,
            bounds,
            cursor: 0,
            status: String::new(),
        })
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100)).map_err(|e| AppError::new(4, format!("Event poll error: {e}")))? {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Apply a key press; returns `true` to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        let items = self.models.len() + EXTRA_ITEMS;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down => self.cursor = (self.cursor + 1).min(items - 1),
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_item(),
            KeyCode::Left => self.move_start(-1),
            KeyCode::Right => self.move_start(1),
            KeyCode::PageUp => self.move_start(-12),
            KeyCode::PageDown => self.move_start(12),
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                if let Some(panel) = self.panels.get_mut(idx) {
                    panel.mode = match panel.mode {
                        PanelMode::Chart => PanelMode::Table,
                        PanelMode::Table => PanelMode::Chart,
                    };
                    self.status = format!("{}: {:?}", panel.indicator.label(), panel.mode).to_lowercase();
                }
            }
            _ => {}
        }
        false
    }

    fn toggle_item(&mut self) {
        if let Some(tag) = self.models.get(self.cursor).copied() {
            if !self.state.selected.remove(&tag) {
                self.state.selected.insert(tag);
            }
            self.status = format!("models: {}", self.state.selected.len());
        } else if self.cursor == self.models.len() + 1 {
            self.state.show_ci = !self.state.show_ci;
            self.status = format!("intervals: {}", if self.state.show_ci { "on" } else { "off" });
        }
    }

    fn move_start(&mut self, months: i32) {
        self.state.start = view::step_start(self.state.start, months, self.bounds);
        self.status = format!("start: {}", self.state.start.format("%m/%Y"));
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(frame.area());
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(30), Constraint::Min(0)])
            .split(rows[0]);

        self.draw_sidebar(frame, cols[0]);
        self.draw_panels(frame, cols[1]);
        self.draw_footer(frame, rows[1]);
    }

    fn draw_sidebar(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let check = |on: bool| if on { "[x]" } else { "[ ]" };

        let mut items: Vec<ListItem> = self
            .models
            .iter()
            .map(|tag| {
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{} ", check(self.state.selected.contains(tag)))),
                    Span::styled(tag.model_name(), Style::default().fg(tag_color(*tag))),
                ]))
            })
            .collect();
        items.push(ListItem::new(format!(
            "Start: {} ({}..{})",
            self.state.start.format("%m/%Y"),
            self.bounds[0].format("%Y"),
            self.bounds[1].format("%Y"),
        )));
        items.push(ListItem::new(format!("{} Intervals", check(self.state.show_ci))));

        let list = List::new(items)
            .block(Block::default().title("Filters").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        state.select(Some(self.cursor));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_panels(&mut self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let halves = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);
        let mut cells = Vec::with_capacity(4);
        for half in halves.iter() {
            let row = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(*half);
            cells.extend(row.iter().copied());
        }

        let state = &self.state;
        for (i, (panel, cell)) in self.panels.iter_mut().zip(cells).enumerate() {
            draw_panel(frame, cell, i + 1, panel, state);
        }
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ select  Space toggle  ←/→ month  PgUp/PgDn year  1-4 chart/table  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn draw_panel(frame: &mut ratatui::Frame<'_>, area: Rect, number: usize, panel: &mut Panel, state: &FilterState) {
    let indicator = panel.indicator;
    let title = format!(" {number} {} ({}) ", indicator.title(), indicator.unit());
    let block = Block::default()
        .title(Span::styled(title, Style::default().add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(Clear, inner);

    let Some(table) = panel.table.as_deref() else {
        let msg = Paragraph::new("No forecast table.").style(Style::default().fg(Color::Yellow));
        frame.render_widget(msg, inner);
        return;
    };

    match panel.mode {
        PanelMode::Chart => {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(1), Constraint::Min(0)])
                .split(inner);
            let view = panel.cache.chart(table, indicator, state);

            let legend: Vec<Span> = view
                .series
                .iter()
                .flat_map(|s| {
                    [
                        Span::styled("━ ", Style::default().fg(tag_color(s.tag))),
                        Span::raw(format!("{}  ", s.label)),
                    ]
                })
                .collect();
            frame.render_widget(Paragraph::new(Line::from(legend)), parts[0]);
            frame.render_widget(ForecastChart { view }, parts[1]);
        }
        PanelMode::Table => {
            let header = Row::new(["date", "model", "value", "lower", "upper"])
                .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
            let rows = panel.rows.iter().map(|r| {
                Row::new([
                    Cell::from(r.date.as_str()),
                    Cell::from(r.model),
                    Cell::from(r.value.as_str()),
                    Cell::from(r.lower.as_str()),
                    Cell::from(r.upper.as_str()),
                ])
            });
            let widths = [
                Constraint::Length(8),
                Constraint::Length(15),
                Constraint::Length(8),
                Constraint::Length(8),
                Constraint::Length(8),
            ];
            frame.render_widget(Table::new(rows, widths).header(header), inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ForecastRow;
    use crate::io::write_forecast_table;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn write_selic(dir: &Path) {
        let rows = vec![
            ForecastRow {
                date: d(2024, 6),
                value: 10.5,
                lower: None,
                upper: None,
                model: ModelTag::Actual,
            },
            ForecastRow {
                date: d(2024, 7),
                value: 10.25,
                lower: Some(9.75),
                upper: Some(10.75),
                model: ModelTag::Ensemble,
            },
        ];
        write_forecast_table(&forecast_table_path(dir, Indicator::Selic), &rows).unwrap();
    }

    #[test]
    fn loads_available_tables_and_defaults_the_filters() {
        let dir = tempfile::tempdir().unwrap();
        write_selic(dir.path());

        let app = App::load(dir.path(), NaiveDate::from_ymd_opt(2025, 5, 2).unwrap()).unwrap();
        assert_eq!(app.models, vec![ModelTag::Ensemble]);
        assert!(app.state.selected.contains(&ModelTag::Ensemble));
        assert_eq!(app.bounds, [d(2004, 1), d(2024, 7)]);
        assert_eq!(app.state.start, d(2019, 1));
        let loaded: Vec<Indicator> = app.panels.iter().filter(|p| p.table.is_some()).map(|p| p.indicator).collect();
        assert_eq!(loaded, vec![Indicator::Selic]);
    }

    #[test]
    fn keys_toggle_models_intervals_and_panels() {
        let dir = tempfile::tempdir().unwrap();
        write_selic(dir.path());
        let mut app = App::load(dir.path(), NaiveDate::from_ymd_opt(2025, 5, 2).unwrap()).unwrap();

        app.handle_key(KeyCode::Char(' '));
        assert!(app.state.selected.is_empty());

        // Cursor: model, start, intervals.
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Char(' '));
        assert!(!app.state.show_ci);

        app.handle_key(KeyCode::PageDown);
        assert_eq!(app.state.start, d(2020, 1));
        app.handle_key(KeyCode::Left);
        assert_eq!(app.state.start, d(2019, 12));

        app.handle_key(KeyCode::Char('4'));
        assert_eq!(app.panels[3].mode, PanelMode::Table);
        assert!(app.handle_key(KeyCode::Char('q')));
    }

    #[test]
    fn empty_output_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = App::load(dir.path(), NaiveDate::from_ymd_opt(2025, 5, 2).unwrap())
            .err()
            .unwrap();
        assert_eq!(err.exit_code(), 2);
    }
}
