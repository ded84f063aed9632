//! # Terminal User Interface (TUI)
//!
//! Live dashboard using `ratatui`, fed by the [`DashboardUpdate`] channel.
//!
//! ```text
//! ┌ header: server | connection | counts ──────────────────────────┐
//! ├ Status ──────────────┬ PARAMS ─────────────────────────────────┤
//! │                      │  params of the selected LSP message     │
//! ├ LSP LOG ─────────────┼ VECTOR MAX SIZE ────────────────────────┤
//! │ REQ  initialize      │  per-owner size histogram               │
//! │ NTF  didOpen         │                                         │
//! ├ keys ────────────────┴─────────────────────────────────────────┤
//! ```
//!
//! ## View Modes
//!
//! - **Dashboard** - log, params and histogram panels (default)
//! - **Help** - keyboard shortcuts overlay
//!
//! ## Sub-Modules
//!
//! - `lsp_log` - LSP message list, classification and params drill-down
//! - `histogram` - vector max-size histogram per owner
//! - `status` - transport and dispatch counters
//! - `layout` - panel placement per terminal size
//! - `theme` - Color scheme

// TUI rendering intentionally uses precision-losing casts and long functions for clarity
#![allow(clippy::cast_possible_truncation, clippy::too_many_lines, clippy::needless_pass_by_value)]

use anyhow::Result;
use crossbeam_channel::{Receiver, TryRecvError};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

pub mod histogram;
pub mod layout;
pub mod lsp_log;
mod status;
mod theme;

use histogram::HistogramView;
use layout::panel_areas;
use lsp_log::LspLogView;
use status::StatusPanel;
use theme::{CAUTION_AMBER, CRITICAL_RED, HUD_CYAN, HUD_GREEN, INFO_DIM};

use crate::app::{ConnectionStatus, DashboardUpdate};

// =============================================================================
// STYLE CONSTANTS
// =============================================================================

const STYLE_HEADING: Style = Style::new().fg(HUD_GREEN).add_modifier(Modifier::BOLD);
const STYLE_LABEL: Style = Style::new().fg(CAUTION_AMBER).add_modifier(Modifier::BOLD);
const STYLE_DIM: Style = Style::new().fg(INFO_DIM);
const STYLE_KEY: Style = Style::new().fg(CAUTION_AMBER);
const STYLE_TEXT: Style = Style::new().fg(ratatui::style::Color::White);

/// Redraw cadence (10 Hz)
const UPDATE_INTERVAL: Duration = Duration::from_millis(100);

// =============================================================================
// VIEW MODES
// =============================================================================

/// Current view mode determines what's displayed and how keys are handled
#[derive(Debug, Clone, Copy, PartialEq)]
enum ViewMode {
    /// Main view: log, params, histogram
    Dashboard,
    /// Help overlay with keyboard shortcuts
    Help,
}

/// Panel that receives ↑/↓
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Focus {
    Log,
    Histogram,
}

// =============================================================================
// DASHBOARD STATE
// =============================================================================

/// Everything the live dashboard shows, updated from [`DashboardUpdate`]s
pub struct Dashboard {
    server: String,
    log: LspLogView,
    histogram: HistogramView,
    status: StatusPanel,
    view_mode: ViewMode,
    focus: Focus,
    should_quit: bool,
    started: Instant,
}

impl Dashboard {
    #[must_use]
    pub fn new(server: &str) -> Self {
        Self {
            server: server.to_string(),
            log: LspLogView::new(),
            histogram: HistogramView::new(),
            status: StatusPanel::new(),
            view_mode: ViewMode::Dashboard,
            focus: Focus::Log,
            should_quit: false,
            started: Instant::now(),
        }
    }

    pub fn apply(&mut self, update: DashboardUpdate) {
        match update {
            DashboardUpdate::Connection(status) => self.status.set_connection(status),
            DashboardUpdate::LspMessage { timestamp, body, .. } => {
                self.log.add_message_or_log(timestamp, &body);
            }
            DashboardUpdate::TraceEvent { thread, channel } => {
                self.status.record_event(thread, channel);
            }
            DashboardUpdate::Stats(stats) => self.status.set_stats(stats),
            DashboardUpdate::Histogram(snapshot) => {
                for (owner, counts) in &snapshot.max_size_histogram_by_owner {
                    self.histogram.update_histogram(owner, counts);
                }
            }
        }
    }

    #[must_use]
    pub fn log(&self) -> &LspLogView {
        &self.log
    }

    #[must_use]
    pub fn histogram(&self) -> &HistogramView {
        &self.histogram
    }

    #[must_use]
    pub fn focus(&self) -> Focus {
        self.focus
    }

    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Process keyboard input based on current view mode
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        match self.view_mode {
            ViewMode::Dashboard => match key.code {
                KeyCode::Char('q' | 'Q') => self.should_quit = true,
                KeyCode::Tab => {
                    self.focus = match self.focus {
                        Focus::Log => Focus::Histogram,
                        Focus::Histogram => Focus::Log,
                    };
                }
                KeyCode::Up => match self.focus {
                    Focus::Log => self.log.select_previous(),
                    Focus::Histogram => self.histogram.scroll_up(),
                },
                KeyCode::Down => match self.focus {
                    Focus::Log => self.log.select_next(),
                    Focus::Histogram => self.histogram.scroll_down(),
                },
                // Jump to the newest message when nothing is selected yet
                KeyCode::Enter => {
                    if self.log.selected().is_none() {
                        if let Some(last) = self.log.entries().last().map(|entry| entry.id) {
                            self.log.select(last);
                        }
                    }
                    self.focus = Focus::Log;
                }
                KeyCode::Char('?') => self.view_mode = ViewMode::Help,
                _ => {}
            },
            // Help overlay - any key closes
            ViewMode::Help => self.view_mode = ViewMode::Dashboard,
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.view_mode != ViewMode::Dashboard {
            return;
        }
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if self.log.click(mouse.column, mouse.row).is_some() {
                    self.focus = Focus::Log;
                }
            }
            MouseEventKind::ScrollUp => self.histogram.scroll_up(),
            MouseEventKind::ScrollDown => self.histogram.scroll_down(),
            _ => {}
        }
    }

    pub fn render(&mut self, f: &mut Frame) {
        let area = f.area();
        let panels = panel_areas(area);

        self.render_header(f, panels.header);
        if let Some(status) = panels.status {
            self.status.render(f, status, self.log.rejected(), self.histogram.blocks().len());
        }
        self.log.render(f, panels.log);
        if let Some(params) = panels.params {
            self.log.render_details(f, params);
        }
        if let Some(histogram) = panels.histogram {
            self.histogram.render(f, histogram);
        }

        if self.view_mode == ViewMode::Help {
            render_help_overlay(f, area);
        }

        if let Some(status_bar) = panels.status_bar {
            self.render_status_bar(f, status_bar);
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let (label, color) = self.status.connection_label();
        let header = Paragraph::new(vec![Line::from(vec![
            Span::styled("TRACESCOPE", STYLE_HEADING),
            Span::styled(" | ", STYLE_DIM),
            Span::styled(format!("[{label}]"), Style::new().fg(color).add_modifier(Modifier::BOLD)),
            Span::styled(" | ", STYLE_DIM),
            Span::styled(self.server.clone(), Style::new().fg(HUD_GREEN)),
            Span::styled(" | ", STYLE_DIM),
            Span::styled(
                format!("{:.0}s", self.started.elapsed().as_secs_f64()),
                Style::new().fg(HUD_GREEN),
            ),
            Span::styled(" | ", STYLE_DIM),
            Span::styled(
                format!("{} msgs", self.log.entries().len()),
                Style::new().fg(CAUTION_AMBER),
            ),
        ])])
        .block(Block::default().borders(Borders::ALL).border_style(Style::new().fg(color)));
        f.render_widget(header, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let mode_indicator = match (self.view_mode, self.status.connection()) {
            (ViewMode::Help, _) => Span::styled("[Help]", Style::new().fg(CAUTION_AMBER)),
            (_, ConnectionStatus::Connected(_)) => {
                Span::styled("[Live]", Style::new().fg(CRITICAL_RED))
            }
            (_, ConnectionStatus::Connecting(_)) => Span::styled("[Waiting]", STYLE_DIM),
            _ => Span::styled("[Offline]", Style::new().fg(CAUTION_AMBER)),
        };
        let focus = match self.focus {
            Focus::Log => "log",
            Focus::Histogram => "histogram",
        };

        let status_line = Line::from(vec![
            Span::styled("Q", STYLE_KEY),
            Span::styled(":Quit ", STYLE_DIM),
            Span::styled("↑↓", STYLE_KEY),
            Span::styled(":Select ", STYLE_DIM),
            Span::styled("Tab", STYLE_KEY),
            Span::styled(format!(":Focus({focus}) "), STYLE_DIM),
            Span::styled("?", STYLE_KEY),
            Span::styled(":Help ", STYLE_DIM),
            mode_indicator,
        ]);

        let status = Paragraph::new(vec![status_line]).block(
            Block::default().borders(Borders::ALL).border_style(Style::default().fg(HUD_GREEN)),
        );
        f.render_widget(status, area);
    }
}

// =============================================================================
// OVERLAY RENDERERS
// =============================================================================

fn render_help_overlay(f: &mut Frame, area: Rect) {
    let popup_area = centered_popup(area, 80, 22);

    let help_text = vec![
        Line::from(""),
        Line::from(Span::styled("  What You're Looking At", STYLE_HEADING)),
        Line::from(Span::styled(
            "  Live trace events from a language server's debug endpoint.",
            STYLE_DIM,
        )),
        Line::from(""),
        Line::from(Span::styled("  How to Read It", STYLE_HEADING)),
        Line::from(vec![
            Span::styled("  LSP Log    ", STYLE_LABEL),
            Span::styled("Client-to-server messages in arrival order.", STYLE_DIM),
        ]),
        Line::from(vec![
            Span::styled("             ", STYLE_LABEL),
            Span::styled("REQ request, RES response, NTF notification, ERR error.", STYLE_DIM),
        ]),
        Line::from(vec![
            Span::styled("  Params     ", STYLE_LABEL),
            Span::styled("Parameters of the selected message, sorted by name.", STYLE_DIM),
        ]),
        Line::from(vec![
            Span::styled("  Vector     ", STYLE_LABEL),
            Span::styled("Share of allocations per max-size bucket, by owner.", STYLE_DIM),
        ]),
        Line::from(vec![
            Span::styled("  Status     ", STYLE_LABEL),
            Span::styled("Transport state, decode faults and per-channel counts.", STYLE_DIM),
        ]),
        Line::from(""),
        Line::from(Span::styled("  Keys", STYLE_HEADING)),
        Line::from(vec![
            Span::styled("  ↑↓", STYLE_KEY),
            Span::styled(" Select   ", STYLE_TEXT),
            Span::styled("Enter/Click", STYLE_KEY),
            Span::styled(" Select   ", STYLE_TEXT),
            Span::styled("Tab", STYLE_KEY),
            Span::styled(" Switch panel   ", STYLE_TEXT),
            Span::styled("Q", STYLE_KEY),
            Span::styled(" Quit", STYLE_TEXT),
        ]),
        Line::from(""),
        Line::from(Span::styled("  Press any key to close", STYLE_DIM)),
    ];

    let help_widget = Paragraph::new(help_text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Help ")
            .style(Style::new().bg(ratatui::style::Color::Black).fg(HUD_CYAN)),
    );

    f.render_widget(ratatui::widgets::Clear, popup_area);
    f.render_widget(help_widget, popup_area);
}

/// Create a centered popup area with given width percentage and height in lines
fn centered_popup(area: Rect, width_percent: u16, height_lines: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Fill(1), Constraint::Length(height_lines), Constraint::Fill(1)])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

// =============================================================================
// LIVE MODE ENTRY POINT
// =============================================================================

/// Run the dashboard until the user quits or every update sender is gone
///
/// 1. Sets up the terminal in raw mode with mouse capture
/// 2. Drains pending updates (non-blocking)
/// 3. Redraws at 10Hz
/// 4. Handles keyboard and mouse input
/// 5. Cleans up terminal on exit
///
/// # Errors
/// Returns an error if terminal setup or rendering fails
pub fn run_live(update_rx: Receiver<DashboardUpdate>, server: &str) -> Result<()> {
    // -------------------------------------------------------------------------
    // Terminal Setup
    // -------------------------------------------------------------------------
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = Dashboard::new(server);
    let result = event_loop(&mut terminal, &mut app, &update_rx);

    // Cleanup terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut Dashboard,
    update_rx: &Receiver<DashboardUpdate>,
) -> Result<()> {
    let mut last_update: Option<Instant> = None;
    loop {
        // Drain pending updates; every sender gone means shutdown
        loop {
            match update_rx.try_recv() {
                Ok(update) => app.apply(update),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }

        if !last_update.is_some_and(|at| at.elapsed() < UPDATE_INTERVAL) {
            terminal.draw(|f| app.render(f))?;
            last_update = Some(Instant::now());
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                _ => {}
            }
        }

        if app.should_quit() {
            return Ok(());
        }
    }
}
