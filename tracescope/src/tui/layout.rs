//! Panel placement for the dashboard.
//!
//! ```text
//! ┌ header ──────────────────────────────────┐
//! ├ status ──────────┬ params ───────────────┤
//! │                  │                       │
//! ├ LSP log ─────────┼ vector max size ──────┤
//! │                  │                       │
//! ├ status bar ──────┴───────────────────────┤
//! ```
//!
//! The LSP log is always placed. The other panels give way as the terminal
//! shrinks: the params/histogram column below 60 columns, the status panel
//! at 24 rows or fewer, and the status bar below 16 rows.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

pub const HEADER_HEIGHT: u16 = 3;
pub const STATUS_BAR_HEIGHT: u16 = 3;
/// Connection line, counters and one row per channel
pub const STATUS_PANEL_HEIGHT: u16 = 19;

const MIN_WIDTH_FOR_SIDE_COLUMN: u16 = 60;
/// At or below this width the log and side column split evenly
const MAX_EVEN_SPLIT_WIDTH: u16 = 100;
const MIN_HEIGHT_FOR_STATUS_BAR: u16 = 16;
const MIN_HEIGHT_FOR_STATUS_PANEL: u16 = 25;

/// Where each panel goes for one frame; `None` means hidden at this size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelAreas {
    pub header: Rect,
    pub log: Rect,
    pub status: Option<Rect>,
    pub params: Option<Rect>,
    pub histogram: Option<Rect>,
    pub status_bar: Option<Rect>,
}

/// Share of the width given to the log column
fn log_column_percent(width: u16) -> u16 {
    if width <= MAX_EVEN_SPLIT_WIDTH {
        50
    } else {
        45
    }
}

fn split(direction: Direction, constraints: Vec<Constraint>, area: Rect) -> Vec<Rect> {
    Layout::default().direction(direction).constraints(constraints).split(area).to_vec()
}

#[must_use]
pub fn panel_areas(area: Rect) -> PanelAreas {
    let show_status_bar = area.height >= MIN_HEIGHT_FOR_STATUS_BAR;
    let mut rows = vec![Constraint::Length(HEADER_HEIGHT), Constraint::Min(0)];
    if show_status_bar {
        rows.push(Constraint::Length(STATUS_BAR_HEIGHT));
    }
    let outer = split(Direction::Vertical, rows, area);

    let (left, right) = if area.width >= MIN_WIDTH_FOR_SIDE_COLUMN {
        let percent = log_column_percent(area.width);
        let columns = split(
            Direction::Horizontal,
            vec![Constraint::Percentage(percent), Constraint::Percentage(100 - percent)],
            outer[1],
        );
        (columns[0], Some(columns[1]))
    } else {
        (outer[1], None)
    };

    let (status, log) = if area.height >= MIN_HEIGHT_FOR_STATUS_PANEL {
        let left = split(
            Direction::Vertical,
            vec![Constraint::Length(STATUS_PANEL_HEIGHT), Constraint::Min(0)],
            left,
        );
        (Some(left[0]), left[1])
    } else {
        (None, left)
    };

    // Params above the histogram, half each
    let (params, histogram) = match right {
        Some(right) => {
            let right = split(
                Direction::Vertical,
                vec![Constraint::Percentage(50), Constraint::Percentage(50)],
                right,
            );
            (Some(right[0]), Some(right[1]))
        }
        None => (None, None),
    };

    PanelAreas {
        header: outer[0],
        log,
        status,
        params,
        histogram,
        status_bar: show_status_bar.then(|| outer[2]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn areas(width: u16, height: u16) -> PanelAreas {
        panel_areas(Rect::new(0, 0, width, height))
    }

    #[test]
    fn test_full_size_places_every_panel() {
        let a = areas(120, 40);
        assert_eq!(a.header, Rect::new(0, 0, 120, 3));
        assert_eq!(a.status, Some(Rect::new(0, 3, 54, STATUS_PANEL_HEIGHT)));
        assert_eq!(a.log, Rect::new(0, 22, 54, 15));
        assert_eq!(a.params, Some(Rect::new(54, 3, 66, 17)));
        assert_eq!(a.histogram, Some(Rect::new(54, 20, 66, 17)));
        assert_eq!(a.status_bar, Some(Rect::new(0, 37, 120, 3)));
    }

    #[test]
    fn test_short_terminal_puts_log_under_header() {
        // Mouse hit-testing relies on the log starting right below the header
        let a = areas(120, 20);
        assert_eq!(a.status, None);
        assert_eq!(a.log, Rect::new(0, 3, 54, 14));
        assert_eq!(a.params.map(|r| r.height), Some(7));
        assert!(a.status_bar.is_some());
    }

    #[test]
    fn test_narrow_terminal_splits_log_and_params_evenly() {
        let a = areas(80, 30);
        assert_eq!(a.log.width, 40);
        assert_eq!(a.params.map(|r| r.width), Some(40));
        assert!(a.status.is_some());
    }

    #[test]
    fn test_very_narrow_terminal_drops_params_and_histogram() {
        let a = areas(50, 40);
        assert_eq!(a.params, None);
        assert_eq!(a.histogram, None);
        assert_eq!(a.log.width, 50);
        assert_eq!(a.status.map(|r| r.width), Some(50));
    }

    #[test]
    fn test_tiny_terminal_keeps_header_and_log() {
        let a = areas(120, 12);
        assert_eq!(a.status_bar, None);
        assert_eq!(a.status, None);
        assert_eq!(a.log, Rect::new(0, 3, 54, 9));
    }
}
