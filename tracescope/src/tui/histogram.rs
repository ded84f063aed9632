//! Vector profile panel - max-size histogram per allocation owner.
//!
//! # What This Shows
//!
//! For each owner, one row per size bucket: the bucket's share of all
//! allocations, and a bar scaled against the largest bucket.
//!
//! ```text
//! libA
//!   0 ▓▓░░░░░░░░  10.0%
//!   1 ▓▓▓░░░░░░░  20.0%
//!   2 ▓▓▓▓▓▓▓▓▓▓  70.0%
//! ```
//!
//! Owner blocks keep the order in which owners were first seen. Rendering is a
//! pure function of the latest snapshot, so repeating a snapshot changes
//! nothing.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use std::collections::HashMap;

use super::theme::{gauge_bar, HUD_CYAN, HUD_GREEN, INFO_DIM};

/// One size bucket as rendered
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramRow {
    pub size: usize,
    pub count: u64,
    /// Percent of the owner's total, one decimal place (e.g. `"70.0%"`)
    pub label: String,
    /// Percent of the owner's largest bucket, 0..=100
    pub scale: f64,
}

impl HistogramRow {
    #[must_use]
    pub fn scale_label(&self) -> String {
        percent_label(self.scale)
    }
}

/// One decimal place, ties rounded up (`6.25` is `"6.3%"`)
fn percent_label(percent: f64) -> String {
    format!("{:.1}%", (percent * 10.0).round() / 10.0)
}

/// Rendering block for one owner, created on first sight
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerBlock {
    pub owner: String,
    pub rows: Vec<HistogramRow>,
}

#[allow(clippy::cast_precision_loss)]
fn compute_rows(counts_by_size: &[u64]) -> Vec<HistogramRow> {
    let total: u64 = counts_by_size.iter().sum();
    let max = counts_by_size.iter().copied().max().unwrap_or(0);

    counts_by_size
        .iter()
        .enumerate()
        .map(|(size, &count)| {
            let share = if total > 0 { count as f64 / total as f64 * 100.0 } else { 0.0 };
            let scale = if max > 0 { count as f64 / max as f64 * 100.0 } else { 0.0 };
            HistogramRow { size, count, label: percent_label(share), scale }
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct HistogramView {
    blocks: Vec<OwnerBlock>,
    index_by_owner: HashMap<String, usize>,
    scroll: usize,
}

impl HistogramView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `owner`'s rows with ones computed from `counts_by_size`.
    ///
    /// The owner's block is created the first time it's seen and reused
    /// afterwards. Rows beyond the new bucket count are dropped.
    pub fn update_histogram(&mut self, owner: &str, counts_by_size: &[u64]) {
        let index = match self.index_by_owner.get(owner) {
            Some(&index) => index,
            None => {
                self.blocks.push(OwnerBlock { owner: owner.to_string(), rows: Vec::new() });
                self.index_by_owner.insert(owner.to_string(), self.blocks.len() - 1);
                self.blocks.len() - 1
            }
        };
        self.blocks[index].rows = compute_rows(counts_by_size);
    }

    #[must_use]
    pub fn blocks(&self) -> &[OwnerBlock] {
        &self.blocks
    }

    #[must_use]
    pub fn block(&self, owner: &str) -> Option<&OwnerBlock> {
        self.index_by_owner.get(owner).map(|&i| &self.blocks[i])
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        if self.scroll + 1 < self.line_count() {
            self.scroll += 1;
        }
    }

    fn line_count(&self) -> usize {
        self.blocks.iter().map(|b| b.rows.len() + 2).sum()
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        // "  12 " prefix + " 100.0%" suffix + borders
        let bar_width = (area.width as usize).saturating_sub(17).clamp(4, 40);

        let mut lines = Vec::new();
        for block in &self.blocks {
            lines.push(Line::from(Span::styled(
                format!(" {}", block.owner),
                Style::default().fg(HUD_CYAN).add_modifier(Modifier::BOLD),
            )));
            for row in &block.rows {
                lines.push(Line::from(vec![
                    Span::styled(format!(" {:>3} ", row.size), Style::default().fg(INFO_DIM)),
                    Span::styled(gauge_bar(row.scale, bar_width), Style::default().fg(HUD_GREEN)),
                    Span::styled(format!(" {:>6}", row.label), Style::default().fg(HUD_GREEN)),
                ]));
            }
            lines.push(Line::from(""));
        }
        if lines.is_empty() {
            lines.push(Line::from(Span::styled(
                " Waiting for vector profiler stats...",
                Style::default().fg(INFO_DIM),
            )));
        }

        #[allow(clippy::cast_possible_truncation)]
        let scroll = self.scroll.min(u16::MAX as usize) as u16;
        let paragraph = Paragraph::new(lines).scroll((scroll, 0)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("[ VECTOR MAX SIZE | {} owners ]", self.blocks.len()))
                .border_style(Style::default().fg(HUD_GREEN)),
        );
        f.render_widget(paragraph, area);
    }
}
