use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use std::collections::{HashMap, HashSet};

use super::theme::{CAUTION_AMBER, CRITICAL_RED, HUD_CYAN, HUD_GREEN, INFO_DIM};
use crate::app::ConnectionStatus;
use crate::dispatch::{Channel, DispatchStats};
use crate::domain::ThreadId;

/// Status panel - transport and dispatch overview
#[derive(Debug)]
pub struct StatusPanel {
    connection: ConnectionStatus,
    stats: DispatchStats,
    channel_counts: HashMap<Channel, u64>,
    threads_seen: HashSet<ThreadId>,
}

impl Default for StatusPanel {
    fn default() -> Self {
        Self {
            connection: ConnectionStatus::Connecting(String::new()),
            stats: DispatchStats::default(),
            channel_counts: HashMap::new(),
            threads_seen: HashSet::new(),
        }
    }
}

impl StatusPanel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connection(&mut self, status: ConnectionStatus) {
        self.connection = status;
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionStatus {
        &self.connection
    }

    pub fn set_stats(&mut self, stats: DispatchStats) {
        self.stats = stats;
    }

    pub fn record_event(&mut self, thread: ThreadId, channel: Channel) {
        *self.channel_counts.entry(channel).or_insert(0) += 1;
        self.threads_seen.insert(thread);
    }

    #[must_use]
    pub fn channel_count(&self, channel: Channel) -> u64 {
        self.channel_counts.get(&channel).copied().unwrap_or(0)
    }

    /// Short label for the status bar
    #[must_use]
    pub fn connection_label(&self) -> (&'static str, ratatui::style::Color) {
        match self.connection {
            ConnectionStatus::Connecting(_) => ("CONNECTING", CAUTION_AMBER),
            ConnectionStatus::Connected(_) => ("LIVE", HUD_GREEN),
            ConnectionStatus::Disconnected(_) => ("DISCONNECTED", CAUTION_AMBER),
            ConnectionStatus::Failed(_) => ("FAILED", CRITICAL_RED),
        }
    }

    fn has_faults(&self) -> bool {
        self.stats.frame_errors > 0 || self.stats.poisoned_threads > 0
    }

    pub fn render(&self, f: &mut Frame, area: Rect, rejected: usize, owners: usize) {
        let mut lines = vec![];

        let (label, color) = self.connection_label();
        lines.push(Line::from(Span::styled(
            format!(" [{}] {label}", if self.has_faults() { "!" } else { "-" }),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        let detail = match &self.connection {
            ConnectionStatus::Connecting(s)
            | ConnectionStatus::Connected(s)
            | ConnectionStatus::Disconnected(s)
            | ConnectionStatus::Failed(s) => s.as_str(),
        };
        if !detail.is_empty() {
            lines.push(Line::from(Span::styled(format!(" {detail}"), Style::default().fg(INFO_DIM))));
        }
        lines.push(Line::from(""));

        let stat = |name: &str, value: String, color| {
            Line::from(vec![
                Span::styled(format!(" {name:<9}"), Style::default().fg(INFO_DIM)),
                Span::styled(value, Style::default().fg(color)),
            ])
        };
        // Threads with events can lag the dispatch counter between stats ticks
        let threads = self.stats.threads.max(self.threads_seen.len());
        lines.push(stat("Threads", threads.to_string(), HUD_GREEN));
        lines.push(stat("Frames", self.stats.frames.to_string(), HUD_GREEN));
        lines.push(stat("Events", self.stats.events.to_string(), HUD_GREEN));
        lines.push(stat("Owners", owners.to_string(), HUD_GREEN));

        let fault_color = if self.has_faults() { CAUTION_AMBER } else { HUD_GREEN };
        lines.push(stat(
            "Faults",
            format!("{} frames, {} threads", self.stats.frame_errors, self.stats.poisoned_threads),
            fault_color,
        ));
        if rejected > 0 {
            lines.push(stat("Rejected", rejected.to_string(), CAUTION_AMBER));
        }

        lines.push(Line::from(""));
        // Protocol order, channels that have seen nothing are left out
        for channel in Channel::ALL {
            let count = self.channel_count(channel);
            if count == 0 {
                continue;
            }
            lines.push(Line::from(vec![
                Span::styled(format!(" {count:>6} "), Style::default().fg(HUD_CYAN)),
                Span::styled(channel.name(), Style::default().fg(INFO_DIM)),
            ]));
        }

        let border_color = if self.has_faults() { CAUTION_AMBER } else { HUD_GREEN };
        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Status")
                .border_style(Style::default().fg(border_color)),
        );

        f.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn test_channel_counts_accumulate() {
        let mut panel = StatusPanel::new();
        panel.record_event(ThreadId(1), Channel::Init);
        panel.record_event(ThreadId(2), Channel::Init);
        panel.record_event(ThreadId(2), Channel::Unknown);
        assert_eq!(panel.channel_count(Channel::Init), 2);
        assert_eq!(panel.channel_count(Channel::Unknown), 1);
        assert_eq!(panel.channel_count(Channel::VscodeDocumentSync), 0);
    }

    #[test]
    fn test_connection_label_tracks_status() {
        let mut panel = StatusPanel::new();
        assert_eq!(panel.connection_label().0, "CONNECTING");
        panel.set_connection(ConnectionStatus::Connected("ws://h/api/trace".into()));
        assert_eq!(panel.connection_label().0, "LIVE");
        panel.set_connection(ConnectionStatus::Disconnected("closed by server".into()));
        assert_eq!(panel.connection_label().0, "DISCONNECTED");
    }

    #[test]
    fn test_render_shows_faults() {
        let mut panel = StatusPanel::new();
        panel.set_stats(DispatchStats { frames: 4, frame_errors: 1, ..DispatchStats::default() });
        let mut terminal = Terminal::new(TestBackend::new(50, 20)).unwrap();
        terminal.draw(|f| panel.render(f, Rect::new(0, 0, 50, 20), 2, 0)).unwrap();

        let text: String =
            terminal.backend().buffer().content().iter().map(ratatui::buffer::Cell::symbol).collect();
        assert!(text.contains("[!] CONNECTING"));
        assert!(text.contains("1 frames, 0 threads"));
        assert!(text.contains("Rejected"));
    }

    #[test]
    fn test_render_lists_seen_channels_in_protocol_order() {
        let mut panel = StatusPanel::new();
        panel.record_event(ThreadId(1), Channel::Unknown);
        panel.record_event(ThreadId(1), Channel::LspClientToServerMessage);
        panel.record_event(ThreadId(1), Channel::Init);
        let mut terminal = Terminal::new(TestBackend::new(50, 20)).unwrap();
        terminal.draw(|f| panel.render(f, Rect::new(0, 0, 50, 20), 0, 0)).unwrap();

        let text: String =
            terminal.backend().buffer().content().iter().map(ratatui::buffer::Cell::symbol).collect();
        let init = text.find(Channel::Init.name()).unwrap();
        let lsp = text.find(Channel::LspClientToServerMessage.name()).unwrap();
        let unknown = text.find(Channel::Unknown.name()).unwrap();
        assert!(init < lsp && lsp < unknown);
        assert!(!text.contains(Channel::VscodeDocumentSync.name()));
    }
}
