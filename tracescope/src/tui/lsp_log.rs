//! LSP log panel - client-to-server messages with a detail drill-down.
//!
//! # What This Shows
//!
//! One line per JSON-RPC message, tagged by kind:
//!
//! ```text
//! [ LSP LOG ]
//! REQ  initialize
//! NTF  textDocument/didOpen
//! RES
//! ERR  workspace/configuration
//! ```
//!
//! Selecting a message (↑/↓ or a mouse click) shows its `params` in the
//! details panel, parameter names sorted, values pretty-printed as JSON.
//!
//! # Selection
//!
//! Each entry gets a stable [`EntryId`] when it is added. Rendering records
//! which screen row shows which entry, so a click resolves directly to an
//! entry without searching.

use log::warn;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{block::BorderType, Block, Borders, Paragraph, Wrap},
    Frame,
};
use serde_json::{Map, Value};

use super::theme::{message_color, CAUTION_AMBER, HUD_GREEN, INFO_DIM};
use crate::domain::{EntryId, LogError, Timestamp};

/// Mutually exclusive display category of a JSON-RPC message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Has `id` and `method`
    Request,
    /// Has `id`, no `method`
    Response,
    /// Has `method`, no `id`
    Notification,
    /// Neither `id` nor `method`
    Other,
}

impl MessageKind {
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            MessageKind::Request => "REQ",
            MessageKind::Response => "RES",
            MessageKind::Notification => "NTF",
            MessageKind::Other => "???",
        }
    }
}

/// Presence of the four JSON-RPC members that drive classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct MessageFlags {
    pub has_id: bool,
    pub has_method: bool,
    pub has_error: bool,
    pub has_params: bool,
}

impl MessageFlags {
    #[must_use]
    pub fn from_message(message: &Map<String, Value>) -> Self {
        Self {
            has_id: message.contains_key("id"),
            has_method: message.contains_key("method"),
            has_error: message.contains_key("error"),
            has_params: message.contains_key("params"),
        }
    }

    #[must_use]
    pub fn kind(self) -> MessageKind {
        match (self.has_id, self.has_method) {
            (true, true) => MessageKind::Request,
            (true, false) => MessageKind::Response,
            (false, true) => MessageKind::Notification,
            (false, false) => MessageKind::Other,
        }
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        self.has_error
    }
}

/// One parsed message in the log
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: EntryId,
    pub timestamp: Timestamp,
    pub message: Map<String, Value>,
    pub flags: MessageFlags,
    /// Method name, empty when the message has none
    pub summary: String,
}

/// A `params` member rendered for the details panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDetail {
    pub name: String,
    /// Pretty-printed JSON, two-space indent
    pub value: String,
}

/// Parameters of `message`, names sorted lexicographically.
///
/// Only the top-level names are sorted. Nested objects keep the key order of
/// the message.
///
/// Array params are listed by index (as strings, so `"10"` sorts before
/// `"2"`). Scalar or missing params yield nothing.
#[must_use]
pub fn param_details(message: &Map<String, Value>) -> Vec<ParamDetail> {
    let mut details: Vec<ParamDetail> = match message.get("params") {
        Some(Value::Object(params)) => params
            .iter()
            .map(|(name, value)| ParamDetail { name: name.clone(), value: pretty_json(value) })
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, value)| ParamDetail { name: index.to_string(), value: pretty_json(value) })
            .collect(),
        _ => Vec::new(),
    };
    details.sort_by(|a, b| a.name.cmp(&b.name));
    details
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn summary_of(message: &Map<String, Value>) -> String {
    match message.get("method") {
        Some(Value::String(method)) => method.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// LSP log view state: entries, selection, scroll, and last-render row map
#[derive(Debug, Default)]
pub struct LspLogView {
    entries: Vec<LogEntry>,
    selected: Option<EntryId>,
    scroll_offset: usize,
    /// Bodies that failed to parse and were skipped
    rejected: usize,
    /// Screen row → entry shown on it, from the last render
    rendered_rows: Vec<(u16, EntryId)>,
    /// Horizontal extent of the last render (x, width)
    rendered_columns: (u16, u16),
}

impl LspLogView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and append a client-to-server message.
    ///
    /// # Errors
    /// Returns an error (and counts the body as rejected) if `raw_body` is not
    /// a JSON object. The log is left unchanged.
    pub fn add_message(&mut self, timestamp: Timestamp, raw_body: &str) -> Result<EntryId, LogError> {
        let message = match serde_json::from_str::<Value>(raw_body) {
            Ok(Value::Object(message)) => message,
            Ok(_) => {
                self.rejected += 1;
                return Err(LogError::NotAnObject);
            }
            Err(err) => {
                self.rejected += 1;
                return Err(err.into());
            }
        };

        let id = EntryId(self.entries.len());
        let flags = MessageFlags::from_message(&message);
        let summary = summary_of(&message);
        self.entries.push(LogEntry { id, timestamp, message, flags, summary });
        Ok(id)
    }

    /// Like [`Self::add_message`], but logs and drops a malformed body
    pub fn add_message_or_log(&mut self, timestamp: Timestamp, raw_body: &str) -> Option<EntryId> {
        self.add_message(timestamp, raw_body)
            .map_err(|err| warn!("Skipping LSP message at {timestamp}: {err}"))
            .ok()
    }

    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn entry(&self, id: EntryId) -> Option<&LogEntry> {
        self.entries.get(id.0)
    }

    #[must_use]
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Select `id`, replacing any previous selection
    pub fn select(&mut self, id: EntryId) -> Option<&LogEntry> {
        if id.0 >= self.entries.len() {
            return None;
        }
        self.selected = Some(id);
        self.entries.get(id.0)
    }

    #[must_use]
    pub fn selected(&self) -> Option<&LogEntry> {
        self.selected.and_then(|id| self.entry(id))
    }

    pub fn select_next(&mut self) {
        let next = self.selected.map_or(0, |id| id.0 + 1);
        if next < self.entries.len() {
            self.selected = Some(EntryId(next));
        }
    }

    pub fn select_previous(&mut self) {
        if let Some(id) = self.selected {
            self.selected = Some(EntryId(id.0.saturating_sub(1)));
        }
    }

    /// Parameters of the selected entry
    #[must_use]
    pub fn details(&self) -> Vec<ParamDetail> {
        self.selected().map(|entry| param_details(&entry.message)).unwrap_or_default()
    }

    /// Entry drawn at screen position (`column`, `row`) in the last render
    #[must_use]
    pub fn entry_at(&self, column: u16, row: u16) -> Option<EntryId> {
        let (x, width) = self.rendered_columns;
        if column < x || column >= x.saturating_add(width) {
            return None;
        }
        self.rendered_rows.iter().find(|(r, _)| *r == row).map(|(_, id)| *id)
    }

    /// Select whatever entry was drawn at (`column`, `row`)
    pub fn click(&mut self, column: u16, row: u16) -> Option<&LogEntry> {
        let id = self.entry_at(column, row)?;
        self.select(id)
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect) {
        let inner_height = area.height.saturating_sub(2) as usize;
        self.scroll_offset = scroll_offset_for(
            self.selected.map(|id| id.0),
            self.scroll_offset,
            inner_height,
            self.entries.len(),
        );

        self.rendered_rows.clear();
        self.rendered_columns = (area.x.saturating_add(1), area.width.saturating_sub(2));

        let mut lines = Vec::with_capacity(inner_height);
        for (row, entry) in
            self.entries.iter().skip(self.scroll_offset).take(inner_height).enumerate()
        {
            #[allow(clippy::cast_possible_truncation)]
            let y = area.y + 1 + row as u16;
            self.rendered_rows.push((y, entry.id));

            let kind = entry.flags.kind();
            let color = message_color(kind, entry.flags.is_error());
            let tag = if entry.flags.is_error() { "ERR" } else { kind.tag() };
            let mut style = Style::default().fg(color);
            if self.selected == Some(entry.id) {
                style = style.add_modifier(Modifier::REVERSED);
            }
            lines.push(Line::from(vec![
                Span::styled(format!("{tag}  "), style.add_modifier(Modifier::BOLD)),
                Span::styled(entry.summary.clone(), style),
            ]));
        }

        let title = if self.rejected > 0 {
            format!("[ LSP LOG {} | {} rejected ]", self.entries.len(), self.rejected)
        } else {
            format!("[ LSP LOG {} ]", self.entries.len())
        };
        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Plain)
                .title(title)
                .border_style(Style::default().fg(HUD_GREEN)),
        );
        f.render_widget(paragraph, area);
    }

    pub fn render_details(&self, f: &mut Frame, area: Rect) {
        let mut lines = Vec::new();
        match self.selected() {
            None => {
                lines.push(Line::from(Span::styled(
                    " Select a message to see its params",
                    Style::default().fg(INFO_DIM),
                )));
            }
            Some(entry) => {
                lines.push(Line::from(vec![
                    Span::styled(" Method ", Style::default().fg(INFO_DIM)),
                    Span::styled(entry.summary.clone(), Style::default().fg(HUD_GREEN)),
                ]));
                if let Some(id) = entry.message.get("id") {
                    lines.push(Line::from(vec![
                        Span::styled(" Id     ", Style::default().fg(INFO_DIM)),
                        Span::styled(id.to_string(), Style::default().fg(HUD_GREEN)),
                    ]));
                }
                lines.push(Line::from(vec![
                    Span::styled(" Time   ", Style::default().fg(INFO_DIM)),
                    Span::styled(entry.timestamp.to_string(), Style::default().fg(HUD_GREEN)),
                ]));
                lines.push(Line::from(""));
                for detail in param_details(&entry.message) {
                    lines.push(Line::from(Span::styled(
                        detail.name,
                        Style::default().fg(CAUTION_AMBER).add_modifier(Modifier::BOLD),
                    )));
                    for text in detail.value.lines() {
                        lines.push(Line::from(Span::styled(
                            format!("  {text}"),
                            Style::default().fg(HUD_GREEN),
                        )));
                    }
                }
            }
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .borders(Borders::ALL)
                .title("[ PARAMS ]")
                .border_style(Style::default().fg(HUD_GREEN)),
        );
        f.render_widget(paragraph, area);
    }
}

/// Keep the selected row visible; follow the tail when nothing is selected
fn scroll_offset_for(
    selected: Option<usize>,
    current_offset: usize,
    visible_count: usize,
    total: usize,
) -> usize {
    if visible_count == 0 {
        return 0;
    }
    match selected {
        None => total.saturating_sub(visible_count),
        Some(index) if index < current_offset => index,
        Some(index) if index >= current_offset + visible_count => index + 1 - visible_count,
        Some(_) => current_offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn view_with(bodies: &[&str]) -> LspLogView {
        let mut view = LspLogView::new();
        for (i, body) in bodies.iter().enumerate() {
            view.add_message(Timestamp(i as u64), body).unwrap();
        }
        view
    }

    #[test]
    fn test_request_classification() {
        let view = view_with(&[r#"{"id":1,"method":"foo","params":{}}"#]);
        let flags = view.entries()[0].flags;
        assert_eq!(flags.kind(), MessageKind::Request);
        assert!(flags.has_params);
        assert!(!flags.is_error());
        assert_eq!(view.entries()[0].summary, "foo");
    }

    #[test]
    fn test_notification_and_response_classification() {
        let view = view_with(&[
            r#"{"jsonrpc":"2.0","method":"initialized"}"#,
            r#"{"jsonrpc":"2.0","id":3,"result":null}"#,
            r#"{"jsonrpc":"2.0","id":4,"error":{"code":-32601,"message":"nope"}}"#,
        ]);
        assert_eq!(view.entries()[0].flags.kind(), MessageKind::Notification);
        assert_eq!(view.entries()[1].flags.kind(), MessageKind::Response);
        assert_eq!(view.entries()[1].summary, "");
        assert_eq!(view.entries()[2].flags.kind(), MessageKind::Response);
        assert!(view.entries()[2].flags.is_error());
    }

    #[test]
    fn test_null_id_still_counts_as_present() {
        let view = view_with(&[r#"{"id":null,"method":"m"}"#]);
        assert_eq!(view.entries()[0].flags.kind(), MessageKind::Request);
    }

    #[test]
    fn test_malformed_body_is_rejected_without_side_effects() {
        let mut view = view_with(&[r#"{"method":"a"}"#]);
        assert!(matches!(view.add_message(Timestamp(1), "{not json"), Err(LogError::InvalidJson(_))));
        assert!(matches!(view.add_message(Timestamp(2), "[1,2]"), Err(LogError::NotAnObject)));
        assert_eq!(view.add_message_or_log(Timestamp(3), ""), None);

        let id = view.add_message(Timestamp(4), r#"{"method":"b"}"#).unwrap();
        assert_eq!(id, EntryId(1));
        assert_eq!(view.entries().len(), 2);
        assert_eq!(view.rejected(), 3);
    }

    #[test]
    fn test_params_sorted_and_pretty_printed() {
        let mut view = view_with(&[
            r#"{"method":"textDocument/didOpen","params":{"zeta":1,"alpha":{"uri":"file:///a.js"}}}"#,
        ]);
        view.select(EntryId(0));
        let details = view.details();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].name, "alpha");
        assert_eq!(details[0].value, "{\n  \"uri\": \"file:///a.js\"\n}");
        assert_eq!(details[1], ParamDetail { name: "zeta".into(), value: "1".into() });
    }

    #[test]
    fn test_nested_params_keep_message_order() {
        let mut view = view_with(&[
            r#"{"method":"textDocument/didChange","params":{"textDocument":{"version":4,"uri":"file:///a.js"}}}"#,
        ]);
        view.select(EntryId(0));
        assert_eq!(
            view.details()[0].value,
            "{\n  \"version\": 4,\n  \"uri\": \"file:///a.js\"\n}"
        );
    }

    #[test]
    fn test_array_params_sort_as_strings() {
        let message: Map<String, Value> = serde_json::from_str(
            r#"{"params":[0,1,2,3,4,5,6,7,8,9,10]}"#,
        )
        .unwrap();
        let names: Vec<String> = param_details(&message).into_iter().map(|d| d.name).collect();
        assert_eq!(names[..3], ["0", "1", "10"]);
    }

    #[test]
    fn test_selection_replaces_previous() {
        let mut view = view_with(&[r#"{"method":"a"}"#, r#"{"method":"b"}"#]);
        assert!(view.selected().is_none());
        assert!(view.details().is_empty());

        view.select(EntryId(0));
        view.select(EntryId(1));
        assert_eq!(view.selected().map(|e| e.summary.as_str()), Some("b"));
        assert!(view.select(EntryId(9)).is_none());
        assert_eq!(view.selected().map(|e| e.id), Some(EntryId(1)));
    }

    #[test]
    fn test_keyboard_navigation_clamps() {
        let mut view = view_with(&[r#"{"method":"a"}"#, r#"{"method":"b"}"#]);
        view.select_previous();
        assert!(view.selected().is_none());
        view.select_next();
        view.select_next();
        view.select_next();
        assert_eq!(view.selected().map(|e| e.id), Some(EntryId(1)));
        view.select_previous();
        view.select_previous();
        assert_eq!(view.selected().map(|e| e.id), Some(EntryId(0)));
    }

    #[test]
    fn test_click_resolves_rendered_row() {
        let mut view = view_with(&[r#"{"method":"a"}"#, r#"{"method":"b"}"#, r#"{"method":"c"}"#]);
        let mut terminal = Terminal::new(TestBackend::new(40, 10)).unwrap();
        terminal.draw(|f| view.render(f, Rect::new(0, 0, 40, 10))).unwrap();

        // Row 0 is the border; entries start at row 1
        assert_eq!(view.entry_at(5, 2), Some(EntryId(1)));
        assert_eq!(view.entry_at(5, 0), None);
        assert_eq!(view.entry_at(5, 7), None);
        assert_eq!(view.entry_at(0, 2), None);

        assert_eq!(view.click(5, 3).map(|e| e.summary.clone()), Some("c".to_string()));
    }

    #[test]
    fn test_scroll_offset_follows_selection() {
        assert_eq!(scroll_offset_for(None, 0, 5, 12), 7);
        assert_eq!(scroll_offset_for(Some(2), 0, 5, 12), 0);
        assert_eq!(scroll_offset_for(Some(9), 0, 5, 12), 5);
        assert_eq!(scroll_offset_for(Some(1), 4, 5, 12), 1);
        assert_eq!(scroll_offset_for(Some(1), 4, 0, 12), 0);
    }
}
