//! TUI color theme
//!
//! HUD-inspired color scheme for the terminal interface

use ratatui::style::Color;

// HUD color scheme (F-35 inspired)
pub const HUD_GREEN: Color = Color::Rgb(0, 255, 0);
pub const HUD_CYAN: Color = Color::Rgb(0, 255, 255);
pub const CRITICAL_RED: Color = Color::Rgb(255, 0, 0);
pub const CAUTION_AMBER: Color = Color::Rgb(255, 191, 0);
pub const INFO_DIM: Color = Color::Rgb(0, 180, 0);

/// Color for an LSP message kind
/// - Error responses: Critical (Red)
/// - Requests: Caution (Amber)
/// - Notifications: Cyan
/// - Responses: Normal (Green)
#[must_use]
pub fn message_color(kind: crate::tui::lsp_log::MessageKind, is_error: bool) -> Color {
    use crate::tui::lsp_log::MessageKind;
    if is_error {
        return CRITICAL_RED;
    }
    match kind {
        MessageKind::Request => CAUTION_AMBER,
        MessageKind::Notification => HUD_CYAN,
        MessageKind::Response => HUD_GREEN,
        MessageKind::Other => INFO_DIM,
    }
}

/// Horizontal bar `width` cells wide, filled to `percentage`
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn gauge_bar(percentage: f64, width: usize) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("{}{}", "▓".repeat(filled), "░".repeat(width - filled.min(width)))
}
