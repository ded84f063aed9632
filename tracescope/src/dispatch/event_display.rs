// Percentages are computed for display only
#![allow(clippy::cast_precision_loss)]

use crate::app::ConnectionStatus;
use crate::dispatch::{Channel, DispatchStats};
use crate::domain::ThreadId;
use crate::tui::histogram::OwnerBlock;
use crate::tui::lsp_log::{param_details, LogEntry};

/// Display one client-to-server LSP message
pub fn display_lsp_entry(thread: ThreadId, entry: &LogEntry) {
    let tag = if entry.flags.is_error() { "ERR" } else { entry.flags.kind().tag() };
    println!("\n[{tag}] {} {thread} t={}", entry.summary, entry.timestamp);
    if let Some(id) = entry.message.get("id") {
        println!("  id={id}");
    }
    for detail in param_details(&entry.message) {
        println!("  {}={}", detail.name, detail.value.replace('\n', "\n  "));
    }
}

/// Display the current histogram of one owner
pub fn display_histogram(block: &OwnerBlock) {
    println!("\n[HISTOGRAM] {}", block.owner);
    for row in &block.rows {
        println!("  {:>3} {:>8} {:>6} (scale {})", row.size, row.count, row.label, row.scale_label());
    }
}

/// Display a non-LSP trace event
pub fn display_trace_event(thread: ThreadId, channel: Channel) {
    println!("[{}] {thread}", channel.name());
}

/// Display a transport state change
pub fn display_connection(status: &ConnectionStatus) {
    match status {
        ConnectionStatus::Connecting(endpoint) => eprintln!("connecting: {endpoint}"),
        ConnectionStatus::Connected(endpoint) => eprintln!("connected: {endpoint}"),
        ConnectionStatus::Disconnected(reason) => eprintln!("disconnected: {reason}"),
        ConnectionStatus::Failed(reason) => eprintln!("connection failed: {reason}"),
    }
}

/// Display dispatch statistics
pub fn display_statistics(stats: &DispatchStats, rejected: usize) {
    let unknown_pct =
        if stats.events > 0 { stats.unknown_events as f64 / stats.events as f64 * 100.0 } else { 0.0 };
    eprintln!(
        "stats: threads={} frames={} bytes={} events={} unknown={} ({unknown_pct:.1}%) frame_errors={} poisoned_threads={} rejected_messages={rejected}",
        stats.threads,
        stats.frames,
        stats.bytes,
        stats.events,
        stats.unknown_events,
        stats.frame_errors,
        stats.poisoned_threads,
    );
}
