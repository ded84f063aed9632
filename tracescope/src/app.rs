//! Application context and startup wiring.
//!
//! Everything the dashboard needs is built once in `main` into an
//! [`AppContext`] and passed explicitly to the tasks that use it:
//!
//! ```text
//!   trace task ── connect() ── TraceDemux ── subscribers ──┐
//!                                                           ├─▶ DashboardUpdate channel ─▶ TUI / headless
//!   poll task  ── StatsPoller ──────────────────────────────┘
//! ```
//!
//! Both tasks stop once the receiving side of the update channel is gone.

use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{info, warn};
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracescope_common::TracePayload;
use url::Url;

use crate::cli::Args;
use crate::dispatch::event_display::{
    display_connection, display_histogram, display_lsp_entry, display_statistics,
    display_trace_event,
};
use crate::dispatch::{self, Channel, DispatchStats, SubscriptionHandle, TraceDemux};
use crate::domain::{ThreadId, Timestamp};
use crate::polling::{StatsPoller, VectorProfileStats};
use crate::tui::histogram::HistogramView;
use crate::tui::lsp_log::LspLogView;

/// Bound on queued dashboard updates; overflow is dropped, not awaited
pub const UPDATE_CHANNEL_CAPACITY: usize = 1000;

/// How often dispatch counters are pushed to the dashboard
const STATS_INTERVAL: Duration = Duration::from_millis(500);

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Debug server page URL; the trace and stats endpoints derive from it
    pub server_url: Url,
    pub poll_interval: Duration,
    pub headless: bool,
    /// Stop after this long (`None` = until quit)
    pub duration: Option<Duration>,
    /// Seed the log with example messages
    pub sample_messages: bool,
    pub quiet: bool,
}

impl Config {
    /// # Errors
    /// Returns an error if the server URL doesn't parse or the poll interval is zero
    pub fn from_args(args: &Args) -> Result<Self> {
        let server_url = Url::parse(&args.server_url)
            .with_context(|| format!("Invalid server URL: {}", args.server_url))?;
        if args.poll_interval_ms == 0 {
            bail!("--poll-interval-ms must be greater than 0");
        }
        Ok(Self {
            server_url,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            headless: args.headless,
            duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
            sample_messages: args.sample_messages,
            quiet: args.quiet,
        })
    }
}

/// State of the trace transport, as shown in the status panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting(String),
    Connected(String),
    /// Was connected, transport ended
    Disconnected(String),
    /// Never connected
    Failed(String),
}

/// Everything the dashboard consumes, from either data path
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardUpdate {
    Connection(ConnectionStatus),
    LspMessage { thread: ThreadId, timestamp: Timestamp, body: String },
    /// Any dispatched event, for per-channel activity counts
    TraceEvent { thread: ThreadId, channel: Channel },
    Stats(DispatchStats),
    Histogram(VectorProfileStats),
}

/// Subscribe the dashboard's listeners on `demux`.
///
/// LSP messages are forwarded with their body; every channel also forwards a
/// lightweight activity update. Updates are dropped when the dashboard falls
/// behind rather than stalling dispatch.
pub fn wire_subscriptions(
    demux: &mut TraceDemux,
    updates: &Sender<DashboardUpdate>,
) -> Vec<SubscriptionHandle> {
    let mut handles = Vec::new();

    let tx = updates.clone();
    handles.push(demux.subscribe(Channel::LspClientToServerMessage, move |dispatched| {
        if let TracePayload::LspClientToServerMessage { body } = &dispatched.event.payload {
            let _ = tx.try_send(DashboardUpdate::LspMessage {
                thread: dispatched.thread,
                timestamp: Timestamp(dispatched.event.timestamp),
                body: body.clone(),
            });
        }
    }));

    for channel in Channel::ALL {
        let tx = updates.clone();
        handles.push(demux.subscribe(channel, move |dispatched| {
            let _ = tx.try_send(DashboardUpdate::TraceEvent { thread: dispatched.thread, channel });
        }));
    }

    handles
}

/// Application context, built once at startup
pub struct AppContext {
    pub config: Config,
    updates: Sender<DashboardUpdate>,
}

impl AppContext {
    /// Create the context and the receiving end of its update channel
    #[must_use]
    pub fn new(config: Config) -> (Self, Receiver<DashboardUpdate>) {
        let (updates, rx) = bounded(UPDATE_CHANNEL_CAPACITY);
        (Self { config, updates }, rx)
    }

    #[must_use]
    pub fn updates(&self) -> &Sender<DashboardUpdate> {
        &self.updates
    }

    /// Connect to the trace transport and dispatch frames until it closes
    pub fn spawn_trace_task(&self) -> JoinHandle<()> {
        let server_url = self.config.server_url.clone();
        let updates = self.updates.clone();
        tokio::spawn(run_trace_connection(server_url, updates))
    }

    /// Poll histogram snapshots until the dashboard goes away
    ///
    /// # Errors
    /// Returns an error if the stats URL can't be derived from the server URL
    pub fn spawn_poll_task(&self) -> Result<JoinHandle<()>> {
        let poller = StatsPoller::new(&self.config.server_url, self.config.poll_interval)?;
        let updates = self.updates.clone();
        info!("Polling {} every {:?}", poller.url(), self.config.poll_interval);
        Ok(tokio::spawn(async move {
            poller
                .run(|stats| match updates.try_send(DashboardUpdate::Histogram(stats)) {
                    Err(TrySendError::Disconnected(_)) => ControlFlow::Break(()),
                    _ => ControlFlow::Continue(()),
                })
                .await;
        }))
    }

    /// Queue the example messages behind `--sample-messages`
    pub fn send_sample_messages(&self) {
        for body in SAMPLE_MESSAGES {
            let _ = self.updates.try_send(DashboardUpdate::LspMessage {
                thread: ThreadId(0),
                timestamp: Timestamp(0),
                body: (*body).to_string(),
            });
        }
    }
}

const SAMPLE_MESSAGES: &[&str] = &[
    r#"{"method":"textDocument/didChange","jsonrpc":"2.0","params":{"contentChanges":[{"text":"console.log('hello world');\n\n"}],"textDocument":{"uri":"file:///home/user/project/hello.js","version":4264}}}"#,
    r#"{"method":"textDocument/didChange","jsonrpc":"2.0","params":{"contentChanges":[{"text":"console.log('hello world');\n"}],"textDocument":{"uri":"file:///home/user/project/hello.js","version":4265}}}"#,
    r#"{"method":"textDocument/didChange","jsonrpc":"2.0","params":{"contentChanges":[{"text":"console.log('hello world');\n"}],"textDocument":{"uri":"file:///home/user/project/hello.js","version":4266}}}"#,
];

async fn run_trace_connection(server_url: Url, updates: Sender<DashboardUpdate>) {
    let label = dispatch::trace_endpoint(&server_url)
        .map_or_else(|_| server_url.to_string(), |url| url.to_string());
    let _ = updates.try_send(DashboardUpdate::Connection(ConnectionStatus::Connecting(label)));

    let mut connection = match dispatch::connect(&server_url).await {
        Ok(connection) => connection,
        Err(err) => {
            warn!("{err}");
            let _ = updates
                .try_send(DashboardUpdate::Connection(ConnectionStatus::Failed(err.to_string())));
            return;
        }
    };
    let endpoint = connection.endpoint().to_string();
    let _ = updates.try_send(DashboardUpdate::Connection(ConnectionStatus::Connected(endpoint)));

    let mut demux = TraceDemux::new();
    wire_subscriptions(&mut demux, &updates);

    let mut stats_tick = tokio::time::interval(STATS_INTERVAL);
    let reason = loop {
        tokio::select! {
            frame = connection.next_frame() => match frame {
                Some(Ok(frame)) => {
                    demux.handle_frame(&frame);
                }
                Some(Err(err)) => {
                    warn!("{err}");
                    break err.to_string();
                }
                None => break "closed by server".to_string(),
            },
            _ = stats_tick.tick() => {
                if let Err(TrySendError::Disconnected(_)) =
                    updates.try_send(DashboardUpdate::Stats(demux.stats()))
                {
                    return;
                }
            }
        }
    };

    info!("Trace transport ended: {reason}");
    let _ = updates.try_send(DashboardUpdate::Stats(demux.stats()));
    let _ = updates.try_send(DashboardUpdate::Connection(ConnectionStatus::Disconnected(reason)));
}

/// Stdout rendering of the dashboard for `--headless`
#[derive(Default)]
pub struct HeadlessPrinter {
    log: LspLogView,
    histogram: HistogramView,
    stats: DispatchStats,
}

impl HeadlessPrinter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, update: DashboardUpdate) {
        match update {
            DashboardUpdate::Connection(status) => display_connection(&status),
            DashboardUpdate::LspMessage { thread, timestamp, body } => {
                if let Some(entry) =
                    self.log.add_message_or_log(timestamp, &body).and_then(|id| self.log.entry(id))
                {
                    display_lsp_entry(thread, entry);
                }
            }
            DashboardUpdate::TraceEvent { thread, channel } => {
                if channel != Channel::LspClientToServerMessage {
                    display_trace_event(thread, channel);
                }
            }
            DashboardUpdate::Stats(stats) => self.stats = stats,
            DashboardUpdate::Histogram(snapshot) => {
                for (owner, counts) in &snapshot.max_size_histogram_by_owner {
                    let before = self.histogram.block(owner).cloned();
                    self.histogram.update_histogram(owner, counts);
                    // Snapshots repeat every poll; print only what changed
                    if let Some(block) = self.histogram.block(owner) {
                        if before.as_ref() != Some(block) {
                            display_histogram(block);
                        }
                    }
                }
            }
        }
    }

    /// Consume updates until every sender is dropped, then print totals
    pub fn run(mut self, rx: &Receiver<DashboardUpdate>) {
        for update in rx {
            self.apply(update);
        }
        display_statistics(&self.stats, self.log.rejected());
    }

    #[must_use]
    pub fn log(&self) -> &LspLogView {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tracescope_common::{encode_frame, TraceEvent, TraceWriter};

    #[test]
    fn test_config_from_args() {
        let args = Args::parse_from(["tracescope", "http://127.0.0.1:8098", "--duration", "5"]);
        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.server_url.as_str(), "http://127.0.0.1:8098/");
        assert_eq!(config.poll_interval, Duration::from_millis(1000));
        assert_eq!(config.duration, Some(Duration::from_secs(5)));
        assert!(!config.headless);
    }

    #[test]
    fn test_config_rejects_zero_interval_and_bad_url() {
        let args = Args::parse_from(["tracescope", "http://x", "--poll-interval-ms", "0"]);
        assert!(Config::from_args(&args).is_err());
        let args = Args::parse_from(["tracescope", "not a url"]);
        assert!(Config::from_args(&args).is_err());
    }

    #[test]
    fn test_wired_demux_forwards_lsp_body_then_activity() {
        let (tx, rx) = bounded(16);
        let mut demux = TraceDemux::new();
        let handles = wire_subscriptions(&mut demux, &tx);
        assert_eq!(handles.len(), Channel::ALL.len() + 1);

        let mut writer = TraceWriter::new();
        writer.write_header(3);
        writer.write_event(&TraceEvent::new(
            11,
            TracePayload::LspClientToServerMessage { body: r#"{"method":"m"}"#.into() },
        ));
        demux.handle_frame(&encode_frame(3, writer.as_bytes()));

        let received: Vec<DashboardUpdate> = rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                DashboardUpdate::LspMessage {
                    thread: ThreadId(3),
                    timestamp: Timestamp(11),
                    body: r#"{"method":"m"}"#.into(),
                },
                DashboardUpdate::TraceEvent {
                    thread: ThreadId(3),
                    channel: Channel::LspClientToServerMessage,
                },
            ]
        );
    }

    #[test]
    fn test_headless_printer_skips_malformed_body() {
        let mut printer = HeadlessPrinter::new();
        printer.apply(DashboardUpdate::LspMessage {
            thread: ThreadId(1),
            timestamp: Timestamp(1),
            body: "{oops".into(),
        });
        printer.apply(DashboardUpdate::LspMessage {
            thread: ThreadId(1),
            timestamp: Timestamp(2),
            body: r#"{"id":1,"method":"initialize"}"#.into(),
        });
        assert_eq!(printer.log().entries().len(), 1);
        assert_eq!(printer.log().rejected(), 1);
    }

    #[test]
    fn test_sample_messages_parse() {
        let config = Config::from_args(&Args::parse_from(["tracescope", "http://x"])).unwrap();
        let (ctx, rx) = AppContext::new(config);
        ctx.send_sample_messages();

        let mut view = LspLogView::new();
        for update in rx.try_iter() {
            if let DashboardUpdate::LspMessage { timestamp, body, .. } = update {
                view.add_message(timestamp, &body).unwrap();
            }
        }
        assert_eq!(view.entries().len(), 3);
        assert_eq!(view.entries()[0].summary, "textDocument/didChange");
    }
}
