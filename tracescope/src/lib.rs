//! # Tracescope - Live Diagnostic Dashboard for a Language Server
//!
//! Tracescope attaches to a language server's debug HTTP server and shows what
//! it is doing while it runs: the LSP messages it receives and how its vectors
//! grow.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Language Server Debug Server                  │
//! │        WS /api/trace               GET /vector-profiler-stats   │
//! └──────────────┬───────────────────────────────┬──────────────────┘
//!                │ binary frames                 │ JSON, polled
//!                │ [thread_id u64 LE][bytes]     │
//!                ▼                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Tracescope (This Crate)                     │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐                            │
//! │  │  Connection  │──▶│ TraceDemux   │── one TraceReader/thread   │
//! │  │ (WebSocket)  │   │              │                            │
//! │  └──────────────┘   └──────┬───────┘                            │
//! │                            │ publish(channel, event)            │
//! │                            ▼                                    │
//! │                     ┌──────────────┐    ┌──────────────┐        │
//! │                     │   EventBus   │    │ StatsPoller  │        │
//! │                     └──────┬───────┘    └──────┬───────┘        │
//! │                            └──── updates ──────┘                │
//! │                                   │                             │
//! │                                   ▼                             │
//! │                   ┌────────────────────────────────┐            │
//! │                   │ TUI: LSP log │ params │ histo  │            │
//! │                   │  (or headless stdout printer)  │            │
//! │                   └────────────────────────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`dispatch`]: Trace transport and fan-out
//!   - `connection`: WebSocket endpoint derivation and frame reception
//!   - `demux`: per-thread incremental decoding, channel routing
//!   - `event_bus`: named-channel publish/subscribe
//!   - `event_display`: headless printing
//!
//! - [`polling`]: Periodic fetch of vector profiler stats
//!
//! - [`tui`]: Terminal UI
//!   - `lsp_log`: message classification, selection, params drill-down
//!   - `histogram`: per-owner max-size histogram
//!
//! - [`app`]: Configuration, task wiring, headless mode
//!
//! - [`cli`]: Command-line argument parsing
//!
//! - [`domain`]: Core domain types (`ThreadId`, `Timestamp`, `EntryId`) and errors
//!
//! The binary trace format itself (reader, writer, event model) lives in the
//! `tracescope-common` crate.
//!
//! ## Operational Modes
//!
//! 1. **Live TUI Mode** (default): interactive dashboard
//! 2. **Headless Mode** (`--headless`): print messages, histogram changes and
//!    trace activity to stdout
//!
//! ## Typical Usage
//!
//! ```bash
//! # Attach to a debug server
//! tracescope http://127.0.0.1:8098/
//!
//! # Log for 30 seconds without the TUI
//! tracescope http://127.0.0.1:8098/ --headless --duration 30
//! ```
//!
//! ## Key Concepts
//!
//! - **Frame**: one binary transport message, prefixed with the emitting thread
//! - **Trace stream**: per-thread byte stream; frames are arbitrary slices of it
//! - **Channel**: named publish target, one per dashboard-visible event type
//! - **Owner**: allocation site label in the vector profiler stats

pub mod app;
pub mod cli;
pub mod dispatch;
pub mod domain;
pub mod polling;
pub mod tui;
