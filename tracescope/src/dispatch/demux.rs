//! # Trace Stream Demultiplexer
//!
//! Turns raw transport frames into published trace events.
//!
//! ## Frame Routing
//!
//! ```text
//! frame: [thread_id u64 LE][bytes...]
//!            │
//!            ▼
//!   readers[thread_id] (created on first frame) ── append_bytes(bytes)
//!            │
//!            ▼
//!   pull_new_events() ── drained to exhaustion
//!            │
//!            ▼
//!   bus.publish(Channel::for_event_type(..), DispatchedEvent)
//! ```
//!
//! A frame is fully dispatched, including every listener call, before
//! [`TraceDemux::handle_frame`] returns. Decode faults are contained to the
//! thread that produced them: the reader for that thread is poisoned, every
//! other thread keeps decoding.

use log::{debug, warn};
use std::collections::HashMap;
use tracescope_common::{split_frame, TraceEvent, TraceEventType, TraceReader};

use super::event_bus::{EventBus, SubscriptionHandle};
use crate::domain::{FrameError, ThreadId};

/// Publish channel, one per dashboard-visible event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Init,
    VscodeDocumentOpened,
    VscodeDocumentClosed,
    VscodeDocumentChanged,
    VscodeDocumentSync,
    LspClientToServerMessage,
    /// Every event type without a dedicated channel
    Unknown,
}

impl Channel {
    pub const ALL: [Channel; 7] = [
        Channel::Init,
        Channel::VscodeDocumentOpened,
        Channel::VscodeDocumentClosed,
        Channel::VscodeDocumentChanged,
        Channel::VscodeDocumentSync,
        Channel::LspClientToServerMessage,
        Channel::Unknown,
    ];

    #[must_use]
    pub fn for_event_type(event_type: TraceEventType) -> Self {
        match event_type {
            TraceEventType::Init => Channel::Init,
            TraceEventType::VscodeDocumentOpened => Channel::VscodeDocumentOpened,
            TraceEventType::VscodeDocumentClosed => Channel::VscodeDocumentClosed,
            TraceEventType::VscodeDocumentChanged => Channel::VscodeDocumentChanged,
            TraceEventType::VscodeDocumentSync => Channel::VscodeDocumentSync,
            TraceEventType::LspClientToServerMessage => Channel::LspClientToServerMessage,
            TraceEventType::VectorMaxSizeHistogramByOwner | TraceEventType::ProcessId => {
                Channel::Unknown
            }
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Channel::Init => "initEvent",
            Channel::VscodeDocumentOpened => "vscodeDocumentOpenedEvent",
            Channel::VscodeDocumentClosed => "vscodeDocumentClosedEvent",
            Channel::VscodeDocumentChanged => "vscodeDocumentChangedEvent",
            Channel::VscodeDocumentSync => "vscodeDocumentSyncEvent",
            Channel::LspClientToServerMessage => "lspClientToServerMessageEvent",
            Channel::Unknown => "unknownTraceEvent",
        }
    }
}

/// Payload delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedEvent {
    pub thread: ThreadId,
    pub event: TraceEvent,
}

/// Running totals, shown in the status panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub frames: u64,
    pub bytes: u64,
    pub events: u64,
    pub unknown_events: u64,
    pub frame_errors: u64,
    pub threads: usize,
    /// Threads whose stream was found malformed
    pub poisoned_threads: usize,
}

/// Routes transport frames to per-thread readers and publishes their events
#[derive(Default)]
pub struct TraceDemux {
    readers: HashMap<ThreadId, TraceReader>,
    bus: EventBus<Channel, DispatchedEvent>,
    stats: DispatchStats,
}

impl TraceDemux {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, channel: Channel, listener: F) -> SubscriptionHandle
    where
        F: FnMut(&DispatchedEvent) + Send + 'static,
    {
        self.bus.subscribe(channel, listener)
    }

    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.bus.unsubscribe(handle)
    }

    /// Dispatch one frame, logging (never propagating) any fault.
    ///
    /// Returns the number of events published from this frame.
    pub fn handle_frame(&mut self, frame: &[u8]) -> usize {
        match self.dispatch_frame(frame) {
            Ok(published) => published,
            Err(err) => {
                warn!("Dropping trace frame: {err}");
                0
            }
        }
    }

    /// Dispatch one frame.
    ///
    /// Events decoded before a fault are still published.
    ///
    /// # Errors
    /// Returns an error if the frame is too short to carry a thread id, or if
    /// the thread's stream turned out to be malformed
    pub fn dispatch_frame(&mut self, frame: &[u8]) -> Result<usize, FrameError> {
        self.stats.frames += 1;
        self.stats.bytes += frame.len() as u64;

        let Some((thread_id, trace_bytes)) = split_frame(frame) else {
            self.stats.frame_errors += 1;
            return Err(FrameError::TooShort(frame.len()));
        };
        let thread = ThreadId(thread_id);

        let Self { readers, bus, stats } = self;
        let reader = readers.entry(thread).or_insert_with(|| {
            debug!("New trace stream from {thread}");
            stats.threads += 1;
            TraceReader::new()
        });

        if reader.is_poisoned() {
            reader.append_bytes(trace_bytes);
            debug!("Discarding {} bytes from malformed stream {thread}", trace_bytes.len());
            return Ok(0);
        }

        reader.append_bytes(trace_bytes);

        let mut published = 0;
        for result in reader.pull_new_events() {
            match result {
                Ok(event) => {
                    let channel = Channel::for_event_type(event.event_type());
                    debug!(
                        "{thread} event {} at {} -> {}",
                        event.event_type().name(),
                        event.timestamp,
                        channel.name()
                    );
                    stats.events += 1;
                    if channel == Channel::Unknown {
                        stats.unknown_events += 1;
                    }
                    bus.publish(&channel, &DispatchedEvent { thread, event });
                    published += 1;
                }
                Err(source) => {
                    stats.frame_errors += 1;
                    stats.poisoned_threads += 1;
                    return Err(FrameError::Decode { thread, source });
                }
            }
        }

        Ok(published)
    }

    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.readers.len()
    }

    /// Reader for `thread`, if a frame from it has been seen
    #[must_use]
    pub fn reader(&self, thread: ThreadId) -> Option<&TraceReader> {
        self.readers.get(&thread)
    }
}
