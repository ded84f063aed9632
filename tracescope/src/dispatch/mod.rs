//! Trace transport, demultiplexing, and publish/subscribe dispatch
//!
//! - `connection`: WebSocket transport, endpoint derivation
//! - `demux`: per-thread readers, channel routing
//! - `event_bus`: named-channel listener registry
//! - `event_display`: headless printing of dispatched events

pub mod connection;
pub mod demux;
pub mod event_bus;
pub mod event_display;

pub use connection::{connect, trace_endpoint, TraceConnection, TRACE_ENDPOINT_PATH};
pub use demux::{Channel, DispatchStats, DispatchedEvent, TraceDemux};
pub use event_bus::{EventBus, SubscriptionHandle};
