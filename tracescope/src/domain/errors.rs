//! Structured error types for tracescope
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::ThreadId;
use thiserror::Error;
use tracescope_common::DecodeError;

/// Failure to open the trace transport
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Invalid server URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to connect to WebSocket at {url}: {source}")]
    ConnectFailed {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("Trace transport failed: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
}

/// A transport frame that could not be dispatched
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame of {0} bytes is shorter than the 8-byte thread prefix")]
    TooShort(usize),

    #[error("Trace stream for {thread} is malformed: {source}")]
    Decode {
        thread: ThreadId,
        #[source]
        source: DecodeError,
    },
}

/// Failure to fetch a histogram snapshot
#[derive(Error, Debug)]
pub enum PollError {
    #[error("Invalid stats URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Stats request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// An LSP message body that could not be added to the log
#[derive(Error, Debug)]
pub enum LogError {
    #[error("LSP message body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("LSP message body is not a JSON object")]
    NotAnObject,
}
