//! # Trace Stream Format (Emitter ↔ Dashboard)
//!
//! Defines the binary trace format written by the instrumented language server
//! and read by the `tracescope` dashboard. One trace stream exists per emitting
//! worker thread; streams are multiplexed over a single transport connection by
//! prefixing every transport frame with the emitting thread's identifier.
//!
//! ## Layout
//!
//! ```text
//! transport frame:  [thread_id: u64 LE][ trace bytes ... ]
//!
//! trace stream:     [header][event][event][event] ...
//! header:           magic u32 | stream uuid [u8; 16] | thread_id u64 | compression u8
//! event:            timestamp u64 | event_id u8 | payload
//! ```
//!
//! All integers are little-endian. A frame boundary may fall anywhere inside a
//! stream, including in the middle of an integer; [`TraceReader`] buffers
//! partial events until the rest of their bytes arrive.
//!
//! ## Key Types
//!
//! - [`TraceReader`] - Incremental decoder, one per thread stream
//! - [`TraceWriter`] - Encoder used by emitters, demos, and tests
//! - [`TraceEvent`] - A decoded event (timestamp + typed payload)
//! - [`TraceEventType`] - The event tag

mod reader;
mod writer;

pub use reader::{DecodeError, PullNewEvents, TraceReader};
pub use writer::TraceWriter;

// ============================================================================
// Stream Header Constants
// ============================================================================

/// First four bytes of every trace stream
pub const TRACE_MAGIC: u32 = 0xc1fc_1fc1;

/// Identifies the stream as a language-server trace (bytes 4..20 of the header)
pub const TRACE_STREAM_UUID: [u8; 16] = [
    0x71, 0x75, 0x69, 0x63, 0x6b, 0x2d, 0x6c, 0x69, 0x6e, 0x74, 0x2d, 0x6a, 0x73, 0x2d, 0x74, 0x72,
];

/// Uncompressed event data (the only supported scheme)
pub const COMPRESSION_NONE: u8 = 0;

/// Size of the stream header in bytes
pub const HEADER_SIZE: usize = 4 + 16 + 8 + 1;

/// Size of the thread identifier prefix on every transport frame
pub const FRAME_PREFIX_SIZE: usize = 8;

/// Upper bound for a single length-prefixed field.
///
/// A corrupt length would otherwise make the reader buffer forever waiting
/// for bytes that never arrive.
pub const MAX_FIELD_BYTES: u64 = 1 << 30;

// ============================================================================
// Event Type Constants
// ============================================================================

/// Server started; payload is the server version string
pub const EVENT_INIT: u8 = 1;

/// Editor opened a document
pub const EVENT_VSCODE_DOCUMENT_OPENED: u8 = 2;

/// Editor closed a document
pub const EVENT_VSCODE_DOCUMENT_CLOSED: u8 = 3;

/// Editor applied incremental changes to a document
pub const EVENT_VSCODE_DOCUMENT_CHANGED: u8 = 4;

/// Full snapshot of a document's content
pub const EVENT_VSCODE_DOCUMENT_SYNC: u8 = 5;

/// Raw JSON-RPC message received from the LSP client
pub const EVENT_LSP_CLIENT_TO_SERVER_MESSAGE: u8 = 6;

/// Vector capacity histogram, keyed by allocation owner
pub const EVENT_VECTOR_MAX_SIZE_HISTOGRAM_BY_OWNER: u8 = 7;

/// Process identifier of the traced server
pub const EVENT_PROCESS_ID: u8 = 8;

/// Event tag carried by every [`TraceEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEventType {
    Init,
    VscodeDocumentOpened,
    VscodeDocumentClosed,
    VscodeDocumentChanged,
    VscodeDocumentSync,
    LspClientToServerMessage,
    VectorMaxSizeHistogramByOwner,
    ProcessId,
}

impl TraceEventType {
    /// Map a wire event id to its type, `None` for ids this format doesn't define
    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            EVENT_INIT => Some(Self::Init),
            EVENT_VSCODE_DOCUMENT_OPENED => Some(Self::VscodeDocumentOpened),
            EVENT_VSCODE_DOCUMENT_CLOSED => Some(Self::VscodeDocumentClosed),
            EVENT_VSCODE_DOCUMENT_CHANGED => Some(Self::VscodeDocumentChanged),
            EVENT_VSCODE_DOCUMENT_SYNC => Some(Self::VscodeDocumentSync),
            EVENT_LSP_CLIENT_TO_SERVER_MESSAGE => Some(Self::LspClientToServerMessage),
            EVENT_VECTOR_MAX_SIZE_HISTOGRAM_BY_OWNER => Some(Self::VectorMaxSizeHistogramByOwner),
            EVENT_PROCESS_ID => Some(Self::ProcessId),
            _ => None,
        }
    }

    /// Wire event id
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            Self::Init => EVENT_INIT,
            Self::VscodeDocumentOpened => EVENT_VSCODE_DOCUMENT_OPENED,
            Self::VscodeDocumentClosed => EVENT_VSCODE_DOCUMENT_CLOSED,
            Self::VscodeDocumentChanged => EVENT_VSCODE_DOCUMENT_CHANGED,
            Self::VscodeDocumentSync => EVENT_VSCODE_DOCUMENT_SYNC,
            Self::LspClientToServerMessage => EVENT_LSP_CLIENT_TO_SERVER_MESSAGE,
            Self::VectorMaxSizeHistogramByOwner => EVENT_VECTOR_MAX_SIZE_HISTOGRAM_BY_OWNER,
            Self::ProcessId => EVENT_PROCESS_ID,
        }
    }

    /// Upper-case tag name, as shown in logs
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::VscodeDocumentOpened => "VSCODE_DOCUMENT_OPENED",
            Self::VscodeDocumentClosed => "VSCODE_DOCUMENT_CLOSED",
            Self::VscodeDocumentChanged => "VSCODE_DOCUMENT_CHANGED",
            Self::VscodeDocumentSync => "VSCODE_DOCUMENT_SYNC",
            Self::LspClientToServerMessage => "LSP_CLIENT_TO_SERVER_MESSAGE",
            Self::VectorMaxSizeHistogramByOwner => "VECTOR_MAX_SIZE_HISTOGRAM_BY_OWNER",
            Self::ProcessId => "PROCESS_ID",
        }
    }
}

// ============================================================================
// Decoded Data Structures
// ============================================================================

/// Stream header, decoded once at the start of each thread's stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceHeader {
    /// Thread id as recorded by the emitter
    pub thread_id: u64,
    pub compression_scheme: u8,
}

/// A fully decoded trace event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// Emitter clock, opaque units
    pub timestamp: u64,
    pub payload: TracePayload,
}

impl TraceEvent {
    #[must_use]
    pub fn new(timestamp: u64, payload: TracePayload) -> Self {
        Self { timestamp, payload }
    }

    #[must_use]
    pub fn event_type(&self) -> TraceEventType {
        self.payload.event_type()
    }
}

/// Event-specific data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracePayload {
    Init {
        version: String,
    },
    VscodeDocumentOpened {
        document_id: u64,
        uri: String,
        language_id: String,
        content: String,
    },
    VscodeDocumentClosed {
        document_id: u64,
        uri: String,
        language_id: String,
    },
    VscodeDocumentChanged {
        document_id: u64,
        changes: Vec<DocumentChange>,
    },
    VscodeDocumentSync {
        document_id: u64,
        uri: String,
        language_id: String,
        content: String,
    },
    LspClientToServerMessage {
        /// UTF-8 JSON-RPC 2.0 message text
        body: String,
    },
    VectorMaxSizeHistogramByOwner {
        entries: Vec<OwnerHistogram>,
    },
    ProcessId {
        process_id: u64,
    },
}

impl TracePayload {
    #[must_use]
    pub fn event_type(&self) -> TraceEventType {
        match self {
            Self::Init { .. } => TraceEventType::Init,
            Self::VscodeDocumentOpened { .. } => TraceEventType::VscodeDocumentOpened,
            Self::VscodeDocumentClosed { .. } => TraceEventType::VscodeDocumentClosed,
            Self::VscodeDocumentChanged { .. } => TraceEventType::VscodeDocumentChanged,
            Self::VscodeDocumentSync { .. } => TraceEventType::VscodeDocumentSync,
            Self::LspClientToServerMessage { .. } => TraceEventType::LspClientToServerMessage,
            Self::VectorMaxSizeHistogramByOwner { .. } => {
                TraceEventType::VectorMaxSizeHistogramByOwner
            }
            Self::ProcessId { .. } => TraceEventType::ProcessId,
        }
    }
}

/// One incremental edit from a `VSCODE_DOCUMENT_CHANGED` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChange {
    pub range: DocumentRange,
    pub range_offset: u64,
    pub range_length: u64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentRange {
    pub start: DocumentPosition,
    pub end: DocumentPosition,
}

/// Zero-based line and UTF-16 character offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentPosition {
    pub line: u64,
    pub character: u64,
}

/// Capacity histogram for one allocation owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerHistogram {
    pub owner: String,
    pub entries: Vec<MaxSizeCount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxSizeCount {
    pub max_size: u64,
    pub count: u64,
}

// ============================================================================
// Transport Framing
// ============================================================================

/// Split a transport frame into its thread id and trace bytes.
///
/// Returns `None` when the frame is shorter than the 8-byte prefix.
#[must_use]
pub fn split_frame(frame: &[u8]) -> Option<(u64, &[u8])> {
    let prefix: [u8; FRAME_PREFIX_SIZE] = frame.get(..FRAME_PREFIX_SIZE)?.try_into().ok()?;
    Some((u64::from_le_bytes(prefix), &frame[FRAME_PREFIX_SIZE..]))
}

/// Prefix trace bytes with a thread id to form a transport frame
#[must_use]
pub fn encode_frame(thread_id: u64, trace_bytes: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_PREFIX_SIZE + trace_bytes.len());
    frame.extend_from_slice(&thread_id.to_le_bytes());
    frame.extend_from_slice(trace_bytes);
    frame
}
