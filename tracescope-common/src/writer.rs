//! Trace encoder, the inverse of [`crate::TraceReader`].

use crate::{
    DocumentPosition, TraceEvent, TracePayload, COMPRESSION_NONE, TRACE_MAGIC, TRACE_STREAM_UUID,
};

/// Appends a header and events to an in-memory trace stream
#[derive(Debug, Default)]
pub struct TraceWriter {
    buffer: Vec<u8>,
}

impl TraceWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_header(&mut self, thread_id: u64) {
        self.u32(TRACE_MAGIC);
        self.buffer.extend_from_slice(&TRACE_STREAM_UUID);
        self.u64(thread_id);
        self.buffer.push(COMPRESSION_NONE);
    }

    pub fn write_event(&mut self, event: &TraceEvent) {
        self.u64(event.timestamp);
        self.buffer.push(event.event_type().id());

        match &event.payload {
            TracePayload::Init { version } => self.utf8_zstring(version),
            TracePayload::VscodeDocumentOpened { document_id, uri, language_id, content }
            | TracePayload::VscodeDocumentSync { document_id, uri, language_id, content } => {
                self.u64(*document_id);
                self.utf16le_string(uri);
                self.utf16le_string(language_id);
                self.utf16le_string(content);
            }
            TracePayload::VscodeDocumentClosed { document_id, uri, language_id } => {
                self.u64(*document_id);
                self.utf16le_string(uri);
                self.utf16le_string(language_id);
            }
            TracePayload::VscodeDocumentChanged { document_id, changes } => {
                self.u64(*document_id);
                self.u64(changes.len() as u64);
                for change in changes {
                    self.position(change.range.start);
                    self.position(change.range.end);
                    self.u64(change.range_offset);
                    self.u64(change.range_length);
                    self.utf16le_string(&change.text);
                }
            }
            TracePayload::LspClientToServerMessage { body } => {
                self.u64(body.len() as u64);
                self.buffer.extend_from_slice(body.as_bytes());
            }
            TracePayload::VectorMaxSizeHistogramByOwner { entries } => {
                self.u64(entries.len() as u64);
                for histogram in entries {
                    self.utf8_zstring(&histogram.owner);
                    self.u64(histogram.entries.len() as u64);
                    for entry in &histogram.entries {
                        self.u64(entry.max_size);
                        self.u64(entry.count);
                    }
                }
            }
            TracePayload::ProcessId { process_id } => self.u64(*process_id),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Hand out everything written so far and start a new, empty buffer
    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn position(&mut self, position: DocumentPosition) {
        self.u64(position.line);
        self.u64(position.character);
    }

    fn utf8_zstring(&mut self, value: &str) {
        self.buffer.extend(value.bytes().filter(|&b| b != 0));
        self.buffer.push(0);
    }

    fn utf16le_string(&mut self, value: &str) {
        let units: Vec<u16> = value.encode_utf16().collect();
        self.u64(units.len() as u64);
        for unit in units {
            self.buffer.extend_from_slice(&unit.to_le_bytes());
        }
    }
}
