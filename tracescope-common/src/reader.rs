//! Incremental trace decoder.
//!
//! A [`TraceReader`] owns a growing byte buffer and a read cursor. Bytes are
//! appended as they arrive from the transport; [`TraceReader::pull_new_events`]
//! decodes every complete event past the cursor and leaves any trailing partial
//! event buffered for the next call.
//!
//! A malformed stream poisons the reader: the fault is reported once, and all
//! later bytes are discarded, since event boundaries can no longer be trusted.

use thiserror::Error;

use crate::{
    DocumentChange, DocumentPosition, DocumentRange, MaxSizeCount, OwnerHistogram, TraceEvent,
    TraceEventType, TraceHeader, TracePayload, COMPRESSION_NONE, HEADER_SIZE, MAX_FIELD_BYTES,
    TRACE_MAGIC, TRACE_STREAM_UUID,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid trace magic {0:#010x}")]
    BadMagic(u32),

    #[error("Unrecognized trace stream UUID")]
    BadStreamUuid,

    #[error("Unsupported compression scheme {0}")]
    UnsupportedCompression(u8),

    #[error("Unknown event id {id} at stream offset {offset}")]
    UnknownEvent { id: u8, offset: u64 },

    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("Invalid UTF-16 in {0}")]
    InvalidUtf16(&'static str),

    #[error("Field length {0} exceeds limit")]
    FieldTooLarge(u64),
}

/// Why a parse attempt stopped
enum Stop {
    /// More bytes are needed; nothing was consumed
    Incomplete,
    Malformed(DecodeError),
}

impl From<DecodeError> for Stop {
    fn from(err: DecodeError) -> Self {
        Stop::Malformed(err)
    }
}

type Parse<T> = Result<T, Stop>;

/// Cursor over the unconsumed part of the buffer.
///
/// Every read either succeeds or leaves the caller to discard the cursor, so a
/// partial event never advances the reader.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Parse<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(Stop::Incomplete)?;
        let bytes = self.data.get(self.pos..end).ok_or(Stop::Incomplete)?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Parse<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Parse<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self) -> Parse<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    /// `u64` element count, rejected once `min_size` bytes per element would
    /// exceed [`MAX_FIELD_BYTES`]
    fn count(&mut self, min_size: u64) -> Parse<u64> {
        let count = self.u64()?;
        if count.checked_mul(min_size).is_some_and(|bytes| bytes <= MAX_FIELD_BYTES) {
            Ok(count)
        } else {
            Err(DecodeError::FieldTooLarge(count).into())
        }
    }

    fn field_len(&mut self, unit_size: u64) -> Parse<usize> {
        let count = self.count(unit_size)?;
        usize::try_from(count * unit_size).map_err(|_| Stop::from(DecodeError::FieldTooLarge(count)))
    }

    /// `u64` byte length followed by UTF-8 bytes
    fn utf8_string(&mut self, field: &'static str) -> Parse<String> {
        let len = self.field_len(1)?;
        let bytes = self.take(len)?;
        Ok(std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(field))?.to_owned())
    }

    /// UTF-8 bytes terminated by a NUL byte
    fn utf8_zstring(&mut self, field: &'static str) -> Parse<String> {
        let rest = &self.data[self.pos..];
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            if rest.len() as u64 > MAX_FIELD_BYTES {
                return Err(DecodeError::FieldTooLarge(rest.len() as u64).into());
            }
            return Err(Stop::Incomplete);
        };
        let bytes = self.take(nul)?;
        self.pos += 1;
        Ok(std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(field))?.to_owned())
    }

    /// `u64` code-unit count followed by UTF-16LE code units
    fn utf16le_string(&mut self, field: &'static str) -> Parse<String> {
        let len = self.field_len(2)?;
        let bytes = self.take(len)?;
        let units: Vec<u16> =
            bytes.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect();
        Ok(String::from_utf16(&units).map_err(|_| DecodeError::InvalidUtf16(field))?)
    }

    fn position(&mut self) -> Parse<DocumentPosition> {
        Ok(DocumentPosition { line: self.u64()?, character: self.u64()? })
    }
}

fn parse_header(cursor: &mut Cursor<'_>) -> Parse<TraceHeader> {
    // Wait for the whole header so a short first frame isn't misreported
    if cursor.data.len() < HEADER_SIZE {
        return Err(Stop::Incomplete);
    }
    let magic = cursor.u32()?;
    if magic != TRACE_MAGIC {
        return Err(DecodeError::BadMagic(magic).into());
    }
    if cursor.take(16)? != TRACE_STREAM_UUID {
        return Err(DecodeError::BadStreamUuid.into());
    }
    let thread_id = cursor.u64()?;
    let compression_scheme = cursor.u8()?;
    if compression_scheme != COMPRESSION_NONE {
        return Err(DecodeError::UnsupportedCompression(compression_scheme).into());
    }
    Ok(TraceHeader { thread_id, compression_scheme })
}

/// Smallest encoding of one document change: two positions, offset, length,
/// and an empty text
const MIN_CHANGE_SIZE: u64 = 4 * 8 + 8 + 8 + 8;

/// Smallest encoding of one histogram owner: empty name and entry count
const MIN_OWNER_SIZE: u64 = 1 + 8;

const ENTRY_SIZE: u64 = 8 + 8;

fn parse_event(cursor: &mut Cursor<'_>, stream_offset: u64) -> Parse<TraceEvent> {
    let timestamp = cursor.u64()?;
    let id = cursor.u8()?;
    let event_type = TraceEventType::from_id(id)
        .ok_or(DecodeError::UnknownEvent { id, offset: stream_offset })?;

    let payload = match event_type {
        TraceEventType::Init => TracePayload::Init { version: cursor.utf8_zstring("version")? },
        TraceEventType::VscodeDocumentOpened => TracePayload::VscodeDocumentOpened {
            document_id: cursor.u64()?,
            uri: cursor.utf16le_string("uri")?,
            language_id: cursor.utf16le_string("language_id")?,
            content: cursor.utf16le_string("content")?,
        },
        TraceEventType::VscodeDocumentClosed => TracePayload::VscodeDocumentClosed {
            document_id: cursor.u64()?,
            uri: cursor.utf16le_string("uri")?,
            language_id: cursor.utf16le_string("language_id")?,
        },
        TraceEventType::VscodeDocumentChanged => {
            let document_id = cursor.u64()?;
            let count = cursor.count(MIN_CHANGE_SIZE)?;
            let mut changes = Vec::new();
            for _ in 0..count {
                changes.push(DocumentChange {
                    range: DocumentRange { start: cursor.position()?, end: cursor.position()? },
                    range_offset: cursor.u64()?,
                    range_length: cursor.u64()?,
                    text: cursor.utf16le_string("text")?,
                });
            }
            TracePayload::VscodeDocumentChanged { document_id, changes }
        }
        TraceEventType::VscodeDocumentSync => TracePayload::VscodeDocumentSync {
            document_id: cursor.u64()?,
            uri: cursor.utf16le_string("uri")?,
            language_id: cursor.utf16le_string("language_id")?,
            content: cursor.utf16le_string("content")?,
        },
        TraceEventType::LspClientToServerMessage => {
            TracePayload::LspClientToServerMessage { body: cursor.utf8_string("body")? }
        }
        TraceEventType::VectorMaxSizeHistogramByOwner => {
            let owner_count = cursor.count(MIN_OWNER_SIZE)?;
            let mut entries = Vec::new();
            for _ in 0..owner_count {
                let owner = cursor.utf8_zstring("owner")?;
                let entry_count = cursor.count(ENTRY_SIZE)?;
                let mut counts = Vec::new();
                for _ in 0..entry_count {
                    counts.push(MaxSizeCount { max_size: cursor.u64()?, count: cursor.u64()? });
                }
                entries.push(OwnerHistogram { owner, entries: counts });
            }
            TracePayload::VectorMaxSizeHistogramByOwner { entries }
        }
        TraceEventType::ProcessId => TracePayload::ProcessId { process_id: cursor.u64()? },
    };

    Ok(TraceEvent { timestamp, payload })
}

/// Incremental decoder for one thread's trace stream
#[derive(Debug, Default)]
pub struct TraceReader {
    buffer: Vec<u8>,
    /// Start of the first unconsumed byte in `buffer`
    cursor: usize,
    /// Bytes consumed since the start of the stream (for error offsets)
    consumed: u64,
    header: Option<TraceHeader>,
    poisoned: bool,
    discarded_bytes: u64,
}

impl TraceReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly received bytes to the end of the buffer.
    ///
    /// Bytes appended after the stream was found malformed are dropped and
    /// only counted.
    pub fn append_bytes(&mut self, bytes: &[u8]) {
        if self.poisoned {
            self.discarded_bytes += bytes.len() as u64;
            return;
        }
        if self.cursor > 0 {
            self.buffer.drain(..self.cursor);
            self.cursor = 0;
        }
        self.buffer.extend_from_slice(bytes);
    }

    /// Decode every complete event currently buffered.
    ///
    /// The iterator is lazy: each `next()` decodes one event and consumes its
    /// bytes. It ends when only a partial event (or nothing) remains; calling
    /// `pull_new_events` again after more bytes are appended resumes from there.
    /// A decode fault is yielded once as `Err`, after which the reader stays
    /// empty.
    pub fn pull_new_events(&mut self) -> PullNewEvents<'_> {
        PullNewEvents { reader: self }
    }

    /// Stream header, once the first bytes have been decoded
    #[must_use]
    pub fn header(&self) -> Option<&TraceHeader> {
        self.header.as_ref()
    }

    /// Bytes waiting for the rest of a partial event
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Bytes dropped because the stream was malformed
    #[must_use]
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    fn next_event(&mut self) -> Option<Result<TraceEvent, DecodeError>> {
        if self.poisoned {
            return None;
        }

        if self.header.is_none() {
            let mut cursor = Cursor::new(&self.buffer[self.cursor..]);
            match parse_header(&mut cursor) {
                Ok(header) => {
                    let used = cursor.pos;
                    self.header = Some(header);
                    self.advance(used);
                }
                Err(Stop::Incomplete) => return None,
                Err(Stop::Malformed(err)) => return Some(Err(self.poison(err))),
            }
        }

        let mut cursor = Cursor::new(&self.buffer[self.cursor..]);
        match parse_event(&mut cursor, self.consumed) {
            Ok(event) => {
                let used = cursor.pos;
                self.advance(used);
                Some(Ok(event))
            }
            Err(Stop::Incomplete) => None,
            Err(Stop::Malformed(err)) => Some(Err(self.poison(err))),
        }
    }

    fn advance(&mut self, len: usize) {
        self.cursor += len;
        self.consumed += len as u64;
        if self.cursor == self.buffer.len() {
            self.buffer.clear();
            self.cursor = 0;
        }
    }

    fn poison(&mut self, err: DecodeError) -> DecodeError {
        self.poisoned = true;
        self.discarded_bytes += self.buffered_len() as u64;
        self.buffer = Vec::new();
        self.cursor = 0;
        err
    }
}

/// Lazy iterator returned by [`TraceReader::pull_new_events`]
pub struct PullNewEvents<'r> {
    reader: &'r mut TraceReader,
}

impl Iterator for PullNewEvents<'_> {
    type Item = Result<TraceEvent, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_event()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TraceWriter;

    fn lsp(timestamp: u64, body: &str) -> TraceEvent {
        TraceEvent::new(timestamp, TracePayload::LspClientToServerMessage { body: body.into() })
    }

    fn sample_stream() -> (Vec<u8>, Vec<TraceEvent>) {
        let events = vec![
            TraceEvent::new(1, TracePayload::Init { version: "2.4.0".into() }),
            TraceEvent::new(
                2,
                TracePayload::VscodeDocumentOpened {
                    document_id: 7,
                    uri: "file:///tmp/héllo.js".into(),
                    language_id: "javascript".into(),
                    content: "let x = 1; // 😀".into(),
                },
            ),
            TraceEvent::new(
                3,
                TracePayload::VscodeDocumentChanged {
                    document_id: 7,
                    changes: vec![DocumentChange {
                        range: DocumentRange {
                            start: DocumentPosition { line: 0, character: 4 },
                            end: DocumentPosition { line: 0, character: 5 },
                        },
                        range_offset: 4,
                        range_length: 1,
                        text: "y".into(),
                    }],
                },
            ),
            lsp(4, r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#),
            TraceEvent::new(
                5,
                TracePayload::VectorMaxSizeHistogramByOwner {
                    entries: vec![OwnerHistogram {
                        owner: "lexer".into(),
                        entries: vec![MaxSizeCount { max_size: 4, count: 10 }],
                    }],
                },
            ),
            TraceEvent::new(6, TracePayload::ProcessId { process_id: 4242 }),
        ];
        let mut writer = TraceWriter::new();
        writer.write_header(99);
        for event in &events {
            writer.write_event(event);
        }
        (writer.into_bytes(), events)
    }

    fn decode_all(reader: &mut TraceReader) -> Vec<TraceEvent> {
        reader.pull_new_events().map(|r| r.expect("valid stream")).collect()
    }

    #[test]
    fn test_decodes_whole_stream() {
        let (bytes, expected) = sample_stream();
        let mut reader = TraceReader::new();
        reader.append_bytes(&bytes);

        assert_eq!(decode_all(&mut reader), expected);
        assert_eq!(reader.header().map(|h| h.thread_id), Some(99));
        assert_eq!(reader.buffered_len(), 0);
    }

    #[test]
    fn test_byte_at_a_time_matches_whole_stream() {
        let (bytes, expected) = sample_stream();
        let mut reader = TraceReader::new();
        let mut decoded = Vec::new();
        for byte in &bytes {
            reader.append_bytes(std::slice::from_ref(byte));
            decoded.extend(decode_all(&mut reader));
        }
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_partial_event_stays_buffered() {
        let (bytes, expected) = sample_stream();
        let mut reader = TraceReader::new();
        let cut = bytes.len() - 3;
        reader.append_bytes(&bytes[..cut]);

        let first = decode_all(&mut reader);
        assert_eq!(first, expected[..expected.len() - 1]);
        assert!(reader.buffered_len() > 0);

        reader.append_bytes(&bytes[cut..]);
        assert_eq!(decode_all(&mut reader), expected[expected.len() - 1..]);
    }

    #[test]
    fn test_iterator_is_lazy() {
        let (bytes, expected) = sample_stream();
        let mut reader = TraceReader::new();
        reader.append_bytes(&bytes);

        let first = reader.pull_new_events().next().unwrap().unwrap();
        assert_eq!(first, expected[0]);

        // A fresh call picks up where the previous one stopped
        assert_eq!(decode_all(&mut reader), expected[1..]);
    }

    #[test]
    fn test_bad_magic_poisons_reader() {
        let mut reader = TraceReader::new();
        reader.append_bytes(&[0u8; HEADER_SIZE]);

        let results: Vec<_> = reader.pull_new_events().collect();
        assert_eq!(results, vec![Err(DecodeError::BadMagic(0))]);
        assert!(reader.is_poisoned());

        reader.append_bytes(&[1, 2, 3]);
        assert_eq!(reader.pull_new_events().count(), 0);
        assert_eq!(reader.discarded_bytes(), HEADER_SIZE as u64 + 3);
    }

    #[test]
    fn test_unsupported_compression() {
        let mut writer = TraceWriter::new();
        writer.write_header(1);
        let mut bytes = writer.into_bytes();
        bytes[HEADER_SIZE - 1] = 1;

        let mut reader = TraceReader::new();
        reader.append_bytes(&bytes);
        let err = reader.pull_new_events().next().unwrap().unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedCompression(1));
    }

    #[test]
    fn test_unknown_event_id_reports_offset() {
        let mut writer = TraceWriter::new();
        writer.write_header(1);
        writer.write_event(&lsp(1, "{}"));
        let mut bytes = writer.into_bytes();
        let offset = bytes.len() as u64;
        bytes.extend_from_slice(&9u64.to_le_bytes());
        bytes.push(0xee);

        let mut reader = TraceReader::new();
        reader.append_bytes(&bytes);
        let results: Vec<_> = reader.pull_new_events().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(results[1], Err(DecodeError::UnknownEvent { id: 0xee, offset }));
    }

    #[test]
    fn test_invalid_utf8_body_is_malformed() {
        let mut writer = TraceWriter::new();
        writer.write_header(1);
        let mut bytes = writer.into_bytes();
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.push(crate::EVENT_LSP_CLIENT_TO_SERVER_MESSAGE);
        bytes.extend_from_slice(&2u64.to_le_bytes());
        bytes.extend_from_slice(&[0xff, 0xfe]);

        let mut reader = TraceReader::new();
        reader.append_bytes(&bytes);
        let err = reader.pull_new_events().next().unwrap().unwrap_err();
        assert_eq!(err, DecodeError::InvalidUtf8("body"));
    }

    #[test]
    fn test_oversized_length_is_malformed_not_incomplete() {
        let mut writer = TraceWriter::new();
        writer.write_header(1);
        let mut bytes = writer.into_bytes();
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.push(crate::EVENT_LSP_CLIENT_TO_SERVER_MESSAGE);
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());

        let mut reader = TraceReader::new();
        reader.append_bytes(&bytes);
        let err = reader.pull_new_events().next().unwrap().unwrap_err();
        assert_eq!(err, DecodeError::FieldTooLarge(u64::MAX));
    }

    fn event_prefix(id: u8) -> Vec<u8> {
        let mut writer = TraceWriter::new();
        writer.write_header(1);
        let mut bytes = writer.into_bytes();
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.push(id);
        bytes
    }

    #[test]
    fn test_oversized_change_count_poisons_reader() {
        let mut bytes = event_prefix(crate::EVENT_VSCODE_DOCUMENT_CHANGED);
        bytes.extend_from_slice(&7u64.to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());

        let mut reader = TraceReader::new();
        reader.append_bytes(&bytes);
        let results: Vec<_> = reader.pull_new_events().collect();
        assert_eq!(results, vec![Err(DecodeError::FieldTooLarge(u64::MAX))]);
        assert!(reader.is_poisoned());

        // Zero padding that a corrupt count would otherwise wait on is discarded
        reader.append_bytes(&[0u8; 4096]);
        assert_eq!(reader.buffered_len(), 0);
        assert_eq!(reader.pull_new_events().count(), 0);
    }

    #[test]
    fn test_oversized_histogram_counts_are_malformed() {
        let mut owners = event_prefix(crate::EVENT_VECTOR_MAX_SIZE_HISTOGRAM_BY_OWNER);
        owners.extend_from_slice(&MAX_FIELD_BYTES.to_le_bytes());
        let mut reader = TraceReader::new();
        reader.append_bytes(&owners);
        assert_eq!(
            reader.pull_new_events().next(),
            Some(Err(DecodeError::FieldTooLarge(MAX_FIELD_BYTES)))
        );

        let mut entries = event_prefix(crate::EVENT_VECTOR_MAX_SIZE_HISTOGRAM_BY_OWNER);
        entries.extend_from_slice(&1u64.to_le_bytes());
        entries.extend_from_slice(b"lexer\0");
        entries.extend_from_slice(&(MAX_FIELD_BYTES / 8).to_le_bytes());
        let mut reader = TraceReader::new();
        reader.append_bytes(&entries);
        assert_eq!(
            reader.pull_new_events().next(),
            Some(Err(DecodeError::FieldTooLarge(MAX_FIELD_BYTES / 8)))
        );
        assert!(reader.is_poisoned());
    }

    #[test]
    fn test_change_count_within_limit_waits_for_bytes() {
        let mut bytes = event_prefix(crate::EVENT_VSCODE_DOCUMENT_CHANGED);
        bytes.extend_from_slice(&7u64.to_le_bytes());
        bytes.extend_from_slice(&2u64.to_le_bytes());

        let mut reader = TraceReader::new();
        reader.append_bytes(&bytes);
        assert_eq!(reader.pull_new_events().count(), 0);
        assert!(!reader.is_poisoned());
    }

    #[test]
    fn test_short_header_waits_for_more_bytes() {
        let mut writer = TraceWriter::new();
        writer.write_header(5);
        let bytes = writer.into_bytes();

        let mut reader = TraceReader::new();
        reader.append_bytes(&bytes[..3]);
        assert_eq!(reader.pull_new_events().count(), 0);
        assert!(!reader.is_poisoned());

        reader.append_bytes(&bytes[3..]);
        assert_eq!(reader.pull_new_events().count(), 0);
        assert_eq!(reader.header().map(|h| h.thread_id), Some(5));
    }
}
