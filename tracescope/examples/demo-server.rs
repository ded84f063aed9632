//! Fake language server debug server for trying out tracescope
//!
//! Serves the two endpoints tracescope reads:
//! - `WS /api/trace`: two "threads" emitting document and LSP events, split
//!   into frames at arbitrary byte boundaries
//! - `GET /vector-profiler-stats`: histograms that grow on every request
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example demo-server
//!
//! # In another terminal
//! cargo run -- http://127.0.0.1:8098/
//! ```

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracescope_common::{
    encode_frame, DocumentChange, DocumentPosition, DocumentRange, TraceEvent, TracePayload,
    TraceWriter,
};

const DOC_URI: &str = "file:///home/user/project/hello.js";

#[derive(Default)]
struct DemoState {
    polls: AtomicU64,
}

fn lsp(timestamp: u64, body: String) -> TraceEvent {
    TraceEvent::new(timestamp, TracePayload::LspClientToServerMessage { body })
}

/// Events for one simulated editing session
fn session_events(thread: u64, step: u64) -> Vec<TraceEvent> {
    let t = step * 10;
    let version = step + 1;
    vec![
        lsp(
            t,
            format!(
                r#"{{"jsonrpc":"2.0","method":"textDocument/didChange","params":{{"textDocument":{{"uri":"{DOC_URI}","version":{version}}},"contentChanges":[{{"text":"console.log({step});\n"}}]}}}}"#
            ),
        ),
        TraceEvent::new(
            t + 1,
            TracePayload::VscodeDocumentChanged {
                document_id: thread,
                changes: vec![DocumentChange {
                    range: DocumentRange {
                        start: DocumentPosition { line: 0, character: 12 },
                        end: DocumentPosition { line: 0, character: 13 },
                    },
                    range_offset: 12,
                    range_length: 1,
                    text: step.to_string(),
                }],
            },
        ),
        lsp(
            t + 2,
            format!(
                r#"{{"jsonrpc":"2.0","id":{step},"method":"textDocument/hover","params":{{"textDocument":{{"uri":"{DOC_URI}"}},"position":{{"line":0,"character":3}}}}}}"#
            ),
        ),
        lsp(t + 3, format!(r#"{{"jsonrpc":"2.0","id":{step},"result":null}}"#)),
    ]
}

async fn stream_trace(mut socket: WebSocket) {
    let mut writers: Vec<(u64, TraceWriter)> = vec![(1, TraceWriter::new()), (2, TraceWriter::new())];
    for (thread, writer) in &mut writers {
        writer.write_header(*thread);
        writer.write_event(&TraceEvent::new(0, TracePayload::Init { version: "0.1.0".into() }));
        writer.write_event(&TraceEvent::new(
            1,
            TracePayload::VscodeDocumentOpened {
                document_id: *thread,
                uri: DOC_URI.into(),
                language_id: "javascript".into(),
                content: "console.log(0);\n".into(),
            },
        ));
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(400));
    for step in 1.. {
        ticker.tick().await;
        for (thread, writer) in &mut writers {
            for event in session_events(*thread, step) {
                writer.write_event(&event);
            }
            let bytes = writer.take_bytes();
            // Cut at an odd offset so events straddle frames
            let cut = (bytes.len() / 3) | 1;
            for chunk in [&bytes[..cut], &bytes[cut..]] {
                if socket.send(Message::Binary(encode_frame(*thread, chunk))).await.is_err() {
                    return;
                }
            }
        }
    }
}

async fn trace(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(stream_trace)
}

async fn stats(State(state): State<Arc<DemoState>>) -> Json<serde_json::Value> {
    let n = state.polls.fetch_add(1, Ordering::Relaxed);
    Json(serde_json::json!({
        "maxSizeHistogramByOwner": {
            "lexer": [100 + n, 40 + n / 2, 5],
            "parser": [10, 20 + n, 70 + 2 * n, n / 4],
            "symbol_table": [0, 0, 1 + n / 10],
        }
    }))
}

#[tokio::main]
async fn main() {
    let app = Router::new()
        .route("/api/trace", get(trace))
        .route("/vector-profiler-stats", get(stats))
        .with_state(Arc::new(DemoState::default()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8098").await.unwrap();
    println!("Demo debug server listening on http://127.0.0.1:8098");
    println!();
    println!("Attach with:");
    println!("  cargo run -- http://127.0.0.1:8098/");
    axum::serve(listener, app).await.unwrap();
}
