use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};
use clap::Parser;
use url::Url;

use tracescope::app::{AppContext, Config, ConnectionStatus, DashboardUpdate};
use tracescope::cli::Args;
use tracescope::dispatch::{self, Channel, DispatchedEvent, TraceDemux};
use tracescope::domain::{ConnectionError, ThreadId, Timestamp};
use tracescope::polling::StatsPoller;
use tracescope_common::{encode_frame, TraceEvent, TracePayload, TraceWriter};

/// Frames the fake debug server sends to every trace client, then closes
fn trace_frames() -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    for thread in [1_u64, 2] {
        let mut writer = TraceWriter::new();
        writer.write_header(thread);
        writer.write_event(&TraceEvent::new(10, TracePayload::Init { version: "1.0".into() }));
        let bytes = writer.take_bytes();
        // Header split across two frames
        frames.push(encode_frame(thread, &bytes[..7]));
        frames.push(encode_frame(thread, &bytes[7..]));
    }
    let mut writer = TraceWriter::new();
    writer.write_event(&TraceEvent::new(
        20,
        TracePayload::LspClientToServerMessage {
            body: r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"processId":7}}"#.into(),
        },
    ));
    frames.push(encode_frame(1, writer.as_bytes()));
    frames
}

async fn trace_socket(ws: WebSocketUpgrade, State(frames): State<Arc<Vec<Vec<u8>>>>) -> Response {
    ws.on_upgrade(move |mut socket: WebSocket| async move {
        let _ = socket.send(Message::Text("not part of the protocol".into())).await;
        for frame in frames.iter() {
            if socket.send(Message::Binary(frame.clone())).await.is_err() {
                return;
            }
        }
        let _ = socket.send(Message::Close(None)).await;
    })
}

async fn stats() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "maxSizeHistogramByOwner": { "libA": [10, 20, 70] } }))
}

async fn spawn_debug_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn debug_server() -> Router {
    Router::new()
        .route("/api/trace", get(trace_socket))
        .route("/vector-profiler-stats", get(stats))
        .with_state(Arc::new(trace_frames()))
}

fn page_url(addr: SocketAddr) -> Url {
    Url::parse(&format!("http://{addr}/index.html")).unwrap()
}

#[tokio::test]
async fn test_connection_dispatches_frames_until_close() {
    let addr = spawn_debug_server(debug_server()).await;

    let connection = dispatch::connect(&page_url(addr)).await.unwrap();
    assert_eq!(connection.endpoint().as_str(), format!("ws://{addr}/api/trace"));

    let mut demux = TraceDemux::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    for channel in [Channel::Init, Channel::LspClientToServerMessage] {
        let seen = Arc::clone(&seen);
        demux.subscribe(channel, move |event: &DispatchedEvent| {
            seen.lock().unwrap().push((channel, event.thread));
        });
    }

    let frames = connection.run(&mut demux).await.unwrap();
    assert_eq!(frames, 5);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (Channel::Init, ThreadId(1)),
            (Channel::Init, ThreadId(2)),
            (Channel::LspClientToServerMessage, ThreadId(1)),
        ]
    );
    assert_eq!(demux.stats().frame_errors, 0);
}

#[tokio::test]
async fn test_connect_to_closed_port_fails_once() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = dispatch::connect(&page_url(addr)).await.err().unwrap();
    assert!(matches!(err, ConnectionError::ConnectFailed { .. }));
    assert!(err.to_string().contains("/api/trace"));
}

#[tokio::test]
async fn test_poll_once_reads_snapshot() {
    let addr = spawn_debug_server(debug_server()).await;
    let poller = StatsPoller::new(&page_url(addr), Duration::from_millis(50)).unwrap();

    let snapshot = poller.poll_once().await.unwrap();
    assert_eq!(snapshot.max_size_histogram_by_owner["libA"], vec![10, 20, 70]);
}

#[tokio::test]
async fn test_poll_once_reports_server_error() {
    let router = Router::new()
        .route("/vector-profiler-stats", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let addr = spawn_debug_server(router).await;
    let poller = StatsPoller::new(&page_url(addr), Duration::from_millis(50)).unwrap();

    assert!(poller.poll_once().await.is_err());
}

#[tokio::test]
async fn test_app_tasks_feed_dashboard_updates() {
    let addr = spawn_debug_server(debug_server()).await;
    let args = Args::parse_from(["tracescope", page_url(addr).as_str(), "--poll-interval-ms", "50"]);
    let (ctx, rx) = AppContext::new(Config::from_args(&args).unwrap());

    let trace_task = ctx.spawn_trace_task();
    let poll_task = ctx.spawn_poll_task().unwrap();

    let mut updates = Vec::new();
    let mut saw_histogram = false;
    let mut disconnected = false;
    for _ in 0..200 {
        while let Ok(update) = rx.try_recv() {
            saw_histogram |= matches!(update, DashboardUpdate::Histogram(_));
            disconnected |=
                matches!(update, DashboardUpdate::Connection(ConnectionStatus::Disconnected(_)));
            updates.push(update);
        }
        if saw_histogram && disconnected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    poll_task.abort();
    let _ = trace_task.await;

    assert!(saw_histogram, "poll task never delivered a snapshot");
    assert!(disconnected, "trace task never reported the close");
    assert!(matches!(
        updates.first(),
        Some(DashboardUpdate::Connection(ConnectionStatus::Connecting(_)))
    ));
    assert!(updates.contains(&DashboardUpdate::LspMessage {
        thread: ThreadId(1),
        timestamp: Timestamp(20),
        body: r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"processId":7}}"#.into(),
    }));
    let init_events = updates
        .iter()
        .filter(|u| matches!(u, DashboardUpdate::TraceEvent { channel: Channel::Init, .. }))
        .count();
    assert_eq!(init_events, 2);
}
