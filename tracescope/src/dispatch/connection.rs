//! WebSocket transport to the traced server's debug endpoint.
//!
//! The endpoint is derived from the server's page URL: same host and port,
//! path replaced with [`TRACE_ENDPOINT_PATH`], scheme replaced with `ws`.
//! A failed open is reported once; there is no retry.

use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::demux::TraceDemux;
use crate::domain::ConnectionError;

/// Path of the trace WebSocket on the debug server
pub const TRACE_ENDPOINT_PATH: &str = "/api/trace";

/// Derive the trace WebSocket URL from the server's page URL
///
/// # Errors
/// Returns an error if the page URL cannot carry a `ws` scheme (for example
/// `file:` or `mailto:` URLs)
pub fn trace_endpoint(page_url: &Url) -> Result<Url, ConnectionError> {
    let invalid = |reason: &str| ConnectionError::InvalidUrl {
        url: page_url.to_string(),
        reason: reason.to_string(),
    };

    if page_url.cannot_be_a_base() || page_url.host_str().is_none() {
        return Err(invalid("URL has no host"));
    }

    let mut url = page_url.clone();
    url.set_scheme("ws").map_err(|()| invalid("scheme cannot be replaced with ws"))?;
    url.set_path(TRACE_ENDPOINT_PATH);
    url.set_fragment(None);
    Ok(url)
}

/// Open the trace transport for the server at `page_url`
///
/// # Errors
/// Returns [`ConnectionError`] if the endpoint URL is invalid or the
/// WebSocket handshake fails
pub async fn connect(page_url: &Url) -> Result<TraceConnection, ConnectionError> {
    let endpoint = trace_endpoint(page_url)?;
    debug!("Connecting to {endpoint}");

    let (stream, _response) = connect_async(endpoint.as_str())
        .await
        .map_err(|source| ConnectionError::ConnectFailed { url: endpoint.to_string(), source })?;

    info!("Connected to {endpoint}");
    Ok(TraceConnection { endpoint, stream })
}

/// An open trace transport
pub struct TraceConnection {
    endpoint: Url,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TraceConnection {
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Wait for the next binary frame.
    ///
    /// Returns `None` once the server closes the connection. Text frames are
    /// not part of the protocol and are skipped.
    pub async fn next_frame(&mut self) -> Option<Result<Vec<u8>, ConnectionError>> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Binary(data)) => return Some(Ok(data)),
                Ok(Message::Text(text)) => {
                    warn!("Ignoring {}-byte text frame on trace transport", text.len());
                }
                Ok(Message::Close(frame)) => {
                    debug!("Trace transport closed: {frame:?}");
                    return None;
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(err) => return Some(Err(err.into())),
            }
        }
        None
    }

    /// Feed every frame into `demux` until the server closes the connection.
    ///
    /// Frames are handled strictly one after another; each frame's events are
    /// fully published before the next frame is read.
    ///
    /// # Errors
    /// Returns an error if the transport fails (decode faults are not errors)
    pub async fn run(mut self, demux: &mut TraceDemux) -> Result<u64, ConnectionError> {
        let mut frames = 0;
        while let Some(frame) = self.next_frame().await {
            demux.handle_frame(&frame?);
            frames += 1;
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(page: &str) -> Result<String, ConnectionError> {
        trace_endpoint(&Url::parse(page).unwrap()).map(String::from)
    }

    #[test]
    fn test_endpoint_replaces_path_and_scheme() {
        assert_eq!(
            endpoint("http://127.0.0.1:8098/index.html").unwrap(),
            "ws://127.0.0.1:8098/api/trace"
        );
    }

    #[test]
    fn test_endpoint_keeps_query_drops_fragment() {
        assert_eq!(
            endpoint("https://localhost:9000/debug/?x=1#top").unwrap(),
            "ws://localhost:9000/api/trace?x=1"
        );
    }

    #[test]
    fn test_endpoint_rejects_hostless_url() {
        assert!(matches!(endpoint("mailto:someone@example.com"), Err(ConnectionError::InvalidUrl { .. })));
        assert!(matches!(endpoint("file:///tmp/x"), Err(ConnectionError::InvalidUrl { .. })));
    }
}
