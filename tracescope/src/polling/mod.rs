//! Vector profiler stats polling
//!
//! Fetches `GET /vector-profiler-stats` from the debug server on a fixed
//! interval. This path is independent of the trace transport: a stats failure
//! doesn't affect trace dispatch and vice versa.

use log::{debug, warn};
use indexmap::IndexMap;
use serde::Deserialize;
use std::ops::ControlFlow;
use std::time::Duration;
use url::Url;

use crate::domain::PollError;

/// Path of the stats endpoint on the debug server
pub const STATS_ENDPOINT_PATH: &str = "/vector-profiler-stats";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// One stats snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorProfileStats {
    /// Owner name → count per size bucket, in the server's order
    #[serde(default)]
    pub max_size_histogram_by_owner: IndexMap<String, Vec<u64>>,
}

pub struct StatsPoller {
    client: reqwest::Client,
    url: Url,
    interval: Duration,
}

impl StatsPoller {
    /// # Errors
    /// Returns an error if the stats URL cannot be derived from `server_url`
    pub fn new(server_url: &Url, interval: Duration) -> Result<Self, PollError> {
        Ok(Self {
            client: reqwest::Client::new(),
            url: server_url.join(STATS_ENDPOINT_PATH)?,
            interval,
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetch a single snapshot
    ///
    /// # Errors
    /// Returns an error on connection failure, a non-2xx status, or a body
    /// that isn't a stats object
    pub async fn poll_once(&self) -> Result<VectorProfileStats, PollError> {
        let stats = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json::<VectorProfileStats>()
            .await?;
        debug!("Polled {} histogram owners", stats.max_size_histogram_by_owner.len());
        Ok(stats)
    }

    /// Poll forever, handing each snapshot to `on_snapshot`.
    ///
    /// A failed poll is logged and retried on the next tick. The loop ends
    /// only when `on_snapshot` returns `ControlFlow::Break`.
    pub async fn run<F>(&self, mut on_snapshot: F)
    where
        F: FnMut(VectorProfileStats) -> ControlFlow<()>,
    {
        loop {
            match self.poll_once().await {
                Ok(stats) => {
                    if on_snapshot(stats).is_break() {
                        return;
                    }
                }
                Err(err) => warn!("Failed to poll {}: {err}", self.url),
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
