//! Analysis requester
//!
//! One request/response exchange per snapshot: open a fresh channel to the
//! text-generation endpoint, send the snapshot's document, await exactly one
//! structured response, then close the connection.

use anyhow::{Result, bail};
use tokio::sync::mpsc;

use crate::AnalysisText;
use crate::channel::{Channel, ChannelEvent, ReconnectPolicy, endpoint_url};
use crate::session::Snapshot;

/// Path of the text-generation endpoint.
pub const ANALYSIS_PATH: &str = "/realtime/mamba";

/// Result of one analysis exchange, tagged with the generation of the
/// snapshot that requested it so stale responses can be discarded.
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub generation: u64,
    pub result: Result<String>,
}

/// Opens the analysis channel and runs the exchange off the event loop.
pub struct AnalysisRequester {
    server_url: String,
}

impl AnalysisRequester {
    pub fn new(server_url: &str) -> Self {
        Self {
            server_url: server_url.to_string(),
        }
    }

    /// Request analysis of a freshly captured snapshot. Returns `None` for
    /// an empty capture: there is nothing to analyze, so no channel is
    /// opened and no payload is sent.
    pub fn request_snapshot(
        &self,
        snapshot: &Snapshot,
    ) -> Option<mpsc::UnboundedReceiver<AnalysisOutcome>> {
        if snapshot.sample().is_empty() {
            tracing::debug!("skipping analysis of empty snapshot");
            return None;
        }

        Some(self.request(snapshot.generation(), snapshot.document()))
    }

    /// Send `document` for analysis. The outcome arrives on the returned
    /// receiver; dropping the receiver (operator resumed) makes any late
    /// outcome inert.
    ///
    /// There is deliberately no retry and no timeout: a never-responding
    /// endpoint leaves the snapshot pending-analysis and the view renders
    /// that state.
    pub fn request(&self, generation: u64, document: String) -> mpsc::UnboundedReceiver<AnalysisOutcome> {
        let (tx, rx) = mpsc::unbounded_channel();
        let url = endpoint_url(&self.server_url, ANALYSIS_PATH);

        tokio::spawn(async move {
            let result = exchange(url, document).await;
            if let Err(e) = &result {
                tracing::error!("analysis exchange failed: {e:#}");
            }
            tx.send(AnalysisOutcome { generation, result }).ok();
        });

        rx
    }
}

/// Connect, send the document as a single text frame, await one response,
/// close the channel deterministically.
async fn exchange(url: String, document: String) -> Result<String> {
    let mut channel: Channel<AnalysisText> = Channel::connect(url, ReconnectPolicy::none());

    // Queued now, written immediately after the connection is established.
    channel.send(document)?;

    loop {
        match channel.recv().await {
            Some(ChannelEvent::Connected) => {}
            Some(ChannelEvent::Message(AnalysisText { text })) => {
                channel.close();
                return Ok(text);
            }
            Some(ChannelEvent::DecodeError(e)) => {
                // Malformed frame: drop it, keep waiting for the response.
                tracing::error!("malformed analysis frame dropped: {e}");
            }
            Some(ChannelEvent::Disconnected(reason)) => {
                bail!(
                    "analysis channel closed before a response arrived: {}",
                    reason.as_deref().unwrap_or("unknown reason")
                );
            }
            None => bail!("analysis channel ended unexpectedly"),
        }
    }
}
