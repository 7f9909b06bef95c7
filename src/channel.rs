//! WebSocket channel connector
//!
//! Generic connector used by both the live feed and the analysis exchange.
//! A reader task owns the socket and forwards decoded frames over an mpsc
//! channel to the event loop, in arrival order. Outbound frames are queued
//! through a second mpsc and written by the same task.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Build a WebSocket endpoint URL from the configured server origin.
///
/// Substitutes the scheme (http -> ws, https -> wss) and appends the path,
/// mirroring how a browser client derives the stream URL from its page
/// origin.
pub fn endpoint_url(server_url: &str, path: &str) -> String {
    let ws_url = server_url
        .replace("http://", "ws://")
        .replace("https://", "wss://");

    format!("{}{}", ws_url.trim_end_matches('/'), path)
}

/// Event delivered to the channel consumer, in arrival order.
#[derive(Debug)]
pub enum ChannelEvent<In> {
    /// Connection established (also sent after a successful reconnect).
    Connected,
    /// One decoded inbound frame.
    Message(In),
    /// A frame failed to decode. The frame is dropped; the channel stays up.
    DecodeError(String),
    /// The connection is gone and no further reconnect will be attempted.
    Disconnected(Option<String>),
}

/// Reconnect behaviour after a failed connect or an unexpected close.
///
/// Retries are bounded with exponentially increasing delays. Establishing a
/// connection starts a fresh budget: when a long-lived stream drops, the
/// drop counts as the first attempt and up to `max_attempts - 1` reconnects
/// follow.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl ReconnectPolicy {
    /// Single connection attempt, no retries. Used by the analysis channel.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry `attempt` (counted from 1): base * 2^(attempt-1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// How a single connection ended.
enum SessionEnd {
    /// Closed by this side (`close()` called or handle dropped).
    Local,
    /// Closed by the server or by a transport error.
    Remote(Option<String>),
}

/// Handle to one WebSocket channel.
///
/// At most one connection exists per handle at any time. Dropping the handle
/// tears the connection down; `close()` does the same explicitly and is
/// idempotent.
pub struct Channel<In> {
    events: mpsc::UnboundedReceiver<ChannelEvent<In>>,
    outbound: mpsc::UnboundedSender<String>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl<In: DeserializeOwned + Send + 'static> Channel<In> {
    /// Open a channel to `url`. Connection establishment is asynchronous;
    /// the caller observes the outcome as `Connected` or `Disconnected`
    /// events.
    pub fn connect(url: String, policy: ReconnectPolicy) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(run(url, policy, event_tx, outbound_rx, shutdown_rx));

        Self {
            events: event_rx,
            outbound: outbound_tx,
            shutdown: Some(shutdown_tx),
        }
    }
}

impl<In> Channel<In> {
    /// Non-blocking poll for the next event, for use inside a render tick.
    pub fn try_recv(&mut self) -> Option<ChannelEvent<In>> {
        self.events.try_recv().ok()
    }

    /// Await the next event. Returns `None` once the reader task is gone.
    pub async fn recv(&mut self) -> Option<ChannelEvent<In>> {
        self.events.recv().await
    }

    /// Queue one outbound text frame.
    pub fn send(&self, payload: impl Into<String>) -> Result<()> {
        self.outbound
            .send(payload.into())
            .map_err(|_| anyhow::anyhow!("channel is closed"))
    }

    /// Close the channel. Closing an already-closed handle is a no-op.
    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.send(()).ok();
        }
    }
}

/// Connection loop: connect, pump frames, reconnect per policy.
async fn run<In: DeserializeOwned>(
    url: String,
    policy: ReconnectPolicy,
    events: mpsc::UnboundedSender<ChannelEvent<In>>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut attempt = 0u32;
    let mut last_error: Option<String> = None;

    loop {
        tracing::debug!("connecting to {url}");

        match connect_once(&url, &events, &mut outbound, &mut shutdown).await {
            Ok(SessionEnd::Local) => {
                tracing::debug!("channel to {url} closed locally");
                return;
            }
            Ok(SessionEnd::Remote(reason)) => {
                tracing::info!(
                    "connection to {url} ended: {}",
                    reason.as_deref().unwrap_or("stream exhausted")
                );
                // Connection had been established; start a fresh budget,
                // with the drop itself counting as its first attempt. A
                // single-attempt policy therefore never reconnects.
                attempt = 1;
                last_error = reason;
            }
            Err(e) => {
                tracing::error!("failed to connect to {url}: {e:#}");
                attempt += 1;
                last_error = Some(format!("{e:#}"));
            }
        }

        if attempt >= policy.max_attempts {
            events.send(ChannelEvent::Disconnected(last_error)).ok();
            return;
        }

        let delay = policy.delay_for(attempt);
        tracing::info!("reconnecting to {url} in {delay:?}");
        tokio::select! {
            _ = &mut shutdown => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn connect_once<In: DeserializeOwned>(
    url: &str,
    events: &mpsc::UnboundedSender<ChannelEvent<In>>,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    shutdown: &mut oneshot::Receiver<()>,
) -> Result<SessionEnd> {
    let (ws_stream, _) = connect_async(url)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;

    tracing::info!("connected to {url}");
    events.send(ChannelEvent::Connected).ok();

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            // close() called or handle dropped
            _ = &mut *shutdown => {
                write.send(Message::Close(None)).await.ok();
                return Ok(SessionEnd::Local);
            }
            frame = outbound.recv() => {
                match frame {
                    Some(text) => {
                        write
                            .send(Message::Text(text))
                            .await
                            .context("failed to send frame")?;
                    }
                    None => {
                        write.send(Message::Close(None)).await.ok();
                        return Ok(SessionEnd::Local);
                    }
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<In>(&text) {
                            Ok(decoded) => {
                                if events.send(ChannelEvent::Message(decoded)).is_err() {
                                    // Receiver dropped, exit
                                    return Ok(SessionEnd::Local);
                                }
                            }
                            Err(e) => {
                                tracing::error!(
                                    "failed to decode frame: {e}\nraw: {text}"
                                );
                                events
                                    .send(ChannelEvent::DecodeError(e.to_string()))
                                    .ok();
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        return Ok(SessionEnd::Remote(Some(
                            "connection closed by server".to_string(),
                        )));
                    }
                    Some(Ok(_)) => {
                        // Ignore ping/pong/binary frames
                    }
                    Some(Err(e)) => {
                        return Ok(SessionEnd::Remote(Some(e.to_string())));
                    }
                    None => {
                        return Ok(SessionEnd::Remote(Some(
                            "connection lost unexpectedly".to_string(),
                        )));
                    }
                }
            }
        }
    }
}
