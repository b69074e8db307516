//! Finnhub Stream Client
//!
//! Owns the single WebSocket connection to Finnhub's trade stream and keeps
//! the last traded price of every subscribed symbol in the shared price
//! store.
//!
//! # Stream URL
//!
//! `wss://ws.finnhub.io?token=<key>`
//!
//! # Connection Lifecycle
//!
//! - No symbols are subscribed on first connect; subscriptions are on demand
//! - Subscribe requests while disconnected are dropped, not queued
//! - Symbols subscribed on an earlier connection are re-subscribed on reconnect
//! - A connection silent for longer than the idle timeout is torn down
//! - Reconnection uses exponential backoff with jitter

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::codec::{FinnhubCodec, latest_prices};
use super::messages::{ControlKind, InboundFrame};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{StreamFeedPort, StreamStatsSnapshot, SubscribeOutcome};
use crate::domain::price::{PriceEntry, PriceStore, Ticker};
use crate::error::CacheError;
use crate::infrastructure::config::PriceCacheConfig;
use crate::infrastructure::metrics;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end a connection or the client.
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Control message could not be encoded.
    #[error("failed to encode control message: {0}")]
    Encode(#[from] serde_json::Error),

    /// No inbound traffic within the idle timeout.
    #[error("no traffic for {0:?}")]
    IdleTimeout(Duration),

    /// Server closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Maximum reconnection attempts exceeded.
    #[error("maximum reconnection attempts exceeded")]
    MaxReconnectAttemptsExceeded,

    /// `run` was called more than once.
    #[error("stream client is already running")]
    AlreadyRunning,
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the stream client.
#[derive(Clone)]
pub struct StreamClientConfig {
    /// WebSocket URL without the token.
    pub url: String,
    /// API token appended as `?token=`.
    pub token: String,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
    /// Silence after which the connection is considered dead.
    pub idle_timeout: Duration,
}

impl StreamClientConfig {
    /// Create a configuration with default reconnect and idle settings.
    #[must_use]
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            reconnect: ReconnectConfig::default(),
            idle_timeout: Duration::from_secs(90),
        }
    }

    /// Build from the service configuration.
    #[must_use]
    pub fn from_config(config: &PriceCacheConfig) -> Self {
        Self {
            url: config.endpoints.stream_url.clone(),
            token: config.credentials.finnhub_api_key().to_string(),
            reconnect: ReconnectConfig::from_stream_settings(&config.stream),
            idle_timeout: config.stream.idle_timeout,
        }
    }

    /// Full connection URL.
    #[must_use]
    pub fn connect_url(&self) -> String {
        format!("{}?token={}", self.url, self.token)
    }
}

impl std::fmt::Debug for StreamClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClientConfig")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .field("reconnect", &self.reconnect)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

// =============================================================================
// Stream Stats
// =============================================================================

/// Connection counters, readable from any thread.
#[derive(Debug, Default)]
struct StreamStats {
    connected: AtomicBool,
    frames_received: AtomicU64,
    prices_updated: AtomicU64,
    malformed_frames: AtomicU64,
    reconnect_attempts: AtomicU64,
}

// =============================================================================
// Stream Client
// =============================================================================

#[derive(Debug)]
enum Command {
    Control(ControlKind, Ticker),
}

/// Finnhub trade stream client.
///
/// Manages the connection lifecycle including:
/// - Idle detection
/// - Automatic reconnection with exponential backoff
/// - Subscription restore after reconnect
pub struct StreamFeedClient {
    config: StreamClientConfig,
    codec: FinnhubCodec,
    prices: Arc<PriceStore>,
    cancel: CancellationToken,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    subscribed: RwLock<HashSet<Ticker>>,
    stats: StreamStats,
}

impl StreamFeedClient {
    /// Create a client writing trades into `prices`.
    #[must_use]
    pub fn new(
        config: StreamClientConfig,
        prices: Arc<PriceStore>,
        cancel: CancellationToken,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        Self {
            config,
            codec: FinnhubCodec::new(),
            prices,
            cancel,
            commands_tx,
            commands_rx: Mutex::new(Some(commands_rx)),
            subscribed: RwLock::new(HashSet::new()),
            stats: StreamStats::default(),
        }
    }

    /// Run the connection loop until cancelled or attempts are exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if called twice or reconnection gives up.
    pub async fn run(self: Arc<Self>) -> Result<(), StreamClientError> {
        let mut commands = self
            .commands_rx
            .lock()
            .take()
            .ok_or(StreamClientError::AlreadyRunning)?;
        let mut reconnect_policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Stream client cancelled");
                return Ok(());
            }

            let result = self
                .connect_and_run(&mut commands, &mut reconnect_policy)
                .await;
            self.mark_disconnected(&mut commands);

            match result {
                Ok(()) => {
                    tracing::info!("Stream connection closed gracefully");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Stream connection error");

                    let Some(delay) = reconnect_policy.next_delay() else {
                        return Err(StreamClientError::MaxReconnectAttemptsExceeded);
                    };

                    let attempt = reconnect_policy.attempt_count();
                    self.stats.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
                    metrics::record_reconnect();
                    tracing::info!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        "Reconnecting to trade stream"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            tracing::info!("Stream client cancelled during reconnect delay");
                            return Ok(());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Connect and pump messages until error or cancellation.
    async fn connect_and_run(
        &self,
        commands: &mut mpsc::UnboundedReceiver<Command>,
        reconnect_policy: &mut ReconnectPolicy,
    ) -> Result<(), StreamClientError> {
        tracing::info!(url = %self.config.url, "Connecting to trade stream");

        let (ws_stream, _response) =
            tokio_tungstenite::connect_async(self.config.connect_url()).await?;
        let (mut write, mut read) = ws_stream.split();

        reconnect_policy.reset();

        // Restore before accepting new requests so none are sent twice.
        let restore: Vec<Ticker> = {
            let mut symbols: Vec<_> = self.subscribed.read().iter().cloned().collect();
            symbols.sort();
            symbols
        };
        for symbol in &restore {
            let json = self.codec.encode_control(ControlKind::Subscribe, symbol)?;
            write.send(Message::Text(json.into())).await?;
        }

        self.stats.connected.store(true, Ordering::Release);
        metrics::set_stream_connected(true);
        tracing::info!(restored = restore.len(), "Trade stream connected");

        let idle_timeout = self.config.idle_timeout;
        let idle = tokio::time::sleep(idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                () = &mut idle => {
                    return Err(StreamClientError::IdleTimeout(idle_timeout));
                }
                command = commands.recv() => {
                    let Some(Command::Control(kind, symbol)) = command else {
                        return Ok(());
                    };
                    let json = self.codec.encode_control(kind, &symbol)?;
                    tracing::debug!(symbol = %symbol, kind = ?kind, "Sending control message");
                    write.send(Message::Text(json.into())).await?;
                }
                msg = read.next() => {
                    idle.as_mut().reset(Instant::now() + idle_timeout);
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = self.on_message(text.as_str()) {
                                tracing::warn!(error = %e, "Discarding stream frame");
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Server sent close frame");
                            return Err(StreamClientError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            tracing::info!("WebSocket stream ended");
                            return Err(StreamClientError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Clear the connected flag and drop control messages queued for the
    /// dead connection.
    fn mark_disconnected(&self, commands: &mut mpsc::UnboundedReceiver<Command>) {
        self.stats.connected.store(false, Ordering::Release);
        metrics::set_stream_connected(false);

        let mut dropped = 0usize;
        while commands.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(dropped, "Dropped control messages queued before disconnect");
        }
    }

    /// Apply one inbound text frame.
    ///
    /// Returns how many price entries were written.
    ///
    /// # Errors
    ///
    /// Returns `MalformedMessage` for a malformed or unknown frame; no state
    /// is changed in that case.
    pub fn on_message(&self, raw: &str) -> Result<usize, CacheError> {
        self.stats.frames_received.fetch_add(1, Ordering::Relaxed);

        let frame = self.codec.decode(raw).inspect_err(|_| {
            self.stats.malformed_frames.fetch_add(1, Ordering::Relaxed);
            metrics::record_malformed_frame();
        })?;
        metrics::record_stream_frame(frame.kind());

        match frame {
            InboundFrame::Trade(ticks) => {
                let entries = latest_prices(&ticks).inspect_err(|_| {
                    self.stats.malformed_frames.fetch_add(1, Ordering::Relaxed);
                    metrics::record_malformed_frame();
                })?;
                let count = entries.len();
                for entry in entries {
                    self.prices.upsert(entry);
                }
                self.stats
                    .prices_updated
                    .fetch_add(count as u64, Ordering::Relaxed);
                Ok(count)
            }
            InboundFrame::Ping => Ok(0),
            InboundFrame::Error(msg) => {
                tracing::error!(msg = %msg, "Trade stream reported an error");
                Ok(0)
            }
        }
    }

    fn send_control(&self, kind: ControlKind, ticker: &str) -> SubscribeOutcome {
        if !self.is_connected() {
            return SubscribeOutcome::NotConnected;
        }
        match self
            .commands_tx
            .send(Command::Control(kind, ticker.to_string()))
        {
            Ok(()) => SubscribeOutcome::Sent,
            Err(_) => SubscribeOutcome::NotConnected,
        }
    }

    /// Symbols that will be restored on reconnect, sorted.
    #[must_use]
    pub fn subscribed_symbols(&self) -> Vec<Ticker> {
        let mut symbols: Vec<_> = self.subscribed.read().iter().cloned().collect();
        symbols.sort();
        symbols
    }
}

impl StreamFeedPort for StreamFeedClient {
    fn subscribe(&self, ticker: &str) -> SubscribeOutcome {
        let outcome = self.send_control(ControlKind::Subscribe, ticker);
        if outcome == SubscribeOutcome::Sent {
            self.subscribed.write().insert(ticker.to_string());
        } else {
            tracing::debug!(ticker, "Trade stream not connected, subscribe dropped");
        }
        outcome
    }

    fn unsubscribe(&self, ticker: &str) -> SubscribeOutcome {
        self.subscribed.write().remove(ticker);
        self.send_control(ControlKind::Unsubscribe, ticker)
    }

    fn price(&self, ticker: &str) -> Option<PriceEntry> {
        self.prices.get(ticker)
    }

    fn is_connected(&self) -> bool {
        self.stats.connected.load(Ordering::Acquire)
    }

    fn stats(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            connected: self.is_connected(),
            frames_received: self.stats.frames_received.load(Ordering::Relaxed),
            prices_updated: self.stats.prices_updated.load(Ordering::Relaxed),
            malformed_frames: self.stats.malformed_frames.load(Ordering::Relaxed),
            reconnect_attempts: self.stats.reconnect_attempts.load(Ordering::Relaxed),
            subscribed_symbols: self.subscribed.read().len(),
        }
    }
}

impl std::fmt::Debug for StreamFeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamFeedClient")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
