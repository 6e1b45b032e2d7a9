//! Streaming top-of-book client for one YES/NO token pair.
//!
//! [`MarketDataFeed`] owns a single WebSocket subscribed to both tokens and
//! merges their best bid/ask updates into one [`MarketSnapshot`]. Every
//! applied quote republishes the whole snapshot so consumers always see a
//! consistent four-tuple with a freshness timestamp.
//!
//! # Architecture
//!
//! ```text
//! MarketDataFeed::connect()
//!        │
//!        ├─► Spawns connection loop task
//!        │   ├─► subscribe, ping every `ping_interval`
//!        │   ├─► quotes → snapshot → FeedEvent::Snapshot
//!        │   └─► drop → backoff → reconnect (bounded)
//!        │
//!        └─► FeedEvents on the receiver returned by `new`
//! ```
//!
//! # Example
//!
//! ```no_run
//! use arb_ladder_feed::{FeedConfig, FeedEvent, MarketDataFeed};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), arb_ladder_feed::FeedError> {
//!     let (mut feed, mut events) = MarketDataFeed::new(FeedConfig::default());
//!     feed.connect(&["yes-token".to_string(), "no-token".to_string()])?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let FeedEvent::Snapshot(snapshot) = event {
//!             println!("pair cost: {:?}", snapshot.pair_ask_cost());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use crate::backoff::ReconnectPolicy;
use crate::codec::{self, InboundFrame, PING_FRAME};
use crate::error::FeedError;
use arb_ladder_core::{ConnectionStatus, FeedSettings, MarketSnapshot, PriceQuote, TokenSide};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// How long `disconnect` waits for a graceful close before aborting.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Events emitted by the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Connection lifecycle transition.
    Status(ConnectionStatus),
    /// Merged snapshot after a quote was applied.
    Snapshot(MarketSnapshot),
    /// A reconnect was scheduled after an abnormal close.
    ReconnectScheduled {
        /// 1-based reconnect number since the last successful open.
        attempt: u32,
        delay: Duration,
    },
}

/// Configuration for the feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    /// Keep-alive interval.
    pub ping_interval: Duration,
    pub reconnect: ReconnectPolicy,
    pub channel_buffer_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::from(&FeedSettings::default())
    }
}

impl From<&FeedSettings> for FeedConfig {
    fn from(settings: &FeedSettings) -> Self {
        Self {
            url: settings.url.clone(),
            ping_interval: Duration::from_millis(settings.ping_interval_ms),
            reconnect: ReconnectPolicy::new(
                Duration::from_millis(settings.reconnect_base_delay_ms),
                settings.max_reconnect_attempts,
            ),
            channel_buffer_size: settings.channel_buffer_size.max(1),
        }
    }
}

/// The YES and NO instrument ids of one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentPair {
    pub yes: String,
    pub no: String,
}

impl InstrumentPair {
    /// Validates that exactly two distinct ids were supplied, YES first.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidInstruments`] otherwise.
    pub fn from_ids(ids: &[String]) -> Result<Self, FeedError> {
        match ids {
            [yes, no] if yes != no => Ok(Self {
                yes: yes.clone(),
                no: no.clone(),
            }),
            [_, _] => Err(FeedError::InvalidInstruments(
                "YES and NO ids must differ".to_string(),
            )),
            other => Err(FeedError::InvalidInstruments(format!(
                "expected exactly 2 instrument ids, got {}",
                other.len()
            ))),
        }
    }

    /// Maps an instrument id to the token it represents.
    #[must_use]
    pub fn side_of(&self, instrument_id: &str) -> Option<TokenSide> {
        if instrument_id == self.yes {
            Some(TokenSide::Yes)
        } else if instrument_id == self.no {
            Some(TokenSide::No)
        } else {
            None
        }
    }

    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        vec![self.yes.clone(), self.no.clone()]
    }
}

/// State shared between the handle and the connection task.
#[derive(Debug, Default)]
struct FeedState {
    snapshot: RwLock<MarketSnapshot>,
    status: RwLock<ConnectionStatus>,
}

impl FeedState {
    async fn publish_status(&self, event_tx: &mpsc::Sender<FeedEvent>, status: ConnectionStatus) {
        {
            let mut guard = self.status.write();
            if *guard == status {
                return;
            }
            *guard = status;
        }
        debug!(status = %status, "Feed status changed");
        let _ = event_tx.send(FeedEvent::Status(status)).await;
    }
}

struct Session {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Explicitly-owned market-data client for one YES/NO pair.
///
/// Construct with [`MarketDataFeed::new`], then [`connect`](Self::connect).
/// Dropping the feed aborts its connection task.
pub struct MarketDataFeed {
    config: FeedConfig,
    state: Arc<FeedState>,
    event_tx: mpsc::Sender<FeedEvent>,
    instruments: Option<InstrumentPair>,
    session: Option<Session>,
}

impl MarketDataFeed {
    /// Creates a disconnected feed and the receiver for its events.
    #[must_use]
    pub fn new(config: FeedConfig) -> (Self, mpsc::Receiver<FeedEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer_size.max(1));
        (
            Self {
                config,
                state: Arc::new(FeedState::default()),
                event_tx,
                instruments: None,
                session: None,
            },
            event_rx,
        )
    }

    /// Opens one socket subscribed to both instruments.
    ///
    /// `instrument_ids` must be exactly `[yes, no]`. Must be called from
    /// within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidInstruments`] for any other count (the
    /// feed stays disconnected) and [`FeedError::AlreadyConnected`] if a
    /// session is running.
    pub fn connect(&mut self, instrument_ids: &[String]) -> Result<(), FeedError> {
        if self.session.is_some() {
            return Err(FeedError::AlreadyConnected);
        }
        let instruments = InstrumentPair::from_ids(instrument_ids)?;

        info!(
            url = %self.config.url,
            yes_token = %instruments.yes,
            no_token = %instruments.no,
            "Starting market data feed"
        );

        *self.state.snapshot.write() = MarketSnapshot::default();
        *self.state.status.write() = ConnectionStatus::Connecting;
        let _ = self
            .event_tx
            .try_send(FeedEvent::Status(ConnectionStatus::Connecting));

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(run_connection_loop(
            self.config.clone(),
            instruments.clone(),
            Arc::clone(&self.state),
            self.event_tx.clone(),
            shutdown_rx,
        ));

        self.instruments = Some(instruments);
        self.session = Some(Session {
            shutdown_tx,
            handle,
        });
        Ok(())
    }

    /// Manually closes the connection.
    ///
    /// Abandons any pending reconnect timer and never schedules a reconnect.
    pub async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.shutdown_tx.try_send(());
            let mut handle = session.handle;
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                warn!("Feed task did not stop in time, aborting");
                handle.abort();
            }
            info!("Market data feed disconnected");
        }

        *self.state.status.write() = ConnectionStatus::Disconnected;
        let _ = self
            .event_tx
            .try_send(FeedEvent::Status(ConnectionStatus::Disconnected));
    }

    /// Disconnects and connects again to the same instruments with fresh
    /// attempt counters.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::NotConfigured`] if `connect` never succeeded.
    pub async fn reconnect(&mut self) -> Result<(), FeedError> {
        let instruments = self.instruments.clone().ok_or(FeedError::NotConfigured)?;
        self.disconnect().await;
        self.connect(&instruments.ids())
    }

    /// Returns the latest merged snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MarketSnapshot {
        self.state.snapshot.read().clone()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.state.status.read()
    }

    #[must_use]
    pub fn instruments(&self) -> Option<&InstrumentPair> {
        self.instruments.as_ref()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }
}

impl Drop for MarketDataFeed {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.handle.abort();
        }
    }
}

/// Connection loop with bounded exponential backoff.
async fn run_connection_loop(
    config: FeedConfig,
    instruments: InstrumentPair,
    state: Arc<FeedState>,
    event_tx: mpsc::Sender<FeedEvent>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut attempt: u32 = 0;

    loop {
        state.publish_status(&event_tx, ConnectionStatus::Connecting).await;
        info!(url = %config.url, attempt, "Connecting to market data WebSocket");

        match connect_and_run(
            &config,
            &instruments,
            &state,
            &event_tx,
            &mut shutdown_rx,
            &mut attempt,
        )
        .await
        {
            Ok(()) => {
                info!("WebSocket closed on request");
                break;
            }
            Err(e) => {
                warn!(error = %e, attempt, "WebSocket connection lost");

                let Some(delay) = config.reconnect.delay_for(attempt) else {
                    error!(
                        attempts = attempt,
                        max_attempts = config.reconnect.max_attempts,
                        "Max reconnection attempts exceeded"
                    );
                    state.publish_status(&event_tx, ConnectionStatus::Error).await;
                    break;
                };
                attempt += 1;

                state.publish_status(&event_tx, ConnectionStatus::Connecting).await;
                info!(attempt, delay = ?delay, "Waiting before reconnect");
                let _ = event_tx
                    .send(FeedEvent::ReconnectScheduled { attempt, delay })
                    .await;

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Shutdown requested during backoff");
                        break;
                    }
                    () = sleep(delay) => {}
                }
            }
        }
    }
}

/// Runs one socket until it drops (`Err`) or shutdown is requested (`Ok`).
async fn connect_and_run(
    config: &FeedConfig,
    instruments: &InstrumentPair,
    state: &FeedState,
    event_tx: &mpsc::Sender<FeedEvent>,
    shutdown_rx: &mut mpsc::Receiver<()>,
    attempt: &mut u32,
) -> Result<(), FeedError> {
    let ws_stream = tokio::select! {
        _ = shutdown_rx.recv() => return Ok(()),
        result = connect_async(config.url.as_str()) => {
            result.map_err(|e| FeedError::ConnectionFailed(e.to_string()))?.0
        }
    };

    let (mut write, mut read) = ws_stream.split();

    let sub_json = codec::subscription_message(&instruments.ids())?;
    debug!(message = %sub_json, "Sending subscription message");
    write.send(Message::Text(sub_json)).await?;

    *attempt = 0;
    *state.snapshot.write() = MarketSnapshot::default();
    state.publish_status(event_tx, ConnectionStatus::Connected).await;
    info!("WebSocket connected and subscribed");

    let mut ping_interval =
        tokio::time::interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, closing WebSocket");
                let _ = write.close().await;
                return Ok(());
            }

            _ = ping_interval.tick() => {
                debug!("Sending ping");
                write.send(Message::Text(PING_FRAME.to_string())).await?;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(&text, instruments, state, event_tx).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        match String::from_utf8(data) {
                            Ok(text) => handle_text(&text, instruments, state, event_tx).await,
                            Err(_) => warn!("Ignoring non-UTF-8 binary frame"),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        debug!("Received ping, sending pong");
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        debug!("Received pong");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(frame = ?frame, "Received close frame");
                        return Err(FeedError::ConnectionClosed(
                            frame.map_or_else(|| "close frame".to_string(), |f| f.reason.to_string()),
                        ));
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        return Err(FeedError::WebSocket(e));
                    }
                    None => {
                        return Err(FeedError::ConnectionClosed("stream ended".to_string()));
                    }
                }
            }
        }
    }
}

/// Decodes a text frame and applies every quote it carries.
///
/// Malformed frames are logged and dropped; the socket stays open.
async fn handle_text(
    text: &str,
    instruments: &InstrumentPair,
    state: &FeedState,
    event_tx: &mpsc::Sender<FeedEvent>,
) {
    let frame = match codec::parse_frame(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed frame");
            return;
        }
    };

    match frame {
        InboundFrame::Quotes(quotes) => {
            for raw in quotes {
                let Some(side) = instruments.side_of(&raw.instrument_id) else {
                    debug!(instrument_id = %raw.instrument_id, "Quote for unsubscribed instrument");
                    continue;
                };
                let quote = PriceQuote::new(side, raw.kind, raw.price);
                let snapshot = {
                    let mut guard = state.snapshot.write();
                    guard.apply(quote, Utc::now());
                    guard.clone()
                };
                debug!(
                    side = %quote.side,
                    kind = %quote.kind,
                    price = %quote.price,
                    "Applied quote"
                );
                let _ = event_tx.send(FeedEvent::Snapshot(snapshot)).await;
            }
        }
        InboundFrame::Ack => debug!("Received keep-alive ack"),
        InboundFrame::Ignored => debug!("Ignoring non-quote frame"),
    }
}
