use thiserror::Error;

/// Errors produced by the market-data feed.
#[derive(Error, Debug)]
pub enum FeedError {
    /// The feed needs exactly one YES and one NO instrument id.
    #[error("Invalid instruments: {0}")]
    InvalidInstruments(String),

    /// `connect` was called while a session is already running.
    #[error("Feed is already connected")]
    AlreadyConnected,

    /// `reconnect` was called before any successful `connect`.
    #[error("No instruments configured; call connect first")]
    NotConfigured,

    /// Failed to establish the WebSocket connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The server closed the connection or the stream ended.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// WebSocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Well-formed JSON that does not describe a usable quote.
    #[error("Malformed frame: {0}")]
    Malformed(String),
}
