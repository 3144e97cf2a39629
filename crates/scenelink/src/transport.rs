//! # Transport Abstraction
//!
//! A minimal, async interface for moving frames between a host and one session.
//!
//! The transport knows nothing about frames or values. It moves opaque buffers
//! in both directions; `Peer` gives them meaning.

use std::fmt;

/// Errors that occur at the network/transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The session is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A bidirectional byte channel to one session.
///
/// Object-safe, so it can be shared as `Arc<dyn Transport>`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends one whole frame.
    async fn send(&self, payload: &[u8]) -> Result<()>;

    /// Waits for the next whole frame.
    ///
    /// Returns `Ok(None)` once the other side has closed the stream.
    async fn recv(&self) -> Result<Option<Vec<u8>>>;
}
