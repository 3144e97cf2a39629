//! # Messenger
//!
//! The outbound half of a session: how the host sends signals and remote calls
//! to one connected caller.

use std::fmt;

use flexrpc::EncodedBuffer;

use crate::transport;

/// Continuation run with the encoded return value of a remote call.
///
/// Runs at most once. It never runs if the call fails or the session goes away.
pub type OnReply = Box<dyn FnOnce(EncodedBuffer) + Send + 'static>;

#[derive(Debug, Clone)]
pub enum Error {
    Transport(transport::Error),
    Rpc(flexrpc::Error),
    /// The session no longer accepts messages.
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Rpc(e) => write!(f, "RPC error: {}", e),
            Self::Closed => write!(f, "Session closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<flexrpc::Error> for Error {
    fn from(e: flexrpc::Error) -> Self {
        Self::Rpc(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Sends messages to one remote session.
#[async_trait::async_trait]
pub trait Messenger: Send + Sync + 'static {
    /// Fire-and-forget call of `method` on the remote `path`.
    async fn send_signal(&self, path: &str, method: &str, args: EncodedBuffer) -> Result<()>;

    /// Calls `method` on the remote `path`; `on_reply` receives the return value.
    ///
    /// Returns once the call is sent, not when it is answered.
    async fn execute_remote_method(
        &self,
        path: &str,
        method: &str,
        args: EncodedBuffer,
        on_reply: OnReply,
    ) -> Result<()>;
}
