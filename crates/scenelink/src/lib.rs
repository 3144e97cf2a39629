//! # Scenelink
//!
//! Remote method calls between connected sessions and a host's node graph.
//!
//! ## Layout
//!
//! - [`session`]: session ids and the registry of live messengers.
//! - [`messenger`]: the outbound handle for one session.
//! - [`graph`]: the node-graph capability calls are dispatched against.
//! - [`dispatch`]: the dispatcher for signals, synchronous calls and remote calls with callbacks.
//! - [`scheduler`]: deferred invocation on the host's own loop.
//! - [`tree`]: an in-memory node graph.
//! - [`transport`] and [`peer`]: a byte transport and the messenger that runs over it.

pub mod config;
pub mod dispatch;
pub mod graph;
pub mod messenger;
pub mod peer;
pub mod scheduler;
pub mod session;
pub mod transport;
pub mod tree;

pub use config::LinkConfig;
pub use dispatch::Callback;
pub use dispatch::RpcDispatcher;
pub use graph::DispatchError;
pub use graph::InvokeMode;
pub use graph::NodeGraph;
pub use messenger::Messenger;
pub use peer::Peer;
pub use scheduler::Deferred;
pub use session::SessionId;
pub use session::SessionRegistry;
pub use tree::NodeTree;

#[cfg(test)]
mod mock_transport;
