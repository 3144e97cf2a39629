//! # Node Graph
//!
//! The capability the dispatcher calls into: resolve a node by path, then
//! invoke a named method on it either immediately or deferred to the host's
//! own loop.

use std::fmt;
use std::sync::Arc;

use flexrpc::Value;

/// Why a call against the node graph did not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No node lives at the path.
    NodeNotFound(String),
    /// The node exists but has no such method.
    MethodNotFound { path: String, method: String },
    /// The method rejected its arguments.
    BadArguments { method: String, details: String },
    /// The method ran and failed, or could not be scheduled.
    Failed(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound(path) => write!(f, "Node not found: {}", path),
            Self::MethodNotFound { path, method } => write!(f, "Method not found: {}.{}", path, method),
            Self::BadArguments { method, details } => write!(f, "Bad arguments for {}: {}", method, details),
            Self::Failed(msg) => write!(f, "Invocation failed: {}", msg),
        }
    }
}

impl std::error::Error for DispatchError {}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// How a method invocation is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeMode {
    /// Run now on the calling thread and return the result.
    Immediate,
    /// Enqueue for the host's own loop. The result is discarded.
    Deferred,
}

/// A host-side object graph addressed by path.
pub trait NodeGraph: Send + Sync + 'static {
    /// A resolved node handle.
    type Node: Clone + Send + 'static;

    fn resolve(&self, path: &str) -> Result<Self::Node>;

    /// Invokes `method` on `node`.
    ///
    /// In `InvokeMode::Deferred` the call only has to be accepted; the returned
    /// value is `Value::Nil`.
    fn invoke(&self, node: &Self::Node, method: &str, args: Vec<Value>, mode: InvokeMode) -> Result<Value>;
}

impl<G: NodeGraph> NodeGraph for Arc<G> {
    type Node = G::Node;

    fn resolve(&self, path: &str) -> Result<Self::Node> {
        (**self).resolve(path)
    }

    fn invoke(&self, node: &Self::Node, method: &str, args: Vec<Value>, mode: InvokeMode) -> Result<Value> {
        (**self).invoke(node, method, args, mode)
    }
}
