//! # RPC Dispatcher
//!
//! Turns inbound messages into node-graph invocations and outbound requests
//! into messenger calls.
//!
//! ## Argument Assembly
//!
//! A method invoked on behalf of a session always receives the session id as
//! its first argument. A decoded `List` payload is spread into positional
//! arguments after it; any other payload becomes a single argument. Callback
//! invocations additionally carry the caller-supplied prefix between the
//! session id and the spread reply.
//!
//! Spreading is one level deep: a list inside the list stays one argument.

use std::fmt;
use std::sync::Arc;

use flexrpc::EncodedBuffer;
use flexrpc::Value;

use crate::config::LinkConfig;
use crate::graph::DispatchError;
use crate::graph::InvokeMode;
use crate::graph::NodeGraph;
use crate::messenger;
use crate::messenger::OnReply;
use crate::session;
use crate::session::SessionId;
use crate::session::SessionRegistry;

#[derive(Debug, Clone)]
pub enum Error {
    Session(session::Error),
    Rpc(flexrpc::Error),
    Dispatch(DispatchError),
    Messenger(messenger::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(e) => write!(f, "Session error: {}", e),
            Self::Rpc(e) => write!(f, "RPC error: {}", e),
            Self::Dispatch(e) => write!(f, "Dispatch error: {}", e),
            Self::Messenger(e) => write!(f, "Messenger error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<session::Error> for Error {
    fn from(e: session::Error) -> Self {
        Self::Session(e)
    }
}

impl From<flexrpc::Error> for Error {
    fn from(e: flexrpc::Error) -> Self {
        Self::Rpc(e)
    }
}

impl From<DispatchError> for Error {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

impl From<messenger::Error> for Error {
    fn from(e: messenger::Error) -> Self {
        Self::Messenger(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Where the reply to a remote call is delivered on the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Callback {
    pub path: String,
    pub method: String,
    /// Extra leading arguments, placed after the session id.
    pub prefix: Vec<Value>,
}

impl Callback {
    pub fn new(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            prefix: Vec::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: Vec<Value>) -> Self {
        self.prefix = prefix;
        self
    }
}

/// Appends `decoded` to `prefix`, spreading it if it is a list.
pub fn assemble_args(prefix: Vec<Value>, decoded: Value) -> Vec<Value> {
    let mut args = prefix;
    match decoded {
        Value::List(items) => args.extend(items),
        other => args.push(other),
    }
    args
}

/// Routes calls between sessions and a node graph.
pub struct RpcDispatcher<G: NodeGraph> {
    graph: Arc<G>,
    sessions: Arc<SessionRegistry>,
    config: LinkConfig,
}

impl<G: NodeGraph> RpcDispatcher<G> {
    pub fn new(graph: Arc<G>, sessions: Arc<SessionRegistry>) -> Self {
        Self::with_config(graph, sessions, LinkConfig::default())
    }

    pub fn with_config(graph: Arc<G>, sessions: Arc<SessionRegistry>, config: LinkConfig) -> Self {
        Self { graph, sessions, config }
    }

    pub fn graph(&self) -> &Arc<G> {
        &self.graph
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Handles an inbound signal: a deferred call whose result is discarded.
    ///
    /// Resolution and scheduling failures are logged and dropped; the sender
    /// never hears about them.
    pub fn handle_signal(&self, session: SessionId, path: &str, method: &str, args: &[u8]) {
        let decoded = self.config.decoding().decode(args);
        let payload = decoded.kind();
        let args = assemble_args(vec![session.into()], decoded);

        tracing::debug!(%session, path, method, payload, argc = args.len(), "signal");
        if let Err(e) = invoke_path(&*self.graph, &self.config, path, method, args, InvokeMode::Deferred) {
            tracing::warn!(%session, path, method, error = %e, "signal dropped");
        }
    }

    /// Handles an inbound synchronous call and returns the encoded result.
    ///
    /// Runs on the calling thread and blocks it until the method returns, so it
    /// must not be called from the host loop that drains deferred calls.
    pub fn handle_execute(&self, session: SessionId, path: &str, method: &str, args: &[u8]) -> Result<EncodedBuffer> {
        let decoded = self.config.decoding().decode(args);
        let payload = decoded.kind();
        let args = assemble_args(vec![session.into()], decoded);

        tracing::debug!(%session, path, method, payload, argc = args.len(), "execute");
        let ret = invoke_path(&*self.graph, &self.config, path, method, args, InvokeMode::Immediate)?;
        Ok(flexrpc::encode(&ret)?)
    }

    /// Sends a fire-and-forget call to `session`.
    pub async fn send_signal(&self, session: SessionId, path: &str, method: &str, value: &Value) -> Result<()> {
        let messenger = self.sessions.lookup(session)?;
        let buffer = flexrpc::encode(value)?;
        messenger.send_signal(path, method, buffer).await?;
        Ok(())
    }

    /// Calls `method` on `session` and routes the reply to `callback`.
    ///
    /// The callback runs deferred with `[session] ++ prefix ++ reply` where a
    /// list reply is spread. Returns once the request is sent.
    pub async fn execute_remote_method(
        &self,
        session: SessionId,
        path: &str,
        method: &str,
        value: &Value,
        callback: Callback,
    ) -> Result<()> {
        let messenger = self.sessions.lookup(session)?;
        let buffer = flexrpc::encode(value)?;

        let graph = self.graph.clone();
        let config = self.config.clone();
        let on_reply: OnReply = Box::new(move |reply: EncodedBuffer| {
            let Callback { path, method, prefix } = callback;
            let mut leading = Vec::with_capacity(prefix.len() + 1);
            leading.push(session.into());
            leading.extend(prefix);

            let args = assemble_args(leading, config.decoding().decode(reply.as_bytes()));
            if let Err(e) = invoke_path(&*graph, &config, &path, &method, args, InvokeMode::Deferred) {
                tracing::warn!(%session, path = %path, method = %method, error = %e, "reply callback dropped");
            }
        });

        messenger.execute_remote_method(path, method, buffer, on_reply).await?;
        Ok(())
    }
}

fn invoke_path<G: NodeGraph>(
    graph: &G,
    config: &LinkConfig,
    path: &str,
    method: &str,
    args: Vec<Value>,
    mode: InvokeMode,
) -> std::result::Result<Value, DispatchError> {
    let node = graph.resolve(config.node_path(path))?;
    graph.invoke(&node, method, args, mode)
}
