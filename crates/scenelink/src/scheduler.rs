//! # Deferred Scheduler
//!
//! Wraps a `NodeGraph` so deferred invocations are queued and run later, in
//! submission order, on whichever task drains the queue. That task plays the
//! part of the host's own loop.

use flexrpc::Value;
use tokio::sync::Mutex;
use tokio::sync::mpsc;

use crate::graph::DispatchError;
use crate::graph::InvokeMode;
use crate::graph::NodeGraph;
use crate::graph::Result;

struct PendingCall<N> {
    node: N,
    method: String,
    args: Vec<Value>,
}

pub struct Deferred<G: NodeGraph> {
    inner: G,
    tx: mpsc::UnboundedSender<PendingCall<G::Node>>,
    rx: Mutex<mpsc::UnboundedReceiver<PendingCall<G::Node>>>,
}

impl<G: NodeGraph> Deferred<G> {
    pub fn new(inner: G) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { inner, tx, rx: Mutex::new(rx) }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// Runs every call queued so far and returns how many ran.
    ///
    /// Meant to be called once per tick of the host loop. Failures are logged
    /// and dropped. Returns 0 if another task is already draining.
    pub fn run_pending(&self) -> usize {
        let Ok(mut rx) = self.rx.try_lock() else {
            return 0;
        };

        let mut ran = 0;
        while let Ok(call) = rx.try_recv() {
            self.execute(call);
            ran += 1;
        }
        ran
    }

    /// Drains the queue forever, running each call as it arrives.
    ///
    /// For hosts whose loop is a dedicated tokio task.
    pub async fn run(&self) {
        let mut rx = self.rx.lock().await;
        while let Some(call) = rx.recv().await {
            self.execute(call);
        }
    }

    fn execute(&self, call: PendingCall<G::Node>) {
        if let Err(e) = self.inner.invoke(&call.node, &call.method, call.args, InvokeMode::Immediate) {
            tracing::warn!(method = %call.method, error = %e, "deferred call failed");
        }
    }
}

impl<G: NodeGraph> NodeGraph for Deferred<G> {
    type Node = G::Node;

    fn resolve(&self, path: &str) -> Result<Self::Node> {
        self.inner.resolve(path)
    }

    fn invoke(&self, node: &Self::Node, method: &str, args: Vec<Value>, mode: InvokeMode) -> Result<Value> {
        match mode {
            InvokeMode::Immediate => self.inner.invoke(node, method, args, InvokeMode::Immediate),
            InvokeMode::Deferred => {
                let call = PendingCall {
                    node: node.clone(),
                    method: method.to_string(),
                    args,
                };
                self.tx
                    .send(call)
                    .map_err(|_| DispatchError::Failed("scheduler closed".into()))?;
                Ok(Value::Nil)
            }
        }
    }
}
