//! # Session Peer
//!
//! The host end of one session's transport. A `Peer` is the session's
//! `Messenger`, and it runs a background pump that:
//! - routes `Reply` frames to the continuation waiting on their `seq`,
//! - hands `Signal` frames to the dispatcher,
//! - executes `Call` frames on a blocking thread and answers with a `Reply`.
//!
//! When the stream closes the session is unregistered and every continuation
//! still waiting is dropped without running.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use flexrpc::CallFrame;
use flexrpc::EncodedBuffer;
use flexrpc::Frame;
use flexrpc::ReplyFrame;
use flexrpc::SignalFrame;

use crate::dispatch::RpcDispatcher;
use crate::graph::NodeGraph;
use crate::messenger;
use crate::messenger::Messenger;
use crate::messenger::OnReply;
use crate::session::SessionId;
use crate::transport::Transport;

/// A remote call waiting for its reply.
struct PendingReply {
    on_reply: Mutex<OnReply>,
}

impl PendingReply {
    fn new(on_reply: OnReply) -> Self {
        Self { on_reply: Mutex::new(on_reply) }
    }

    fn into_inner(self) -> OnReply {
        self.on_reply.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Peer {
    session: SessionId,
    transport: Arc<dyn Transport>,
    pending: Arc<DashMap<u64, PendingReply>>,
    seq_gen: AtomicU64,
    closed: Arc<AtomicBool>,
}

impl Peer {
    /// Registers a new session on `dispatcher` and starts its pump.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<G: NodeGraph>(
        session: SessionId,
        transport: Box<dyn Transport>,
        dispatcher: Arc<RpcDispatcher<G>>,
    ) -> Arc<Self> {
        let peer = Arc::new(Self {
            session,
            transport: Arc::from(transport),
            pending: Arc::new(DashMap::new()),
            seq_gen: AtomicU64::new(1),
            closed: Arc::new(AtomicBool::new(false)),
        });

        let messenger: Arc<dyn Messenger> = peer.clone();
        dispatcher.sessions().register(session, messenger.clone());

        let transport = peer.transport.clone();
        let pending = peer.pending.clone();
        let closed = peer.closed.clone();

        tokio::spawn(async move {
            loop {
                match transport.recv().await {
                    Ok(Some(msg)) => Self::handle_message(session, &msg, &transport, &pending, &dispatcher),
                    Ok(None) => {
                        tracing::debug!(%session, "stream closed");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(%session, error = %e, "transport error in pump");
                        break;
                    }
                }
            }

            // Close before clearing so a concurrent call either sees the flag or
            // lands in the table before it is cleared.
            closed.store(true, Ordering::Release);
            dispatcher.sessions().unregister_if(session, &messenger);

            let abandoned = pending.len();
            pending.clear();
            if abandoned > 0 {
                tracing::warn!(%session, abandoned, "session closed with calls awaiting reply");
            }
        });

        peer
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Number of remote calls still waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn handle_message<G: NodeGraph>(
        session: SessionId,
        msg: &[u8],
        transport: &Arc<dyn Transport>,
        pending: &DashMap<u64, PendingReply>,
        dispatcher: &Arc<RpcDispatcher<G>>,
    ) {
        let frame = match Frame::decode(msg) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(%session, error = %e, "dropping malformed frame");
                return;
            }
        };

        match frame {
            Frame::Signal(f) => dispatcher.handle_signal(session, f.path, f.method, f.args),
            Frame::Call(f) => Self::spawn_execute(session, f, transport.clone(), dispatcher.clone()),
            Frame::Reply(f) => {
                let Some((_, waiting)) = pending.remove(&f.seq) else {
                    tracing::debug!(%session, seq = f.seq, "reply for unknown call");
                    return;
                };
                match f.status {
                    Ok(bytes) => (waiting.into_inner())(EncodedBuffer::from(bytes)),
                    Err(message) => {
                        tracing::warn!(%session, seq = f.seq, error = message, "remote call failed");
                    }
                }
            }
        }
    }

    /// Runs a synchronous call off the pump and sends back its reply.
    fn spawn_execute<G: NodeGraph>(
        session: SessionId,
        call: CallFrame<'_>,
        transport: Arc<dyn Transport>,
        dispatcher: Arc<RpcDispatcher<G>>,
    ) {
        let seq = call.seq;
        let path = call.path.to_string();
        let method = call.method.to_string();
        let args = call.args.to_vec();

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                dispatcher.handle_execute(session, &path, &method, &args)
            })
            .await;

            let payload = match &result {
                Ok(Ok(buffer)) => Frame::Reply(ReplyFrame { seq, status: Ok(buffer.as_bytes()) }).to_bytes(),
                Ok(Err(e)) => {
                    let message = e.to_string();
                    Frame::Reply(ReplyFrame { seq, status: Err(&message) }).to_bytes()
                }
                Err(e) => {
                    let message = format!("call panicked: {}", e);
                    Frame::Reply(ReplyFrame { seq, status: Err(&message) }).to_bytes()
                }
            };

            let payload = match payload {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(%session, seq, error = %e, "failed to encode reply");
                    return;
                }
            };
            if let Err(e) = transport.send(&payload).await {
                tracing::warn!(%session, seq, error = %e, "failed to send reply");
            }
        });
    }

    fn ensure_open(&self) -> messenger::Result<()> {
        if self.is_closed() {
            return Err(messenger::Error::Closed);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Messenger for Peer {
    async fn send_signal(&self, path: &str, method: &str, args: EncodedBuffer) -> messenger::Result<()> {
        self.ensure_open()?;
        let payload = Frame::Signal(SignalFrame { path, method, args: args.as_bytes() }).to_bytes()?;
        self.transport.send(&payload).await?;
        Ok(())
    }

    async fn execute_remote_method(
        &self,
        path: &str,
        method: &str,
        args: EncodedBuffer,
        on_reply: OnReply,
    ) -> messenger::Result<()> {
        self.ensure_open()?;
        let seq = self.seq_gen.fetch_add(1, Ordering::Relaxed);
        let payload = Frame::Call(CallFrame { seq, path, method, args: args.as_bytes() }).to_bytes()?;

        self.pending.insert(seq, PendingReply::new(on_reply));
        if self.is_closed() {
            self.pending.remove(&seq);
            return Err(messenger::Error::Closed);
        }
        if let Err(e) = self.transport.send(&payload).await {
            self.pending.remove(&seq);
            return Err(e.into());
        }
        Ok(())
    }
}
