//! Host-side scenarios through the public API: a node tree behind the deferred
//! scheduler, a dispatcher, and a scripted remote session.

use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Result;
use anyhow::anyhow;
use flexrpc::EncodedBuffer;
use flexrpc::Value;
use scenelink::Callback;
use scenelink::Deferred;
use scenelink::Messenger;
use scenelink::NodeTree;
use scenelink::RpcDispatcher;
use scenelink::SessionId;
use scenelink::SessionRegistry;
use scenelink::dispatch;
use scenelink::messenger;
use scenelink::messenger::OnReply;
use scenelink::session;

/// A session that answers every remote call with a fixed value.
struct ScriptedSession {
    answer: Value,
}

#[async_trait::async_trait]
impl Messenger for ScriptedSession {
    async fn send_signal(&self, _path: &str, _method: &str, _args: EncodedBuffer) -> messenger::Result<()> {
        Ok(())
    }

    async fn execute_remote_method(
        &self,
        _path: &str,
        _method: &str,
        _args: EncodedBuffer,
        on_reply: OnReply,
    ) -> messenger::Result<()> {
        on_reply(flexrpc::encode(&self.answer)?);
        Ok(())
    }
}

struct Host {
    scheduler: Arc<Deferred<NodeTree>>,
    dispatcher: RpcDispatcher<Deferred<NodeTree>>,
    received: Arc<Mutex<Vec<Vec<Value>>>>,
}

fn host() -> Host {
    let received = Arc::new(Mutex::new(Vec::new()));
    let tree = NodeTree::new();

    let sink = received.clone();
    tree.add_node("root/player")
        .method("on_move", move |args| {
            sink.lock().unwrap().push(args);
            Ok(Value::Nil)
        });

    let sink = received.clone();
    tree.add_node("root/score")
        .method("add", move |args| {
            sink.lock().unwrap().push(args);
            Ok(Value::Int(42))
        });

    let scheduler = Arc::new(Deferred::new(tree));
    let dispatcher = RpcDispatcher::new(scheduler.clone(), Arc::new(SessionRegistry::new()));
    Host { scheduler, dispatcher, received }
}

#[test]
fn signal_runs_on_next_host_tick() -> Result<()> {
    let host = host();
    let args = flexrpc::encode(&Value::List(vec![Value::Int(10), Value::Text("x".into())]))?;

    host.dispatcher.handle_signal(SessionId(7), "/root/player", "on_move", args.as_bytes());
    assert!(host.received.lock().unwrap().is_empty());

    assert_eq!(host.scheduler.run_pending(), 1);
    assert_eq!(host.received.lock().unwrap().clone(), vec![vec![
        Value::Int(7),
        Value::Int(10),
        Value::Text("x".into()),
    ]]);
    Ok(())
}

#[test]
fn sync_call_returns_result() -> Result<()> {
    let host = host();
    let args = flexrpc::encode(&Value::Int(5))?;

    let ret = host.dispatcher.handle_execute(SessionId(3), "/root/score", "add", args.as_bytes())?;

    assert_eq!(flexrpc::decode(ret.as_bytes()), Value::Int(42));
    assert_eq!(host.received.lock().unwrap().clone(), vec![vec![Value::Int(3), Value::Int(5)]]);
    assert_eq!(host.scheduler.run_pending(), 0);
    Ok(())
}

#[tokio::test]
async fn remote_reply_reaches_callback() -> Result<()> {
    let host = host();
    let session = SessionId(12);
    host.dispatcher
        .sessions()
        .register(session, Arc::new(ScriptedSession { answer: Value::Text("done".into()) }));

    let callback = Callback::new("/root/player", "on_move").with_prefix(vec![Value::Text("ctx".into())]);
    host.dispatcher
        .execute_remote_method(session, "client", "ask", &Value::Nil, callback)
        .await?;

    assert_eq!(host.scheduler.run_pending(), 1);
    assert_eq!(host.received.lock().unwrap().clone(), vec![vec![
        Value::Int(12),
        Value::Text("ctx".into()),
        Value::Text("done".into()),
    ]]);
    Ok(())
}

#[tokio::test]
async fn unknown_session_is_rejected_before_sending() -> Result<()> {
    let host = host();

    let err = host
        .dispatcher
        .execute_remote_method(SessionId(404), "client", "ask", &Value::Nil, Callback::new("root/player", "on_move"))
        .await;

    match err {
        Err(dispatch::Error::Session(session::Error::SessionNotFound(id))) => assert_eq!(id, SessionId(404)),
        other => return Err(anyhow!("expected SessionNotFound, got {:?}", other)),
    }
    assert_eq!(host.scheduler.run_pending(), 0);
    Ok(())
}

#[test]
fn vector_arguments_keep_their_shape() -> Result<()> {
    let host = host();
    let args = flexrpc::encode(&Value::List(vec![
        Value::Vec3(1.0, 2.0, 3.0),
        Value::Quat(0.0, 0.0, 0.0, 1.0),
    ]))?;

    host.dispatcher.handle_signal(SessionId(1), "root/player", "on_move", args.as_bytes());
    host.scheduler.run_pending();

    assert_eq!(host.received.lock().unwrap().clone(), vec![vec![
        Value::Int(1),
        Value::Vec3(1.0, 2.0, 3.0),
        Value::Quat(0.0, 0.0, 0.0, 1.0),
    ]]);
    Ok(())
}
