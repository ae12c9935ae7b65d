//! A mock RPC backend speaking the real wire protocol, for pipeline and pool
//! integration tests. Binds `127.0.0.1:0` and answers every request via a
//! pluggable [`MockResponder`], mirroring `rt-test-utils::mock_ws_server`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use rpc_protocol::message::{Body, MessageType, RemoteException, Response};
use rpc_protocol::{FramedMessage, Request, RpcCodec};
use tokio::net::TcpListener;
use tokio_util::codec::Framed;
use tracing::debug;

/// What a [`MockResponder`] decides to do with one request.
pub enum MockOutcome {
    Ok(serde_json::Value),
    Err(RemoteException),
    /// Never respond; used to exercise the adaptive-timeout path.
    Hang,
}

#[async_trait]
pub trait MockResponder: Send + Sync {
    async fn respond(&self, request: &Request) -> MockOutcome;
}

/// Always succeeds, echoing the first parameter (or `null`) as the result.
pub struct EchoResponder;

#[async_trait]
impl MockResponder for EchoResponder {
    async fn respond(&self, request: &Request) -> MockOutcome {
        MockOutcome::Ok(request.params.first().cloned().unwrap_or(serde_json::Value::Null))
    }
}

/// Responds after a fixed delay, useful for driving the adaptive timeout and
/// circuit breaker's slow-call accounting deterministically.
pub struct DelayedResponder {
    pub delay: Duration,
    pub outcome_factory: Box<dyn Fn() -> MockOutcome + Send + Sync>,
}

#[async_trait]
impl MockResponder for DelayedResponder {
    async fn respond(&self, _request: &Request) -> MockOutcome {
        tokio::time::sleep(self.delay).await;
        (self.outcome_factory)()
    }
}

/// A running mock server. Dropping it stops the accept loop.
pub struct MockRpcServer {
    addr: SocketAddr,
    _task: tokio::task::JoinHandle<()>,
}

impl MockRpcServer {
    pub async fn start(responder: Arc<dyn MockResponder>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _peer)) = listener.accept().await else { break };
                let responder = responder.clone();
                tokio::spawn(async move {
                    if let Err(err) = Self::handle_connection(stream, responder).await {
                        debug!(%err, "mock connection ended");
                    }
                });
            }
        });

        Ok(Self { addr, _task: task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        responder: Arc<dyn MockResponder>,
    ) -> Result<(), rpc_protocol::ProtocolError> {
        let mut framed = Framed::new(stream, RpcCodec);

        while let Some(incoming) = framed.next().await {
            let msg = incoming?;
            match msg.message_type {
                MessageType::HeartbeatRequest => {
                    let reply = FramedMessage::response(
                        msg.message_id,
                        msg.serializer,
                        Response::pong(request_id_of(&msg)),
                        true,
                    );
                    framed.send(reply).await?;
                }
                MessageType::Request => {
                    let Body::Request(req) = &msg.body else { continue };
                    match responder.respond(req).await {
                        MockOutcome::Ok(value) => {
                            let reply = FramedMessage::response(
                                msg.message_id,
                                msg.serializer,
                                Response::ok(req.request_id.clone(), value),
                                false,
                            );
                            framed.send(reply).await?;
                        }
                        MockOutcome::Err(remote_err) => {
                            let reply = FramedMessage::response(
                                msg.message_id,
                                msg.serializer,
                                Response::err(req.request_id.clone(), remote_err),
                                false,
                            );
                            framed.send(reply).await?;
                        }
                        MockOutcome::Hang => {}
                    }
                }
                MessageType::Response | MessageType::HeartbeatResponse => {}
            }
        }
        Ok(())
    }
}

fn request_id_of(msg: &FramedMessage) -> String {
    match &msg.body {
        Body::Request(r) => r.request_id.clone(),
        Body::Response(r) => r.request_id.clone(),
    }
}
