//! Component C: one bounded connection pool per endpoint (spec §4.3).
//!
//! Each connection owns a TLS layer (see [`crate::tls`]), a writer-idle
//! watchdog that sends heartbeats, the wire codec, and a
//! [`CorrelationTable`] (§4.2). Acquired connections are always returned to
//! the pool once the caller's future completes, successfully or not.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use rpc_protocol::message::{MessageType, Request as WireRequest, SerializerKind};
use rpc_protocol::{Endpoint, EndpointKey, FramedMessage, RpcCodec};
use rustls::client::danger::ServerCertVerifier;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_rustls::TlsConnector;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::correlation::CorrelationTable;
use crate::error::{RpcError, RpcResult};

#[derive(Clone)]
pub struct PoolConfig {
    pub max_connections: usize,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub heartbeat_grace: Duration,
    /// `None` disables TLS (plaintext), used by in-process test backends.
    pub tls_verifier: Option<Arc<dyn ServerCertVerifier>>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(5),
            heartbeat_grace: Duration::from_secs(3),
            tls_verifier: Some(crate::tls::insecure()),
        }
    }
}

trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// One open, pooled connection to a single endpoint.
pub struct Connection {
    endpoint: Endpoint,
    serializer: SerializerKind,
    correlation: Arc<CorrelationTable>,
    outbound: mpsc::UnboundedSender<FramedMessage>,
    closed: Arc<AtomicBool>,
    _permit: OwnedSemaphorePermit,
}

impl Connection {
    async fn connect(
        endpoint: &Endpoint,
        config: &PoolConfig,
        serializer: SerializerKind,
        permit: OwnedSemaphorePermit,
    ) -> RpcResult<Self> {
        let addr = endpoint.host_port();
        let tcp = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| RpcError::ConnectionRefused(format!("connect timed out: {addr}")))?
            .map_err(|e| RpcError::ConnectionRefused(format!("{addr}: {e}")))?;
        tcp.set_nodelay(true).ok();

        let stream: Box<dyn AsyncStream> = match &config.tls_verifier {
            Some(verifier) => {
                let tls_config = crate::tls::client_config(verifier.clone());
                let connector = TlsConnector::from(Arc::new(tls_config));
                let server_name = ServerName::try_from(endpoint.host.clone())
                    .map_err(|_| RpcError::ConnectionRefused(format!("invalid server name: {}", endpoint.host)))?;
                let tls = connector
                    .connect(server_name, tcp)
                    .await
                    .map_err(|e| RpcError::ConnectionRefused(format!("tls handshake failed: {e}")))?;
                Box::new(tls)
            }
            None => Box::new(tcp),
        };

        let framed = Framed::new(stream, RpcCodec);
        let correlation = Arc::new(CorrelationTable::new());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        spawn_io_loop(
            framed,
            correlation.clone(),
            outbound_tx.clone(),
            outbound_rx,
            closed.clone(),
            serializer,
            config.idle_timeout,
            config.heartbeat_grace,
        );

        debug!(endpoint = %endpoint, "connection established");
        Ok(Self { endpoint: endpoint.clone(), serializer, correlation, outbound: outbound_tx, closed, _permit: permit })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn serializer(&self) -> SerializerKind {
        self.serializer
    }

    pub fn correlation(&self) -> &CorrelationTable {
        &self.correlation
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Queue a message for the write half. Registration with the
    /// correlation table is the caller's responsibility (see `pipeline`).
    pub fn send(&self, msg: FramedMessage) -> RpcResult<()> {
        if self.is_closed() {
            return Err(RpcError::ConnectionRefused(format!("{} is closed", self.endpoint)));
        }
        self.outbound
            .send(msg)
            .map_err(|_| RpcError::ConnectionRefused(format!("{} is closed", self.endpoint)))
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_io_loop<S>(
    mut framed: Framed<S, RpcCodec>,
    correlation: Arc<CorrelationTable>,
    outbound_tx: mpsc::UnboundedSender<FramedMessage>,
    mut outbound_rx: mpsc::UnboundedReceiver<FramedMessage>,
    closed: Arc<AtomicBool>,
    serializer: SerializerKind,
    idle_timeout: Duration,
    heartbeat_grace: Duration,
) where
    S: AsyncStream + 'static,
{
    tokio::spawn(async move {
        let last_activity = AtomicI64::new(now_millis());
        let mut awaiting_heartbeat: Option<u32> = None;
        let mut idle_tick = tokio::time::interval(idle_timeout);
        idle_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                incoming = framed.next() => {
                    match incoming {
                        Some(Ok(msg)) => {
                            last_activity.store(now_millis(), Ordering::SeqCst);
                            match msg.message_type {
                                MessageType::HeartbeatResponse => {
                                    if awaiting_heartbeat == Some(msg.message_id) {
                                        awaiting_heartbeat = None;
                                    }
                                }
                                MessageType::Response => {
                                    correlation.complete(msg.message_id, msg);
                                }
                                MessageType::Request | MessageType::HeartbeatRequest => {
                                    warn!("unexpected inbound request on client connection, dropping");
                                }
                            }
                        }
                        Some(Err(err)) => {
                            warn!(%err, "connection closed on protocol error");
                            break;
                        }
                        None => {
                            debug!("connection closed by peer");
                            break;
                        }
                    }
                }
                outgoing = outbound_rx.recv() => {
                    match outgoing {
                        Some(msg) => {
                            last_activity.store(now_millis(), Ordering::SeqCst);
                            if let Err(err) = framed.send(msg).await {
                                warn!(%err, "write failed, closing connection");
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = idle_tick.tick() => {
                    let idle_for = now_millis() - last_activity.load(Ordering::SeqCst);
                    if let Some(pending_id) = awaiting_heartbeat {
                        if idle_for >= (idle_timeout + heartbeat_grace).as_millis() as i64 {
                            warn!(pending_id, "heartbeat grace period elapsed, closing connection");
                            break;
                        }
                    } else if idle_for >= idle_timeout.as_millis() as i64 {
                        let msg_id = correlation.next_bare_id();
                        let hb = FramedMessage::request(msg_id, serializer, WireRequest::heartbeat(msg_id.to_string()));
                        if outbound_tx.send(hb).is_ok() {
                            awaiting_heartbeat = Some(msg_id);
                        }
                    }
                }
            }
        }

        closed.store(true, Ordering::SeqCst);
        correlation.fail_all();
    });
}

fn now_millis() -> i64 {
    // Connections run for a single process lifetime; a monotonic source tied
    // to process start avoids depending on wall-clock `SystemTime`.
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    let start = START.get_or_init(std::time::Instant::now);
    start.elapsed().as_millis() as i64
}

/// An acquired connection. Returned to its pool's idle queue on drop.
pub struct PooledConnection {
    conn: Option<Arc<Connection>>,
    pool: Arc<Pool>,
}

impl std::ops::Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection taken only on drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

/// One bounded pool of connections to a single endpoint.
pub struct Pool {
    endpoint: Endpoint,
    config: PoolConfig,
    serializer: SerializerKind,
    idle: Mutex<VecDeque<Arc<Connection>>>,
    capacity: Arc<Semaphore>,
}

impl Pool {
    fn new(endpoint: Endpoint, config: PoolConfig, serializer: SerializerKind) -> Arc<Self> {
        let capacity = Arc::new(Semaphore::new(config.max_connections));
        Arc::new(Self { endpoint, config, serializer, idle: Mutex::new(VecDeque::new()), capacity })
    }

    /// Acquire a connection, reusing an idle one or opening a new one if
    /// under capacity. Queues (via the semaphore) once capacity is exhausted.
    pub async fn acquire(self: &Arc<Self>) -> RpcResult<PooledConnection> {
        loop {
            let popped = { self.idle.lock().unwrap().pop_front() };
            match popped {
                Some(conn) if !conn.is_closed() => {
                    return Ok(PooledConnection { conn: Some(conn), pool: self.clone() })
                }
                Some(_closed) => continue,
                None => break,
            }
        }

        let permit = self
            .capacity
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RpcError::ConnectionRefused("pool closed".to_owned()))?;
        let conn = Connection::connect(&self.endpoint, &self.config, self.serializer, permit).await?;
        Ok(PooledConnection { conn: Some(Arc::new(conn)), pool: self.clone() })
    }

    fn release(&self, conn: Arc<Connection>) {
        if !conn.is_closed() {
            self.idle.lock().unwrap().push_back(conn);
        }
        // A closed connection's permit is freed when its last `Arc` drops.
    }
}

/// Process-wide registry: one [`Pool`] per endpoint, created on first use.
pub struct PoolManager {
    config: PoolConfig,
    serializer: SerializerKind,
    pools: DashMap<EndpointKey, Arc<Pool>>,
}

impl PoolManager {
    pub fn new(config: PoolConfig, serializer: SerializerKind) -> Self {
        Self { config, serializer, pools: DashMap::new() }
    }

    pub fn pool_for(&self, endpoint: &Endpoint, key: &EndpointKey) -> Arc<Pool> {
        self.pools
            .entry(key.clone())
            .or_insert_with(|| Pool::new(endpoint.clone(), self.config.clone(), self.serializer))
            .clone()
    }
}
