//! Component B: per-connection request/response correlation (spec §3, §4.2).
//!
//! Each connection owns one table and one monotonic message-id counter
//! (spec.md §9's "per-connection msgId" resolution, see `SPEC_FULL.md` §4).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use rpc_protocol::FramedMessage;
use tokio::sync::oneshot;

/// Tracks in-flight calls for one connection, keyed by message id.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    next_id: AtomicU32,
    pending: Mutex<HashMap<u32, oneshot::Sender<FramedMessage>>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        // 0 is reserved for nothing in particular, but starting at 1 keeps
        // message ids visibly distinct from a freshly zeroed header.
        Self { next_id: AtomicU32::new(1), pending: Mutex::new(HashMap::new()) }
    }

    /// Allocate the next message id and register a waiter for its response.
    pub fn register(&self) -> (u32, oneshot::Receiver<FramedMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);
        (id, rx)
    }

    /// Allocate a message id without registering a waiter for it. Used for
    /// heartbeats, whose response is matched by id locally and never routed
    /// through `pending` (it would otherwise never be removed).
    pub fn next_bare_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Deliver a response to its waiter. Returns `false` if there was no
    /// waiter (late/duplicate/unknown message id).
    pub fn complete(&self, message_id: u32, response: FramedMessage) -> bool {
        let sender = self.pending.lock().unwrap().remove(&message_id);
        match sender {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Remove a waiter without completing it, e.g. after a local timeout so
    /// a subsequent late response is silently dropped instead of resolved.
    pub fn cancel(&self, message_id: u32) {
        self.pending.lock().unwrap().remove(&message_id);
    }

    /// Drop every pending waiter on disconnect; each receiver observes a
    /// `RecvError` that the caller maps to `RpcError::ConnectionRefused` or
    /// `RpcError::Io`.
    pub fn fail_all(&self) {
        self.pending.lock().unwrap().clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}
