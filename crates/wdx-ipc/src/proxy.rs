//! Call correlation shared by every generated proxy.
//!
//! A proxy encodes `(method_ordinal, call_id, arguments…)` and must later
//! match an incoming `(call_id, return_value…)` reply back to the right
//! caller. `CallTable` is that matching structure: a map from `call_id` to
//! a oneshot sender the stub's reply (or a connection teardown) completes.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use tokio::sync::oneshot;

use crate::error::{IpcError, Result};

/// A fresh, monotonic token minted per outstanding call on a proxy.
pub type CallId = u64;

/// Tracks outstanding calls for one proxy so replies can be routed back to
/// the `await` that is waiting on them.
pub struct CallTable {
    next_call_id: AtomicU64,
    pending: Mutex<HashMap<CallId, oneshot::Sender<Vec<u8>>>>,
}

impl Default for CallTable {
    fn default() -> Self {
        Self { next_call_id: AtomicU64::new(1), pending: Mutex::new(HashMap::new()) }
    }
}

impl CallTable {
    /// Register a new outstanding call, returning its id and a future that
    /// resolves when [`CallTable::complete`] is called with that id (or
    /// [`IpcError::Dropped`] if the table is torn down first).
    pub fn begin_call(&self) -> (CallId, oneshot::Receiver<Vec<u8>>) {
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(call_id, tx);
        (call_id, rx)
    }

    /// Deliver a decoded reply payload to the caller waiting on `call_id`.
    /// A `call_id` with no (or an already-resolved) waiter is silently
    /// ignored — the caller may have cancelled.
    pub fn complete(&self, call_id: CallId, reply_body: Vec<u8>) {
        if let Some(tx) = self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&call_id) {
            let _ = tx.send(reply_body);
        }
    }

    /// Resolve every outstanding call with [`IpcError::Dropped`]. Called
    /// when the proxy is destroyed or its connection is torn down.
    pub fn drop_all(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (_, tx) in pending.drain() {
            drop(tx);
        }
    }

    /// Await the reply for `rx`, translating a dropped sender into
    /// [`IpcError::Dropped`].
    pub async fn await_reply(rx: oneshot::Receiver<Vec<u8>>) -> Result<Vec<u8>> {
        rx.await.map_err(|_| IpcError::Dropped)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reply_reaches_the_matching_waiter() {
        let table = CallTable::default();
        let (call_id, rx) = table.begin_call();
        table.complete(call_id, vec![9, 9]);
        let reply = CallTable::await_reply(rx).await.unwrap();
        assert_eq!(reply, vec![9, 9]);
    }

    #[tokio::test]
    async fn drop_all_resolves_outstanding_calls_with_dropped() {
        let table = CallTable::default();
        let (_call_id, rx) = table.begin_call();
        table.drop_all();
        let err = CallTable::await_reply(rx).await.unwrap_err();
        assert!(matches!(err, IpcError::Dropped));
    }

    #[tokio::test]
    async fn complete_on_unknown_call_id_is_a_noop() {
        let table = CallTable::default();
        table.complete(12345, vec![]);
    }

    #[tokio::test]
    async fn distinct_calls_get_distinct_ids() {
        let table = CallTable::default();
        let (id1, _rx1) = table.begin_call();
        let (id2, _rx2) = table.begin_call();
        assert_ne!(id1, id2);
    }
}
