//! The manager: multiplexes one transport connection across many managed
//! objects.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use wdx_codec::{Decode, Encode, Message, Reader};
use wdx_transport::StreamAdapter;

use crate::{
    error::{IpcError, Result},
    ids::ObjectId,
    store::ObjectStore,
};

/// Owns the stream adapter and object store for one transport connection,
/// and ferries frames between them.
///
/// Outbound sends and inbound receives both need exclusive access to the
/// adapter (it is a single bidirectional stream), so the adapter is guarded
/// by an async mutex; the object store has its own finer-grained locking
/// and is shared freely.
pub struct Manager {
    adapter: AsyncMutex<Box<dyn StreamAdapter>>,
    store: Arc<ObjectStore>,
}

impl Manager {
    /// Build a manager around an already-connected `adapter`, with a fresh
    /// object store named `connection_name`.
    #[must_use]
    pub fn new(connection_name: impl Into<String>, adapter: Box<dyn StreamAdapter>) -> Self {
        Self { adapter: AsyncMutex::new(adapter), store: Arc::new(ObjectStore::new(connection_name)) }
    }

    /// The object store backing this connection.
    #[must_use]
    pub fn object_store(&self) -> &Arc<ObjectStore> {
        &self.store
    }

    /// Send `body` on behalf of `sender_id`, prefixing it with the sender's
    /// object id per the wire format.
    pub async fn send(&self, sender_id: ObjectId, body: Vec<u8>) -> Result<()> {
        let message = Message::new(sender_id, body);
        let mut frame = Vec::new();
        message.encode(&mut frame)?;
        let mut adapter = self.adapter.lock().await;
        adapter.send(&frame).await?;
        Ok(())
    }

    /// Receive and dispatch exactly one incoming frame.
    ///
    /// Decodes the leading object id, obtains a call guard for the target
    /// object, and invokes its `handle_message` with the stream positioned
    /// past the id. Frames addressed to an unknown or destroying object are
    /// logged and discarded — the original implementation reserves this
    /// case for a future synthetic negative reply, which this port does not
    /// yet send either.
    pub async fn receive_one(&self) -> Result<()> {
        let frame = {
            let mut adapter = self.adapter.lock().await;
            adapter.receive().await?
        };
        let mut reader = Reader::new(&frame);
        let target_object_id = u32::decode(&mut reader)?;
        let body = reader_remaining(&mut reader);

        match self.store.try_begin_call(target_object_id) {
            Some((object, guard)) => {
                let result = object.handle_message(&body).await;
                drop(guard);
                if let Err(err) = result {
                    tracing::warn!(target_object_id, error = %err, "handler returned an error");
                }
            }
            None => {
                tracing::info!(target_object_id, "not handled: object is gone or destroying");
            }
        }
        Ok(())
    }

    /// Drive [`Manager::receive_one`] in a loop until the transport closes.
    ///
    /// Once the loop exits, every object still in the store is notified via
    /// [`crate::store::ManagedObject::on_transport_closed`] and every
    /// generated object is dropped (§5 Cancellation): nothing will ever
    /// address or reply to them again.
    pub async fn run(&self) {
        loop {
            match self.receive_one().await {
                Ok(()) => {}
                Err(IpcError::Transport(wdx_transport::TransportError::Closed)) => {
                    tracing::info!(connection = self.store.connection_name(), "transport closed");
                    break;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "error receiving frame, continuing");
                }
            }
        }
        self.store.notify_transport_closed();
    }
}

fn reader_remaining(reader: &mut Reader<'_>) -> Vec<u8> {
    let n = reader.remaining();
    reader.take(n, "Manager::body").map(<[u8]>::to_vec).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use wdx_transport::ConnectionInfo;

    use super::*;
    use crate::store::ManagedObject;

    struct EchoStub {
        id: ObjectId,
        seen: std::sync::Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl ManagedObject for EchoStub {
        fn id(&self) -> ObjectId {
            self.id
        }

        async fn handle_message(&self, body: &[u8]) -> Result<()> {
            *self.seen.lock().unwrap() = body.to_vec();
            Ok(())
        }
    }

    struct InMemoryAdapter {
        inbox: tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>,
        outbox: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
    }

    #[async_trait]
    impl StreamAdapter for InMemoryAdapter {
        async fn send(&mut self, data: &[u8]) -> wdx_transport::Result<()> {
            self.outbox.send(data.to_vec()).map_err(|_| wdx_transport::TransportError::Closed)
        }

        async fn receive(&mut self) -> wdx_transport::Result<Vec<u8>> {
            self.inbox.recv().await.ok_or(wdx_transport::TransportError::Closed)
        }

        fn connection_info(&self) -> ConnectionInfo {
            ConnectionInfo { local: "mem".to_string(), peer: "mem".to_string() }
        }
    }

    #[tokio::test]
    async fn receive_one_dispatches_to_the_addressed_object() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let (_discard_tx, discard_rx) = tokio::sync::mpsc::unbounded_channel();
        let adapter = InMemoryAdapter { inbox: rx, outbox: tokio::sync::mpsc::unbounded_channel().0 };
        drop(discard_rx);

        let manager = Manager::new("test", Box::new(adapter));
        let stub = Arc::new(EchoStub { id: 5, seen: std::sync::Mutex::new(Vec::new()) });
        manager.object_store().add(stub.clone()).unwrap();

        let msg = Message::new(5, vec![1, 2, 3]);
        let mut frame = Vec::new();
        msg.encode(&mut frame).unwrap();
        tx.send(frame).unwrap();

        manager.receive_one().await.unwrap();
        assert_eq!(*stub.seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn receive_one_on_unknown_object_does_not_error() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let adapter = InMemoryAdapter { inbox: rx, outbox: tokio::sync::mpsc::unbounded_channel().0 };
        let manager = Manager::new("test", Box::new(adapter));

        let msg = Message::new(999, vec![]);
        let mut frame = Vec::new();
        msg.encode(&mut frame).unwrap();
        tx.send(frame).unwrap();

        manager.receive_one().await.unwrap();
    }

    #[tokio::test]
    async fn run_notifies_objects_and_clears_generated_ones_when_transport_closes() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let adapter = InMemoryAdapter { inbox: rx, outbox: tokio::sync::mpsc::unbounded_channel().0 };
        let manager = Manager::new("test", Box::new(adapter));

        let id = manager.object_store().generate_object_id();
        let stub = Arc::new(EchoStub { id, seen: std::sync::Mutex::new(Vec::new()) });
        manager.object_store().add(stub).unwrap();

        drop(tx);
        manager.run().await;

        assert!(manager.object_store().get(id).is_err());
    }
}
