//! Per-connection lifetime: wires a freshly accepted transport into its own
//! [`Manager`], installs the backend stub, and drives the receive loop.

use std::sync::Arc;

use wdx_ipc::{Manager, ProviderDispatcher};
use wdx_transport::{StreamAdapter, TcpTransport};

use crate::{backend_stub::BackendStub, registry::DaemonRegistry};

/// Run one connection to completion: build its manager, install the
/// backend stub at id 0, and drive [`Manager::run`] until the transport
/// closes. Every other registered object (devices, providers) lives in
/// `registry`/`dispatcher`, shared across every connection, so nothing
/// beyond the connection-scoped proxy objects is lost when this returns.
pub async fn handle_connection(
    transport: TcpTransport,
    registry: Arc<DaemonRegistry>,
    dispatcher: Arc<ProviderDispatcher>,
) {
    let info = transport.connection_info();
    let manager = Arc::new(Manager::new(info.peer.clone(), Box::new(transport)));

    let stub = Arc::new(BackendStub::new(Arc::clone(&manager), registry, dispatcher));
    if let Err(err) = manager.object_store().add(stub) {
        tracing::error!(peer = %info.peer, %err, "failed to install backend stub, dropping connection");
        return;
    }

    tracing::info!(peer = %info.peer, "ipc connection accepted");
    manager.run().await;
    tracing::info!(peer = %info.peer, "ipc connection closed");
}
