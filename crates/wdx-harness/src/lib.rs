//! Deterministic network simulation harness.
//!
//! Runs the real [`wdx_client::Client`] and the real daemon-side registration
//! stack ([`wdx_server::backend_stub::BackendStub`],
//! [`wdx_server::registry::DaemonRegistry`],
//! [`wdx_server::file_routing::RoutingFileProvider`]) over a
//! [`turmoil`]-simulated network instead of real TCP, so partitions,
//! reconnects, and replay behavior can be tested deterministically rather
//! than against a real socket's timing.
//!
//! Mirrors the production wiring in `wdx_server::Server` closely enough that
//! a scenario proven here is proof about the production code path: the only
//! thing this crate substitutes is the transport.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use async_trait::async_trait;
use turmoil::net::{TcpListener, TcpStream};
use wdx_ipc::{Manager, ProviderDispatcher};
use wdx_server::{backend_stub::BackendStub, file_routing::RoutingFileProvider, registry::DaemonRegistry};
use wdx_transport::{
    framing::{read_frame, write_frame},
    ConnectionInfo, Result as TransportResult, StreamAdapter, TransportError,
};

/// A connected `turmoil` TCP stream framed exactly like
/// [`wdx_transport::TcpTransport`], so the real [`Manager`] can drive it
/// without knowing it isn't a real socket.
pub struct SimTcpTransport {
    stream: TcpStream,
    info: ConnectionInfo,
}

impl SimTcpTransport {
    fn new(stream: TcpStream, local: String, peer: String) -> Self {
        Self { stream, info: ConnectionInfo { local, peer } }
    }

    /// Dial `addr` (a `turmoil` host name and port, e.g. `"daemon:7300"`)
    /// inside the running simulation.
    pub async fn connect(addr: &str) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr).await.map_err(TransportError::Io)?;
        tracing::debug!(addr, "sim transport connected");
        Ok(Self::new(stream, "sim-client".to_string(), addr.to_string()))
    }
}

#[async_trait]
impl StreamAdapter for SimTcpTransport {
    async fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        write_frame(&mut self.stream, data).await
    }

    async fn receive(&mut self) -> TransportResult<Vec<u8>> {
        read_frame(&mut self.stream).await
    }

    fn connection_info(&self) -> ConnectionInfo {
        self.info.clone()
    }
}

/// Daemon-side state for one simulated host, wired the same way
/// `wdx_server::Server` wires a real listener: every accepted connection
/// gets its own [`Manager`] and [`BackendStub`], all sharing one
/// [`DaemonRegistry`] and [`ProviderDispatcher`] so registrations survive
/// the connection that made them.
#[derive(Default)]
pub struct SimDaemon {
    /// Registered devices and providers, shared across every connection
    /// this daemon accepts.
    pub registry: Arc<DaemonRegistry>,
    /// Call-mode dispatch policy for every registered provider.
    pub dispatcher: Arc<ProviderDispatcher>,
}

impl SimDaemon {
    /// Build an empty daemon with nothing registered yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`wdx_files::FileProvider`] fronting every file provider registered
    /// against this daemon, for wiring into an HTTP frontend alongside the
    /// simulated IPC listener.
    #[must_use]
    pub fn file_provider(&self) -> Arc<RoutingFileProvider> {
        Arc::new(RoutingFileProvider::new(Arc::clone(&self.registry), Arc::clone(&self.dispatcher)))
    }

    /// Accept connections on `listener` until it errors, handling each one
    /// to completion on its own task.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let transport = SimTcpTransport::new(stream, "sim-daemon".to_string(), peer_addr.to_string());
            let registry = Arc::clone(&self.registry);
            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(Self::handle_connection(transport, registry, dispatcher));
        }
    }

    async fn handle_connection(transport: SimTcpTransport, registry: Arc<DaemonRegistry>, dispatcher: Arc<ProviderDispatcher>) {
        let info = transport.connection_info();
        let manager = Arc::new(Manager::new(info.peer.clone(), Box::new(transport)));

        let stub = Arc::new(BackendStub::new(Arc::clone(&manager), registry, dispatcher));
        if let Err(err) = manager.object_store().add(stub) {
            tracing::error!(peer = %info.peer, %err, "failed to install backend stub in simulation, dropping connection");
            return;
        }

        tracing::info!(peer = %info.peer, "simulated ipc connection accepted");
        manager.run().await;
        tracing::info!(peer = %info.peer, "simulated ipc connection closed");
    }
}
