//! Client-side registration library: drives the backend handshake (§4.6)
//! over a managed-object IPC connection to the daemon, and hosts locally
//! implemented parameter and file providers as callback stubs the daemon
//! can call back into.
//!
//! A thin layer, in the same spirit as a transport adapter: connection
//! setup and the receive loop live here, while the registration and replay
//! logic itself is [`wdx_ipc::BackendProxy`]'s.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod backend_peer;
mod error;

use std::sync::Arc;

pub use backend_peer::IpcBackendPeer;
pub use error::{ClientError, Result};
use wdx_files::{FileProvider, FileProviderStub};
use wdx_ipc::{
    BackendProxy, CallMode, DeviceId, DeviceRegistration, FileContext, FileIdResponse, ManagedObject, Manager,
    ObjectId, ParameterProvider, ParameterProviderStub, ProxyMetadata, Response,
};
use wdx_transport::{StreamAdapter, TcpTransport};

/// A connection to the daemon: the managed-object substrate driving it, the
/// backend registration proxy layered over it, and a background task
/// pumping [`Manager::run`] for the lifetime of the connection.
pub struct Client {
    manager: Arc<Manager>,
    backend: BackendProxy<Arc<IpcBackendPeer>>,
    receive_loop: tokio::task::AbortHandle,
}

impl Client {
    /// Connect to the daemon at `addr` (e.g. `"127.0.0.1:9000"`) and start
    /// driving its managed-object connection in the background.
    pub async fn connect(addr: &str) -> Result<Self> {
        let transport = TcpTransport::connect(addr).await?;
        Ok(Self::from_manager(Manager::new(addr.to_string(), Box::new(transport))))
    }

    /// Build a connection directly over an already-connected `adapter`,
    /// bypassing [`Client::connect`]'s real-TCP dial. Used to run this
    /// client against a simulated transport (e.g. a `turmoil` network) in
    /// tests, where the adapter is something other than a [`TcpTransport`].
    #[must_use]
    pub fn from_adapter(connection_name: impl Into<String>, adapter: Box<dyn StreamAdapter>) -> Self {
        Self::from_manager(Manager::new(connection_name, adapter))
    }

    fn from_manager(manager: Manager) -> Self {
        let (manager, peer) = Self::install_backend_peer(manager);
        let backend = BackendProxy::new(peer);
        let receive_loop = Self::spawn_receive_loop(&manager);
        Self { manager, backend, receive_loop }
    }

    /// Reconnect to the daemon at `addr`, replacing this connection's
    /// transport. The registration replay cache survives the swap; call
    /// [`Client::reregister_providers`] afterwards to restore everything
    /// this client had registered before the old connection dropped.
    pub async fn reconnect(&mut self, addr: &str) -> Result<()> {
        let transport = TcpTransport::connect(addr).await?;
        self.reconnect_with_adapter(addr.to_string(), Box::new(transport))
    }

    /// Like [`Client::reconnect`], but over an already-connected `adapter`
    /// rather than dialing a real TCP address. Used to reconnect against a
    /// simulated transport in tests.
    pub fn reconnect_with_adapter(&mut self, connection_name: impl Into<String>, adapter: Box<dyn StreamAdapter>) -> Result<()> {
        self.receive_loop.abort();
        let (manager, peer) = Self::install_backend_peer(Manager::new(connection_name, adapter));
        self.backend.set_peer(peer);
        self.receive_loop = Self::spawn_receive_loop(&manager);
        self.manager = manager;
        Ok(())
    }

    fn install_backend_peer(manager: Manager) -> (Arc<Manager>, Arc<IpcBackendPeer>) {
        let manager = Arc::new(manager);
        let peer = Arc::new(IpcBackendPeer::new(Arc::clone(&manager)));
        if let Err(err) = manager.object_store().add(Arc::clone(&peer) as Arc<dyn ManagedObject>) {
            tracing::error!(%err, "backend object id was already occupied on a fresh connection");
        }
        (manager, peer)
    }

    fn spawn_receive_loop(manager: &Arc<Manager>) -> tokio::task::AbortHandle {
        let manager = Arc::clone(manager);
        tokio::spawn(async move { manager.run().await }).abort_handle()
    }

    /// The managed-object substrate backing this connection.
    #[must_use]
    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// The backend registration driver for this connection.
    #[must_use]
    pub fn backend(&self) -> &BackendProxy<Arc<IpcBackendPeer>> {
        &self.backend
    }

    /// Register `devices` with the daemon, replacing any existing entry
    /// sharing a registered device's `(slot, collection_id)` identity.
    pub async fn register_devices(&self, devices: Vec<DeviceRegistration>) -> Result<Vec<Response>> {
        Ok(self.backend.register_devices(devices).await?)
    }

    /// Drop `ids` from the daemon's device registry.
    pub async fn unregister_devices(&self, ids: Vec<DeviceId>) -> Result<Vec<Response>> {
        Ok(self.backend.unregister_devices(ids).await?)
    }

    /// Drop every device in `collection_id` from the daemon's device
    /// registry.
    pub async fn unregister_all_devices(&self, collection_id: u32) -> Result<Response> {
        Ok(self.backend.unregister_all_devices(collection_id).await?)
    }

    /// Register `provider` with the daemon under `display_name`, serving
    /// `provided_selectors`, and start answering its callbacks locally.
    ///
    /// Runs the full three-step handshake: allocate a stub id, push its
    /// metadata, then register it. On success the stub is left installed in
    /// this connection's object store so the daemon's subsequent calls are
    /// served immediately.
    pub async fn host_parameter_provider(
        &self,
        provider: Arc<dyn ParameterProvider>,
        display_name: impl Into<String>,
        provided_selectors: Vec<String>,
        call_mode: CallMode,
    ) -> Result<Response> {
        let display_name = display_name.into();
        let manager = Arc::clone(&self.manager);
        let responses = self
            .backend
            .register_parameter_providers(1, call_mode, |id| {
                self.install_parameter_stub(&manager, id, Arc::clone(&provider));
                ProxyMetadata { object_id: id, display_name: display_name.clone(), provided_selectors: provided_selectors.clone() }
            })
            .await?;
        first_response(responses)
    }

    /// Register `provider` as a file provider with the daemon under
    /// `context` (the parameter-instance path it serves), returning the
    /// file id the daemon assigned it.
    pub async fn host_file_provider(
        &self,
        provider: Arc<dyn FileProvider>,
        display_name: impl Into<String>,
        provided_selectors: Vec<String>,
        context: impl Into<String>,
        call_mode: CallMode,
    ) -> Result<FileIdResponse> {
        let display_name = display_name.into();
        let context = FileContext { path: context.into() };
        let manager = Arc::clone(&self.manager);
        let responses = self
            .backend
            .register_file_providers(1, context, call_mode, |id| {
                self.install_file_stub(&manager, id, Arc::clone(&provider));
                ProxyMetadata { object_id: id, display_name: display_name.clone(), provided_selectors: provided_selectors.clone() }
            })
            .await?;
        responses.into_iter().next().ok_or_else(|| ClientError::Ipc(wdx_ipc::IpcError::Dropped))
    }

    /// Replay every previously successful registration against the current
    /// connection. Call this after reconnecting: the daemon's fresh backend
    /// stub has no memory of registrations made on the torn-down
    /// connection.
    pub async fn reregister_providers(&self) -> Result<()> {
        Ok(self.backend.reregister_providers().await?)
    }

    fn install_parameter_stub(&self, manager: &Arc<Manager>, id: ObjectId, provider: Arc<dyn ParameterProvider>) {
        let stub = Arc::new(ParameterProviderStub::new(id, provider, Arc::clone(manager)));
        if let Err(err) = manager.object_store().add(stub) {
            tracing::error!(object_id = id, %err, "freshly allocated parameter proxy id already occupied");
        }
    }

    fn install_file_stub(&self, manager: &Arc<Manager>, id: ObjectId, provider: Arc<dyn FileProvider>) {
        let stub = Arc::new(FileProviderStub::new(id, provider, Arc::clone(manager)));
        if let Err(err) = manager.object_store().add(stub) {
            tracing::error!(object_id = id, %err, "freshly allocated file proxy id already occupied");
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.receive_loop.abort();
    }
}

fn first_response(responses: Vec<Response>) -> Result<Response> {
    responses.into_iter().next().ok_or_else(|| ClientError::Ipc(wdx_ipc::IpcError::Dropped))
}
