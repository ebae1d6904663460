//! Parameter service fabric daemon: the IPC backend registration surface
//! and the HTTP file-transfer frontend, sharing one daemon-wide registry of
//! connected providers.
//!
//! # Architecture
//!
//! Every TCP connection gets its own [`wdx_ipc::Manager`] and object store,
//! with a [`backend_stub::BackendStub`] installed at object id 0 to decode
//! registration calls. What gets registered — devices, parameter providers,
//! file providers — is recorded in a [`registry::DaemonRegistry`] shared by
//! every connection, so it survives the connection that populated it. The
//! HTTP file-transfer frontend in `wdx-files` is handed a single
//! [`file_routing::RoutingFileProvider`] backed by that same registry.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend_stub;
mod connection;
pub mod error;
pub mod file_routing;
pub mod registry;

use std::sync::Arc;

use axum::http::HeaderValue;
use tokio::{net::TcpListener, sync::Semaphore};
use wdx_files::{files_router, FilesConfig};
use wdx_ipc::ProviderDispatcher;
use wdx_transport::TcpTransportListener;

pub use error::{Result, ServerError};
pub use registry::DaemonRegistry;

use file_routing::RoutingFileProvider;

/// Daemon configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address the IPC (managed-object) listener binds to.
    pub ipc_bind_address: String,
    /// Address the HTTP file-transfer listener binds to.
    pub http_bind_address: String,
    /// Seconds an upload id allocated by `POST /files` stays valid before
    /// it expires unclaimed.
    pub upload_id_timeout_secs: u16,
    /// Single origin the file-transfer frontend's CORS layer allows.
    pub cors_allow_origin: String,
    /// Maximum number of simultaneous IPC connections accepted; further
    /// connections wait for a slot to free up rather than being refused.
    pub max_connections: usize,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            ipc_bind_address: "0.0.0.0:7300".to_string(),
            http_bind_address: "0.0.0.0:8080".to_string(),
            upload_id_timeout_secs: 60,
            cors_allow_origin: "*".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Production parameter service daemon.
pub struct Server {
    config: ServerRuntimeConfig,
    ipc_listener: TcpTransportListener,
    http_listener: TcpListener,
    registry: Arc<DaemonRegistry>,
    dispatcher: Arc<ProviderDispatcher>,
}

impl Server {
    /// Bind both listeners and build the shared daemon state. Binds
    /// eagerly so a startup failure (port in use, no permission) surfaces
    /// before [`Server::run`] is called rather than on first connection.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self> {
        let ipc_listener = TcpTransportListener::bind(&config.ipc_bind_address).await?;
        let http_listener =
            TcpListener::bind(&config.http_bind_address).await.map_err(|err| ServerError::Http(err.to_string()))?;

        Ok(Self {
            config,
            ipc_listener,
            http_listener,
            registry: Arc::new(DaemonRegistry::default()),
            dispatcher: Arc::new(ProviderDispatcher::default()),
        })
    }

    /// Local address the IPC listener is bound to.
    pub fn ipc_local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.ipc_listener.local_addr()?)
    }

    /// Local address the HTTP listener is bound to.
    pub fn http_local_addr(&self) -> Result<std::net::SocketAddr> {
        self.http_listener.local_addr().map_err(|err| ServerError::Http(err.to_string()))
    }

    /// Run the daemon until the HTTP listener is closed or errors.
    ///
    /// Spawns a background task accepting IPC connections and runs the HTTP
    /// file-transfer server in the foreground; both share `registry` and
    /// `dispatcher` so a provider registered over IPC is immediately
    /// reachable from an HTTP request.
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            ipc = %self.ipc_listener.local_addr()?,
            http = %self.http_listener.local_addr().map_err(|err| ServerError::Http(err.to_string()))?,
            "server starting",
        );

        let registry = Arc::clone(&self.registry);
        let dispatcher = Arc::clone(&self.dispatcher);
        let ipc_listener = self.ipc_listener;
        let connection_slots = Arc::new(Semaphore::new(self.config.max_connections));

        tokio::spawn(async move {
            loop {
                match ipc_listener.accept().await {
                    Ok(transport) => {
                        let registry = Arc::clone(&registry);
                        let dispatcher = Arc::clone(&dispatcher);
                        let slots = Arc::clone(&connection_slots);
                        tokio::spawn(async move {
                            let Ok(permit) = slots.acquire_owned().await else {
                                return;
                            };
                            connection::handle_connection(transport, registry, dispatcher).await;
                            drop(permit);
                        });
                    }
                    Err(err) => {
                        tracing::error!(%err, "ipc accept error");
                    }
                }
            }
        });

        let provider = Arc::new(RoutingFileProvider::new(Arc::clone(&self.registry), Arc::clone(&self.dispatcher)));
        let files_config = FilesConfig { provider, upload_id_timeout_secs: self.config.upload_id_timeout_secs };
        let allow_origin = HeaderValue::from_str(&self.config.cors_allow_origin)
            .map_err(|err| ServerError::Http(format!("invalid cors_allow_origin: {err}")))?;
        let router = files_router(files_config, allow_origin);

        axum::serve(self.http_listener, router).await.map_err(|err| ServerError::Http(err.to_string()))
    }
}
