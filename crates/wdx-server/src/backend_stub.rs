//! Daemon-side half of the backend proxy/stub pair (§4.6): decodes the
//! registration calls a connected client's `wdx-client::IpcBackendPeer`
//! encodes, performs the registration against a [`DaemonRegistry`] shared
//! by every connection, and replies.
//!
//! Lives at [`BACKEND_OBJECT_ID`] on every connection's object store, same
//! as its client-side counterpart.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use wdx_codec::{CodecError, Decode, Encode, Reader};
use wdx_ipc::{
    BackendOrdinal, CallMode, DeviceId, DeviceRegistration, FileContext, FileIdResponse, ManagedObject, Manager,
    ObjectId, ParameterProviderProxy, ProviderDispatcher, ProviderRef, ProxyMetadata, Response, Result as IpcResult,
    BACKEND_OBJECT_ID,
};

use crate::registry::DaemonRegistry;

/// Daemon-side managed object at [`BACKEND_OBJECT_ID`] for one connection.
///
/// Proxy ids allocated during `create_*_proxies` are only meaningful on
/// this connection's [`Manager`], so the handshake's in-progress state
/// (ids not yet registered with a call mode) is kept here rather than in
/// [`DaemonRegistry`], which is shared across every connection and keyed by
/// identity that survives a reconnect.
pub struct BackendStub {
    manager: Arc<Manager>,
    registry: Arc<DaemonRegistry>,
    dispatcher: Arc<ProviderDispatcher>,
    pending_parameter_proxies: Mutex<HashMap<ObjectId, Arc<ParameterProviderProxy>>>,
    pending_file_proxies: Mutex<HashMap<ObjectId, Arc<wdx_files::FileProviderProxy>>>,
}

impl BackendStub {
    /// Build a stub driving registration against `registry`/`dispatcher`
    /// for the connection behind `manager`.
    #[must_use]
    pub fn new(manager: Arc<Manager>, registry: Arc<DaemonRegistry>, dispatcher: Arc<ProviderDispatcher>) -> Self {
        Self {
            manager,
            registry,
            dispatcher,
            pending_parameter_proxies: Mutex::new(HashMap::new()),
            pending_file_proxies: Mutex::new(HashMap::new()),
        }
    }

    fn allocate_parameter_proxies(&self, count: u32) -> Vec<ObjectId> {
        let mut pending = self.pending_parameter_proxies.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        (0..count)
            .map(|_| {
                let id = self.manager.object_store().generate_object_id();
                let proxy = Arc::new(ParameterProviderProxy::new(id, Arc::clone(&self.manager)));
                if let Err(err) = self.manager.object_store().add(Arc::clone(&proxy) as Arc<dyn ManagedObject>) {
                    tracing::error!(object_id = id, %err, "freshly generated parameter proxy id already occupied");
                }
                pending.insert(id, proxy);
                id
            })
            .collect()
    }

    fn allocate_file_proxies(&self, count: u32) -> Vec<ObjectId> {
        let mut pending = self.pending_file_proxies.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        (0..count)
            .map(|_| {
                let id = self.manager.object_store().generate_object_id();
                let proxy = Arc::new(wdx_files::FileProviderProxy::new(id, Arc::clone(&self.manager)));
                if let Err(err) = self.manager.object_store().add(Arc::clone(&proxy) as Arc<dyn ManagedObject>) {
                    tracing::error!(object_id = id, %err, "freshly generated file proxy id already occupied");
                }
                pending.insert(id, proxy);
                id
            })
            .collect()
    }

    fn take_pending_parameter_proxy(&self, id: ObjectId) -> Option<Arc<ParameterProviderProxy>> {
        self.pending_parameter_proxies.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&id)
    }

    fn take_pending_file_proxy(&self, id: ObjectId) -> Option<Arc<wdx_files::FileProviderProxy>> {
        self.pending_file_proxies.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&id)
    }
}

#[async_trait]
impl ManagedObject for BackendStub {
    fn id(&self) -> ObjectId {
        BACKEND_OBJECT_ID
    }

    #[allow(clippy::too_many_lines)]
    async fn handle_message(&self, body: &[u8]) -> IpcResult<()> {
        let mut reader = Reader::new(body);
        let ordinal_raw = u16::decode(&mut reader)?;
        let call_id = u64::decode(&mut reader)?;
        let ordinal = BackendOrdinal::from_u16(ordinal_raw)
            .ok_or_else(|| CodecError::Malformed { type_name: "BackendOrdinal", reason: format!("unknown ordinal {ordinal_raw}") })?;

        let mut reply = Vec::new();
        call_id.encode(&mut reply)?;

        match ordinal {
            BackendOrdinal::RegisterDevices => {
                let devices = Vec::<DeviceRegistration>::decode(&mut reader)?;
                tracing::info!(count = devices.len(), "registering devices");
                let responses: Vec<Response> = devices.iter().map(|_| Response::ok()).collect();
                self.registry.register_devices(devices);
                responses.encode(&mut reply)?;
            }
            BackendOrdinal::UnregisterDevices => {
                let ids = Vec::<DeviceId>::decode(&mut reader)?;
                let responses: Vec<Response> = ids.iter().map(|_| Response::ok()).collect();
                self.registry.unregister_devices(&ids);
                responses.encode(&mut reply)?;
            }
            BackendOrdinal::UnregisterAllDevices => {
                let collection_id = u32::decode(&mut reader)?;
                self.registry.unregister_all_devices(collection_id);
                Response::ok().encode(&mut reply)?;
            }
            BackendOrdinal::CreateParameterProxies => {
                let count = u32::decode(&mut reader)?;
                let ids = self.allocate_parameter_proxies(count);
                ids.encode(&mut reply)?;
            }
            BackendOrdinal::UpdateParameterProxies => {
                let _metadata = Vec::<ProxyMetadata>::decode(&mut reader)?;
                // Display names/selectors are logged only; no routing decision
                // in this daemon currently depends on them.
            }
            BackendOrdinal::RegisterParameterProviders => {
                let providers = Vec::<ProviderRef>::decode(&mut reader)?;
                let call_mode = CallMode::decode(&mut reader)?;
                let responses: Vec<Response> = providers
                    .iter()
                    .map(|provider| match self.take_pending_parameter_proxy(provider.proxy_object_id) {
                        Some(proxy) => {
                            self.dispatcher.register(provider.proxy_object_id, call_mode);
                            self.registry.register_parameter_provider(provider.proxy_object_id, proxy);
                            Response::ok()
                        }
                        None => Response::failed(wdx_ipc::CoreStatus::LogicError),
                    })
                    .collect();
                responses.encode(&mut reply)?;
            }
            BackendOrdinal::UnregisterParameterProviders => {
                let providers = Vec::<ProviderRef>::decode(&mut reader)?;
                for provider in providers {
                    self.dispatcher.unregister(provider.proxy_object_id);
                    self.registry.unregister_parameter_provider(provider.proxy_object_id);
                    self.manager.object_store().remove(provider.proxy_object_id);
                }
            }
            BackendOrdinal::CreateFileProxies => {
                let count = u32::decode(&mut reader)?;
                let ids = self.allocate_file_proxies(count);
                ids.encode(&mut reply)?;
            }
            BackendOrdinal::UpdateFileProxies => {
                let _metadata = Vec::<ProxyMetadata>::decode(&mut reader)?;
            }
            BackendOrdinal::RegisterFileProviders => {
                let providers = Vec::<ProviderRef>::decode(&mut reader)?;
                let context = FileContext::decode(&mut reader)?;
                let call_mode = CallMode::decode(&mut reader)?;
                let responses: Vec<FileIdResponse> = providers
                    .iter()
                    .map(|provider| match self.take_pending_file_proxy(provider.proxy_object_id) {
                        Some(proxy) => {
                            self.dispatcher.register(provider.proxy_object_id, call_mode);
                            let file_id = self.registry.register_file_provider(proxy, context.path.clone(), call_mode);
                            FileIdResponse { status: wdx_ipc::CoreStatus::Ok, file_id: Some(file_id) }
                        }
                        None => FileIdResponse { status: wdx_ipc::CoreStatus::LogicError, file_id: None },
                    })
                    .collect();
                responses.encode(&mut reply)?;
            }
            BackendOrdinal::ReregisterFileProviders => {
                let ids = Vec::<ProviderRef>::decode(&mut reader)?;
                let file_ids = Vec::<String>::decode(&mut reader)?;
                let context = FileContext::decode(&mut reader)?;
                let call_mode = CallMode::decode(&mut reader)?;
                let responses: Vec<FileIdResponse> = ids
                    .iter()
                    .zip(file_ids)
                    .map(|(provider, file_id)| match self.take_pending_file_proxy(provider.proxy_object_id) {
                        Some(proxy) => {
                            self.dispatcher.register(provider.proxy_object_id, call_mode);
                            self.registry.reregister_file_provider(file_id.clone(), proxy, context.path.clone(), call_mode);
                            FileIdResponse { status: wdx_ipc::CoreStatus::Ok, file_id: Some(file_id) }
                        }
                        None => FileIdResponse { status: wdx_ipc::CoreStatus::LogicError, file_id: None },
                    })
                    .collect();
                responses.encode(&mut reply)?;
            }
            BackendOrdinal::UnregisterFileProviders => {
                let providers = Vec::<ProviderRef>::decode(&mut reader)?;
                for provider in &providers {
                    self.dispatcher.unregister(provider.proxy_object_id);
                    self.manager.object_store().remove(provider.proxy_object_id);
                }
                let ids: Vec<ObjectId> = providers.iter().map(|p| p.proxy_object_id).collect();
                self.registry.unregister_file_providers_by_object_id(&ids);
            }
        }

        self.manager.send(BACKEND_OBJECT_ID, reply).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use wdx_client::IpcBackendPeer;
    use wdx_ipc::BackendProxy;

    use super::*;

    struct LoopbackAdapter {
        inbox: tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>,
        outbox: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
    }

    #[async_trait]
    impl wdx_transport::StreamAdapter for LoopbackAdapter {
        async fn send(&mut self, data: &[u8]) -> wdx_transport::Result<()> {
            self.outbox.send(data.to_vec()).map_err(|_| wdx_transport::TransportError::Closed)
        }

        async fn receive(&mut self) -> wdx_transport::Result<Vec<u8>> {
            self.inbox.recv().await.ok_or(wdx_transport::TransportError::Closed)
        }

        fn connection_info(&self) -> wdx_transport::ConnectionInfo {
            wdx_transport::ConnectionInfo { local: "mem".into(), peer: "mem".into() }
        }
    }

    /// Wires a real client-side [`IpcBackendPeer`] against a real
    /// [`BackendStub`] over an in-memory channel pair, so every test below
    /// exercises the whole encode -> dispatch -> decode path rather than
    /// calling [`DaemonRegistry`] methods directly.
    struct Harness {
        proxy: BackendProxy<Arc<IpcBackendPeer>>,
        registry: Arc<DaemonRegistry>,
    }

    fn spin_up() -> Harness {
        let (client_to_stub_tx, client_to_stub_rx) = tokio::sync::mpsc::unbounded_channel();
        let (stub_to_client_tx, stub_to_client_rx) = tokio::sync::mpsc::unbounded_channel();

        let client_manager = Arc::new(Manager::new(
            "client",
            Box::new(LoopbackAdapter { inbox: stub_to_client_rx, outbox: client_to_stub_tx }),
        ));
        let daemon_manager = Arc::new(Manager::new(
            "daemon",
            Box::new(LoopbackAdapter { inbox: client_to_stub_rx, outbox: stub_to_client_tx }),
        ));

        let registry = Arc::new(DaemonRegistry::default());
        let dispatcher = Arc::new(ProviderDispatcher::default());
        let stub = Arc::new(BackendStub::new(Arc::clone(&daemon_manager), Arc::clone(&registry), Arc::clone(&dispatcher)));
        daemon_manager.object_store().add(stub).unwrap();

        let peer = Arc::new(IpcBackendPeer::new(Arc::clone(&client_manager)));
        client_manager.object_store().add(Arc::clone(&peer) as Arc<dyn ManagedObject>).unwrap();
        let proxy = BackendProxy::new(peer);

        tokio::spawn({
            let daemon_manager = Arc::clone(&daemon_manager);
            async move { daemon_manager.run().await }
        });
        tokio::spawn({
            let client_manager = Arc::clone(&client_manager);
            async move { client_manager.run().await }
        });

        Harness { proxy, registry }
    }

    fn device(slot: u32) -> DeviceRegistration {
        DeviceRegistration { slot, collection_id: 1, order_number: format!("ORD-{slot}"), firmware_version: "1.0".into() }
    }

    #[tokio::test]
    async fn registering_devices_records_them_in_the_daemon_registry() {
        let harness = spin_up();
        let responses = harness.proxy.register_devices(vec![device(1), device(2), device(3)]).await.unwrap();
        assert!(responses.iter().all(|r| r.status.is_ok()));
        assert_eq!(harness.registry.device_count(), 3);
    }

    #[tokio::test]
    async fn unregistering_a_device_drops_it_from_the_daemon_registry() {
        let harness = spin_up();
        harness.proxy.register_devices(vec![device(1), device(2)]).await.unwrap();
        harness.proxy.unregister_devices(vec![DeviceId { slot: 1, collection_id: 1 }]).await.unwrap();
        assert_eq!(harness.registry.device_count(), 1);
    }

    #[tokio::test]
    async fn reregistering_devices_after_reconnect_does_not_duplicate_entries() {
        let harness = spin_up();
        harness.proxy.register_devices(vec![device(1), device(2), device(3)]).await.unwrap();
        harness.proxy.reregister_devices().await.unwrap();
        assert_eq!(harness.registry.device_count(), 3);
    }

    #[tokio::test]
    async fn parameter_provider_handshake_registers_with_the_daemon() {
        let harness = spin_up();
        let assigned_id = std::sync::Mutex::new(None);
        let responses = harness
            .proxy
            .register_parameter_providers(1, CallMode::Concurrent, |id| {
                *assigned_id.lock().unwrap() = Some(id);
                ProxyMetadata { object_id: id, display_name: "test-provider".into(), provided_selectors: vec!["slot.1.value".into()] }
            })
            .await
            .unwrap();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].status.is_ok());
        let id = assigned_id.lock().unwrap().unwrap();
        assert!(harness.registry.parameter_provider(id).is_some());
    }

    #[tokio::test]
    async fn file_provider_handshake_assigns_a_file_id() {
        let harness = spin_up();
        let responses = harness
            .proxy
            .register_file_providers(1, FileContext { path: "slot.1.firmware".into() }, CallMode::Serialized, |id| {
                ProxyMetadata { object_id: id, display_name: "test-files".into(), provided_selectors: vec![] }
            })
            .await
            .unwrap();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].status.is_ok());
        let file_id = responses[0].file_id.clone().unwrap();
        assert!(harness.registry.file_provider_by_id(&file_id).is_some());
    }
}
