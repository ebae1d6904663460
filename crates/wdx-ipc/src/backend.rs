//! Backend proxy/stub: the well-known root object at
//! [`crate::BACKEND_OBJECT_ID`] on which the registration lifecycle runs
//! (§4.6).
//!
//! The wire encoding of each backend call is generated-surface boilerplate
//! identical in shape to any other proxy/stub pair (see [`crate::proxy`]);
//! what's specific to the backend is the three-step registration handshake
//! and the replay-on-reconnect behavior, both implemented here against a
//! [`BackendPeer`] abstraction so they can be exercised without a live
//! transport.

use std::sync::Mutex;

use async_trait::async_trait;
use wdx_codec::{CodecError, Decode, Encode, Reader};

use crate::{
    error::Result,
    ids::ObjectId,
    types::{CallMode, DeviceId, DeviceRegistration, FileContext, FileIdResponse, ProviderRef, Response},
};

/// Method ordinals of the backend's wire contract, shared by the
/// client-side encoder (`wdx-client::IpcBackendPeer`) and the daemon-side
/// decoder (`wdx-server::BackendStub`) so the two never drift apart absent
/// an actual IDL compiler to generate them from a single source.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOrdinal {
    /// `register_devices`.
    RegisterDevices = 0,
    /// `unregister_devices`.
    UnregisterDevices = 1,
    /// `unregister_all_devices`.
    UnregisterAllDevices = 2,
    /// `remote_create_parameter_proxies`.
    CreateParameterProxies = 3,
    /// `remote_update_parameter_proxies`.
    UpdateParameterProxies = 4,
    /// `register_parameter_providers`.
    RegisterParameterProviders = 5,
    /// `unregister_parameter_providers`.
    UnregisterParameterProviders = 6,
    /// `remote_create_file_proxies`.
    CreateFileProxies = 7,
    /// `remote_update_file_proxies`.
    UpdateFileProxies = 8,
    /// `register_file_providers`.
    RegisterFileProviders = 9,
    /// `reregister_file_providers`.
    ReregisterFileProviders = 10,
    /// `unregister_file_providers`.
    UnregisterFileProviders = 11,
}

impl BackendOrdinal {
    /// Recover a [`BackendOrdinal`] from its wire value, if it names one.
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0 => Self::RegisterDevices,
            1 => Self::UnregisterDevices,
            2 => Self::UnregisterAllDevices,
            3 => Self::CreateParameterProxies,
            4 => Self::UpdateParameterProxies,
            5 => Self::RegisterParameterProviders,
            6 => Self::UnregisterParameterProviders,
            7 => Self::CreateFileProxies,
            8 => Self::UpdateFileProxies,
            9 => Self::RegisterFileProviders,
            10 => Self::ReregisterFileProviders,
            11 => Self::UnregisterFileProviders,
            _ => return None,
        })
    }
}

/// Metadata pushed for a freshly allocated proxy id during step 2 of the
/// registration handshake (display name, provided selectors, capabilities).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyMetadata {
    /// Id of the stub object this metadata describes, allocated in step 1.
    pub object_id: ObjectId,
    /// Human-readable name shown to operators.
    pub display_name: String,
    /// Selectors (parameter paths, method ids) this provider serves.
    pub provided_selectors: Vec<String>,
}

impl Encode for ProxyMetadata {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> std::result::Result<(), CodecError> {
        self.object_id.encode(buf)?;
        self.display_name.encode(buf)?;
        self.provided_selectors.encode(buf)
    }
}

impl Decode for ProxyMetadata {
    fn decode(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            object_id: u32::decode(reader)?,
            display_name: String::decode(reader)?,
            provided_selectors: Vec::<String>::decode(reader)?,
        })
    }
}

/// The calls a [`BackendProxy`] issues against the remote backend stub.
///
/// An IPC-backed implementation (in `wdx-client`) encodes each call through
/// a [`crate::Manager`] and awaits the matching reply via a
/// [`crate::proxy::CallTable`]; a test double can implement this trait
/// directly against in-memory state.
#[async_trait]
pub trait BackendPeer: Send + Sync {
    async fn remote_register_devices(&self, devices: &[DeviceRegistration]) -> Result<Vec<Response>>;
    async fn remote_unregister_devices(&self, ids: &[DeviceId]) -> Result<Vec<Response>>;
    async fn remote_unregister_all_devices(&self, collection_id: u32) -> Result<Response>;

    async fn remote_create_parameter_proxies(&self, count: u32) -> Result<Vec<ObjectId>>;
    async fn remote_update_parameter_proxies(&self, metadata: &[ProxyMetadata]) -> Result<()>;
    async fn remote_register_parameter_providers(
        &self,
        providers: &[ProviderRef],
        call_mode: CallMode,
    ) -> Result<Vec<Response>>;
    async fn remote_unregister_parameter_providers(&self, providers: &[ProviderRef]) -> Result<()>;

    async fn remote_create_file_proxies(&self, count: u32) -> Result<Vec<ObjectId>>;
    async fn remote_update_file_proxies(&self, metadata: &[ProxyMetadata]) -> Result<()>;
    async fn remote_register_file_providers(
        &self,
        providers: &[ProviderRef],
        context: FileContext,
        call_mode: CallMode,
    ) -> Result<Vec<FileIdResponse>>;
    async fn remote_reregister_file_providers(
        &self,
        providers: &[(ProviderRef, String)],
        context: FileContext,
        call_mode: CallMode,
    ) -> Result<Vec<FileIdResponse>>;
    async fn remote_unregister_file_providers(&self, providers: &[ProviderRef]) -> Result<()>;
}

/// A successfully completed parameter-provider registration, cached for
/// replay after a reconnect.
#[derive(Debug, Clone)]
struct ParameterRegistration {
    provider: ProviderRef,
    metadata: ProxyMetadata,
    call_mode: CallMode,
}

/// A successfully completed file-provider registration, cached for replay.
#[derive(Debug, Clone)]
struct FileRegistration {
    provider: ProviderRef,
    metadata: ProxyMetadata,
    call_mode: CallMode,
    context: FileContext,
    file_id: String,
}

/// Caches every successful registration so `reregister_*` can replay it
/// without the original caller's involvement, per §4.6.
#[derive(Default)]
struct RegistrationCache {
    devices: Vec<DeviceRegistration>,
    parameter_providers: Vec<ParameterRegistration>,
    file_providers: Vec<FileRegistration>,
}

/// Client-side driver of the backend registration lifecycle.
pub struct BackendProxy<P: BackendPeer> {
    peer: P,
    cache: Mutex<RegistrationCache>,
}

impl<P: BackendPeer> BackendProxy<P> {
    /// Wrap `peer`, the remote backend stub to drive calls against.
    pub fn new(peer: P) -> Self {
        Self { peer, cache: Mutex::new(RegistrationCache::default()) }
    }

    /// Replace the peer this proxy drives calls against, e.g. after a
    /// reconnect establishes a connection to a fresh backend stub. The
    /// replay cache survives the swap, so a subsequent
    /// [`BackendProxy::reregister_providers`] replays everything recorded
    /// against the old peer onto the new one.
    pub fn set_peer(&mut self, peer: P) {
        self.peer = peer;
    }

    /// Register `devices`, caching every one the peer accepted so a later
    /// `reregister_devices` can replay it.
    pub async fn register_devices(&self, devices: Vec<DeviceRegistration>) -> Result<Vec<Response>> {
        let responses = self.peer.remote_register_devices(&devices).await?;
        let mut cache = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (device, response) in devices.into_iter().zip(&responses) {
            if response.status.is_ok() {
                cache.devices.retain(|d| d.device_id() != device.device_id());
                cache.devices.push(device);
            }
        }
        Ok(responses)
    }

    /// Unregister `ids`, dropping them from the replay cache regardless of
    /// per-id outcome (mirroring the peer's own bookkeeping: an id this
    /// proxy no longer wants registered should not resurrect on reconnect).
    pub async fn unregister_devices(&self, ids: Vec<DeviceId>) -> Result<Vec<Response>> {
        let responses = self.peer.remote_unregister_devices(&ids).await?;
        let mut cache = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        cache.devices.retain(|d| !ids.contains(&d.device_id()));
        Ok(responses)
    }

    /// Unregister every device in `collection_id`.
    pub async fn unregister_all_devices(&self, collection_id: u32) -> Result<Response> {
        let response = self.peer.remote_unregister_all_devices(collection_id).await?;
        let mut cache = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        cache.devices.retain(|d| d.collection_id != collection_id);
        Ok(response)
    }

    /// Replay every cached device registration against the current peer.
    /// Used after a reconnect establishes a fresh connection (and thus a
    /// fresh backend stub with no memory of prior registrations).
    pub async fn reregister_devices(&self) -> Result<Vec<Response>> {
        let devices = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner).devices.clone();
        if devices.is_empty() {
            return Ok(Vec::new());
        }
        self.peer.remote_register_devices(&devices).await
    }

    /// Register parameter providers via the three-step handshake: allocate
    /// stub ids, push metadata, then register with the daemon's local
    /// backend using those ids as callback targets.
    pub async fn register_parameter_providers(
        &self,
        count: u32,
        call_mode: CallMode,
        metadata_of: impl Fn(ObjectId) -> ProxyMetadata,
    ) -> Result<Vec<Response>> {
        let ids = self.peer.remote_create_parameter_proxies(count).await?;
        let metadata: Vec<ProxyMetadata> = ids.iter().map(|&id| metadata_of(id)).collect();
        self.peer.remote_update_parameter_proxies(&metadata).await?;

        let providers: Vec<ProviderRef> = ids.iter().map(|&id| ProviderRef { proxy_object_id: id }).collect();
        let responses = self.peer.remote_register_parameter_providers(&providers, call_mode).await?;

        let mut cache = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for ((provider, meta), response) in providers.into_iter().zip(metadata).zip(&responses) {
            if response.status.is_ok() {
                cache.parameter_providers.push(ParameterRegistration { provider, metadata: meta, call_mode });
            }
        }
        Ok(responses)
    }

    /// Unregister parameter providers and drop them from the replay cache.
    pub async fn unregister_parameter_providers(&self, providers: Vec<ProviderRef>) -> Result<()> {
        self.peer.remote_unregister_parameter_providers(&providers).await?;
        let mut cache = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        cache.parameter_providers.retain(|r| !providers.contains(&r.provider));
        Ok(())
    }

    /// Register file providers under `context` (the parameter-instance path
    /// they serve). The reply carries the newly assigned file id, cached so
    /// `reregister_file_providers` can reuse it.
    pub async fn register_file_providers(
        &self,
        count: u32,
        context: FileContext,
        call_mode: CallMode,
        metadata_of: impl Fn(ObjectId) -> ProxyMetadata,
    ) -> Result<Vec<FileIdResponse>> {
        let ids = self.peer.remote_create_file_proxies(count).await?;
        let metadata: Vec<ProxyMetadata> = ids.iter().map(|&id| metadata_of(id)).collect();
        self.peer.remote_update_file_proxies(&metadata).await?;

        let providers: Vec<ProviderRef> = ids.iter().map(|&id| ProviderRef { proxy_object_id: id }).collect();
        let responses = self.peer.remote_register_file_providers(&providers, context.clone(), call_mode).await?;

        let mut cache = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for ((provider, meta), response) in providers.into_iter().zip(metadata).zip(&responses) {
            if let Some(file_id) = response.status.is_ok().then(|| response.file_id.clone()).flatten() {
                cache.file_providers.push(
                    ParameterRegistration { provider, metadata: meta, call_mode }.into_file(context.clone(), file_id),
                );
            }
        }
        Ok(responses)
    }

    /// Unregister file providers and drop them from the replay cache.
    pub async fn unregister_file_providers(&self, providers: Vec<ProviderRef>) -> Result<()> {
        self.peer.remote_unregister_file_providers(&providers).await?;
        let mut cache = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        cache.file_providers.retain(|r| !providers.contains(&r.provider));
        Ok(())
    }

    /// Replay every cached registration after a reconnect, in the order
    /// the original daemon expects: devices, then parameter providers,
    /// then file providers (each via the full three-step handshake again,
    /// since the new connection's peer has no memory of the old proxy
    /// ids).
    pub async fn reregister_providers(&self) -> Result<()> {
        self.reregister_devices().await?;

        let parameter_providers =
            self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner).parameter_providers.clone();
        for reg in parameter_providers {
            let ids = self.peer.remote_create_parameter_proxies(1).await?;
            let metadata =
                vec![ProxyMetadata { object_id: ids[0], display_name: reg.metadata.display_name, provided_selectors: reg.metadata.provided_selectors }];
            self.peer.remote_update_parameter_proxies(&metadata).await?;
            let providers = vec![ProviderRef { proxy_object_id: ids[0] }];
            self.peer.remote_register_parameter_providers(&providers, reg.call_mode).await?;
        }

        let file_providers =
            self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner).file_providers.clone();
        for reg in file_providers {
            let ids = self.peer.remote_create_file_proxies(1).await?;
            let metadata =
                vec![ProxyMetadata { object_id: ids[0], display_name: reg.metadata.display_name, provided_selectors: reg.metadata.provided_selectors }];
            self.peer.remote_update_file_proxies(&metadata).await?;
            let providers = vec![(ProviderRef { proxy_object_id: ids[0] }, reg.file_id)];
            self.peer.remote_reregister_file_providers(&providers, reg.context, reg.call_mode).await?;
        }

        Ok(())
    }
}

impl ParameterRegistration {
    fn into_file(self, context: FileContext, file_id: String) -> FileRegistration {
        FileRegistration { provider: self.provider, metadata: self.metadata, call_mode: self.call_mode, context, file_id }
    }
}
