//! Wire-level driver for [`wdx_ipc::BackendPeer`]: encodes each backend
//! registration call to [`wdx_ipc::BACKEND_OBJECT_ID`] on the daemon and
//! awaits its reply.
//!
//! This is the client-side half of the backend proxy/stub pair (§4.6); the
//! daemon-side stub that decodes these calls and actually performs
//! registration lives in `wdx-server`.

use std::sync::Arc;

use async_trait::async_trait;
use wdx_codec::{Decode, Encode, Reader};
use wdx_ipc::{
    BackendOrdinal, BackendPeer, CallTable, DeviceId, DeviceRegistration, FileContext, FileIdResponse, ManagedObject,
    Manager, ObjectId, ProviderRef, ProxyMetadata, Response, Result as IpcResult, BACKEND_OBJECT_ID,
};

/// Client-side managed object at [`BACKEND_OBJECT_ID`]: implements
/// [`BackendPeer`] by encoding each call over `manager` and decodes the
/// daemon's replies as they arrive back at the same object id.
pub struct IpcBackendPeer {
    manager: Arc<Manager>,
    calls: CallTable,
}

impl IpcBackendPeer {
    /// Build a peer driving backend calls over `manager`. Must be inserted
    /// into `manager`'s object store at [`BACKEND_OBJECT_ID`] before any
    /// call is issued, so replies have somewhere to land.
    #[must_use]
    pub fn new(manager: Arc<Manager>) -> Self {
        Self { manager, calls: CallTable::default() }
    }

    async fn call(
        &self,
        ordinal: BackendOrdinal,
        encode_args: impl FnOnce(&mut Vec<u8>) -> IpcResult<()>,
    ) -> IpcResult<Vec<u8>> {
        let (call_id, rx) = self.calls.begin_call();
        let mut body = Vec::new();
        (ordinal as u16).encode(&mut body)?;
        call_id.encode(&mut body)?;
        encode_args(&mut body)?;
        self.manager.send(BACKEND_OBJECT_ID, body).await?;
        let reply = CallTable::await_reply(rx).await?;
        let mut reader = Reader::new(&reply);
        let _echoed_call_id = u64::decode(&mut reader)?;
        Ok(reader.take(reader.remaining(), "IpcBackendPeer::reply")?.to_vec())
    }
}

#[async_trait]
impl ManagedObject for IpcBackendPeer {
    fn id(&self) -> ObjectId {
        BACKEND_OBJECT_ID
    }

    async fn handle_message(&self, body: &[u8]) -> IpcResult<()> {
        let mut reader = Reader::new(body);
        let call_id = u64::decode(&mut reader)?;
        let payload = reader.take(reader.remaining(), "IpcBackendPeer::reply")?.to_vec();
        self.calls.complete(call_id, payload);
        Ok(())
    }

    fn on_transport_closed(&self) {
        self.calls.drop_all();
    }
}

#[async_trait]
impl BackendPeer for IpcBackendPeer {
    async fn remote_register_devices(&self, devices: &[DeviceRegistration]) -> IpcResult<Vec<Response>> {
        let raw = self
            .call(BackendOrdinal::RegisterDevices, |buf| devices.to_vec().encode(buf).map_err(Into::into))
            .await?;
        Ok(Vec::<Response>::decode(&mut Reader::new(&raw))?)
    }

    async fn remote_unregister_devices(&self, ids: &[DeviceId]) -> IpcResult<Vec<Response>> {
        let raw =
            self.call(BackendOrdinal::UnregisterDevices, |buf| ids.to_vec().encode(buf).map_err(Into::into)).await?;
        Ok(Vec::<Response>::decode(&mut Reader::new(&raw))?)
    }

    async fn remote_unregister_all_devices(&self, collection_id: u32) -> IpcResult<Response> {
        let raw =
            self.call(BackendOrdinal::UnregisterAllDevices, |buf| collection_id.encode(buf).map_err(Into::into)).await?;
        Ok(Response::decode(&mut Reader::new(&raw))?)
    }

    async fn remote_create_parameter_proxies(&self, count: u32) -> IpcResult<Vec<ObjectId>> {
        let raw =
            self.call(BackendOrdinal::CreateParameterProxies, |buf| count.encode(buf).map_err(Into::into)).await?;
        Ok(Vec::<u32>::decode(&mut Reader::new(&raw))?)
    }

    async fn remote_update_parameter_proxies(&self, metadata: &[ProxyMetadata]) -> IpcResult<()> {
        self.call(BackendOrdinal::UpdateParameterProxies, |buf| metadata.to_vec().encode(buf).map_err(Into::into))
            .await?;
        Ok(())
    }

    async fn remote_register_parameter_providers(
        &self,
        providers: &[ProviderRef],
        call_mode: wdx_ipc::CallMode,
    ) -> IpcResult<Vec<Response>> {
        let raw = self
            .call(BackendOrdinal::RegisterParameterProviders, |buf| {
                providers.to_vec().encode(buf)?;
                call_mode.encode(buf).map_err(Into::into)
            })
            .await?;
        Ok(Vec::<Response>::decode(&mut Reader::new(&raw))?)
    }

    async fn remote_unregister_parameter_providers(&self, providers: &[ProviderRef]) -> IpcResult<()> {
        self.call(BackendOrdinal::UnregisterParameterProviders, |buf| {
            providers.to_vec().encode(buf).map_err(Into::into)
        })
        .await?;
        Ok(())
    }

    async fn remote_create_file_proxies(&self, count: u32) -> IpcResult<Vec<ObjectId>> {
        let raw = self.call(BackendOrdinal::CreateFileProxies, |buf| count.encode(buf).map_err(Into::into)).await?;
        Ok(Vec::<u32>::decode(&mut Reader::new(&raw))?)
    }

    async fn remote_update_file_proxies(&self, metadata: &[ProxyMetadata]) -> IpcResult<()> {
        self.call(BackendOrdinal::UpdateFileProxies, |buf| metadata.to_vec().encode(buf).map_err(Into::into)).await?;
        Ok(())
    }

    async fn remote_register_file_providers(
        &self,
        providers: &[ProviderRef],
        context: FileContext,
        call_mode: wdx_ipc::CallMode,
    ) -> IpcResult<Vec<FileIdResponse>> {
        let raw = self
            .call(BackendOrdinal::RegisterFileProviders, |buf| {
                providers.to_vec().encode(buf)?;
                context.encode(buf)?;
                call_mode.encode(buf).map_err(Into::into)
            })
            .await?;
        Ok(Vec::<FileIdResponse>::decode(&mut Reader::new(&raw))?)
    }

    async fn remote_reregister_file_providers(
        &self,
        providers: &[(ProviderRef, String)],
        context: FileContext,
        call_mode: wdx_ipc::CallMode,
    ) -> IpcResult<Vec<FileIdResponse>> {
        let raw = self
            .call(BackendOrdinal::ReregisterFileProviders, |buf| {
                let ids: Vec<ProviderRef> = providers.iter().map(|(p, _)| *p).collect();
                let file_ids: Vec<String> = providers.iter().map(|(_, f)| f.clone()).collect();
                ids.encode(buf)?;
                file_ids.encode(buf)?;
                context.encode(buf)?;
                call_mode.encode(buf).map_err(Into::into)
            })
            .await?;
        Ok(Vec::<FileIdResponse>::decode(&mut Reader::new(&raw))?)
    }

    async fn remote_unregister_file_providers(&self, providers: &[ProviderRef]) -> IpcResult<()> {
        self.call(BackendOrdinal::UnregisterFileProviders, |buf| providers.to_vec().encode(buf).map_err(Into::into))
            .await?;
        Ok(())
    }
}

/// Forwards to the pointee so a shared [`IpcBackendPeer`] can both sit in a
/// [`Manager`]'s object store (to receive replies) and drive a
/// [`wdx_ipc::BackendProxy`] (which owns its peer by value).
#[async_trait]
impl BackendPeer for Arc<IpcBackendPeer> {
    async fn remote_register_devices(&self, devices: &[DeviceRegistration]) -> IpcResult<Vec<Response>> {
        self.as_ref().remote_register_devices(devices).await
    }

    async fn remote_unregister_devices(&self, ids: &[DeviceId]) -> IpcResult<Vec<Response>> {
        self.as_ref().remote_unregister_devices(ids).await
    }

    async fn remote_unregister_all_devices(&self, collection_id: u32) -> IpcResult<Response> {
        self.as_ref().remote_unregister_all_devices(collection_id).await
    }

    async fn remote_create_parameter_proxies(&self, count: u32) -> IpcResult<Vec<ObjectId>> {
        self.as_ref().remote_create_parameter_proxies(count).await
    }

    async fn remote_update_parameter_proxies(&self, metadata: &[ProxyMetadata]) -> IpcResult<()> {
        self.as_ref().remote_update_parameter_proxies(metadata).await
    }

    async fn remote_register_parameter_providers(
        &self,
        providers: &[ProviderRef],
        call_mode: wdx_ipc::CallMode,
    ) -> IpcResult<Vec<Response>> {
        self.as_ref().remote_register_parameter_providers(providers, call_mode).await
    }

    async fn remote_unregister_parameter_providers(&self, providers: &[ProviderRef]) -> IpcResult<()> {
        self.as_ref().remote_unregister_parameter_providers(providers).await
    }

    async fn remote_create_file_proxies(&self, count: u32) -> IpcResult<Vec<ObjectId>> {
        self.as_ref().remote_create_file_proxies(count).await
    }

    async fn remote_update_file_proxies(&self, metadata: &[ProxyMetadata]) -> IpcResult<()> {
        self.as_ref().remote_update_file_proxies(metadata).await
    }

    async fn remote_register_file_providers(
        &self,
        providers: &[ProviderRef],
        context: FileContext,
        call_mode: wdx_ipc::CallMode,
    ) -> IpcResult<Vec<FileIdResponse>> {
        self.as_ref().remote_register_file_providers(providers, context, call_mode).await
    }

    async fn remote_reregister_file_providers(
        &self,
        providers: &[(ProviderRef, String)],
        context: FileContext,
        call_mode: wdx_ipc::CallMode,
    ) -> IpcResult<Vec<FileIdResponse>> {
        self.as_ref().remote_reregister_file_providers(providers, context, call_mode).await
    }

    async fn remote_unregister_file_providers(&self, providers: &[ProviderRef]) -> IpcResult<()> {
        self.as_ref().remote_unregister_file_providers(providers).await
    }
}
