//! IPC bridge for the [`FileProvider`] contract (§6 "File provider
//! contract").
//!
//! The HTTP engine in [`crate::routes`] only ever talks to a local
//! `Arc<dyn FileProvider>`; this module is what makes that provider real
//! across a process boundary. [`FileProviderStub`] lives on the client that
//! registered the file provider: it decodes incoming calls and forwards
//! them to the client's actual [`FileProvider`] implementation.
//! [`FileProviderProxy`] lives on the daemon: it implements [`FileProvider`]
//! itself by encoding each call and awaiting the stub's reply, so the HTTP
//! routes never need to know a file's bytes live on the other end of a
//! wire.

use std::sync::Arc;

use async_trait::async_trait;
use wdx_codec::{CodecError, Decode, Encode, Reader};
use wdx_ipc::{CallTable, CoreStatus, ManagedObject, Manager, ObjectId, Result as IpcResult};

use crate::provider::{FileChunk, FileInfo, FileProvider, UploadId, WriteOutcome};

#[repr(u16)]
enum MethodOrdinal {
    GetInfo = 0,
    Read = 1,
    Create = 2,
    Write = 3,
    CreateUploadId = 4,
}

/// Client-side managed object: decodes
/// `(method_ordinal, call_id, args…)` calls addressed to this file
/// provider's object id and invokes the locally registered
/// [`FileProvider`].
pub struct FileProviderStub {
    id: ObjectId,
    target: Arc<dyn FileProvider>,
    manager: Arc<Manager>,
}

impl FileProviderStub {
    /// Build a stub at `id` forwarding decoded calls to `target`, replying
    /// over `manager`.
    #[must_use]
    pub fn new(id: ObjectId, target: Arc<dyn FileProvider>, manager: Arc<Manager>) -> Self {
        Self { id, target, manager }
    }
}

#[async_trait]
impl ManagedObject for FileProviderStub {
    fn id(&self) -> ObjectId {
        self.id
    }

    async fn handle_message(&self, body: &[u8]) -> IpcResult<()> {
        let mut reader = Reader::new(body);
        let ordinal = u16::decode(&mut reader)?;
        let call_id = u64::decode(&mut reader)?;

        let mut reply = Vec::new();
        call_id.encode(&mut reply)?;

        match ordinal {
            ord if ord == MethodOrdinal::GetInfo as u16 => {
                let file_id = String::decode(&mut reader)?;
                let info = self.target.file_get_info(&file_id).await;
                info.status.encode(&mut reply)?;
                info.file_size.encode(&mut reply)?;
            }
            ord if ord == MethodOrdinal::Read as u16 => {
                let file_id = String::decode(&mut reader)?;
                let offset = u64::decode(&mut reader)?;
                let length = u64::decode(&mut reader)? as usize;
                let chunk = self.target.file_read(&file_id, offset, length).await;
                // fast path per §4.1: status then raw data, no extra framing
                chunk.status.encode(&mut reply)?;
                chunk.data.encode(&mut reply)?;
            }
            ord if ord == MethodOrdinal::Create as u16 => {
                let file_id = String::decode(&mut reader)?;
                let content_length = u64::decode(&mut reader)?;
                let outcome = self.target.file_create(&file_id, content_length).await;
                outcome.status.encode(&mut reply)?;
            }
            ord if ord == MethodOrdinal::Write as u16 => {
                let file_id = String::decode(&mut reader)?;
                let offset = u64::decode(&mut reader)?;
                let data = Vec::<u8>::decode(&mut reader)?;
                let outcome = self.target.file_write(&file_id, offset, &data).await;
                outcome.status.encode(&mut reply)?;
            }
            ord if ord == MethodOrdinal::CreateUploadId as u16 => {
                let context = String::decode(&mut reader)?;
                let timeout_secs = u16::decode(&mut reader)?;
                let upload_id = self.target.create_parameter_upload_id(&context, timeout_secs).await;
                upload_id.status.encode(&mut reply)?;
                upload_id.file_id.encode(&mut reply)?;
            }
            other => {
                return Err(CodecError::Malformed {
                    type_name: "FileProviderStub::ordinal",
                    reason: format!("unknown ordinal {other}"),
                }
                .into());
            }
        }

        self.manager.send(self.id, reply).await
    }
}

/// Daemon-side handle to a remote file provider: implements
/// [`FileProvider`] by encoding each call and awaiting the stub's reply
/// over `manager`.
pub struct FileProviderProxy {
    id: ObjectId,
    manager: Arc<Manager>,
    calls: CallTable,
}

impl FileProviderProxy {
    /// Build a proxy addressing the remote stub at `id` over `manager`.
    #[must_use]
    pub fn new(id: ObjectId, manager: Arc<Manager>) -> Self {
        Self { id, manager, calls: CallTable::default() }
    }

    async fn call(&self, ordinal: MethodOrdinal, encode_args: impl FnOnce(&mut Vec<u8>) -> IpcResult<()>) -> IpcResult<Vec<u8>> {
        let (call_id, rx) = self.calls.begin_call();
        let mut body = Vec::new();
        (ordinal as u16).encode(&mut body)?;
        call_id.encode(&mut body)?;
        encode_args(&mut body)?;
        self.manager.send(self.id, body).await?;
        let reply = CallTable::await_reply(rx).await?;
        let mut reader = Reader::new(&reply);
        let _echoed_call_id = u64::decode(&mut reader)?;
        Ok(reader.take(reader.remaining(), "FileProviderProxy::reply")?.to_vec())
    }
}

#[async_trait]
impl ManagedObject for FileProviderProxy {
    fn id(&self) -> ObjectId {
        self.id
    }

    async fn handle_message(&self, body: &[u8]) -> IpcResult<()> {
        let mut reader = Reader::new(body);
        let call_id = u64::decode(&mut reader)?;
        let payload = reader.take(reader.remaining(), "FileProviderProxy::reply")?.to_vec();
        self.calls.complete(call_id, payload);
        Ok(())
    }

    fn on_transport_closed(&self) {
        self.calls.drop_all();
    }
}

#[async_trait]
impl FileProvider for FileProviderProxy {
    async fn file_get_info(&self, file_id: &str) -> FileInfo {
        let Ok(raw) =
            self.call(MethodOrdinal::GetInfo, |buf| file_id.to_string().encode(buf).map_err(Into::into)).await
        else {
            return FileInfo { status: CoreStatus::FileNotAccessible, file_size: 0 };
        };
        let mut reader = Reader::new(&raw);
        let Ok(status) = CoreStatus::decode(&mut reader) else {
            return FileInfo { status: CoreStatus::FileNotAccessible, file_size: 0 };
        };
        let file_size = u64::decode(&mut reader).unwrap_or(0);
        FileInfo { status, file_size }
    }

    async fn file_read(&self, file_id: &str, offset: u64, length: usize) -> FileChunk {
        let Ok(raw) = self
            .call(MethodOrdinal::Read, |buf| {
                file_id.to_string().encode(buf)?;
                offset.encode(buf)?;
                (length as u64).encode(buf).map_err(Into::into)
            })
            .await
        else {
            return FileChunk { status: CoreStatus::FileNotAccessible, data: Vec::new() };
        };
        let mut reader = Reader::new(&raw);
        let Ok(status) = CoreStatus::decode(&mut reader) else {
            return FileChunk { status: CoreStatus::FileNotAccessible, data: Vec::new() };
        };
        let data = Vec::<u8>::decode(&mut reader).unwrap_or_default();
        FileChunk { status, data }
    }

    async fn file_create(&self, file_id: &str, content_length: u64) -> WriteOutcome {
        let Ok(raw) = self
            .call(MethodOrdinal::Create, |buf| {
                file_id.to_string().encode(buf)?;
                content_length.encode(buf).map_err(Into::into)
            })
            .await
        else {
            return WriteOutcome { status: CoreStatus::FileNotAccessible };
        };
        decode_write_outcome(&raw)
    }

    async fn file_write(&self, file_id: &str, offset: u64, data: &[u8]) -> WriteOutcome {
        let Ok(raw) = self
            .call(MethodOrdinal::Write, |buf| {
                file_id.to_string().encode(buf)?;
                offset.encode(buf)?;
                data.to_vec().encode(buf).map_err(Into::into)
            })
            .await
        else {
            return WriteOutcome { status: CoreStatus::FileNotAccessible };
        };
        decode_write_outcome(&raw)
    }

    async fn create_parameter_upload_id(&self, context: &str, timeout_secs: u16) -> UploadId {
        let Ok(raw) = self
            .call(MethodOrdinal::CreateUploadId, |buf| {
                context.to_string().encode(buf)?;
                timeout_secs.encode(buf).map_err(Into::into)
            })
            .await
        else {
            return UploadId { status: CoreStatus::FileNotAccessible, file_id: String::new() };
        };
        let mut reader = Reader::new(&raw);
        let Ok(status) = CoreStatus::decode(&mut reader) else {
            return UploadId { status: CoreStatus::FileNotAccessible, file_id: String::new() };
        };
        let file_id = String::decode(&mut reader).unwrap_or_default();
        UploadId { status, file_id }
    }
}

fn decode_write_outcome(raw: &[u8]) -> WriteOutcome {
    let mut reader = Reader::new(raw);
    let status = CoreStatus::decode(&mut reader).unwrap_or(CoreStatus::FileNotAccessible);
    WriteOutcome { status }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use tokio::sync::Mutex as AsyncMutex;
    use wdx_transport::{ConnectionInfo, StreamAdapter};

    use super::*;

    struct InMemoryFileProvider {
        files: AsyncMutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl FileProvider for InMemoryFileProvider {
        async fn file_get_info(&self, file_id: &str) -> FileInfo {
            match self.files.lock().await.get(file_id) {
                Some(data) => FileInfo { status: CoreStatus::Ok, file_size: data.len() as u64 },
                None => FileInfo { status: CoreStatus::UnknownFileId, file_size: 0 },
            }
        }

        async fn file_read(&self, file_id: &str, offset: u64, length: usize) -> FileChunk {
            match self.files.lock().await.get(file_id) {
                Some(data) => {
                    let start = offset as usize;
                    let end = (start + length).min(data.len());
                    FileChunk { status: CoreStatus::Ok, data: data[start..end].to_vec() }
                }
                None => FileChunk { status: CoreStatus::UnknownFileId, data: Vec::new() },
            }
        }

        async fn file_create(&self, file_id: &str, content_length: u64) -> WriteOutcome {
            self.files.lock().await.insert(file_id.to_string(), vec![0u8; content_length as usize]);
            WriteOutcome { status: CoreStatus::Ok }
        }

        async fn file_write(&self, file_id: &str, offset: u64, data: &[u8]) -> WriteOutcome {
            let mut files = self.files.lock().await;
            let Some(existing) = files.get_mut(file_id) else {
                return WriteOutcome { status: CoreStatus::UnknownFileId };
            };
            let start = offset as usize;
            existing[start..start + data.len()].copy_from_slice(data);
            WriteOutcome { status: CoreStatus::Ok }
        }

        async fn create_parameter_upload_id(&self, _context: &str, _timeout_secs: u16) -> UploadId {
            UploadId { status: CoreStatus::Ok, file_id: "new-file".into() }
        }
    }

    struct LoopbackAdapter {
        inbox: tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>,
        outbox: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
    }

    #[async_trait]
    impl StreamAdapter for LoopbackAdapter {
        async fn send(&mut self, data: &[u8]) -> wdx_transport::Result<()> {
            self.outbox.send(data.to_vec()).map_err(|_| wdx_transport::TransportError::Closed)
        }

        async fn receive(&mut self) -> wdx_transport::Result<Vec<u8>> {
            self.inbox.recv().await.ok_or(wdx_transport::TransportError::Closed)
        }

        fn connection_info(&self) -> ConnectionInfo {
            ConnectionInfo { local: "mem".into(), peer: "mem".into() }
        }
    }

    #[tokio::test]
    async fn proxy_round_trips_create_write_and_read_through_a_stub() {
        let (client_tx, client_rx) = tokio::sync::mpsc::unbounded_channel();
        let (daemon_tx, daemon_rx) = tokio::sync::mpsc::unbounded_channel();

        let daemon_manager =
            Arc::new(Manager::new("daemon", Box::new(LoopbackAdapter { inbox: daemon_rx, outbox: client_tx })));
        let client_manager =
            Arc::new(Manager::new("client", Box::new(LoopbackAdapter { inbox: client_rx, outbox: daemon_tx })));

        let provider = Arc::new(InMemoryFileProvider { files: AsyncMutex::new(HashMap::new()) });
        let stub = Arc::new(FileProviderStub::new(7, provider, Arc::clone(&client_manager)));
        client_manager.object_store().add(stub).unwrap();

        let proxy = Arc::new(FileProviderProxy::new(7, Arc::clone(&daemon_manager)));
        daemon_manager.object_store().add(Arc::clone(&proxy) as Arc<dyn ManagedObject>).unwrap();

        tokio::spawn({
            let client_manager = Arc::clone(&client_manager);
            async move {
                loop {
                    if client_manager.receive_one().await.is_err() {
                        break;
                    }
                }
            }
        });

        let create = {
            let proxy = Arc::clone(&proxy);
            tokio::spawn(async move { proxy.file_create("f1", 5).await })
        };
        daemon_manager.receive_one().await.unwrap();
        assert_eq!(create.await.unwrap().status, CoreStatus::Ok);

        let write = {
            let proxy = Arc::clone(&proxy);
            tokio::spawn(async move { proxy.file_write("f1", 0, &[1, 2, 3, 4, 5]).await })
        };
        daemon_manager.receive_one().await.unwrap();
        assert_eq!(write.await.unwrap().status, CoreStatus::Ok);

        let read = {
            let proxy = Arc::clone(&proxy);
            tokio::spawn(async move { proxy.file_read("f1", 1, 3).await })
        };
        daemon_manager.receive_one().await.unwrap();
        let chunk = read.await.unwrap();
        assert_eq!(chunk.status, CoreStatus::Ok);
        assert_eq!(chunk.data, vec![2, 3, 4]);
    }
}
