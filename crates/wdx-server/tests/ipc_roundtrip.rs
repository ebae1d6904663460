//! Full-stack registration round trip: a real `wdx_client::Client` connects
//! to a real `wdx_server::Server` over TCP and registers a parameter
//! provider and a file provider, exercising the whole path from the
//! client's backend proxy through the wire codec to the daemon's
//! [`wdx_server`] backend stub and daemon registry.

use std::sync::Arc;

use async_trait::async_trait;
use wdx_files::{FileChunk, FileInfo, FileProvider, UploadId, WriteOutcome};
use wdx_ipc::{
    CallMode, CoreStatus, MethodResponse, ParamValue, ParameterProvider, SetRequest, SetResponse, UploadIdResponse,
    ValueResponse,
};
use wdx_server::{Server, ServerRuntimeConfig};

struct StubParameterProvider;

#[async_trait]
impl ParameterProvider for StubParameterProvider {
    async fn get_parameter_values(&self, ids: &[u32]) -> Vec<ValueResponse> {
        ids.iter().map(|&id| ValueResponse { status: CoreStatus::Ok, value: Some(ParamValue::I64(i64::from(id))) }).collect()
    }

    async fn set_parameter_values(&self, requests: &[SetRequest]) -> Vec<SetResponse> {
        requests.iter().map(|_| SetResponse { status: CoreStatus::Ok }).collect()
    }

    async fn set_parameter_values_connection_aware(&self, requests: &[SetRequest], _defer: bool) -> Vec<SetResponse> {
        self.set_parameter_values(requests).await
    }

    async fn invoke_method(&self, _method_id: u32, _args: &[ParamValue]) -> MethodResponse {
        MethodResponse { status: CoreStatus::Ok, return_values: vec![] }
    }

    async fn create_parameter_upload_id(&self, _context: &str) -> UploadIdResponse {
        UploadIdResponse { status: CoreStatus::Ok, file_id: Some("file-1".into()) }
    }

    async fn remove_parameter_upload_id(&self, _file_id: &str, _context: &str) -> UploadIdResponse {
        UploadIdResponse { status: CoreStatus::Ok, file_id: None }
    }
}

struct StubFileProvider;

#[async_trait]
impl FileProvider for StubFileProvider {
    async fn file_get_info(&self, _file_id: &str) -> FileInfo {
        FileInfo { status: CoreStatus::Ok, file_size: 4 }
    }

    async fn file_read(&self, _file_id: &str, _offset: u64, _length: usize) -> FileChunk {
        FileChunk { status: CoreStatus::Ok, data: b"abcd".to_vec() }
    }

    async fn file_create(&self, _file_id: &str, _content_length: u64) -> WriteOutcome {
        WriteOutcome { status: CoreStatus::Ok }
    }

    async fn file_write(&self, _file_id: &str, _offset: u64, _data: &[u8]) -> WriteOutcome {
        WriteOutcome { status: CoreStatus::Ok }
    }

    async fn create_parameter_upload_id(&self, _context: &str, _timeout_secs: u16) -> UploadId {
        UploadId { status: CoreStatus::Ok, file_id: "file-1".into() }
    }
}

#[tokio::test]
async fn client_registers_providers_against_a_live_daemon() {
    let config = ServerRuntimeConfig {
        ipc_bind_address: "127.0.0.1:0".to_string(),
        http_bind_address: "127.0.0.1:0".to_string(),
        ..ServerRuntimeConfig::default()
    };
    let server = Server::bind(config).await.expect("daemon binds both listeners");
    let ipc_addr = server.ipc_local_addr().expect("ipc listener has a local address");
    tokio::spawn(server.run());

    let client = wdx_client::Client::connect(&ipc_addr.to_string()).await.expect("client connects to the daemon");

    let parameter_response = client
        .host_parameter_provider(
            Arc::new(StubParameterProvider),
            "test-parameters",
            vec!["slot.1.value".to_string()],
            CallMode::Concurrent,
        )
        .await
        .expect("parameter provider registers");
    assert_eq!(parameter_response.status, CoreStatus::Ok);

    let file_response = client
        .host_file_provider(
            Arc::new(StubFileProvider),
            "test-files",
            vec!["slot.1.firmware".to_string()],
            "slot.1.firmware",
            CallMode::Serialized,
        )
        .await
        .expect("file provider registers");
    assert_eq!(file_response.status, CoreStatus::Ok);
    assert!(file_response.file_id.is_some());
}

#[tokio::test]
async fn reconnecting_and_replaying_restores_registrations_on_the_new_connection() {
    let config = ServerRuntimeConfig {
        ipc_bind_address: "127.0.0.1:0".to_string(),
        http_bind_address: "127.0.0.1:0".to_string(),
        ..ServerRuntimeConfig::default()
    };
    let server = Server::bind(config).await.expect("daemon binds both listeners");
    let ipc_addr = server.ipc_local_addr().expect("ipc listener has a local address");
    tokio::spawn(server.run());

    let mut client = wdx_client::Client::connect(&ipc_addr.to_string()).await.expect("client connects to the daemon");
    client
        .host_file_provider(Arc::new(StubFileProvider), "test-files", vec![], "slot.2.firmware", CallMode::Concurrent)
        .await
        .expect("first registration succeeds");

    // drop the first transport and dial a fresh one; the daemon's backend
    // stub on the new connection has no memory of the old registration.
    client.reconnect(&ipc_addr.to_string()).await.expect("client reconnects to the same daemon");

    client.reregister_providers().await.expect("replay onto the new connection succeeds");
}
