//! Managed-object IPC substrate.
//!
//! Bidirectional message framing over a [`wdx_transport::StreamAdapter`],
//! addressable managed objects (proxies on the caller side, stubs on the
//! callee side), per-object reference counting coordinated with
//! destruction, the backend registration lifecycle, and per-provider call
//! dispatch.

mod backend;
mod core_status;
mod dispatch;
mod error;
mod ids;
mod manager;
mod parameter;
mod proxy;
mod store;
mod types;

pub use backend::{BackendOrdinal, BackendPeer, BackendProxy, ProxyMetadata};
pub use core_status::CoreStatus;
pub use dispatch::ProviderDispatcher;
pub use error::{IpcError, Result};
pub use ids::{ObjectId, ObjectIdGenerator, BACKEND_OBJECT_ID, GENERATED_OBJECT_IDS_START};
pub use manager::Manager;
pub use parameter::{
    MethodResponse, ParamValue, ParameterProvider, ParameterProviderProxy, ParameterProviderStub, SetRequest,
    SetResponse, UploadIdResponse, ValueResponse,
};
pub use proxy::{CallId, CallTable};
pub use store::{ManagedObject, ObjectStore};
pub use types::{CallMode, DeviceId, DeviceRegistration, FileContext, FileIdResponse, ProviderRef, Response};
