//! Parameter-provider proxy/stub pair (§6 "Provider contract").
//!
//! Generated-surface analogue of [`crate::backend`] for the provider side:
//! a daemon-side [`ParameterProviderProxy`] encodes
//! `get_parameter_values`/`set_parameter_values`/`invoke_method`/upload-id
//! calls and awaits the reply; a client-side [`ParameterProviderStub`]
//! decodes them, invokes a local [`ParameterProvider`] implementation, and
//! encodes the reply. Both share one object id, allocated for this provider
//! during the backend registration handshake (§4.6).

use std::sync::Arc;

use async_trait::async_trait;
use wdx_codec::{CodecError, Decode, Encode, Reader};

use crate::{
    core_status::CoreStatus,
    error::Result,
    ids::ObjectId,
    manager::Manager,
    proxy::CallTable,
    store::ManagedObject,
};

/// A single scalar parameter value. Stands in for the spec's
/// domain-specific parameter-value serializer (§4.1): real deployments
/// would plug a WDx value type here via [`wdx_codec::Domain`], but the wire
/// shape — a tagged union framed like any other composite — is the same.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Boolean parameter value.
    Bool(bool),
    /// Signed 64-bit integer parameter value.
    I64(i64),
    /// Double-precision floating point parameter value.
    F64(f64),
    /// UTF-8 string parameter value.
    Str(String),
    /// Opaque byte-string parameter value.
    Bytes(Vec<u8>),
}

impl Encode for ParamValue {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> std::result::Result<(), CodecError> {
        match self {
            ParamValue::Bool(v) => {
                0u8.encode(buf)?;
                v.encode(buf)
            }
            ParamValue::I64(v) => {
                1u8.encode(buf)?;
                v.encode(buf)
            }
            ParamValue::F64(v) => {
                2u8.encode(buf)?;
                v.encode(buf)
            }
            ParamValue::Str(v) => {
                3u8.encode(buf)?;
                v.encode(buf)
            }
            ParamValue::Bytes(v) => {
                4u8.encode(buf)?;
                v.encode(buf)
            }
        }
    }
}

impl Decode for ParamValue {
    fn decode(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(match u8::decode(reader)? {
            0 => ParamValue::Bool(bool::decode(reader)?),
            1 => ParamValue::I64(i64::decode(reader)?),
            2 => ParamValue::F64(f64::decode(reader)?),
            3 => ParamValue::Str(String::decode(reader)?),
            4 => ParamValue::Bytes(Vec::<u8>::decode(reader)?),
            other => {
                return Err(CodecError::Malformed { type_name: "ParamValue", reason: format!("unknown tag {other}") })
            }
        })
    }
}

/// Outcome of reading or writing a single parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueResponse {
    /// Domain status of this single value.
    pub status: CoreStatus,
    /// The value, present iff `status.is_ok()` and this was a read.
    pub value: Option<ParamValue>,
}

impl Encode for ValueResponse {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> std::result::Result<(), CodecError> {
        self.status.encode(buf)?;
        self.value.encode(buf)
    }
}

impl Decode for ValueResponse {
    fn decode(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(Self { status: CoreStatus::decode(reader)?, value: Option::<ParamValue>::decode(reader)? })
    }
}

/// A request to set one parameter to `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct SetRequest {
    /// Id of the parameter to set.
    pub parameter_id: u32,
    /// Value to assign.
    pub value: ParamValue,
}

impl Encode for SetRequest {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> std::result::Result<(), CodecError> {
        self.parameter_id.encode(buf)?;
        self.value.encode(buf)
    }
}

impl Decode for SetRequest {
    fn decode(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(Self { parameter_id: u32::decode(reader)?, value: ParamValue::decode(reader)? })
    }
}

/// Outcome of setting one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetResponse {
    /// Domain status of this single set.
    pub status: CoreStatus,
}

impl Encode for SetResponse {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> std::result::Result<(), CodecError> {
        self.status.encode(buf)
    }
}

impl Decode for SetResponse {
    fn decode(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(Self { status: CoreStatus::decode(reader)? })
    }
}

/// Outcome of invoking a method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodResponse {
    /// Domain status of the invocation.
    pub status: CoreStatus,
    /// Return values, in declaration order. Empty unless `status.is_ok()`.
    pub return_values: Vec<ParamValue>,
}

impl Encode for MethodResponse {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> std::result::Result<(), CodecError> {
        self.status.encode(buf)?;
        self.return_values.encode(buf)
    }
}

impl Decode for MethodResponse {
    fn decode(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(Self { status: CoreStatus::decode(reader)?, return_values: Vec::<ParamValue>::decode(reader)? })
    }
}

/// Outcome of allocating (or releasing) a parameter upload id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadIdResponse {
    /// Domain status of the allocation.
    pub status: CoreStatus,
    /// Newly allocated file id. Present iff `status.is_ok()` and this was
    /// a `create_parameter_upload_id` call.
    pub file_id: Option<String>,
}

impl Encode for UploadIdResponse {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> std::result::Result<(), CodecError> {
        self.status.encode(buf)?;
        self.file_id.encode(buf)
    }
}

impl Decode for UploadIdResponse {
    fn decode(reader: &mut Reader<'_>) -> std::result::Result<Self, CodecError> {
        Ok(Self { status: CoreStatus::decode(reader)?, file_id: Option::<String>::decode(reader)? })
    }
}

/// Local interface a parameter-provider stub invokes once it has decoded an
/// incoming call. Implemented by whatever out-of-process client code
/// actually owns the parameters (device drivers, simulators, …).
#[async_trait]
pub trait ParameterProvider: Send + Sync {
    /// Read the current value of each requested parameter id.
    async fn get_parameter_values(&self, ids: &[u32]) -> Vec<ValueResponse>;

    /// Write each requested `(parameter_id, value)` pair.
    async fn set_parameter_values(&self, requests: &[SetRequest]) -> Vec<SetResponse>;

    /// Write each requested pair, `defer` hinting the provider may batch
    /// the write with others on the same connection before it takes
    /// effect.
    async fn set_parameter_values_connection_aware(&self, requests: &[SetRequest], defer: bool) -> Vec<SetResponse>;

    /// Invoke method `method_id` with `args`.
    async fn invoke_method(&self, method_id: u32, args: &[ParamValue]) -> MethodResponse;

    /// Allocate a fresh upload id scoped to the parameter-instance path
    /// `context`.
    async fn create_parameter_upload_id(&self, context: &str) -> UploadIdResponse;

    /// Release a previously allocated upload id.
    async fn remove_parameter_upload_id(&self, file_id: &str, context: &str) -> UploadIdResponse;
}

#[repr(u16)]
enum MethodOrdinal {
    GetParameterValues = 0,
    SetParameterValues = 1,
    SetParameterValuesConnectionAware = 2,
    InvokeMethod = 3,
    CreateParameterUploadId = 4,
    RemoveParameterUploadId = 5,
}

/// Client-side managed object: decodes an incoming
/// `(method_ordinal, call_id, args…)` call, dispatches it to a local
/// [`ParameterProvider`], and sends back `(call_id, reply…)`.
pub struct ParameterProviderStub {
    id: ObjectId,
    target: Arc<dyn ParameterProvider>,
    manager: Arc<Manager>,
}

impl ParameterProviderStub {
    /// Build a stub at `id` forwarding decoded calls to `target`, replying
    /// over `manager`.
    #[must_use]
    pub fn new(id: ObjectId, target: Arc<dyn ParameterProvider>, manager: Arc<Manager>) -> Self {
        Self { id, target, manager }
    }
}

#[async_trait]
impl ManagedObject for ParameterProviderStub {
    fn id(&self) -> ObjectId {
        self.id
    }

    async fn handle_message(&self, body: &[u8]) -> Result<()> {
        let mut reader = Reader::new(body);
        let ordinal = u16::decode(&mut reader)?;
        let call_id = u64::decode(&mut reader)?;

        let mut reply = Vec::new();
        call_id.encode(&mut reply)?;

        match ordinal {
            ord if ord == MethodOrdinal::GetParameterValues as u16 => {
                let ids = Vec::<u32>::decode(&mut reader)?;
                self.target.get_parameter_values(&ids).await.encode(&mut reply)?;
            }
            ord if ord == MethodOrdinal::SetParameterValues as u16 => {
                let requests = Vec::<SetRequest>::decode(&mut reader)?;
                self.target.set_parameter_values(&requests).await.encode(&mut reply)?;
            }
            ord if ord == MethodOrdinal::SetParameterValuesConnectionAware as u16 => {
                let requests = Vec::<SetRequest>::decode(&mut reader)?;
                let defer = bool::decode(&mut reader)?;
                self.target.set_parameter_values_connection_aware(&requests, defer).await.encode(&mut reply)?;
            }
            ord if ord == MethodOrdinal::InvokeMethod as u16 => {
                let method_id = u32::decode(&mut reader)?;
                let args = Vec::<ParamValue>::decode(&mut reader)?;
                self.target.invoke_method(method_id, &args).await.encode(&mut reply)?;
            }
            ord if ord == MethodOrdinal::CreateParameterUploadId as u16 => {
                let context = String::decode(&mut reader)?;
                self.target.create_parameter_upload_id(&context).await.encode(&mut reply)?;
            }
            ord if ord == MethodOrdinal::RemoveParameterUploadId as u16 => {
                let file_id = String::decode(&mut reader)?;
                let context = String::decode(&mut reader)?;
                self.target.remove_parameter_upload_id(&file_id, &context).await.encode(&mut reply)?;
            }
            other => {
                return Err(CodecError::Malformed {
                    type_name: "ParameterProviderStub::ordinal",
                    reason: format!("unknown ordinal {other}"),
                }
                .into());
            }
        }

        self.manager.send(self.id, reply).await
    }
}

/// Daemon-side handle to a remote parameter provider: encodes each
/// [`ParameterProvider`] method as a call and awaits the stub's reply.
pub struct ParameterProviderProxy {
    id: ObjectId,
    manager: Arc<Manager>,
    calls: CallTable,
}

impl ParameterProviderProxy {
    /// Build a proxy addressing the remote stub at `id` over `manager`.
    #[must_use]
    pub fn new(id: ObjectId, manager: Arc<Manager>) -> Self {
        Self { id, manager, calls: CallTable::default() }
    }

    async fn call(&self, ordinal: MethodOrdinal, encode_args: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> Result<Vec<u8>> {
        let (call_id, rx) = self.calls.begin_call();
        let mut body = Vec::new();
        (ordinal as u16).encode(&mut body)?;
        call_id.encode(&mut body)?;
        encode_args(&mut body)?;
        self.manager.send(self.id, body).await?;
        let reply = CallTable::await_reply(rx).await?;
        let mut reader = Reader::new(&reply);
        let _echoed_call_id = u64::decode(&mut reader)?;
        Ok(reader.take(reader.remaining(), "ParameterProviderProxy::reply")?.to_vec())
    }
}

#[async_trait]
impl ManagedObject for ParameterProviderProxy {
    fn id(&self) -> ObjectId {
        self.id
    }

    async fn handle_message(&self, body: &[u8]) -> Result<()> {
        let mut reader = Reader::new(body);
        let call_id = u64::decode(&mut reader)?;
        let payload = reader.take(reader.remaining(), "ParameterProviderProxy::reply")?.to_vec();
        self.calls.complete(call_id, payload);
        Ok(())
    }

    fn on_transport_closed(&self) {
        self.calls.drop_all();
    }
}

#[async_trait]
impl ParameterProvider for ParameterProviderProxy {
    async fn get_parameter_values(&self, ids: &[u32]) -> Vec<ValueResponse> {
        let Ok(raw) = self.call(MethodOrdinal::GetParameterValues, |buf| ids.to_vec().encode(buf).map_err(Into::into)).await
        else {
            return ids.iter().map(|_| ValueResponse { status: CoreStatus::LogicError, value: None }).collect();
        };
        let mut reader = Reader::new(&raw);
        Vec::<ValueResponse>::decode(&mut reader).unwrap_or_default()
    }

    async fn set_parameter_values(&self, requests: &[SetRequest]) -> Vec<SetResponse> {
        let Ok(raw) =
            self.call(MethodOrdinal::SetParameterValues, |buf| requests.to_vec().encode(buf).map_err(Into::into)).await
        else {
            return requests.iter().map(|_| SetResponse { status: CoreStatus::LogicError }).collect();
        };
        let mut reader = Reader::new(&raw);
        Vec::<SetResponse>::decode(&mut reader).unwrap_or_default()
    }

    async fn set_parameter_values_connection_aware(&self, requests: &[SetRequest], defer: bool) -> Vec<SetResponse> {
        let Ok(raw) = self
            .call(MethodOrdinal::SetParameterValuesConnectionAware, |buf| {
                requests.to_vec().encode(buf)?;
                defer.encode(buf).map_err(Into::into)
            })
            .await
        else {
            return requests.iter().map(|_| SetResponse { status: CoreStatus::LogicError }).collect();
        };
        let mut reader = Reader::new(&raw);
        Vec::<SetResponse>::decode(&mut reader).unwrap_or_default()
    }

    async fn invoke_method(&self, method_id: u32, args: &[ParamValue]) -> MethodResponse {
        let Ok(raw) = self
            .call(MethodOrdinal::InvokeMethod, |buf| {
                method_id.encode(buf)?;
                args.to_vec().encode(buf).map_err(Into::into)
            })
            .await
        else {
            return MethodResponse { status: CoreStatus::LogicError, return_values: Vec::new() };
        };
        let mut reader = Reader::new(&raw);
        MethodResponse::decode(&mut reader)
            .unwrap_or(MethodResponse { status: CoreStatus::LogicError, return_values: Vec::new() })
    }

    async fn create_parameter_upload_id(&self, context: &str) -> UploadIdResponse {
        let Ok(raw) = self
            .call(MethodOrdinal::CreateParameterUploadId, |buf| context.to_string().encode(buf).map_err(Into::into))
            .await
        else {
            return UploadIdResponse { status: CoreStatus::LogicError, file_id: None };
        };
        let mut reader = Reader::new(&raw);
        UploadIdResponse::decode(&mut reader).unwrap_or(UploadIdResponse { status: CoreStatus::LogicError, file_id: None })
    }

    async fn remove_parameter_upload_id(&self, file_id: &str, context: &str) -> UploadIdResponse {
        let Ok(raw) = self
            .call(MethodOrdinal::RemoveParameterUploadId, |buf| {
                file_id.to_string().encode(buf)?;
                context.to_string().encode(buf).map_err(Into::into)
            })
            .await
        else {
            return UploadIdResponse { status: CoreStatus::LogicError, file_id: None };
        };
        let mut reader = Reader::new(&raw);
        UploadIdResponse::decode(&mut reader).unwrap_or(UploadIdResponse { status: CoreStatus::LogicError, file_id: None })
    }
}
