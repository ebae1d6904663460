//! Domain records exchanged during provider and device registration (§3).

use wdx_codec::{CodecError, Decode, Encode, Reader};

use crate::{core_status::CoreStatus, ids::ObjectId};

/// Per-provider dispatch policy (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallMode {
    /// Calls may be dispatched to the provider without ordering
    /// constraints; it may handle any number in parallel.
    Concurrent,
    /// Calls are issued one at a time, in FIFO order, waiting for each to
    /// resolve before issuing the next.
    Serialized,
}

impl Encode for CallMode {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> Result<(), CodecError> {
        let tag: u8 = match self {
            CallMode::Concurrent => 0,
            CallMode::Serialized => 1,
        };
        tag.encode(buf)
    }
}

impl Decode for CallMode {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        match u8::decode(reader)? {
            0 => Ok(CallMode::Concurrent),
            1 => Ok(CallMode::Serialized),
            other => Err(CodecError::Malformed { type_name: "CallMode", reason: format!("unknown tag {other}") }),
        }
    }
}

/// Identity of a registered device: `(slot, collection_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId {
    /// Slot number the device occupies within its collection.
    pub slot: u32,
    /// Collection (bus, rack) the device belongs to.
    pub collection_id: u32,
}

impl Encode for DeviceId {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> Result<(), CodecError> {
        self.slot.encode(buf)?;
        self.collection_id.encode(buf)
    }
}

impl Decode for DeviceId {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { slot: u32::decode(reader)?, collection_id: u32::decode(reader)? })
    }
}

/// A device registration record (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRegistration {
    /// Slot number the device occupies within its collection.
    pub slot: u32,
    /// Collection (bus, rack) the device belongs to.
    pub collection_id: u32,
    /// Vendor order number of the device.
    pub order_number: String,
    /// Firmware version string reported by the device.
    pub firmware_version: String,
}

impl DeviceRegistration {
    /// The canonical identity this registration describes.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        DeviceId { slot: self.slot, collection_id: self.collection_id }
    }
}

impl Encode for DeviceRegistration {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> Result<(), CodecError> {
        self.slot.encode(buf)?;
        self.collection_id.encode(buf)?;
        self.order_number.encode(buf)?;
        self.firmware_version.encode(buf)
    }
}

impl Decode for DeviceRegistration {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            slot: u32::decode(reader)?,
            collection_id: u32::decode(reader)?,
            order_number: String::decode(reader)?,
            firmware_version: String::decode(reader)?,
        })
    }
}

/// Handle to a provider's freshly created, or previously registered, proxy
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderRef {
    /// Id of the provider's callback proxy object.
    pub proxy_object_id: ObjectId,
}

impl Encode for ProviderRef {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> Result<(), CodecError> {
        self.proxy_object_id.encode(buf)
    }
}

impl Decode for ProviderRef {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { proxy_object_id: u32::decode(reader)? })
    }
}

/// Outcome of a single registration or unregistration within a batch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Domain status reported by the peer.
    pub status: CoreStatus,
}

impl Response {
    /// A successful response.
    #[must_use]
    pub fn ok() -> Self {
        Self { status: CoreStatus::Ok }
    }

    /// A failed response carrying `status`.
    #[must_use]
    pub fn failed(status: CoreStatus) -> Self {
        Self { status }
    }
}

impl Encode for Response {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> Result<(), CodecError> {
        self.status.encode(buf)
    }
}

impl Decode for Response {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { status: CoreStatus::decode(reader)? })
    }
}

/// Outcome of registering a file provider: carries the newly assigned file
/// id on success, which the proxy side caches for future `reregister`
/// calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdResponse {
    /// Domain status reported by the peer.
    pub status: CoreStatus,
    /// Newly assigned file id, present iff `status` is `Ok`.
    pub file_id: Option<String>,
}

impl Encode for FileIdResponse {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> Result<(), CodecError> {
        self.status.encode(buf)?;
        self.file_id.encode(buf)
    }
}

impl Decode for FileIdResponse {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { status: CoreStatus::decode(reader)?, file_id: Option::<String>::decode(reader)? })
    }
}

/// Context under which a file provider was registered (the
/// parameter-instance path it serves).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContext {
    /// Parameter-instance path this file provider is registered under.
    pub path: String,
}

impl Encode for FileContext {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> Result<(), CodecError> {
        self.path.encode(buf)
    }
}

impl Decode for FileContext {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { path: String::decode(reader)? })
    }
}
