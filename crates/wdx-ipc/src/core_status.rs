//! Domain status codes carried verbatim through the IPC between a provider
//! and its caller.
//!
//! `wdx-files` maps these onto HTTP statuses at the HTTP boundary; nothing
//! below that boundary ever interprets them beyond passing them through.

use wdx_codec::{CodecError, Decode, Encode, Reader};

/// A provider-reported outcome, mirroring the original `core_status_code`
/// enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreStatus {
    /// The call completed successfully.
    Ok,
    /// The referenced device collection does not exist.
    UnknownDeviceCollection,
    /// The referenced device does not exist.
    UnknownDevice,
    /// The referenced parameter path does not exist.
    UnknownParameterPath,
    /// The referenced class-instance path does not exist.
    UnknownClassInstancePath,
    /// The referenced id is not a valid file id.
    NotAFileId,
    /// The referenced file id is unknown.
    UnknownFileId,
    /// The caller is not authorized to perform the operation.
    Unauthorized,
    /// The operation is not valid given the provider's current state.
    LogicError,
    /// A supplied value failed validation.
    InvalidValue,
    /// The write would exceed the file's declared size.
    FileSizeExceeded,
    /// The maximum number of outstanding upload ids has been reached.
    UploadIdMaxExceeded,
    /// The file exists but is not currently accessible.
    FileNotAccessible,
}

impl CoreStatus {
    /// Whether this status represents success.
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, CoreStatus::Ok)
    }

    const fn discriminant(self) -> u32 {
        match self {
            CoreStatus::Ok => 0,
            CoreStatus::UnknownDeviceCollection => 1,
            CoreStatus::UnknownDevice => 2,
            CoreStatus::UnknownParameterPath => 3,
            CoreStatus::UnknownClassInstancePath => 4,
            CoreStatus::NotAFileId => 5,
            CoreStatus::UnknownFileId => 6,
            CoreStatus::Unauthorized => 7,
            CoreStatus::LogicError => 8,
            CoreStatus::InvalidValue => 9,
            CoreStatus::FileSizeExceeded => 10,
            CoreStatus::UploadIdMaxExceeded => 11,
            CoreStatus::FileNotAccessible => 12,
        }
    }

    const fn from_discriminant(value: u32) -> Option<Self> {
        Some(match value {
            0 => CoreStatus::Ok,
            1 => CoreStatus::UnknownDeviceCollection,
            2 => CoreStatus::UnknownDevice,
            3 => CoreStatus::UnknownParameterPath,
            4 => CoreStatus::UnknownClassInstancePath,
            5 => CoreStatus::NotAFileId,
            6 => CoreStatus::UnknownFileId,
            7 => CoreStatus::Unauthorized,
            8 => CoreStatus::LogicError,
            9 => CoreStatus::InvalidValue,
            10 => CoreStatus::FileSizeExceeded,
            11 => CoreStatus::UploadIdMaxExceeded,
            12 => CoreStatus::FileNotAccessible,
            _ => return None,
        })
    }
}

impl Encode for CoreStatus {
    fn encode(&self, buf: &mut impl bytes::BufMut) -> Result<(), CodecError> {
        self.discriminant().encode(buf)
    }
}

impl Decode for CoreStatus {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let raw = u32::decode(reader)?;
        CoreStatus::from_discriminant(raw)
            .ok_or_else(|| CodecError::Malformed { type_name: "CoreStatus", reason: format!("unknown discriminant {raw}") })
    }
}
