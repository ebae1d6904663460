//! HTTP-facing error type and the core-status-to-HTTP-status mapping.

use axum::http::StatusCode;
use wdx_ipc::CoreStatus;

/// Everything that can cause the files frontend to answer with something
/// other than a success status.
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// The request carried a `Range` or `Content-Range` header this engine
    /// cannot parse.
    #[error("malformed range header")]
    MalformedRange,

    /// The resolved range falls outside the file, or exceeds the engine's
    /// maximum transfer size.
    #[error("range not satisfiable")]
    RangeNotSatisfiable,

    /// `Content-Length` was missing, unparseable, or over the maximum
    /// upload size.
    #[error("invalid content-length: {0}")]
    InvalidContentLength(StatusCode),

    /// The request body did not match the multipart/byteranges grammar.
    #[error("malformed multipart body: {0}")]
    MalformedMultipart(String),

    /// `Content-Type` did not match what the method requires.
    #[error("unsupported media type")]
    UnsupportedMediaType,

    /// The `context` query parameter was missing or malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A provider call returned a domain error.
    #[error("core status: {0:?}")]
    Core(CoreStatus),
}

impl FilesError {
    /// Map this error to the HTTP status the frontend answers with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            FilesError::MalformedRange | FilesError::RangeNotSatisfiable => {
                StatusCode::RANGE_NOT_SATISFIABLE
            }
            FilesError::InvalidContentLength(status) => *status,
            FilesError::MalformedMultipart(_) | FilesError::BadRequest(_) => StatusCode::BAD_REQUEST,
            FilesError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            FilesError::Core(status) => core_status_to_http(*status),
        }
    }
}

/// Map a provider's [`CoreStatus`] to the HTTP status the original
/// implementation answers with for that status.
///
/// Anything not explicitly listed here (and every status this function
/// cannot give a better answer for) maps to `500 Internal Server Error`,
/// matching the original's catch-all default.
#[must_use]
pub fn core_status_to_http(status: CoreStatus) -> StatusCode {
    match status {
        CoreStatus::UnknownDeviceCollection
        | CoreStatus::UnknownDevice
        | CoreStatus::UnknownParameterPath
        | CoreStatus::UnknownClassInstancePath
        | CoreStatus::NotAFileId
        | CoreStatus::LogicError
        | CoreStatus::InvalidValue
        | CoreStatus::FileSizeExceeded => StatusCode::BAD_REQUEST,
        CoreStatus::UnknownFileId => StatusCode::NOT_FOUND,
        CoreStatus::Unauthorized => StatusCode::FORBIDDEN,
        CoreStatus::UploadIdMaxExceeded | CoreStatus::FileNotAccessible | CoreStatus::Ok => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_file_id_maps_to_not_found() {
        assert_eq!(core_status_to_http(CoreStatus::UnknownFileId), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_maps_to_forbidden() {
        assert_eq!(core_status_to_http(CoreStatus::Unauthorized), StatusCode::FORBIDDEN);
    }

    #[test]
    fn upload_id_max_exceeded_maps_to_internal_server_error() {
        assert_eq!(core_status_to_http(CoreStatus::UploadIdMaxExceeded), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unknown_parameter_path_maps_to_bad_request() {
        assert_eq!(core_status_to_http(CoreStatus::UnknownParameterPath), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn file_size_exceeded_maps_to_bad_request() {
        assert_eq!(core_status_to_http(CoreStatus::FileSizeExceeded), StatusCode::BAD_REQUEST);
    }
}
