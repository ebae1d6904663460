//! HTTP file-transfer frontend for the parameter service.
//!
//! Exposes a file's content as an ordinary RFC 7233 resource: ranged
//! `GET`/`HEAD`, full-replace `PUT`, chunked `multipart/byteranges` `PATCH`,
//! and `POST` to allocate a fresh upload id. Every actual read or write goes
//! through a [`FileProvider`] this crate is handed at startup — usually a
//! proxy over the managed-object IPC substrate to a registered file
//! backend, though tests can supply an in-memory one directly.

mod cors;
mod error;
mod ipc_bridge;
mod multipart;
mod provider;
pub mod range;
mod routes;

pub use error::{core_status_to_http, FilesError};
pub use ipc_bridge::{FileProviderProxy, FileProviderStub};
pub use multipart::{parse_multipart_byteranges, MultipartPart};
pub use provider::{FileChunk, FileInfo, FileProvider, UploadId, WriteOutcome};
pub use routes::{files_router, FilesConfig};

/// Content type every file's bytes are served and accepted as.
pub const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type of a chunked `PATCH` request body.
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/byteranges";

/// Maximum number of bytes requested from the provider per `file_read`
/// call while streaming a `GET` response.
pub const DOWNLOAD_CHUNK_SIZE: u64 = 1024 * 1024;

/// Maximum number of bytes sent to the provider per `file_write` call
/// while processing an upload.
pub const UPLOAD_CHUNK_SIZE: u64 = 1024 * 1024;

/// Maximum total size of a single `GET`/`HEAD` response body. A resolved
/// range larger than this is answered with `416 Range Not Satisfiable`.
pub const MAX_DOWNLOAD_DATA_LENGTH: u64 = 1024 * 1024 * 16;

/// Maximum `Content-Length` accepted on a `PUT`/`PATCH` request.
pub const MAX_UPLOAD_REQUEST_LENGTH: u64 = 1024 * 1024 * 16;

/// Query parameter carrying the parameter-instance-path context on
/// `POST /files`.
pub const CONTEXT_QUERY_PARAM_NAME: &str = "context";

/// Fallback timeout, in seconds, an upload id allocated by `POST /files`
/// stays valid before it expires unclaimed, used when no explicit timeout
/// is configured.
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u16 = 60;
