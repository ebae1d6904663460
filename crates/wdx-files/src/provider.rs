//! The contract this engine calls out to for every actual file operation.
//!
//! Mirrors `parameter_service_file_api_i`: the HTTP layer never touches
//! storage directly, it only resolves ranges and chunk boundaries and hands
//! the real work to whatever implements [`FileProvider`] — normally a proxy
//! over the managed-object IPC to a registered file backend.

use async_trait::async_trait;
use wdx_ipc::CoreStatus;

/// Outcome of a `file_get_info` call.
#[derive(Debug, Clone, Copy)]
pub struct FileInfo {
    /// Whether the lookup succeeded.
    pub status: CoreStatus,
    /// Total size of the file in bytes. Meaningless unless `status.is_ok()`.
    pub file_size: u64,
}

/// Outcome of a `file_read` call: one chunk of file content.
#[derive(Debug, Clone)]
pub struct FileChunk {
    /// Whether the read succeeded.
    pub status: CoreStatus,
    /// The bytes read. Empty unless `status.is_ok()`.
    pub data: Vec<u8>,
}

/// Outcome of a `file_create` or `file_write` call.
#[derive(Debug, Clone, Copy)]
pub struct WriteOutcome {
    /// Whether the call succeeded.
    pub status: CoreStatus,
}

/// Outcome of a `create_parameter_upload_id` call.
#[derive(Debug, Clone)]
pub struct UploadId {
    /// Whether a new upload id was allocated.
    pub status: CoreStatus,
    /// The newly allocated file id. Empty unless `status.is_ok()`.
    pub file_id: String,
}

/// The file-transfer engine's sole collaborator: everything that touches an
/// actual file.
///
/// Implementations decide what "a file" even is — they may be a thin proxy
/// forwarding to a backend over IPC, or (in tests) an in-memory map.
#[async_trait]
pub trait FileProvider: Send + Sync {
    /// Resolve `file_id` to its current size.
    async fn file_get_info(&self, file_id: &str) -> FileInfo;

    /// Read up to `length` bytes of `file_id` starting at `offset`.
    async fn file_read(&self, file_id: &str, offset: u64, length: usize) -> FileChunk;

    /// Begin a full-replace write of `file_id`, declaring its final size as
    /// `content_length`. Must be called before any `file_write` for the
    /// same upload.
    async fn file_create(&self, file_id: &str, content_length: u64) -> WriteOutcome;

    /// Write `data` to `file_id` at `offset`, as part of a write begun with
    /// `file_create`.
    async fn file_write(&self, file_id: &str, offset: u64, data: &[u8]) -> WriteOutcome;

    /// Allocate a fresh upload id scoped to `context`, valid for
    /// `timeout_secs` before it expires unused.
    async fn create_parameter_upload_id(&self, context: &str, timeout_secs: u16) -> UploadId;
}
