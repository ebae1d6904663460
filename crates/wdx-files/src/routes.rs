//! Route wiring and request handlers for the file-transfer frontend.
//!
//! Mirrors the original dispatcher: an exact match on `/files` (or
//! `/files/`) routes to the upload-id collection, anything else under the
//! mount point is treated as `/files/<file_id>`. `axum`'s router already
//! answers unmatched methods on a matched path with `405` plus an `Allow`
//! header listing the methods that route supports, so that case needs no
//! special handling here.

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::options,
    Router,
};

use crate::{
    cors,
    error::FilesError,
    multipart::parse_multipart_byteranges,
    provider::FileProvider,
    range::{create_content_range, extract_byte_range_request, resolve_range, RequestRange, ACCEPT_RANGES_UNIT},
    CONTEXT_QUERY_PARAM_NAME, DEFAULT_FILE_CONTENT_TYPE, DOWNLOAD_CHUNK_SIZE, MAX_DOWNLOAD_DATA_LENGTH,
    MAX_UPLOAD_REQUEST_LENGTH, MULTIPART_CONTENT_TYPE, UPLOAD_CHUNK_SIZE,
};

/// Everything a mounted files router needs: where to send real file
/// operations, and how long a freshly allocated upload id stays valid.
pub struct FilesConfig {
    /// The file backend this frontend forwards operations to.
    pub provider: Arc<dyn FileProvider>,
    /// Timeout, in seconds, an upload id allocated by `POST /files` stays
    /// valid before it expires unclaimed.
    pub upload_id_timeout_secs: u16,
}

/// Build the `/files` and `/files/{file_id}` routes, with CORS configured
/// per route shape and `allow_origin` as the single allowed origin.
#[must_use]
pub fn files_router(config: FilesConfig, allow_origin: HeaderValue) -> Router {
    let state = Arc::new(config);

    let collection = Router::new()
        .route("/files", options(collection_options).post(create_upload_id))
        .layer(cors::collection_cors(allow_origin.clone()))
        .with_state(Arc::clone(&state));

    let item = Router::new()
        .route(
            "/files/{file_id}",
            options(item_options)
                .head(get_file_info)
                .get(get_file_content)
                .put(set_file_content)
                .patch(set_file_content),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_REQUEST_LENGTH as usize))
        .layer(cors::item_cors(allow_origin))
        .with_state(state);

    collection.merge(item)
}

async fn collection_options() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, [(header::ALLOW, HeaderValue::from_static("OPTIONS, POST"))])
}

async fn item_options() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, [(header::ALLOW, HeaderValue::from_static("OPTIONS, HEAD, GET, PUT, PATCH"))])
}

async fn create_upload_id(
    State(config): State<Arc<FilesConfig>>,
    Query(params): Query<HashMap<String, String>>,
    uri: Uri,
) -> Response {
    let context = match params.get(CONTEXT_QUERY_PARAM_NAME) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };

    let outcome = config.provider.create_parameter_upload_id(&context, config.upload_id_timeout_secs).await;
    if !outcome.status.is_ok() {
        return FilesError::Core(outcome.status).status_code().into_response();
    }

    let mut location = uri.path().to_string();
    if !location.ends_with('/') {
        location.push('/');
    }
    location.push_str(&outcome.file_id);

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&location) {
        headers.insert(header::LOCATION, value);
    }
    (StatusCode::CREATED, headers).into_response()
}

async fn get_file_info(
    State(config): State<Arc<FilesConfig>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    match compute_range(config.provider.as_ref(), &file_id, &headers).await {
        Ok(range) => head_response(range),
        Err(err) => err.status_code().into_response(),
    }
}

fn head_response(range: RequestRange) -> Response {
    let status = if range.has_range_header { StatusCode::PARTIAL_CONTENT } else { StatusCode::OK };
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(DEFAULT_FILE_CONTENT_TYPE));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from_str(&range.length.to_string()).unwrap_or(HeaderValue::from_static("0")));
    if let Ok(value) = HeaderValue::from_str(ACCEPT_RANGES_UNIT) {
        headers.insert(header::ACCEPT_RANGES, value);
    }
    if range.has_range_header {
        let range_to = range.offset + range.length.saturating_sub(1);
        if let Ok(value) = HeaderValue::from_str(&create_content_range(range.offset, range_to, range.file_size)) {
            headers.insert(header::CONTENT_RANGE, value);
        }
    }
    (status, headers).into_response()
}

async fn get_file_content(
    State(config): State<Arc<FilesConfig>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let range = match compute_range(config.provider.as_ref(), &file_id, &headers).await {
        Ok(range) => range,
        Err(err) => return err.status_code().into_response(),
    };

    if range.length > MAX_DOWNLOAD_DATA_LENGTH {
        tracing::warn!(file_id, requested = range.length, max = MAX_DOWNLOAD_DATA_LENGTH, "requested range too large");
        return FilesError::RangeNotSatisfiable.status_code().into_response();
    }

    let data = match read_file_chunks(config.provider.as_ref(), &file_id, range.offset, range.length).await {
        Ok(data) => data,
        Err(err) => return err.status_code().into_response(),
    };

    let status = if range.length == range.file_size { StatusCode::OK } else { StatusCode::PARTIAL_CONTENT };
    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(DEFAULT_FILE_CONTENT_TYPE));
    response_headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&data.len().to_string()).unwrap_or(HeaderValue::from_static("0")),
    );
    if let Ok(value) = HeaderValue::from_str(ACCEPT_RANGES_UNIT) {
        response_headers.insert(header::ACCEPT_RANGES, value);
    }
    if status == StatusCode::PARTIAL_CONTENT {
        let range_to = range.offset + range.length.saturating_sub(1);
        if let Ok(value) = HeaderValue::from_str(&create_content_range(range.offset, range_to, range.file_size)) {
            response_headers.insert(header::CONTENT_RANGE, value);
        }
    }
    (status, response_headers, data).into_response()
}

async fn compute_range(provider: &dyn FileProvider, file_id: &str, headers: &HeaderMap) -> Result<RequestRange, FilesError> {
    let requested = match headers.get(header::RANGE) {
        Some(value) => {
            let value = value.to_str().map_err(|_| FilesError::MalformedRange)?;
            Some(extract_byte_range_request(value).ok_or(FilesError::MalformedRange)?)
        }
        None => None,
    };

    let info = provider.file_get_info(file_id).await;
    if !info.status.is_ok() {
        return Err(FilesError::Core(info.status));
    }

    let resolved = resolve_range(requested, info.file_size);
    if !resolved.valid {
        return Err(FilesError::RangeNotSatisfiable);
    }
    Ok(resolved)
}

async fn read_file_chunks(
    provider: &dyn FileProvider,
    file_id: &str,
    offset: u64,
    length: u64,
) -> Result<Vec<u8>, FilesError> {
    let mut buffer = Vec::with_capacity(length as usize);
    let mut cursor = offset;
    let mut remaining = length;
    while remaining > 0 {
        let chunk_len = remaining.min(DOWNLOAD_CHUNK_SIZE);
        let chunk = provider.file_read(file_id, cursor, chunk_len as usize).await;
        if !chunk.status.is_ok() {
            return Err(FilesError::Core(chunk.status));
        }
        buffer.extend_from_slice(&chunk.data);
        cursor += chunk_len;
        remaining -= chunk_len;
    }
    Ok(buffer)
}

async fn write_file_chunks(
    provider: &dyn FileProvider,
    file_id: &str,
    offset: u64,
    data: &[u8],
) -> Result<(), FilesError> {
    let mut cursor = offset;
    for chunk in data.chunks(UPLOAD_CHUNK_SIZE as usize) {
        let outcome = provider.file_write(file_id, cursor, chunk).await;
        if !outcome.status.is_ok() {
            return Err(FilesError::Core(outcome.status));
        }
        cursor += chunk.len() as u64;
    }
    Ok(())
}

fn parse_content_length(headers: &HeaderMap) -> Result<u64, StatusCode> {
    let raw = headers.get(header::CONTENT_LENGTH).ok_or(StatusCode::LENGTH_REQUIRED)?;
    let raw = raw.to_str().map_err(|_| StatusCode::BAD_REQUEST)?;
    let value: u64 = raw.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    if value > MAX_UPLOAD_REQUEST_LENGTH {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }
    Ok(value)
}

fn content_type_matches(actual: &str, expected: &str) -> bool {
    actual.split(';').next().unwrap_or("").trim() == expected
}

fn extract_boundary(content_type: &str) -> Option<String> {
    const BOUNDARY_PARAM: &str = "; boundary=";
    let pos = content_type.find(BOUNDARY_PARAM)?;
    Some(content_type[pos + BOUNDARY_PARAM.len()..].to_string())
}

async fn set_file_content(
    State(config): State<Arc<FilesConfig>>,
    Path(file_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_length = match parse_content_length(&headers) {
        Ok(len) => len,
        Err(status) => return status.into_response(),
    };

    let content_type = headers.get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok()).unwrap_or_default();

    if content_type_matches(content_type, DEFAULT_FILE_CONTENT_TYPE) {
        if method != Method::PUT {
            return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
        }
        if headers.contains_key(header::CONTENT_RANGE) {
            tracing::info!(file_id, "rejected PUT with forbidden Content-Range header");
            return StatusCode::BAD_REQUEST.into_response();
        }
        if content_length == 0 {
            return StatusCode::BAD_REQUEST.into_response();
        }

        let created = config.provider.file_create(&file_id, content_length).await;
        if !created.status.is_ok() {
            return FilesError::Core(created.status).status_code().into_response();
        }
        match write_file_chunks(config.provider.as_ref(), &file_id, 0, &body).await {
            Ok(()) => StatusCode::NO_CONTENT.into_response(),
            Err(err) => err.status_code().into_response(),
        }
    } else if content_type_matches(content_type, MULTIPART_CONTENT_TYPE) {
        if method != Method::PATCH {
            return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
        }
        let Some(boundary) = extract_boundary(content_type) else {
            tracing::info!(file_id, "PATCH request without multipart content boundary definition");
            return StatusCode::BAD_REQUEST.into_response();
        };
        let parts = match parse_multipart_byteranges(&body, &boundary) {
            Ok(parts) => parts,
            Err(err) => return err.status_code().into_response(),
        };
        for part in parts {
            if let Err(err) = write_file_chunks(config.provider.as_ref(), &file_id, part.offset, &part.data).await {
                return err.status_code().into_response();
            }
        }
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use axum::body::Body;
    use http::Request;
    use tower::ServiceExt;
    use wdx_ipc::CoreStatus;

    use super::*;
    use crate::provider::{FileChunk, FileInfo, UploadId, WriteOutcome};

    #[derive(Default)]
    struct MemoryProvider {
        files: Mutex<HashMap<String, Vec<u8>>>,
        next_upload_id: Mutex<u64>,
    }

    #[async_trait::async_trait]
    impl FileProvider for MemoryProvider {
        async fn file_get_info(&self, file_id: &str) -> FileInfo {
            match self.files.lock().unwrap().get(file_id) {
                Some(bytes) => FileInfo { status: CoreStatus::Ok, file_size: bytes.len() as u64 },
                None => FileInfo { status: CoreStatus::UnknownFileId, file_size: 0 },
            }
        }

        async fn file_read(&self, file_id: &str, offset: u64, length: usize) -> FileChunk {
            let files = self.files.lock().unwrap();
            let Some(bytes) = files.get(file_id) else {
                return FileChunk { status: CoreStatus::UnknownFileId, data: Vec::new() };
            };
            let start = offset as usize;
            let end = (start + length).min(bytes.len());
            FileChunk { status: CoreStatus::Ok, data: bytes[start..end].to_vec() }
        }

        async fn file_create(&self, file_id: &str, content_length: u64) -> WriteOutcome {
            self.files.lock().unwrap().insert(file_id.to_string(), vec![0u8; content_length as usize]);
            WriteOutcome { status: CoreStatus::Ok }
        }

        async fn file_write(&self, file_id: &str, offset: u64, data: &[u8]) -> WriteOutcome {
            let mut files = self.files.lock().unwrap();
            let Some(bytes) = files.get_mut(file_id) else {
                return WriteOutcome { status: CoreStatus::UnknownFileId };
            };
            let start = offset as usize;
            let end = start + data.len();
            if end > bytes.len() {
                bytes.resize(end, 0);
            }
            bytes[start..end].copy_from_slice(data);
            WriteOutcome { status: CoreStatus::Ok }
        }

        async fn create_parameter_upload_id(&self, context: &str, _timeout_secs: u16) -> UploadId {
            if context.is_empty() {
                return UploadId { status: CoreStatus::InvalidValue, file_id: String::new() };
            }
            let mut next = self.next_upload_id.lock().unwrap();
            *next += 1;
            UploadId { status: CoreStatus::Ok, file_id: format!("upload-{next}") }
        }
    }

    fn test_router(provider: MemoryProvider) -> Router {
        let config = FilesConfig { provider: Arc::new(provider), upload_id_timeout_secs: 60 };
        files_router(config, HeaderValue::from_static("*"))
    }

    #[tokio::test]
    async fn head_without_range_reports_the_whole_file() {
        let provider = MemoryProvider::default();
        provider.files.lock().unwrap().insert("abc".to_string(), vec![1, 2, 3, 4]);
        let router = test_router(provider);

        let response =
            router.oneshot(Request::builder().method("HEAD").uri("/files/abc").body(Body::empty()).unwrap()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "4");
    }

    #[tokio::test]
    async fn get_with_range_returns_partial_content() {
        let provider = MemoryProvider::default();
        provider.files.lock().unwrap().insert("abc".to_string(), b"0123456789".to_vec());
        let router = test_router(provider);

        let response = router
            .oneshot(
                Request::builder().method("GET").uri("/files/abc").header("Range", "bytes=2-5").body(Body::empty()).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers().get(header::CONTENT_RANGE).unwrap(), "bytes 2-5/10");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"2345");
    }

    #[tokio::test]
    async fn get_on_unknown_file_id_is_not_found() {
        let router = test_router(MemoryProvider::default());

        let response =
            router.oneshot(Request::builder().method("GET").uri("/files/missing").body(Body::empty()).unwrap()).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_without_content_length_requires_length() {
        let router = test_router(MemoryProvider::default());

        let response = router
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/files/abc")
                    .header(header::CONTENT_TYPE, DEFAULT_FILE_CONTENT_TYPE)
                    .body(Body::from("data"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::LENGTH_REQUIRED);
    }

    #[tokio::test]
    async fn put_replaces_file_content() {
        let router = test_router(MemoryProvider::default());

        let response = router
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/files/abc")
                    .header(header::CONTENT_TYPE, DEFAULT_FILE_CONTENT_TYPE)
                    .header(header::CONTENT_LENGTH, "4")
                    .body(Body::from("data"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn put_with_content_range_is_rejected() {
        let router = test_router(MemoryProvider::default());

        let response = router
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/files/abc")
                    .header(header::CONTENT_TYPE, DEFAULT_FILE_CONTENT_TYPE)
                    .header(header::CONTENT_LENGTH, "4")
                    .header(header::CONTENT_RANGE, "bytes 0-3/4")
                    .body(Body::from("data"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn zero_length_put_is_bad_request() {
        let router = test_router(MemoryProvider::default());

        let response = router
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/files/abc")
                    .header(header::CONTENT_TYPE, DEFAULT_FILE_CONTENT_TYPE)
                    .header(header::CONTENT_LENGTH, "0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_without_context_is_bad_request() {
        let router = test_router(MemoryProvider::default());

        let response =
            router.oneshot(Request::builder().method("POST").uri("/files").body(Body::empty()).unwrap()).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_with_context_creates_an_upload_id_location() {
        let router = test_router(MemoryProvider::default());

        let response = router
            .oneshot(Request::builder().method("POST").uri("/files?context=some.param.path").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("/files/upload-"));
    }

    #[tokio::test]
    async fn unsupported_method_on_item_route_reports_allow_header() {
        let router = test_router(MemoryProvider::default());

        let response =
            router.oneshot(Request::builder().method("DELETE").uri("/files/abc").body(Body::empty()).unwrap()).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
