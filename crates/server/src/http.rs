//! HTTP routes for browsing and downloading the shared directory.
//!
//! | Method | Route                    | Handler                      |
//! |--------|--------------------------|------------------------------|
//! | GET    | `/api/health`            | liveness check               |
//! | GET    | `/api/files[/*path]`     | directory listing (JSON)     |
//! | GET    | `/api/download/*path`    | single file, streamed        |
//! | POST   | `/api/download/batch`    | ZIP of many paths, streamed  |
//! | GET    | anything else            | front-end assets, if enabled |
//! | OPTIONS| any                      | CORS preflight               |
//!
//! Filesystem work runs on the blocking pool. File and archive bodies are
//! streamed, so response memory does not grow with file size.

use std::fmt::Write as _;
use std::io;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS, CONTENT_DISPOSITION, CONTENT_LENGTH,
    CONTENT_TYPE,
};
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use protocol::{
    BatchDownloadRequest, ErrorCode, ErrorResponse, FileEntry, HealthStatus,
    ARCHIVE_CONTENT_TYPE, DOWNLOAD_ROUTE, FILES_ROUTE, FILE_CONTENT_TYPE, HEALTH_ROUTE,
};
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::files::{
    ArchiveStreamer, ChannelWriter, DirectoryBrowser, DirectoryEntry, FileError, FileTransfer,
    SharedRoot, DEFAULT_CHUNK_SIZE,
};
use crate::frontend::{decode_request_path, Frontend};

/// Archive chunks buffered between the archiver and the client.
const ARCHIVE_CHANNEL_CAPACITY: usize = 8;

/// Last path segment of the batch download route.
const BATCH_SEGMENT: &str = "batch";

/// Methods advertised to CORS preflight requests.
const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

/// Seconds a browser may cache a preflight answer.
const PREFLIGHT_MAX_AGE: &str = "600";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    browser: Arc<DirectoryBrowser>,
    transfer: Arc<FileTransfer>,
    archiver: Arc<ArchiveStreamer>,
    frontend: Option<Arc<Frontend>>,
}

impl AppState {
    /// Build the handler state over one shared root.
    pub fn new(root: Arc<SharedRoot>) -> Self {
        Self {
            browser: Arc::new(DirectoryBrowser::new(Arc::clone(&root))),
            transfer: Arc::new(FileTransfer::new(Arc::clone(&root))),
            archiver: Arc::new(ArchiveStreamer::new(root)),
            frontend: None,
        }
    }

    /// Also serve a browser front-end for paths the API does not claim.
    pub fn with_frontend(mut self, frontend: Arc<Frontend>) -> Self {
        self.frontend = Some(frontend);
        self
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route(HEALTH_ROUTE, get(health))
        .route(FILES_ROUTE, get(list_root))
        .route(&format!("{FILES_ROUTE}/*path"), get(list_path))
        // POST shares the wildcard route; only `batch` is a valid target.
        .route(
            &format!("{DOWNLOAD_ROUTE}/*path"),
            get(download).post(batch_download),
        );

    if state.frontend.is_some() {
        router = router.fallback(frontend_asset);
    }

    router.layer(middleware::from_fn(cors)).with_state(state)
}

/// Error body for requests the API cannot parse.
fn invalid_request(detail: impl Into<String>) -> Response {
    let body = ErrorResponse::new(ErrorCode::InvalidRequest, detail);
    let status =
        StatusCode::from_u16(body.code.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(body)).into_response()
}

impl IntoResponse for FileError {
    fn into_response(self) -> Response {
        let body = self.to_error_response();
        let status = StatusCode::from_u16(body.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        } else {
            debug!(error = %self, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::default())
}

async fn list_root(State(state): State<AppState>) -> Result<Json<Vec<FileEntry>>, FileError> {
    list(state, String::new()).await
}

async fn list_path(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<Vec<FileEntry>>, FileError> {
    list(state, path).await
}

async fn list(state: AppState, path: String) -> Result<Json<Vec<FileEntry>>, FileError> {
    debug!(path = %path, "Listing directory");

    let browser = Arc::clone(&state.browser);
    let entries = run_blocking(move || browser.list_directory(&path)).await?;

    Ok(Json(entries.iter().map(DirectoryEntry::to_protocol).collect()))
}

async fn download(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, FileError> {
    let transfer = Arc::clone(&state.transfer);
    let download = run_blocking(move || transfer.open(&path)).await?;

    info!(path = %download.path.relative(), size = download.size, "Serving file");

    let file = tokio::fs::File::from_std(download.file);
    let body = Body::from_stream(ReaderStream::with_capacity(file, DEFAULT_CHUNK_SIZE));

    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static(FILE_CONTENT_TYPE)),
        (CONTENT_LENGTH, HeaderValue::from(download.size)),
        (CONTENT_DISPOSITION, content_disposition(&download.file_name)),
    ];
    Ok((headers, body).into_response())
}

async fn batch_download(
    State(state): State<AppState>,
    Path(target): Path<String>,
    payload: Result<Json<BatchDownloadRequest>, JsonRejection>,
) -> Result<Response, FileError> {
    if target != BATCH_SEGMENT {
        return Err(FileError::NotFound(format!("{DOWNLOAD_ROUTE}/{target}")));
    }

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected batch request body");
            return Ok(invalid_request(rejection.body_text()));
        }
    };

    let archiver = Arc::clone(&state.archiver);
    let archive_name = archiver.archive_name();
    let paths = request.paths;

    info!(count = paths.len(), "Streaming batch archive");

    let (tx, mut rx) = mpsc::channel(ARCHIVE_CHANNEL_CAPACITY);
    tokio::task::spawn_blocking(move || {
        let mut writer = ChannelWriter::new(tx);
        match archiver.write_archive(&paths, &mut writer) {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                debug!("Client disconnected, archive abandoned");
            }
            Err(err) => {
                warn!(error = %err, "Archive stream failed");
                writer.abort(err);
            }
        }
    });

    // Dropping the body drops `rx`, which stops the archiver at its next write.
    let stream = futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx));

    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static(ARCHIVE_CONTENT_TYPE)),
        (CONTENT_DISPOSITION, content_disposition(&archive_name)),
    ];
    Ok((headers, Body::from_stream(stream)).into_response())
}

async fn frontend_asset(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Result<Response, FileError> {
    let Some(frontend) = state.frontend.clone() else {
        return Err(FileError::NotFound(uri.path().to_string()));
    };
    if method != Method::GET && method != Method::HEAD {
        return Err(FileError::NotFound(uri.path().to_string()));
    }
    let Some(path) = decode_request_path(uri.path()) else {
        return Ok(invalid_request("malformed request path"));
    };

    let asset = run_blocking(move || frontend.asset(&path)).await?;

    let file = tokio::fs::File::from_std(asset.file);
    let body = Body::from_stream(ReaderStream::with_capacity(file, DEFAULT_CHUNK_SIZE));
    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static(asset.content_type)),
        (CONTENT_LENGTH, HeaderValue::from(asset.size)),
    ];
    Ok((headers, body).into_response())
}

/// Permissive CORS: every origin, preflights answered directly.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        let requested_headers = request
            .headers()
            .get(ACCESS_CONTROL_REQUEST_HEADERS)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("*"));

        let mut preflight = StatusCode::NO_CONTENT.into_response();
        let headers = preflight.headers_mut();
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested_headers);
        headers.insert(
            ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE),
        );
        preflight
    } else {
        next.run(request).await
    };

    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// Run filesystem work on the blocking pool.
async fn run_blocking<T, F>(work: F) -> Result<T, FileError>
where
    F: FnOnce() -> Result<T, FileError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| FileError::Io(io::Error::other(e)))?
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 name.
fn content_disposition(file_name: &str) -> HeaderValue {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let value = format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        encode_rfc5987(file_name)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

fn encode_rfc5987(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}
