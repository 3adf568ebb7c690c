use crate::common::response::ApiError;
use crate::infrastructure::process::runner::RunError;
use axum::http::StatusCode;
use std::io;
use thiserror::Error;

/// Failure taxonomy for resolve and fetch. `Display` carries the detail for
/// logs; clients only ever see [`MediaError::client_message`].
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("blocked destination: {0}")]
    BlockedDestination(String),
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("rendition {0} not found")]
    RenditionNotFound(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("mux failed: {0}")]
    MuxFailed(String),
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error("disk full: {0}")]
    DiskFull(String),
    #[error("too many jobs in flight")]
    Busy,
    #[error("{0} is not available")]
    ToolUnavailable(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl MediaError {
    pub fn status(&self) -> StatusCode {
        match self {
            MediaError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            MediaError::BlockedDestination(_) => StatusCode::FORBIDDEN,
            MediaError::UnsupportedSource(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MediaError::ExtractionFailed(_) => StatusCode::BAD_GATEWAY,
            MediaError::RenditionNotFound(_) => StatusCode::NOT_FOUND,
            MediaError::DownloadFailed(_) => StatusCode::BAD_GATEWAY,
            MediaError::MuxFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MediaError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            MediaError::DiskFull(_) => StatusCode::INSUFFICIENT_STORAGE,
            MediaError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            MediaError::ToolUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            MediaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short message safe to show a client. Never includes tool output.
    pub fn client_message(&self) -> String {
        match self {
            MediaError::InvalidUrl(reason) => format!("Invalid URL: {reason}"),
            MediaError::BlockedDestination(_) => "Access denied: Invalid URL".to_string(),
            MediaError::UnsupportedSource(_) => "This URL is not supported".to_string(),
            MediaError::ExtractionFailed(_) => {
                "Failed to analyze video. URL might be invalid or unsupported.".to_string()
            }
            MediaError::RenditionNotFound(id) => {
                format!("Rendition '{id}' is not available for this URL, resolve it again")
            }
            MediaError::DownloadFailed(_) => "Download failed".to_string(),
            MediaError::MuxFailed(_) => "Failed to combine audio and video".to_string(),
            MediaError::Timeout(stage) => format!("The {stage} took too long"),
            MediaError::DiskFull(_) => "Server is out of disk space".to_string(),
            MediaError::Busy => "Server is busy, try again shortly".to_string(),
            MediaError::ToolUnavailable(tool) => {
                format!("Downloads are unavailable: {tool} is not installed")
            }
            MediaError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Maps a runner failure for one pipeline stage. `failed` builds the
    /// stage-specific error for everything that is not a timeout.
    pub fn from_run(stage: &'static str, err: RunError, failed: fn(String) -> MediaError) -> Self {
        match err {
            RunError::Timeout { .. } => MediaError::Timeout(stage),
            RunError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                MediaError::Internal(format!("{stage} tool disappeared: {source}"))
            }
            RunError::Io { source, .. } if is_disk_full(&source) => {
                MediaError::DiskFull(source.to_string())
            }
            other => failed(other.to_string()),
        }
    }

    pub fn from_io(context: &str, err: io::Error) -> Self {
        if is_disk_full(&err) {
            MediaError::DiskFull(format!("{context}: {err}"))
        } else {
            MediaError::Internal(format!("{context}: {err}"))
        }
    }
}

pub fn is_disk_full(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::StorageFull
}

/// Tool stderr that reports a full disk.
pub fn mentions_disk_full(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("no space left on device") || lower.contains("disk quota exceeded")
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", err);
        } else {
            tracing::warn!("Request rejected: {}", err);
        }
        ApiError(err.client_message(), status)
    }
}
