use super::dto::DownloadQuery;
use super::error::MediaError;
use super::handler::accept;
use crate::common::response::ApiError;
use crate::infrastructure::storage::scratch::ScratchJob;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::Stream;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// Fetch one rendition and stream it as an attachment
/// The server-side copy is deleted once the body is finished or dropped
#[utoipa::path(
    get,
    path = "/api/v1/download",
    params(DownloadQuery),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 400, description = "Invalid URL"),
        (status = 403, description = "Destination not allowed"),
        (status = 404, description = "Rendition not found"),
        (status = 422, description = "Unsupported source"),
        (status = 429, description = "Too many requests from this client"),
        (status = 500, description = "Mux failed"),
        (status = 502, description = "Download failed"),
        (status = 503, description = "Server busy or ffmpeg missing"),
        (status = 504, description = "Download timed out"),
        (status = 507, description = "Out of disk space")
    ),
    tag = "Media"
)]
pub async fn download(
    State(state): State<AppState>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Response {
    let query = match accept(query) {
        Ok(q) => q,
        Err(e) => return e.into_response(),
    };

    let job = match state.media.download(&query.url, &query.rendition_id).await {
        Ok(job) => job,
        Err(e) => return ApiError::from(e).into_response(),
    };

    // Errors past this point drop `job`, which removes the files.
    let file = match tokio::fs::File::open(&job.path).await {
        Ok(f) => f,
        Err(e) => return ApiError::from(MediaError::from_io("open download", e)).into_response(),
    };

    let content_type = mime_guess::from_path(&job.path).first_or(mime::APPLICATION_OCTET_STREAM);
    let disposition = format!("attachment; filename=\"{}\"", job.file_name);
    let size = job.size;
    info!("Streaming {} ({} bytes)", job.file_name, size);
    debug!("Serving from {}", job.scratch_dir().display());

    let stream = CleanupStream::new(ReaderStream::new(file), job.into_scratch(), size);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(header::CONTENT_LENGTH, size)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(stream))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Response body that owns the scratch job it reads from. The file handle is
/// closed before the directory is removed.
struct CleanupStream<S> {
    inner: S,
    scratch: ScratchJob,
    sent: u64,
    total: u64,
}

impl<S> CleanupStream<S> {
    fn new(inner: S, scratch: ScratchJob, total: u64) -> Self {
        Self {
            inner,
            scratch,
            sent: 0,
            total,
        }
    }
}

impl<S> Stream for CleanupStream<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Pin::new(&mut self.inner).poll_next(cx);
        if let Poll::Ready(Some(Ok(chunk))) = &polled {
            self.sent += chunk.len() as u64;
        }
        polled
    }
}

impl<S> Drop for CleanupStream<S> {
    fn drop(&mut self) {
        if self.sent < self.total {
            info!(
                job = %self.scratch.id(),
                "Client went away after {} of {} bytes",
                self.sent,
                self.total
            );
        }
    }
}
