use super::cache::ManifestCache;
use super::error::MediaError;
use super::fetcher::{DownloadJob, Fetcher};
use super::model::Manifest;
use super::resolver::Resolver;
use crate::config::settings::AppConfig;
use crate::infrastructure::ffmpeg::client::FfmpegClient;
use crate::infrastructure::process::runner::ProcessRunner;
use crate::infrastructure::storage::scratch::ScratchSpace;
use crate::infrastructure::ytdlp::client::YtDlpClient;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Entry point for the HTTP layer. Bounds how many resolve/fetch operations
/// drive external tools at once.
#[derive(Clone)]
pub struct MediaService {
    resolver: Resolver,
    fetcher: Fetcher,
    limiter: Arc<Semaphore>,
}

impl MediaService {
    pub fn new(resolver: Resolver, fetcher: Fetcher, max_concurrent_jobs: usize) -> Self {
        Self {
            resolver,
            fetcher,
            limiter: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        runner: Arc<dyn ProcessRunner>,
        ytdlp_path: &Path,
        ffmpeg_path: Option<&Path>,
        scratch: ScratchSpace,
    ) -> Self {
        let ytdlp = YtDlpClient::new(ytdlp_path, runner.clone());
        let ffmpeg = ffmpeg_path.map(|path| FfmpegClient::new(path, runner));
        let resolver = Resolver::new(
            ytdlp.clone(),
            ManifestCache::new(config.manifest_ttl, config.manifest_cache_capacity),
            config.resolve_timeout,
            config.block_private_networks,
        );
        let fetcher = Fetcher::new(
            resolver.clone(),
            ytdlp,
            ffmpeg,
            scratch,
            config.download_timeout,
            config.mux_timeout,
        );
        Self::new(resolver, fetcher, config.max_concurrent_jobs)
    }

    pub fn can_download(&self) -> bool {
        self.fetcher.can_download()
    }

    pub async fn renditions(&self, raw_url: &str) -> Result<Arc<Manifest>, MediaError> {
        let _permit = self.permit()?;
        self.resolver.resolve(raw_url).await
    }

    /// The slot is released once the file is ready; streaming it out does not
    /// count against the limit.
    pub async fn download(&self, raw_url: &str, rendition_id: &str) -> Result<DownloadJob, MediaError> {
        let _permit = self.permit()?;
        self.fetcher.fetch(raw_url, rendition_id).await
    }

    fn permit(&self) -> Result<SemaphorePermit<'_>, MediaError> {
        self.limiter.try_acquire().map_err(|_| MediaError::Busy)
    }
}
