use super::error::{MediaError, mentions_disk_full};
use super::model::{Rendition, StreamKind, mux_container};
use super::resolver::Resolver;
use crate::common::security::sanitize_filename;
use crate::infrastructure::ffmpeg::client::FfmpegClient;
use crate::infrastructure::process::runner::ProcessOutput;
use crate::infrastructure::storage::scratch::{ScratchJob, ScratchSpace};
use crate::infrastructure::ytdlp::client::YtDlpClient;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// A fully materialized file ready to be streamed. Dropping it deletes the
/// scratch directory and everything the fetch wrote there.
#[derive(Debug)]
pub struct DownloadJob {
    pub rendition: Rendition,
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    scratch: ScratchJob,
}

impl DownloadJob {
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.dir()
    }

    /// Gives up everything but the directory guard, which the caller keeps
    /// alive for as long as the file is being read.
    pub fn into_scratch(self) -> ScratchJob {
        self.scratch
    }
}

#[derive(Clone)]
pub struct Fetcher {
    resolver: Resolver,
    ytdlp: YtDlpClient,
    ffmpeg: Option<FfmpegClient>,
    scratch: ScratchSpace,
    download_timeout: Duration,
    mux_timeout: Duration,
}

impl Fetcher {
    pub fn new(
        resolver: Resolver,
        ytdlp: YtDlpClient,
        ffmpeg: Option<FfmpegClient>,
        scratch: ScratchSpace,
        download_timeout: Duration,
        mux_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            ytdlp,
            ffmpeg,
            scratch,
            download_timeout,
            mux_timeout,
        }
    }

    pub fn can_download(&self) -> bool {
        self.ffmpeg.is_some()
    }

    pub async fn fetch(&self, raw_url: &str, rendition_id: &str) -> Result<DownloadJob, MediaError> {
        let ffmpeg = self
            .ffmpeg
            .as_ref()
            .ok_or(MediaError::ToolUnavailable("ffmpeg"))?;

        let url = self.resolver.validate(raw_url).await?;
        let manifest = self.resolver.manifest_for(&url).await?;
        let rendition = manifest
            .find(rendition_id)
            .cloned()
            .ok_or_else(|| MediaError::RenditionNotFound(rendition_id.to_string()))?;
        let companion = if rendition.kind.has_audio() {
            None
        } else {
            manifest.companion_audio(&rendition).cloned()
        };

        // From here on every early return drops `job`, which removes whatever
        // was written so far.
        let job = self
            .scratch
            .create_job()
            .await
            .map_err(|e| MediaError::from_io("create scratch job", e))?;
        info!(job = %job.id(), rendition = %rendition.id, "Starting download of {}", url);

        let video = self.download_stream(&job, &url, &rendition, "video").await?;
        let path = match companion {
            Some(audio_rendition) => {
                let audio = self
                    .download_stream(&job, &url, &audio_rendition, "audio")
                    .await?;
                self.mux(ffmpeg, &job, &video, &audio).await?
            }
            None => {
                if rendition.kind == StreamKind::VideoOnly {
                    warn!(rendition = %rendition.id, "No audio rendition to pair with, serving video only");
                }
                video
            }
        };

        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|e| MediaError::from_io("stat download", e))?
            .len();
        let display_name = match rendition.height {
            Some(h) => format!("{}-{}p", manifest.title, h),
            None => manifest.title.clone(),
        };
        let file_name = sanitize_filename(&display_name, &extension_of(&path));

        info!(job = %job.id(), bytes = size, "Download ready: {}", file_name);
        Ok(DownloadJob {
            rendition,
            path,
            file_name,
            size,
            scratch: job,
        })
    }

    async fn download_stream(
        &self,
        job: &ScratchJob,
        url: &Url,
        rendition: &Rendition,
        stem: &str,
    ) -> Result<PathBuf, MediaError> {
        let template = job.path(&format!("{stem}.%(ext)s"));
        let out = self
            .ytdlp
            .download(url.as_str(), &rendition.id, &template, self.download_timeout)
            .await
            .map_err(|e| MediaError::from_run("download", e, MediaError::DownloadFailed))?;

        if !out.success() {
            return Err(tool_failure("yt-dlp", &out, MediaError::DownloadFailed));
        }

        job.find_file(stem)
            .await
            .map_err(|e| MediaError::from_io("scan scratch job", e))?
            .ok_or_else(|| {
                MediaError::DownloadFailed(format!("no {stem} file for rendition {}", rendition.id))
            })
    }

    async fn mux(
        &self,
        ffmpeg: &FfmpegClient,
        job: &ScratchJob,
        video: &Path,
        audio: &Path,
    ) -> Result<PathBuf, MediaError> {
        let container = mux_container(&extension_of(video), &extension_of(audio));
        let output = job.path(&format!("output.{container}"));
        info!(job = %job.id(), "Muxing into {}", container);

        let out = ffmpeg
            .mux(video, audio, &output, self.mux_timeout)
            .await
            .map_err(|e| MediaError::from_run("mux", e, MediaError::MuxFailed))?;
        if !out.success() {
            return Err(tool_failure("ffmpeg", &out, MediaError::MuxFailed));
        }
        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(MediaError::MuxFailed("ffmpeg produced no output".into()));
        }

        for input in [video, audio] {
            if let Err(e) = tokio::fs::remove_file(input).await {
                debug!("Could not remove mux input {}: {}", input.display(), e);
            }
        }
        Ok(output)
    }
}

fn tool_failure(tool: &str, out: &ProcessOutput, failed: fn(String) -> MediaError) -> MediaError {
    let tail = out.stderr_tail();
    warn!("{} exited with {:?}: {}", tool, out.exit_code, tail);
    if mentions_disk_full(&out.stderr_lossy()) {
        MediaError::DiskFull(tail)
    } else {
        failed(format!("{tool} exited with {:?}: {tail}", out.exit_code))
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}
