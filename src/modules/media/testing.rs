//! Fixtures shared by the media tests: canned extractor output and a fake
//! tool chain that writes the files yt-dlp and ffmpeg would have written.

use super::cache::ManifestCache;
use super::fetcher::Fetcher;
use super::resolver::Resolver;
use super::service::MediaService;
use crate::infrastructure::ffmpeg::client::FfmpegClient;
use crate::infrastructure::process::fake::{self, FakeRunner, Invocation};
use crate::infrastructure::process::runner::{ProcessOutput, RunError};
use crate::infrastructure::storage::scratch::ScratchSpace;
use crate::infrastructure::ytdlp::client::YtDlpClient;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const YTDLP: &str = "/opt/tools/yt-dlp";
pub const FFMPEG: &str = "/opt/tools/ffmpeg";

/// Size of every fake media file, large enough to span several body chunks.
pub const PAYLOAD_LEN: usize = 64 * 1024;

pub const TWO_RENDITIONS: &str = r#"{
    "id": "abc",
    "title": "Test Clip",
    "thumbnail": "https://valid.test/thumb.jpg",
    "duration": 42.0,
    "formats": [
        {"format_id": "720p-video-only-id", "ext": "mp4", "vcodec": "avc1.4d401f", "acodec": "none",
         "width": 1280, "height": 720, "fps": 30, "tbr": 2000.0, "filesize": 5000000},
        {"format_id": "1080p-av", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "mp4a.40.2",
         "width": 1920, "height": 1080, "fps": 30, "tbr": 5000.0, "filesize_approx": 12000000}
    ]
}"#;

pub const SPLIT_STREAMS: &str = r#"{
    "id": "def",
    "title": "Split Clip",
    "duration": 10.5,
    "formats": [
        {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none", "format_note": "storyboard"},
        {"format_id": "audio-140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5},
        {"format_id": "720p-video-only-id", "ext": "mp4", "vcodec": "avc1.4d401f", "acodec": "none",
         "width": 1280, "height": 720, "tbr": 2000.0},
        {"format_id": "1080p-av", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "mp4a.40.2",
         "width": 1920, "height": 1080, "tbr": 5000.0}
    ]
}"#;

pub fn payload(tag: &str) -> Vec<u8> {
    let mut bytes = tag.as_bytes().to_vec();
    bytes.resize(PAYLOAD_LEN, b'.');
    bytes
}

/// Behaves like a healthy tool chain for the given `--dump-json` document.
pub fn default_script(json: &str, inv: &Invocation) -> Result<ProcessOutput, RunError> {
    if inv.program_name() == "ffmpeg" {
        inv.write_last_arg(&payload("muxed"));
        return Ok(fake::ok(""));
    }
    if inv.has_arg("--dump-json") {
        return Ok(fake::ok(json));
    }
    let id = inv.value_of("-f").unwrap_or_default();
    let ext = if id.starts_with("audio") { "m4a" } else { "mp4" };
    inv.write_output(ext, &payload(id));
    Ok(fake::ok(""))
}

pub fn scripted_tools(json: &'static str) -> FakeRunner {
    FakeRunner::new(move |inv| default_script(json, inv))
}

pub async fn pipeline(runner: Arc<FakeRunner>, root: &Path, with_ffmpeg: bool) -> (Resolver, Fetcher) {
    let ytdlp = YtDlpClient::new(YTDLP, runner.clone());
    let ffmpeg = with_ffmpeg.then(|| FfmpegClient::new(FFMPEG, runner.clone()));
    let resolver = Resolver::new(
        ytdlp.clone(),
        ManifestCache::new(Duration::from_secs(60), 8),
        Duration::from_secs(5),
        false,
    );
    let scratch = ScratchSpace::open(root).await.unwrap();
    let fetcher = Fetcher::new(
        resolver.clone(),
        ytdlp,
        ffmpeg,
        scratch,
        Duration::from_secs(5),
        Duration::from_secs(5),
    );
    (resolver, fetcher)
}

pub async fn service(runner: Arc<FakeRunner>, root: &Path, max_jobs: usize) -> MediaService {
    let (resolver, fetcher) = pipeline(runner, root, true).await;
    MediaService::new(resolver, fetcher, max_jobs)
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// No job directories left. Trash from a dropped job is removed in the
/// background and does not count.
pub fn scratch_is_empty(root: &Path) -> bool {
    files_in(root).iter().all(|name| !name.starts_with("job-"))
}
