use crate::infrastructure::process::runner::{ProcessOutput, ProcessRunner, RunError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Thin wrapper that knows yt-dlp's command line. Interpreting the outcome is
/// left to the caller.
#[derive(Clone)]
pub struct YtDlpClient {
    binary: PathBuf,
    runner: Arc<dyn ProcessRunner>,
}

impl YtDlpClient {
    pub fn new(binary: impl Into<PathBuf>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    /// Metadata only, nothing is downloaded.
    pub async fn dump_json(&self, url: &str, timeout: Duration) -> Result<ProcessOutput, RunError> {
        let args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--quiet".to_string(),
            url.to_string(),
        ];
        self.runner.run(&self.binary, &args, timeout).await
    }

    /// Downloads exactly one format. `output_template` may contain `%(ext)s`.
    pub async fn download(
        &self,
        url: &str,
        format_id: &str,
        output_template: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, RunError> {
        let args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--quiet".to_string(),
            "--no-part".to_string(),
            "--no-mtime".to_string(),
            "-f".to_string(),
            format_id.to_string(),
            "-o".to_string(),
            output_template.to_string_lossy().into_owned(),
            url.to_string(),
        ];
        self.runner.run(&self.binary, &args, timeout).await
    }
}

/// Subset of the `--dump-json` document we read.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VideoInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub webpage_url: Option<String>,
    pub formats: Option<Vec<RawFormat>>,
    // Top-level format fields, present when the extractor reports a single file.
    #[serde(flatten)]
    pub single: RawFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawFormat {
    pub format_id: Option<String>,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub fps: Option<f64>,
    pub tbr: Option<f64>,
    pub abr: Option<f64>,
    pub vbr: Option<f64>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
    pub format_note: Option<String>,
    pub resolution: Option<String>,
}

impl VideoInfo {
    /// Reads the first JSON document; playlist URLs print one per line.
    pub fn parse(stdout: &[u8]) -> Result<Self, serde_json::Error> {
        let mut docs = serde_json::Deserializer::from_slice(stdout).into_iter::<Self>();
        match docs.next() {
            Some(doc) => doc,
            None => serde_json::from_slice(stdout),
        }
    }
}
