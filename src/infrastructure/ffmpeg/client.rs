use crate::infrastructure::process::runner::{ProcessOutput, ProcessRunner, RunError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// ffmpeg used strictly as a container multiplexer.
#[derive(Clone)]
pub struct FfmpegClient {
    binary: PathBuf,
    runner: Arc<dyn ProcessRunner>,
}

impl FfmpegClient {
    pub fn new(binary: impl Into<PathBuf>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    /// Copies the first video stream of `video` and the first audio stream of
    /// `audio` into `output`. Streams are never re-encoded.
    pub async fn mux(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, RunError> {
        self.runner
            .run(&self.binary, &mux_args(video, audio, output), timeout)
            .await
    }
}

fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostdin",
        "-y",
        "-i",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(video.to_string_lossy().into_owned());
    args.push("-i".to_string());
    args.push(audio.to_string_lossy().into_owned());
    for arg in ["-map", "0:v:0", "-map", "1:a:0", "-c", "copy"] {
        args.push(arg.to_string());
    }

    let is_mp4 = output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));
    if is_mp4 {
        args.push("-movflags".to_string());
        args.push("+faststart".to_string());
    }

    args.push(output.to_string_lossy().into_owned());
    args
}
