use crate::infrastructure::ytdlp::client::{RawFormat, VideoInfo};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    VideoAudio,
    VideoOnly,
    AudioOnly,
}

impl StreamKind {
    pub fn has_video(self) -> bool {
        matches!(self, StreamKind::VideoAudio | StreamKind::VideoOnly)
    }

    pub fn has_audio(self) -> bool {
        matches!(self, StreamKind::VideoAudio | StreamKind::AudioOnly)
    }
}

/// One selectable format as reported by the extractor.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Rendition {
    pub id: String,
    pub container: String,
    pub resolution: String,
    pub height: Option<u32>,
    pub fps: Option<f32>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub bitrate_kbps: Option<f64>,
    pub estimated_size: Option<u64>,
    pub kind: StreamKind,
    pub note: Option<String>,
}

impl Rendition {
    /// `None` for formats without usable streams (storyboards, missing ids).
    pub fn from_raw(raw: &RawFormat) -> Option<Self> {
        let id = raw.format_id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
        let container = raw.ext.clone().unwrap_or_else(|| "mp4".to_string());
        let is_storyboard = container == "mhtml"
            || raw
                .format_note
                .as_deref()
                .is_some_and(|n| n.to_ascii_lowercase().contains("storyboard"));
        if is_storyboard {
            return None;
        }

        // Unknown codecs count as present; only an explicit "none" rules a stream out.
        let has_video = raw.vcodec.as_deref() != Some("none");
        let has_audio = raw.acodec.as_deref() != Some("none");
        let kind = match (has_video, has_audio) {
            (true, true) => StreamKind::VideoAudio,
            (true, false) => StreamKind::VideoOnly,
            (false, true) => StreamKind::AudioOnly,
            (false, false) => return None,
        };

        let height = raw.height.and_then(to_u32).filter(|_| kind.has_video());
        let width = raw.width.and_then(to_u32);
        let resolution = match (&raw.resolution, width, height) {
            (Some(r), _, _) if !r.trim().is_empty() => r.clone(),
            (_, Some(w), Some(h)) => format!("{w}x{h}"),
            (_, None, Some(h)) => format!("{h}p"),
            _ if kind == StreamKind::AudioOnly => "audio only".to_string(),
            _ => "unknown".to_string(),
        };

        Some(Self {
            id: id.to_string(),
            container,
            resolution,
            height,
            fps: raw.fps.map(|f| f as f32),
            vcodec: raw.vcodec.clone().filter(|c| c != "none"),
            acodec: raw.acodec.clone().filter(|c| c != "none"),
            bitrate_kbps: raw.tbr.or(raw.vbr).or(raw.abr).filter(|b| b.is_finite()),
            estimated_size: raw.filesize.or(raw.filesize_approx).and_then(to_u64),
            kind,
            note: raw.format_note.clone(),
        })
    }

    fn bitrate(&self) -> f64 {
        self.bitrate_kbps.unwrap_or(0.0)
    }
}

/// Everything one resolve learned about a URL.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Manifest {
    pub source_url: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration_seconds: Option<f64>,
    pub renditions: Vec<Rendition>,
}

impl Manifest {
    pub fn from_info(source_url: &str, info: VideoInfo) -> Self {
        let raw_formats = match info.formats {
            Some(formats) if !formats.is_empty() => formats,
            _ => vec![info.single],
        };

        let mut renditions: Vec<Rendition> = raw_formats.iter().filter_map(Rendition::from_raw).collect();
        renditions.sort_by(presentation_order);

        let mut seen = HashSet::new();
        renditions.retain(|r| seen.insert((r.height, r.kind, r.container.clone())));

        Self {
            source_url: source_url.to_string(),
            title: info
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Unknown Video".to_string()),
            thumbnail: info.thumbnail,
            duration_seconds: info.duration,
            renditions,
        }
    }

    pub fn find(&self, id: &str) -> Option<&Rendition> {
        self.renditions.iter().find(|r| r.id == id)
    }

    /// Best audio-only rendition to pair with a video-only one, preferring a
    /// container that muxes cleanly with the video's.
    pub fn companion_audio(&self, video: &Rendition) -> Option<&Rendition> {
        self.renditions
            .iter()
            .filter(|r| r.kind == StreamKind::AudioOnly)
            .max_by(|a, b| {
                let compat_a = audio_fits(&video.container, &a.container);
                let compat_b = audio_fits(&video.container, &b.container);
                compat_a
                    .cmp(&compat_b)
                    .then_with(|| a.bitrate().total_cmp(&b.bitrate()))
                    .then_with(|| b.id.cmp(&a.id))
            })
    }
}

/// Height descending, then bitrate descending, then id for a stable tie-break.
fn presentation_order(a: &Rendition, b: &Rendition) -> Ordering {
    b.height
        .unwrap_or(0)
        .cmp(&a.height.unwrap_or(0))
        .then_with(|| b.bitrate().total_cmp(&a.bitrate()))
        .then_with(|| a.id.cmp(&b.id))
}

fn audio_fits(video_ext: &str, audio_ext: &str) -> bool {
    mux_container(video_ext, audio_ext) != "mkv"
}

/// Output container for a stream-copy mux of the two inputs.
pub fn mux_container(video_ext: &str, audio_ext: &str) -> &'static str {
    match (video_ext, audio_ext) {
        ("mp4", "m4a" | "mp4" | "aac") => "mp4",
        ("webm", "webm" | "weba" | "opus") => "webm",
        _ => "mkv",
    }
}

fn to_u32(value: f64) -> Option<u32> {
    (value.is_finite() && value >= 0.0 && value <= u32::MAX as f64).then(|| value as u32)
}

fn to_u64(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value as u64)
}
