use crate::config::env::{self, EnvKey};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_host: IpAddr,
    pub server_port: u16,
    pub ytdlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub scratch_dir: PathBuf,
    pub resolve_timeout: Duration,
    pub download_timeout: Duration,
    pub mux_timeout: Duration,
    pub max_concurrent_jobs: usize,
    pub manifest_ttl: Duration,
    pub manifest_cache_capacity: usize,
    pub block_private_networks: bool,
    pub scratch_max_age: Duration,
    pub janitor_interval: Duration,
    /// Requests per minute per client IP; 0 disables the limit.
    pub resolve_rate_limit: u32,
    pub download_rate_limit: u32,
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            server_host: env::get_parsed(EnvKey::ServerHost, IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            ytdlp_path: env::get_opt(EnvKey::YtDlpPath).map(PathBuf::from),
            ffmpeg_path: env::get_opt(EnvKey::FfmpegPath).map(PathBuf::from),
            scratch_dir: PathBuf::from(env::get_or(EnvKey::ScratchDir, "temp_downloads")),
            resolve_timeout: secs(env::get_parsed(EnvKey::ResolveTimeoutSecs, 30)),
            download_timeout: secs(env::get_parsed(EnvKey::DownloadTimeoutSecs, 300)),
            mux_timeout: secs(env::get_parsed(EnvKey::MuxTimeoutSecs, 300)),
            max_concurrent_jobs: env::get_parsed(EnvKey::MaxConcurrentJobs, 4).max(1),
            manifest_ttl: secs(env::get_parsed(EnvKey::ManifestTtlSecs, 600)),
            manifest_cache_capacity: env::get_parsed(EnvKey::ManifestCacheCapacity, 50).max(1),
            block_private_networks: env::get_flag(EnvKey::BlockPrivateNetworks, true),
            scratch_max_age: secs(env::get_parsed(EnvKey::ScratchMaxAgeSecs, 21_600)),
            janitor_interval: secs(env::get_parsed(EnvKey::JanitorIntervalSecs, 600)),
            resolve_rate_limit: env::get_parsed(EnvKey::RateLimitResolvePerMinute, 10),
            download_rate_limit: env::get_parsed(EnvKey::RateLimitDownloadPerMinute, 2),
        }
    }

    /// Defaults with a caller-chosen scratch root and no destination policy.
    #[cfg(test)]
    pub fn with_scratch_dir(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            server_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            server_port: 0,
            ytdlp_path: None,
            ffmpeg_path: None,
            scratch_dir: scratch_dir.into(),
            resolve_timeout: secs(30),
            download_timeout: secs(300),
            mux_timeout: secs(300),
            max_concurrent_jobs: 4,
            manifest_ttl: secs(600),
            manifest_cache_capacity: 50,
            block_private_networks: false,
            scratch_max_age: secs(21_600),
            janitor_interval: secs(600),
            resolve_rate_limit: 0,
            download_rate_limit: 0,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}
