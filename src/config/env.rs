use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerHost,
    ServerPort,
    YtDlpPath,
    FfmpegPath,
    ScratchDir,
    ResolveTimeoutSecs,
    DownloadTimeoutSecs,
    MuxTimeoutSecs,
    MaxConcurrentJobs,
    ManifestTtlSecs,
    ManifestCacheCapacity,
    BlockPrivateNetworks,
    ScratchMaxAgeSecs,
    JanitorIntervalSecs,
    RateLimitResolvePerMinute,
    RateLimitDownloadPerMinute,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerHost => "APP_HOST",
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::YtDlpPath => "YTDLP_PATH",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::ScratchDir => "SCRATCH_DIR",
            EnvKey::ResolveTimeoutSecs => "RESOLVE_TIMEOUT_SECS",
            EnvKey::DownloadTimeoutSecs => "DOWNLOAD_TIMEOUT_SECS",
            EnvKey::MuxTimeoutSecs => "MUX_TIMEOUT_SECS",
            EnvKey::MaxConcurrentJobs => "MAX_CONCURRENT_JOBS",
            EnvKey::ManifestTtlSecs => "MANIFEST_TTL_SECS",
            EnvKey::ManifestCacheCapacity => "MANIFEST_CACHE_CAPACITY",
            EnvKey::BlockPrivateNetworks => "BLOCK_PRIVATE_NETWORKS",
            EnvKey::ScratchMaxAgeSecs => "SCRATCH_MAX_AGE_SECS",
            EnvKey::JanitorIntervalSecs => "JANITOR_INTERVAL_SECS",
            EnvKey::RateLimitResolvePerMinute => "RATE_LIMIT_RESOLVE_PER_MINUTE",
            EnvKey::RateLimitDownloadPerMinute => "RATE_LIMIT_DOWNLOAD_PER_MINUTE",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Optional value; blank strings count as unset.
pub fn get_opt(key: EnvKey) -> Option<String> {
    get(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_flag(key: EnvKey, default: bool) -> bool {
    match get(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
