use super::cache::ManifestCache;
use super::error::MediaError;
use super::model::Manifest;
use crate::common::security::{self, UrlRejection};
use crate::infrastructure::ytdlp::client::{VideoInfo, YtDlpClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

const UNSUPPORTED_MARKERS: &[&str] = &[
    "Unsupported URL",
    "is not a valid URL",
    "No video formats found",
];

/// Turns a URL into a manifest of renditions using yt-dlp's metadata mode.
#[derive(Clone)]
pub struct Resolver {
    ytdlp: YtDlpClient,
    cache: ManifestCache,
    timeout: Duration,
    block_private_networks: bool,
}

impl Resolver {
    pub fn new(
        ytdlp: YtDlpClient,
        cache: ManifestCache,
        timeout: Duration,
        block_private_networks: bool,
    ) -> Self {
        Self {
            ytdlp,
            cache,
            timeout,
            block_private_networks,
        }
    }

    /// Shape check, then the destination policy. Runs before any subprocess.
    pub async fn validate(&self, raw_url: &str) -> Result<Url, MediaError> {
        let url = security::parse_media_url(raw_url).map_err(rejection)?;
        if self.block_private_networks {
            security::check_destination(&url).await.map_err(|e| {
                warn!("Security Alert: {} ({})", e, url);
                rejection(e)
            })?;
        }
        Ok(url)
    }

    /// Always asks the extractor; refreshes the cache.
    pub async fn resolve(&self, raw_url: &str) -> Result<Arc<Manifest>, MediaError> {
        let url = self.validate(raw_url).await?;
        self.extract(&url).await
    }

    /// Cached manifest for an already validated URL, extracting on a miss.
    pub async fn manifest_for(&self, url: &Url) -> Result<Arc<Manifest>, MediaError> {
        match self.cache.get(url.as_str()) {
            Some(manifest) => Ok(manifest),
            None => self.extract(url).await,
        }
    }

    async fn extract(&self, url: &Url) -> Result<Arc<Manifest>, MediaError> {
        info!("Analyzing URL: {}", url);

        let out = self
            .ytdlp
            .dump_json(url.as_str(), self.timeout)
            .await
            .map_err(|e| MediaError::from_run("analysis", e, MediaError::ExtractionFailed))?;

        if !out.success() {
            let stderr = out.stderr_lossy();
            warn!("Analysis failed for {}: {}", url, out.stderr_tail());
            return Err(if UNSUPPORTED_MARKERS.iter().any(|m| stderr.contains(m)) {
                MediaError::UnsupportedSource(out.stderr_tail())
            } else {
                MediaError::ExtractionFailed(out.stderr_tail())
            });
        }

        let info = VideoInfo::parse(&out.stdout)
            .map_err(|e| MediaError::ExtractionFailed(format!("unparsable extractor output: {e}")))?;
        let manifest = Manifest::from_info(url.as_str(), info);
        if manifest.renditions.is_empty() {
            return Err(MediaError::UnsupportedSource(
                "extractor reported no downloadable formats".into(),
            ));
        }

        let manifest = Arc::new(manifest);
        self.cache.insert(url.as_str(), manifest.clone());
        info!(
            cached = self.cache.len(),
            "Resolved '{}' with {} rendition(s)",
            manifest.title,
            manifest.renditions.len()
        );
        Ok(manifest)
    }
}

fn rejection(err: UrlRejection) -> MediaError {
    match err {
        UrlRejection::Malformed(reason) => MediaError::InvalidUrl(reason),
        UrlRejection::Unresolvable => MediaError::InvalidUrl("hostname could not be resolved".into()),
        UrlRejection::Blocked(ip) => MediaError::BlockedDestination(ip.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::process::fake::{self, FakeRunner};
    use crate::infrastructure::process::runner::RunError;
    use crate::modules::media::model::StreamKind;
    use crate::modules::media::testing::{self, TWO_RENDITIONS};

    fn resolver(runner: Arc<FakeRunner>, block_private: bool) -> Resolver {
        Resolver::new(
            YtDlpClient::new("/opt/tools/yt-dlp", runner),
            ManifestCache::new(Duration::from_secs(60), 8),
            Duration::from_secs(5),
            block_private,
        )
    }

    #[tokio::test]
    async fn two_renditions_sorted_highest_first() {
        let runner = Arc::new(testing::scripted_tools(TWO_RENDITIONS));
        let manifest = resolver(runner.clone(), false)
            .resolve("https://valid.test/watch?v=abc")
            .await
            .unwrap();

        assert_eq!(manifest.renditions.len(), 2);
        assert_eq!(manifest.renditions[0].height, Some(1080));
        assert_eq!(manifest.renditions[0].kind, StreamKind::VideoAudio);
        assert_eq!(manifest.renditions[1].height, Some(720));
        assert_eq!(manifest.renditions[1].kind, StreamKind::VideoOnly);
        assert_eq!(manifest.title, "Test Clip");

        let call = &runner.calls()[0];
        assert!(call.has_arg("--dump-json"));
        assert!(call.has_arg("--no-playlist"));
    }

    #[tokio::test]
    async fn malformed_urls_never_reach_the_extractor() {
        let runner = Arc::new(testing::scripted_tools(TWO_RENDITIONS));
        let resolver = resolver(runner.clone(), true);

        for raw in ["", "valid.test/watch?v=abc", "javascript:alert(1)", "https://"] {
            let err = resolver.resolve(raw).await.unwrap_err();
            assert!(matches!(err, MediaError::InvalidUrl(_)), "{raw:?} gave {err:?}");
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn private_destinations_are_blocked_before_extraction() {
        let runner = Arc::new(testing::scripted_tools(TWO_RENDITIONS));
        let err = resolver(runner.clone(), true)
            .resolve("http://169.254.169.254/latest/meta-data")
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::BlockedDestination(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn unsupported_url_from_extractor() {
        let runner = Arc::new(FakeRunner::new(|_| {
            Ok(fake::failed(1, "ERROR: Unsupported URL: https://valid.test/nothing"))
        }));
        let err = resolver(runner, false)
            .resolve("https://valid.test/nothing")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedSource(_)));
    }

    #[tokio::test]
    async fn other_failures_are_extraction_failures() {
        let runner = Arc::new(FakeRunner::new(|_| Ok(fake::failed(1, "ERROR: HTTP Error 403"))));
        let err = resolver(runner, false).resolve("https://valid.test/v").await.unwrap_err();
        assert!(matches!(err, MediaError::ExtractionFailed(_)));

        let runner = Arc::new(FakeRunner::new(|_| Ok(fake::ok("this is not json"))));
        let err = resolver(runner, false).resolve("https://valid.test/v").await.unwrap_err();
        assert!(matches!(err, MediaError::ExtractionFailed(_)));
    }

    #[tokio::test]
    async fn empty_format_list_is_unsupported() {
        let runner = Arc::new(FakeRunner::new(|_| Ok(fake::ok(r#"{"title": "x", "formats": []}"#))));
        let err = resolver(runner, false).resolve("https://valid.test/v").await.unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedSource(_)));
    }

    #[tokio::test]
    async fn extractor_timeout() {
        let runner = Arc::new(FakeRunner::new(|inv| {
            Err(RunError::Timeout {
                program: inv.program_name(),
                timeout: Duration::from_secs(5),
            })
        }));
        let err = resolver(runner, false).resolve("https://valid.test/v").await.unwrap_err();
        assert!(matches!(err, MediaError::Timeout(_)));
    }

    #[tokio::test]
    async fn manifest_for_reuses_cached_resolve() {
        let runner = Arc::new(testing::scripted_tools(TWO_RENDITIONS));
        let resolver = resolver(runner.clone(), false);
        let url = resolver.validate("https://valid.test/watch?v=abc").await.unwrap();

        resolver.resolve(url.as_str()).await.unwrap();
        let cached = resolver.manifest_for(&url).await.unwrap();

        assert_eq!(cached.renditions.len(), 2);
        assert_eq!(runner.count("yt-dlp"), 1);
    }
}
