use crate::common::rate_limit::RateLimits;
use crate::infrastructure::process::locate::ToolInfo;
use crate::modules::media::service::MediaService;
use std::sync::Arc;

/// What startup discovery found, reported by the health endpoint.
#[derive(Debug, Clone)]
pub struct Tools {
    pub extractor: ToolInfo,
    pub transcoder: ToolInfo,
}

#[derive(Clone)]
pub struct AppState {
    pub media: MediaService,
    pub tools: Arc<Tools>,
    pub limits: RateLimits,
}

impl AppState {
    pub fn new(media: MediaService, tools: Tools, limits: RateLimits) -> Self {
        Self {
            media,
            tools: Arc::new(tools),
            limits,
        }
    }
}
