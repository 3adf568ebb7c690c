use crate::infrastructure::process::locate::ToolInfo;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RenditionsQuery {
    /// Page or media URL understood by yt-dlp
    #[validate(length(min = 1, max = 2048, message = "url is required"))]
    pub url: String,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    #[validate(length(min = 1, max = 2048, message = "url is required"))]
    pub url: String,
    /// Rendition id from a previous renditions call
    #[serde(rename = "renditionId")]
    #[validate(length(min = 1, max = 128, message = "renditionId is required"))]
    pub rendition_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub extractor: ToolInfo,
    pub transcoder: ToolInfo,
    pub downloads_enabled: bool,
}
