use utoipa::OpenApi;
use crate::infrastructure::process::locate::ToolInfo;
use crate::modules::media::dto::HealthResponse;
use crate::modules::media::model::{Manifest, Rendition, StreamKind};

#[derive(OpenApi)]
#[openapi(
    info(title = "BoltLoad", description = "Resolve media URLs and download a chosen rendition"),
    paths(
        crate::modules::media::handler::list_renditions,
        crate::modules::media::handler::health,
        crate::modules::media::stream_handler::download,
    ),
    components(
        schemas(Manifest, Rendition, StreamKind, HealthResponse, ToolInfo)
    ),
    tags(
        (name = "Media", description = "Rendition listing and downloads")
    )
)]
pub struct ApiDoc;
