use axum::Router;
use axum::middleware;
use axum::routing::get;
use crate::middleware::rate_limit::rate_limit;
use crate::state::AppState;

pub mod cache;
pub mod dto;
pub mod error;
pub mod fetcher;
pub mod handler;
pub mod model;
pub mod resolver;
pub mod service;
pub mod stream_handler;
#[cfg(test)]
pub mod testing;

pub fn router(state: AppState) -> Router<AppState> {
    let resolve_routes = Router::new()
        .route("/renditions", get(handler::list_renditions))
        .route_layer(middleware::from_fn_with_state(
            state.limits.resolve.clone(),
            rate_limit,
        ));

    let download_routes = Router::new()
        .route("/download", get(stream_handler::download))
        .route_layer(middleware::from_fn_with_state(
            state.limits.download.clone(),
            rate_limit,
        ));

    resolve_routes.merge(download_routes)
}
