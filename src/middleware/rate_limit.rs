use crate::common::rate_limit::ClientRateLimiter;
use crate::common::response::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::{debug, warn};

/// Per-peer budget in front of a route. Requests without a known peer address
/// (the server was not started with connect info) pass through.
pub async fn rate_limit(
    State(limiter): State<ClientRateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    if !limiter.is_enabled() {
        return next.run(req).await;
    }

    let Some(ConnectInfo(peer)) = req.extensions().get::<ConnectInfo<SocketAddr>>().copied() else {
        debug!("No peer address on request, skipping rate limit");
        return next.run(req).await;
    };

    match limiter.check(peer.ip()) {
        Ok(allowed) => {
            debug!(
                client = %peer.ip(),
                "{} of {} requests left this minute",
                allowed.remaining,
                allowed.limit
            );
            next.run(req).await
        }
        Err(limited) => {
            // Retry-After is whole seconds, rounded up.
            let wait = (limited.retry_after.as_secs()
                + u64::from(limited.retry_after.subsec_nanos() > 0))
            .max(1);
            warn!(
                client = %peer.ip(),
                path = %req.uri().path(),
                "Rate limit of {}/minute exceeded",
                limited.limit
            );
            let mut res = ApiError(
                format!("Too many requests, try again in {wait}s"),
                StatusCode::TOO_MANY_REQUESTS,
            )
            .into_response();
            if let Ok(value) = HeaderValue::from_str(&wait.to_string()) {
                res.headers_mut().insert(header::RETRY_AFTER, value);
            }
            res
        }
    }
}
