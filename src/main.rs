use anyhow::{Context, bail};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod middleware;
mod modules;
mod routes;
mod state;
mod workers;

use common::rate_limit::RateLimits;
use config::settings::AppConfig;
use infrastructure::process::locate;
use infrastructure::process::runner::{ProcessRunner, TokioProcessRunner};
use infrastructure::storage::scratch::ScratchSpace;
use modules::media::service::MediaService;
use state::{AppState, Tools};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("boltload=info,tower_http=info")),
        )
        .init();

    info!("Starting server...");
    let config = AppConfig::new();
    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner);

    let extractor = locate::discover(
        runner.as_ref(),
        config.ytdlp_path.as_deref(),
        "yt-dlp",
        "--version",
    )
    .await;
    let transcoder = locate::discover(
        runner.as_ref(),
        config.ffmpeg_path.as_deref(),
        "ffmpeg",
        "-version",
    )
    .await;

    let Some(ytdlp_path) = extractor.path.clone() else {
        bail!("yt-dlp was not found; install it or set YTDLP_PATH");
    };
    if !transcoder.is_available {
        warn!("ffmpeg was not found, serving rendition lists only");
    }

    let scratch = ScratchSpace::open(&config.scratch_dir)
        .await
        .with_context(|| format!("creating scratch dir {}", config.scratch_dir.display()))?;
    scratch
        .purge()
        .await
        .with_context(|| format!("purging scratch dir {}", config.scratch_dir.display()))?;

    tokio::spawn(workers::janitor::start_janitor(
        scratch.clone(),
        config.scratch_max_age,
        config.janitor_interval,
    ));

    let media = MediaService::from_config(
        &config,
        runner,
        &ytdlp_path,
        transcoder.path.as_deref(),
        scratch,
    );
    let limits = RateLimits::new(config.resolve_rate_limit, config.download_rate_limit);
    info!(
        "Rate limits per client: {}/min renditions, {}/min downloads",
        config.resolve_rate_limit, config.download_rate_limit
    );
    let app = app::create_app(AppState::new(media, Tools { extractor, transcoder }, limits));

    let addr = SocketAddr::new(config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
