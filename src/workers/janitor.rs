use crate::infrastructure::storage::scratch::ScratchSpace;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Periodically removes job directories that outlived any request, e.g. after
/// a crash skipped the normal drop-based cleanup.
pub async fn start_janitor(scratch: ScratchSpace, max_age: Duration, interval: Duration) {
    info!(
        "🧹 Starting scratch janitor on {} (every {:?}, max age {:?})",
        scratch.root().display(),
        interval,
        max_age
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; startup already purged.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        sweep_once(&scratch, max_age).await;
    }
}

pub async fn sweep_once(scratch: &ScratchSpace, max_age: Duration) -> usize {
    match scratch.sweep_older_than(max_age).await {
        Ok(removed) => {
            debug!("Janitor pass done, {} job(s) in use", scratch.live_jobs());
            removed
        }
        Err(e) => {
            error!("❌ Janitor sweep of {} failed: {}", scratch.root().display(), e);
            0
        }
    }
}
