//! Periodic statistics sampler (spec.md §4.6).

use crate::directory::Directory;
use std::sync::Arc;
use std::time::Duration;

/// Runs forever, logging directory cardinalities and the live-session count
/// every `interval`. Intended to be `tokio::spawn`ed alongside the accept
/// loop; it never returns on its own.
pub async fn run(directory: Arc<Directory>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // First tick fires immediately; skip it so the first real sample is one
    // full interval after startup.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let stats = directory.stats();
        tracing::info!(
            groups = stats.groups,
            discoverable = stats.discoverable,
            discovering = stats.discovering,
            serving = stats.serving,
            connections = stats.connections,
            active_sessions = directory.active_sessions(),
            "statistics"
        );
    }
}
