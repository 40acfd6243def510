//! Background hot-reload watcher: polls every registered plugin's binary
//! mtime on a timer and triggers `ProviderPool::check_reloads` when it
//! changes. A timer rather than a filesystem watcher, per spec.md §6 — no
//! new dependency needed beyond `tokio::time`.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::pool::ProviderPool;

pub fn spawn_reload_watcher(
    pool: Arc<ProviderPool>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => pool.check_reloads().await,
            }
        }
    })
}
