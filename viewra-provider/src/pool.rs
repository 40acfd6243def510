//! `ProviderPool`: discovers, spawns, and supervises provider plugin
//! processes, and hands out an RPC channel per provider id.
//!
//! Mirrors the table-behind-one-lock shape every other component in this
//! system uses for shared state (`viewra_core::process::ProcessRegistry`,
//! `viewra_core::session::SessionManager`), generalized here to a
//! concurrent map since entries are looked up far more often than mutated.

use dashmap::DashMap;
use failsafe::CircuitBreaker;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tonic::transport::Channel;
use tracing::{info, warn};
use viewra_core::models::Container;
use viewra_core::resilience::circuit_breaker;
use viewra_proto::TranscodeProviderClient;

use crate::error::{ProviderError, Result};
use crate::manifest::{discover_plugins, DiscoveredPlugin, PluginManifest};
use crate::uds;

/// Per-plugin-id breaker guarding against respawning a binary that keeps
/// failing to start or handshake. Opens after repeated `spawn_one` failures
/// so `refresh` stops hammering a broken plugin every poll.
type SpawnBreaker = failsafe::StateMachine<
    failsafe::failure_policy::ConsecutiveFailures<failsafe::backoff::Exponential>,
    (),
>;

/// Fires after a provider crashes or is replaced during hot reload.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    Crashed { provider_id: String },
    Reloaded { provider_id: String },
}

struct ProviderEntry {
    manifest: PluginManifest,
    binary_path: PathBuf,
    socket_path: PathBuf,
    binary_mtime: SystemTime,
    channel: Channel,
    child: Child,
}

pub struct ProviderPool {
    plugin_dir: PathBuf,
    drain_timeout: Duration,
    providers: DashMap<String, ProviderEntry>,
    spawn_breakers: DashMap<String, SpawnBreaker>,
    events_tx: tokio::sync::mpsc::UnboundedSender<ProviderEvent>,
}

impl ProviderPool {
    #[must_use]
    pub fn new(
        plugin_dir: PathBuf,
        drain_timeout: Duration,
    ) -> (Self, tokio::sync::mpsc::UnboundedReceiver<ProviderEvent>) {
        let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
        (
            Self {
                plugin_dir,
                drain_timeout,
                providers: DashMap::new(),
                spawn_breakers: DashMap::new(),
                events_tx,
            },
            events_rx,
        )
    }

    /// Full discovery pass: enumerate the plugin directory and spawn every
    /// transcoder plugin not already running. Called at startup and from
    /// `/playback/plugins/refresh`.
    pub async fn refresh(&self) -> Result<usize> {
        let discovered = discover_plugins(&self.plugin_dir).await?;
        let mut spawned = 0;
        for plugin in discovered {
            let id = plugin.manifest.id.clone();
            if self.providers.contains_key(&id) {
                continue;
            }

            let permitted = self
                .spawn_breakers
                .entry(id.clone())
                .or_insert_with(circuit_breaker::create_default)
                .is_call_permitted();
            if !permitted {
                warn!(provider_id = %id, "spawn circuit open, skipping plugin this round");
                continue;
            }

            match self.spawn_one(plugin).await {
                Ok(id) => {
                    info!(provider_id = %id, "provider plugin registered");
                    if let Some(breaker) = self.spawn_breakers.get(&id) {
                        breaker.on_success();
                    }
                    spawned += 1;
                }
                Err(err) => {
                    if let Some(breaker) = self.spawn_breakers.get(&id) {
                        breaker.on_error();
                    }
                    warn!(%err, "failed to start provider plugin");
                }
            }
        }
        Ok(spawned)
    }

    async fn spawn_one(&self, plugin: DiscoveredPlugin) -> Result<String> {
        let id = plugin.manifest.id.clone();
        let socket_path = plugin
            .binary_path
            .parent()
            .unwrap_or(Path::new("."))
            .join("plugin.sock");
        let _ = tokio::fs::remove_file(&socket_path).await;

        let child = Command::new(&plugin.binary_path)
            .env("VIEWRA_PLUGIN_SOCKET", &socket_path)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProviderError::Spawn {
                path: plugin.binary_path.display().to_string(),
                source,
            })?;

        let channel = connect_with_retry(&id, &socket_path).await?;
        let binary_mtime = tokio::fs::metadata(&plugin.binary_path)
            .await
            .ok()
            .and_then(|meta| meta.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        self.providers.insert(
            id.clone(),
            ProviderEntry {
                manifest: plugin.manifest,
                binary_path: plugin.binary_path,
                socket_path,
                binary_mtime,
                channel,
                child,
            },
        );

        Ok(id)
    }

    /// Highest-priority registered provider whose capabilities include
    /// `container`, per spec.md's P9 property. Ties on priority are broken
    /// lexicographically by provider id (§4.5), since `DashMap`'s iteration
    /// order is otherwise unspecified.
    #[must_use]
    pub fn select_provider(&self, container: Container) -> Option<String> {
        let token = container.to_string();
        self.providers
            .iter()
            .filter(|entry| entry.manifest.capabilities.iter().any(|c| c == &token))
            .map(|entry| (entry.manifest.priority, entry.manifest.id.clone()))
            .max_by_key(|(priority, id)| (*priority, std::cmp::Reverse(id.clone())))
            .map(|(_, id)| id)
    }

    #[must_use]
    pub fn client_for(&self, provider_id: &str) -> Option<TranscodeProviderClient<Channel>> {
        self.providers
            .get(provider_id)
            .map(|entry| TranscodeProviderClient::new(entry.channel.clone()))
    }

    /// Convenience wrapper pairing the channel with the instrumented
    /// `ProviderClient`, for callers (the playback controller) that only
    /// ever want the typed wrapper, never the raw tonic client.
    #[must_use]
    pub fn provider_client(&self, provider_id: &str) -> Option<crate::client::ProviderClient> {
        self.providers
            .get(provider_id)
            .map(|entry| crate::client::ProviderClient::new(provider_id.to_string(), entry.channel.clone()))
    }

    #[must_use]
    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.iter().map(|e| e.key().clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Check every registered plugin's binary mtime and respawn any that
    /// changed on disk: drain (wait up to `drain_timeout`, then force-kill),
    /// spawn the new binary, re-handshake, replace the entry.
    pub async fn check_reloads(&self) {
        let stale: Vec<String> = {
            let mut stale = Vec::new();
            for entry in self.providers.iter() {
                if let Ok(meta) = tokio::fs::metadata(&entry.binary_path).await {
                    if let Ok(mtime) = meta.modified() {
                        if mtime > entry.binary_mtime {
                            stale.push(entry.manifest.id.clone());
                        }
                    }
                }
            }
            stale
        };

        for provider_id in stale {
            if let Err(err) = self.reload_one(&provider_id).await {
                warn!(%provider_id, %err, "failed to hot-reload provider plugin");
            }
        }
    }

    async fn reload_one(&self, provider_id: &str) -> Result<()> {
        let Some((_, mut old)) = self.providers.remove(provider_id) else {
            return Ok(());
        };

        info!(%provider_id, "provider binary changed on disk, reloading");
        tokio::select! {
            _ = old.child.wait() => {}
            _ = sleep(self.drain_timeout) => {
                warn!(%provider_id, "provider did not exit within drain timeout, killing");
                let _ = old.child.kill().await;
            }
        }

        let plugin = DiscoveredPlugin {
            manifest: old.manifest,
            manifest_path: old.binary_path.with_file_name("manifest.toml"),
            binary_path: old.binary_path,
        };
        self.spawn_one(plugin).await?;
        let _ = self.events_tx.send(ProviderEvent::Reloaded {
            provider_id: provider_id.to_string(),
        });
        viewra_core::metrics::provider::RELOADS_TOTAL
            .with_label_values(&[provider_id])
            .inc();
        Ok(())
    }

    /// Forcibly terminate every provider process. Called at server shutdown.
    pub async fn shutdown_all(&self) {
        let ids = self.provider_ids();
        for id in ids {
            if let Some((_, mut entry)) = self.providers.remove(&id) {
                let _ = entry.child.kill().await;
                let _ = tokio::fs::remove_file(&entry.socket_path).await;
            }
        }
    }
}

async fn connect_with_retry(provider_id: &str, socket_path: &PathBuf) -> Result<Channel> {
    const ATTEMPTS: u32 = 20;
    const DELAY: Duration = Duration::from_millis(100);

    let mut last_err = None;
    for _ in 0..ATTEMPTS {
        match uds::connect(provider_id, socket_path).await {
            Ok(channel) => return Ok(channel),
            Err(err) => {
                last_err = Some(err);
                sleep(DELAY).await;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| ProviderError::NotFound(provider_id.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PluginManifest;
    use tonic::transport::Endpoint;

    fn lazy_channel() -> Channel {
        Endpoint::try_from("http://[::]:1")
            .expect("static endpoint URI is always valid")
            .connect_lazy()
    }

    fn spawn_noop() -> Child {
        Command::new("sleep")
            .arg("100")
            .kill_on_drop(true)
            .spawn()
            .expect("spawn sleep")
    }

    fn insert(pool: &ProviderPool, id: &str, priority: i32, capabilities: &[&str]) {
        pool.providers.insert(
            id.to_string(),
            ProviderEntry {
                manifest: PluginManifest {
                    id: id.to_string(),
                    name: id.to_string(),
                    kind: "transcoder".to_string(),
                    capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
                    priority,
                },
                binary_path: PathBuf::from("/bin/true"),
                socket_path: PathBuf::from("/tmp/nonexistent.sock"),
                binary_mtime: SystemTime::UNIX_EPOCH,
                channel: lazy_channel(),
                child: spawn_noop(),
            },
        );
    }

    fn pool() -> ProviderPool {
        let (pool, _events) = ProviderPool::new(PathBuf::from("/nonexistent"), Duration::from_secs(1));
        pool
    }

    #[tokio::test]
    async fn select_provider_picks_highest_priority() {
        let pool = pool();
        insert(&pool, "low", 1, &["mp4"]);
        insert(&pool, "high", 10, &["mp4"]);
        assert_eq!(pool.select_provider(Container::Mp4), Some("high".to_string()));
    }

    #[tokio::test]
    async fn select_provider_breaks_priority_ties_lexicographically() {
        let pool = pool();
        insert(&pool, "zeta", 5, &["dash"]);
        insert(&pool, "alpha", 5, &["dash"]);
        insert(&pool, "mu", 5, &["dash"]);
        assert_eq!(pool.select_provider(Container::Dash), Some("alpha".to_string()));
    }

    #[tokio::test]
    async fn select_provider_ignores_capability_mismatch() {
        let pool = pool();
        insert(&pool, "only-mp4", 10, &["mp4"]);
        assert_eq!(pool.select_provider(Container::Hls), None);
    }
}
