use std::sync::Arc;
use std::time::Duration;
use tokio::{task::JoinHandle, time::interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{keys, CacheMetrics, CacheStats, TtlCache};
use crate::jobs::{JobKind, JobRecord};
use crate::models::{Platform, PlatformStatus, Playlist, Track};
use crate::pagination::Page;

/// Shortest period accepted by [`CacheRegistry::spawn_sweeper`].
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// TTL and capacity of every named cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub platforms_ttl: Duration,
    pub playlists_ttl: Duration,
    pub tracks_ttl: Duration,
    pub history_ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            platforms_ttl: Duration::from_secs(300), // 5 minutos
            playlists_ttl: Duration::from_secs(120),
            tracks_ttl: Duration::from_secs(120),
            history_ttl: Duration::from_secs(300),
            max_entries: 100,
        }
    }
}

/// The named caches of the data-access layer.
///
/// One [`TtlCache`] per data domain, each with its own TTL and capacity, so
/// invalidating or filling one domain never evicts another. Job status is
/// deliberately absent: polling always goes to the server.
///
/// Build one at startup, share it with `Arc`, and call
/// [`clear_all`](Self::clear_all) on logout so nothing leaks into the next
/// session.
#[derive(Debug)]
pub struct CacheRegistry {
    platforms: TtlCache<Vec<PlatformStatus>>,
    playlists: TtlCache<Page<Playlist>>,
    tracks: TtlCache<Page<Track>>,
    history: TtlCache<Vec<JobRecord>>,
}

impl CacheRegistry {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            platforms: TtlCache::new("platforms", settings.platforms_ttl, settings.max_entries),
            playlists: TtlCache::new("playlists", settings.playlists_ttl, settings.max_entries),
            tracks: TtlCache::new("tracks", settings.tracks_ttl, settings.max_entries),
            history: TtlCache::new("history", settings.history_ttl, settings.max_entries),
        }
    }

    /// Platform connection status list.
    pub fn platforms(&self) -> &TtlCache<Vec<PlatformStatus>> {
        &self.platforms
    }

    pub fn playlists(&self) -> &TtlCache<Page<Playlist>> {
        &self.playlists
    }

    pub fn tracks(&self) -> &TtlCache<Page<Track>> {
        &self.tracks
    }

    /// Conversion and sync history, keyed by [`keys::history`].
    pub fn history(&self) -> &TtlCache<Vec<JobRecord>> {
        &self.history
    }

    /// Drops every cached playlist and track page of `platform`.
    pub fn invalidate_platform(&self, platform: Platform) -> usize {
        let pattern = keys::platform_pattern(platform);
        let removed =
            self.playlists.invalidate_pattern(&pattern) + self.tracks.invalidate_pattern(&pattern);
        debug!(%platform, removed, "invalidated platform pages");
        removed
    }

    /// Forgets everything cached about a platform, connection status included.
    pub fn disconnect(&self, platform: Platform) {
        self.invalidate_platform(platform);
        self.platforms.invalidate(keys::PLATFORMS);
    }

    pub fn invalidate_history(&self, kind: JobKind) {
        self.history.invalidate(keys::history(kind));
    }

    /// Drops every entry of every cache.
    pub fn clear_all(&self) {
        let removed = self.platforms.clear()
            + self.playlists.clear()
            + self.tracks.clear()
            + self.history.clear();
        info!("🗑️ Cache registry cleared ({} entries)", removed);
    }

    /// Sweeps expired entries from every cache, returning how many went.
    pub fn cleanup_expired(&self) -> usize {
        self.platforms.cleanup_expired()
            + self.playlists.cleanup_expired()
            + self.tracks.cleanup_expired()
            + self.history.cleanup_expired()
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        vec![
            self.platforms.stats(),
            self.playlists.stats(),
            self.tracks.stats(),
            self.history.stats(),
        ]
    }

    pub fn metrics(&self) -> Vec<(&'static str, CacheMetrics)> {
        vec![
            (self.platforms.name(), self.platforms.metrics()),
            (self.playlists.name(), self.playlists.metrics()),
            (self.tracks.name(), self.tracks.metrics()),
            (self.history.name(), self.history.metrics()),
        ]
    }

    /// Starts a background task sweeping expired entries every `every`,
    /// until `shutdown` is cancelled. Periods under one second are raised
    /// to one second.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(every.max(MIN_SWEEP_INTERVAL));

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = registry.cleanup_expired();
                        if removed > 0 {
                            info!("🧹 Cache cleanup: removed {} expired entries", removed);
                        }
                    }
                }
            }

            debug!("cache sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobStatus;
    use crate::pagination::{PageQuery, PagingMode};

    fn playlist_page(name: &str) -> Page<Playlist> {
        Page::new(vec![Playlist {
            id: name.to_string(),
            name: name.to_string(),
            description: None,
            track_count: Some(3),
            image_url: None,
            owner: None,
        }])
    }

    fn registry() -> CacheRegistry {
        CacheRegistry::new(&CacheSettings::default())
    }

    #[test]
    fn test_caches_are_isolated() {
        let settings = CacheSettings {
            max_entries: 1,
            ..CacheSettings::default()
        };
        let registry = CacheRegistry::new(&settings);
        let query = PageQuery::first(PagingMode::Offset, 20, None);

        registry
            .playlists()
            .set(keys::playlists(Platform::Spotify, &query), playlist_page("a"));
        registry
            .history()
            .set(keys::SYNC_HISTORY, vec![JobRecord::new("j1", JobKind::Sync, JobStatus::Completed)]);

        // filling one cache up to capacity leaves the other alone
        registry
            .playlists()
            .set(keys::playlists(Platform::Youtube, &query), playlist_page("b"));
        assert_eq!(registry.playlists().len(), 1);
        assert!(registry.history().get(keys::SYNC_HISTORY).is_some());

        registry.playlists().clear();
        assert!(registry.history().get(keys::SYNC_HISTORY).is_some());
    }

    #[test]
    fn test_invalidate_platform() {
        let registry = registry();
        let query = PageQuery::first(PagingMode::Offset, 20, None);

        registry
            .playlists()
            .set(keys::playlists(Platform::Spotify, &query), playlist_page("a"));
        registry
            .playlists()
            .set(keys::playlists(Platform::Youtube, &query), playlist_page("b"));
        registry.tracks().set(
            keys::tracks(Platform::Spotify, "a", &query),
            Page::new(Vec::new()),
        );
        registry.platforms().set(keys::PLATFORMS, Vec::new());

        assert_eq!(registry.invalidate_platform(Platform::Spotify), 2);
        assert_eq!(registry.playlists().len(), 1);
        assert!(registry.tracks().is_empty());
        assert!(registry.platforms().get(keys::PLATFORMS).is_some());

        registry.disconnect(Platform::Youtube);
        assert!(registry.playlists().is_empty());
        assert!(registry.platforms().get(keys::PLATFORMS).is_none());
    }

    #[test]
    fn test_clear_all() {
        let registry = registry();
        registry.platforms().set(keys::PLATFORMS, Vec::new());
        registry.history().set(keys::CONVERSION_HISTORY, Vec::new());

        registry.clear_all();
        assert!(registry.stats().iter().all(|stats| stats.size == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_with_zero_period_still_runs() {
        let registry = Arc::new(registry());
        registry
            .tracks()
            .set_with_ttl("tracks:spotify:x", Page::new(Vec::new()), Duration::from_millis(10));

        let shutdown = CancellationToken::new();
        let sweeper = registry.spawn_sweeper(Duration::ZERO, shutdown.clone());

        tokio::time::sleep(MIN_SWEEP_INTERVAL * 2).await;
        assert!(registry.tracks().is_empty());

        shutdown.cancel();
        sweeper.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_drops_expired_entries() {
        let registry = Arc::new(registry());
        registry
            .platforms()
            .set_with_ttl(keys::PLATFORMS, Vec::new(), Duration::from_secs(1));
        registry.history().set(keys::SYNC_HISTORY, Vec::new());

        let shutdown = CancellationToken::new();
        let sweeper = registry.spawn_sweeper(Duration::from_secs(5), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(registry.platforms().is_empty());
        assert_eq!(registry.platforms().metrics().expired_removals, 1);
        assert_eq!(registry.history().len(), 1);

        shutdown.cancel();
        sweeper.await.unwrap();
    }
}
