//! Read side of the dashboard: platforms, playlists and their tracks.
//!
//! Every read goes through the cache registry first. Each screen that lists
//! a collection keeps its own [`PlaylistBrowser`] (or a bare
//! [`Paginator`](crate::pagination::Paginator)), so navigating one list never
//! moves another.

use std::sync::Arc;
use tracing::{debug, info};

use crate::api::PlaylistApi;
use crate::cache::{keys, CacheRegistry};
use crate::error::ApiError;
use crate::models::{Platform, PlatformStatus, Playlist, Track};
use crate::pagination::{Page, PageQuery, Paginator, Sort};

#[derive(Clone)]
pub struct Library {
    api: Arc<dyn PlaylistApi>,
    caches: Arc<CacheRegistry>,
    page_size: u32,
}

impl Library {
    pub fn new(api: Arc<dyn PlaylistApi>, caches: Arc<CacheRegistry>, page_size: u32) -> Self {
        Self {
            api,
            caches,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn caches(&self) -> &Arc<CacheRegistry> {
        &self.caches
    }

    /// Connection status of every platform.
    pub async fn platforms(&self) -> Result<Vec<PlatformStatus>, ApiError> {
        self.caches
            .platforms()
            .get_or_fetch(keys::PLATFORMS, None, || self.api.platforms())
            .await
    }

    /// Platforms the user has connected, in server order.
    pub async fn connected_platforms(&self) -> Result<Vec<Platform>, ApiError> {
        Ok(self
            .platforms()
            .await?
            .into_iter()
            .filter(|status| status.connected)
            .map(|status| status.platform)
            .collect())
    }

    /// Drops the cached status list and asks the server again.
    pub async fn refresh_platforms(&self) -> Result<Vec<PlatformStatus>, ApiError> {
        self.caches.platforms().invalidate(keys::PLATFORMS);
        self.platforms().await
    }

    pub async fn playlist_page(
        &self,
        platform: Platform,
        query: &PageQuery,
    ) -> Result<Page<Playlist>, ApiError> {
        let key = keys::playlists(platform, query);
        debug!(%key, "loading playlist page");
        self.caches
            .playlists()
            .get_or_fetch(&key, None, || self.api.playlists(platform, query))
            .await
    }

    pub async fn track_page(
        &self,
        platform: Platform,
        playlist_id: &str,
        query: &PageQuery,
    ) -> Result<Page<Track>, ApiError> {
        let key = keys::tracks(platform, playlist_id, query);
        debug!(%key, "loading track page");
        self.caches
            .tracks()
            .get_or_fetch(&key, None, || self.api.tracks(platform, playlist_id, query))
            .await
    }

    /// Forgets cached pages of `platform`, e.g. after a playlist was created there.
    pub fn refresh_platform(&self, platform: Platform) -> usize {
        self.caches.invalidate_platform(platform)
    }

    /// Forgets everything cached about `platform` once the user disconnects it.
    pub fn disconnect(&self, platform: Platform) {
        self.caches.disconnect(platform);
        info!("🔌 {} disconnected, cached data dropped", platform);
    }

    /// A fresh browser over the playlists of `platform`.
    pub fn browse(&self, platform: Platform) -> PlaylistBrowser {
        PlaylistBrowser::new(platform, self.page_size)
    }
}

/// Navigation state of one playlist list view.
#[derive(Debug, Clone)]
pub struct PlaylistBrowser {
    platform: Platform,
    paginator: Paginator,
}

impl PlaylistBrowser {
    pub fn new(platform: Platform, page_size: u32) -> Self {
        Self {
            platform,
            paginator: Paginator::new(platform.paging_mode(), page_size),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn paginator(&self) -> &Paginator {
        &self.paginator
    }

    /// Points the view at another platform; the cursor starts over in that
    /// platform's addressing scheme.
    pub fn select_platform(&mut self, platform: Platform) {
        if self.platform != platform {
            self.platform = platform;
            self.paginator.switch_mode(platform.paging_mode());
        }
    }

    pub fn set_sort(&mut self, sort: Option<Sort>) {
        self.paginator.set_sort(sort);
    }

    pub async fn first(&mut self, library: &Library) -> Result<Page<Playlist>, ApiError> {
        let platform = self.platform;
        self.paginator
            .load_first(|query| async move { library.playlist_page(platform, &query).await })
            .await
    }

    /// `Ok(None)` when already on the last page.
    pub async fn next(&mut self, library: &Library) -> Result<Option<Page<Playlist>>, ApiError> {
        let platform = self.platform;
        self.paginator
            .load_next(|query| async move { library.playlist_page(platform, &query).await })
            .await
    }

    /// `Ok(None)` when already on the first page.
    pub async fn previous(
        &mut self,
        library: &Library,
    ) -> Result<Option<Page<Playlist>>, ApiError> {
        let platform = self.platform;
        self.paginator
            .load_previous(|query| async move { library.playlist_page(platform, &query).await })
            .await
    }
}
