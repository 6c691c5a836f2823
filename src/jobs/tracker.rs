use std::sync::Arc;
use tracing::info;

use super::poller::{self, PollHandle, PollerConfig};
use super::{ConversionRequest, JobKind, JobRecord, SyncRequest};
use crate::api::JobApi;
use crate::cache::{keys, CacheRegistry};
use crate::error::ApiError;

/// Starts jobs, follows them to completion and serves their history.
///
/// History lists go through the history cache. Status fetches never do:
/// a poller must always see what the server says right now. When a tracked
/// job finishes, the cached history of its kind is dropped so the next read
/// picks the new record up.
#[derive(Clone)]
pub struct JobTracker {
    api: Arc<dyn JobApi>,
    caches: Arc<CacheRegistry>,
    config: PollerConfig,
}

impl JobTracker {
    pub fn new(api: Arc<dyn JobApi>, caches: Arc<CacheRegistry>, config: PollerConfig) -> Self {
        Self {
            api,
            caches,
            config,
        }
    }

    pub fn poller_config(&self) -> &PollerConfig {
        &self.config
    }

    /// Starts a conversion and returns a poller following it.
    pub async fn start_conversion(
        &self,
        request: &ConversionRequest,
    ) -> Result<PollHandle, ApiError> {
        let started = self.api.start_conversion(request).await?;
        info!(
            "🔄 Conversion {} started ({} -> {})",
            started.job_id(),
            request.source_platform,
            request.target_platform
        );
        Ok(self.track(JobKind::Conversion, started.job_id()))
    }

    /// Starts a sync and returns a poller following it.
    pub async fn start_sync(&self, request: &SyncRequest) -> Result<PollHandle, ApiError> {
        let started = self.api.start_sync(request).await?;
        info!(
            "🔁 Sync {} started ({} -> {})",
            started.job_id(),
            request.source_platform,
            request.target_platform
        );
        Ok(self.track(JobKind::Sync, started.job_id()))
    }

    /// Polls an existing job until it finishes, fails or the handle goes away.
    pub fn track(&self, kind: JobKind, job_id: &str) -> PollHandle {
        let api = Arc::clone(&self.api);
        let caches = Arc::clone(&self.caches);

        poller::spawn(
            job_id,
            self.config.clone(),
            move |id: String| {
                let api = Arc::clone(&api);
                async move { api.job_status(kind, &id).await }
            },
            move |job: &JobRecord| {
                info!("📜 {} {} is {}, refreshing history", kind, job.id, job.status);
                caches.invalidate_history(kind);
            },
        )
    }

    /// Past jobs of `kind`, from the cache while it is fresh.
    pub async fn history(&self, kind: JobKind) -> Result<Vec<JobRecord>, ApiError> {
        self.caches
            .history()
            .get_or_fetch(keys::history(kind), None, || self.api.history(kind))
            .await
    }

    /// Fetches the history of `kind` again, bypassing the cache.
    pub async fn refresh_history(&self, kind: JobKind) -> Result<Vec<JobRecord>, ApiError> {
        self.caches.invalidate_history(kind);
        self.history(kind).await
    }
}
