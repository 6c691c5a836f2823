//! Contract with the playlist service.
//!
//! The service fronts both streaming platforms; this crate only ever talks
//! to it through these two traits. [`HttpApiClient`] implements both over
//! HTTP, tests substitute mocks.

mod http;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ApiError;
use crate::jobs::{ConversionRequest, JobKind, JobRecord, StartedJob, SyncRequest};
use crate::models::{Platform, PlatformStatus, Playlist, Track};
use crate::pagination::{Page, PageQuery};

pub use http::HttpApiClient;

/// Read access to platforms and their collections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaylistApi: Send + Sync {
    /// Connection status of every platform.
    async fn platforms(&self) -> Result<Vec<PlatformStatus>, ApiError>;

    /// One page of the user's playlists on `platform`.
    async fn playlists(
        &self,
        platform: Platform,
        query: &PageQuery,
    ) -> Result<Page<Playlist>, ApiError>;

    /// One page of the tracks of a playlist.
    async fn tracks(
        &self,
        platform: Platform,
        playlist_id: &str,
        query: &PageQuery,
    ) -> Result<Page<Track>, ApiError>;
}

/// Conversion and sync jobs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobApi: Send + Sync {
    async fn start_conversion(&self, request: &ConversionRequest) -> Result<StartedJob, ApiError>;

    async fn start_sync(&self, request: &SyncRequest) -> Result<StartedJob, ApiError>;

    /// Current record of a job. Never cached.
    async fn job_status(&self, kind: JobKind, job_id: &str) -> Result<JobRecord, ApiError>;

    /// Every past job of `kind`, newest first.
    async fn history(&self, kind: JobKind) -> Result<Vec<JobRecord>, ApiError>;
}

// Response envelopes

#[derive(Debug, Deserialize)]
pub(crate) struct PlatformsEnvelope {
    pub platforms: Vec<PlatformStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobEnvelope {
    pub job: JobRecord,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversionHistoryEnvelope {
    pub conversions: Vec<JobRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SyncHistoryEnvelope {
    pub syncs: Vec<JobRecord>,
}
