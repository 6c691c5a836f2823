//! Long-running conversion and sync jobs.
//!
//! The server owns every job record; the client only holds snapshots and
//! polls them until they reach a terminal status (see [`poller`]).

pub mod poller;
mod tracker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;
use crate::models::Platform;

pub use poller::{PollHandle, PollOutcome, PollState, PollerConfig};
pub use tracker::JobTracker;

/// The two kinds of long-running jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Copy a playlist from one platform to the other.
    Conversion,
    /// Bring an already converted playlist back in line with its source.
    Sync,
}

impl JobKind {
    /// Path segment of the job endpoints.
    pub fn endpoint(&self) -> &'static str {
        match self {
            JobKind::Conversion => "convert",
            JobKind::Sync => "sync",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

impl FromStr for JobKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "convert" | "conversion" => Ok(JobKind::Conversion),
            "sync" => Ok(JobKind::Sync),
            other => Err(ApiError::UnknownJobKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// `completed` and `failed` never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of a job as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub kind: Option<JobKind>,
    #[serde(default)]
    pub source_platform: Option<Platform>,
    #[serde(default)]
    pub target_platform: Option<Platform>,
    #[serde(default)]
    pub source_playlist_id: Option<String>,
    #[serde(default)]
    pub target_playlist_id: Option<String>,
    #[serde(default)]
    pub total_tracks: u32,
    #[serde(default)]
    pub processed_tracks: u32,
    #[serde(default)]
    pub failed_tracks: u32,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// A bare record with only id, kind and status filled in.
    pub fn new(id: impl Into<String>, kind: JobKind, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            status,
            kind: Some(kind),
            source_platform: None,
            target_platform: None,
            source_playlist_id: None,
            target_playlist_id: None,
            total_tracks: 0,
            processed_tracks: 0,
            failed_tracks: 0,
            error: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Fraction of tracks processed so far, when the total is known.
    pub fn progress(&self) -> Option<f64> {
        if self.total_tracks == 0 {
            return None;
        }
        Some(f64::from(self.processed_tracks.min(self.total_tracks)) / f64::from(self.total_tracks))
    }
}

/// Body of a conversion start request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub source_platform: Platform,
    pub target_platform: Platform,
    pub playlist_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_playlist_name: Option<String>,
}

/// Body of a sync start request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub source_platform: Platform,
    pub target_platform: Platform,
    pub source_playlist_id: String,
    pub target_playlist_id: String,
}

/// Answer of a job start endpoint.
///
/// Small jobs come back with their record right away; larger ones are
/// queued and only their id is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StartedJob {
    Immediate { job: JobRecord },
    Queued { job_id: String },
}

impl StartedJob {
    pub fn job_id(&self) -> &str {
        match self {
            StartedJob::Immediate { job } => &job.id,
            StartedJob::Queued { job_id } => job_id,
        }
    }
}
