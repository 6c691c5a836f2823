//! Data-access layer of the playlist bridge dashboard.
//!
//! Reads (platform status, playlist and track pages, job history) go through
//! per-domain TTL caches; paged collections are navigated with cursors that
//! speak each platform's addressing scheme; long-running conversion and sync
//! jobs are followed by cancellable pollers.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod jobs;
pub mod library;
pub mod models;
pub mod pagination;

pub use error::ApiError;
pub use library::{Library, PlaylistBrowser};
pub use models::{Platform, PlatformStatus, Playlist, Track};
