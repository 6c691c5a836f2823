//! # Cache Module
//!
//! In-memory caching for the data-access layer of the playlist dashboard.
//!
//! The cache is an accelerator, never a source of truth: nothing here can
//! fail, and a missing or stale entry simply means "go ask the server".
//!
//! ## Layers
//!
//! - [`TtlCache`]: bounded key/value store with a time-to-live per entry and
//!   oldest-insertion eviction.
//! - [`CacheRegistry`]: one `TtlCache` per data domain (platform status,
//!   playlist pages, track pages, job history), each with its own TTL.
//! - [`TtlCache::get_or_fetch`]: the read path every caller goes through;
//!   returns a fresh hit or runs the producer and stores its result.
//! - [`keys`]: deterministic key builders shared by every call site.
//!
//! ## Configuration
//!
//! TTLs and capacity come from the environment (see [`crate::config`]):
//!
//! ```env
//! CACHE_TTL_PLATFORMS=5m
//! CACHE_TTL_PLAYLISTS=2m
//! CACHE_TTL_TRACKS=2m
//! CACHE_TTL_HISTORY=5m
//! CACHE_MAX_ENTRIES=100
//! CACHE_SWEEP_INTERVAL=1m
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use playlist_bridge::cache::{keys, CacheRegistry, CacheSettings};
//!
//! # async fn example() -> Result<(), playlist_bridge::ApiError> {
//! let registry = CacheRegistry::new(&CacheSettings::default());
//!
//! let platforms = registry
//!     .platforms()
//!     .get_or_fetch(keys::PLATFORMS, None, || async {
//!         Ok::<_, playlist_bridge::ApiError>(Vec::new())
//!     })
//!     .await?;
//! assert!(platforms.is_empty());
//! # Ok(())
//! # }
//! ```

mod fetch;
pub mod keys;
mod registry;
mod ttl_store;

pub use registry::{CacheRegistry, CacheSettings};
pub use ttl_store::{CacheMetrics, CacheStats, EntryStats, TtlCache};
