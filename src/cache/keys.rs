//! Cache key construction.
//!
//! Every key is built here so that the same logical request produces the
//! same key no matter which call site asks. Free-form parts (playlist ids,
//! page tokens) are percent-encoded so they can never forge a `:` separator
//! and collide with another resource.

use crate::jobs::JobKind;
use crate::models::Platform;
use crate::pagination::PageQuery;

/// Key of the platform connection list.
pub const PLATFORMS: &str = "platforms";
pub const CONVERSION_HISTORY: &str = "conversion_history";
pub const SYNC_HISTORY: &str = "sync_history";

pub fn history(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Conversion => CONVERSION_HISTORY,
        JobKind::Sync => SYNC_HISTORY,
    }
}

/// One page of a platform's playlist listing.
pub fn playlists(platform: Platform, query: &PageQuery) -> String {
    format!("playlists:{}:{}", platform, query)
}

/// One page of the tracks of a playlist.
pub fn tracks(platform: Platform, playlist_id: &str, query: &PageQuery) -> String {
    format!(
        "tracks:{}:{}:{}",
        platform,
        urlencoding::encode(playlist_id),
        query
    )
}

/// Substring shared by every key that belongs to `platform`.
pub fn platform_pattern(platform: Platform) -> String {
    format!(":{}:", platform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::{Order, PagingMode, Sort};

    #[test]
    fn test_keys_are_deterministic() {
        let a = PageQuery::first(PagingMode::Offset, 20, Some(Sort::new("name", Order::Asc)));
        let b = PageQuery::first(PagingMode::Offset, 20, Some(Sort::new("name", Order::Asc)));
        assert_eq!(playlists(Platform::Spotify, &a), playlists(Platform::Spotify, &b));
        assert_eq!(
            playlists(Platform::Spotify, &a),
            "playlists:spotify:limit=20:offset=0:sort=name.asc"
        );
    }

    #[test]
    fn test_distinct_resources_get_distinct_keys() {
        let query = PageQuery::first(PagingMode::Token, 20, None);
        assert_ne!(
            playlists(Platform::Spotify, &query),
            playlists(Platform::Youtube, &query)
        );
        // an id containing the separator cannot impersonate another playlist's page
        assert_ne!(
            tracks(Platform::Youtube, "a:limit=20", &query),
            tracks(Platform::Youtube, "a", &query)
        );
        assert_eq!(
            tracks(Platform::Youtube, "PL 1", &query),
            "tracks:youtube:PL%201:limit=20:token="
        );
    }

    #[test]
    fn test_platform_pattern_matches_only_its_platform() {
        let query = PageQuery::first(PagingMode::Offset, 20, None);
        let pattern = platform_pattern(Platform::Spotify);
        assert!(playlists(Platform::Spotify, &query).contains(&pattern));
        assert!(tracks(Platform::Spotify, "x", &query).contains(&pattern));
        assert!(!playlists(Platform::Youtube, &query).contains(&pattern));
        assert!(!PLATFORMS.contains(&pattern));
    }

    #[test]
    fn test_history_keys() {
        assert_eq!(history(JobKind::Conversion), "conversion_history");
        assert_eq!(history(JobKind::Sync), "sync_history");
    }
}
