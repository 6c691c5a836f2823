//! Platform identifiers and the resources listed through them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ApiError;
use crate::pagination::PagingMode;

/// Streaming platforms the dashboard can connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Spotify,
    Youtube,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Spotify, Platform::Youtube];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Spotify => "spotify",
            Platform::Youtube => "youtube",
        }
    }

    /// How collections on this platform are addressed.
    ///
    /// Spotify pages by numeric offset, YouTube hands out opaque page tokens.
    /// Chosen once here so call sites never branch on the platform name.
    pub fn paging_mode(&self) -> PagingMode {
        match self {
            Platform::Spotify => PagingMode::Offset,
            Platform::Youtube => PagingMode::Token,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spotify" => Ok(Platform::Spotify),
            "youtube" | "youtube_music" | "yt" => Ok(Platform::Youtube),
            other => Err(ApiError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// Connection state of one platform for the current user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStatus {
    pub platform: Platform,
    pub connected: bool,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// A playlist as listed by a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub track_count: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

/// A track inside a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl Track {
    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }
}
