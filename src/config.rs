use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheSettings;
use crate::jobs::PollerConfig;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    // Servicio
    pub api_base_url: String,
    #[serde(with = "duration_str")]
    pub api_timeout: Duration,

    // Caché
    #[serde(with = "duration_str")]
    pub platforms_ttl: Duration,
    #[serde(with = "duration_str")]
    pub playlists_ttl: Duration,
    #[serde(with = "duration_str")]
    pub tracks_ttl: Duration,
    #[serde(with = "duration_str")]
    pub history_ttl: Duration,
    pub cache_max_entries: usize,
    #[serde(with = "duration_str")]
    pub cache_sweep_interval: Duration,

    // Paginación
    pub page_size: u32,

    // Polling de trabajos
    #[serde(with = "duration_str")]
    pub poll_interval: Duration,
    pub poll_max_errors: u32,
    #[serde(with = "duration_str")]
    pub poll_max_backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let cache = CacheSettings::default();
        let poller = PollerConfig::default();
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            api_timeout: Duration::from_secs(30),
            platforms_ttl: cache.platforms_ttl,
            playlists_ttl: cache.playlists_ttl,
            tracks_ttl: cache.tracks_ttl,
            history_ttl: cache.history_ttl,
            cache_max_entries: cache.max_entries,
            cache_sweep_interval: Duration::from_secs(60),
            page_size: 20,
            poll_interval: poller.interval,
            poll_max_errors: poller.max_consecutive_errors,
            poll_max_backoff: poller.max_backoff,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment, reading a `.env`
    /// file first when one exists. Unset variables keep their defaults.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Builds a configuration from any variable source.
    ///
    /// Durations use humantime syntax (`90s`, `5m`, `1h 30m`).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            api_base_url: var("API_BASE_URL").unwrap_or(defaults.api_base_url),
            api_timeout: duration(var("API_TIMEOUT"), "API_TIMEOUT", defaults.api_timeout)?,

            platforms_ttl: duration(
                var("CACHE_TTL_PLATFORMS"),
                "CACHE_TTL_PLATFORMS",
                defaults.platforms_ttl,
            )?,
            playlists_ttl: duration(
                var("CACHE_TTL_PLAYLISTS"),
                "CACHE_TTL_PLAYLISTS",
                defaults.playlists_ttl,
            )?,
            tracks_ttl: duration(var("CACHE_TTL_TRACKS"), "CACHE_TTL_TRACKS", defaults.tracks_ttl)?,
            history_ttl: duration(
                var("CACHE_TTL_HISTORY"),
                "CACHE_TTL_HISTORY",
                defaults.history_ttl,
            )?,
            cache_max_entries: number(
                var("CACHE_MAX_ENTRIES"),
                "CACHE_MAX_ENTRIES",
                defaults.cache_max_entries,
            )?,
            cache_sweep_interval: duration(
                var("CACHE_SWEEP_INTERVAL"),
                "CACHE_SWEEP_INTERVAL",
                defaults.cache_sweep_interval,
            )?,

            page_size: number(var("PAGE_SIZE"), "PAGE_SIZE", defaults.page_size)?,

            poll_interval: duration(var("POLL_INTERVAL"), "POLL_INTERVAL", defaults.poll_interval)?,
            poll_max_errors: number(
                var("POLL_MAX_ERRORS"),
                "POLL_MAX_ERRORS",
                defaults.poll_max_errors,
            )?,
            poll_max_backoff: duration(
                var("POLL_MAX_BACKOFF"),
                "POLL_MAX_BACKOFF",
                defaults.poll_max_backoff,
            )?,
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - The base url must be an absolute http(s) url
    /// - TTLs, timeouts and intervals must be non-zero
    /// - Cache capacity, page size and error budget must be > 0
    /// - The backoff cap cannot be shorter than the poll interval
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api_base_url)
            .with_context(|| format!("API_BASE_URL is not a valid url: {}", self.api_base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("API_BASE_URL must use http or https, got: {}", url.scheme());
        }

        for (name, value) in [
            ("API_TIMEOUT", self.api_timeout),
            ("CACHE_TTL_PLATFORMS", self.platforms_ttl),
            ("CACHE_TTL_PLAYLISTS", self.playlists_ttl),
            ("CACHE_TTL_TRACKS", self.tracks_ttl),
            ("CACHE_TTL_HISTORY", self.history_ttl),
            ("CACHE_SWEEP_INTERVAL", self.cache_sweep_interval),
            ("POLL_INTERVAL", self.poll_interval),
        ] {
            if value.is_zero() {
                anyhow::bail!("{} must be greater than 0", name);
            }
        }

        if self.cache_max_entries == 0 {
            anyhow::bail!("Cache capacity must be greater than 0");
        }

        if self.page_size == 0 {
            anyhow::bail!("Page size must be greater than 0");
        }

        if self.poll_max_errors == 0 {
            anyhow::bail!("Poll error budget must be greater than 0");
        }

        if self.poll_max_backoff < self.poll_interval {
            anyhow::bail!(
                "POLL_MAX_BACKOFF ({}) cannot be shorter than POLL_INTERVAL ({})",
                humantime::format_duration(self.poll_max_backoff),
                humantime::format_duration(self.poll_interval)
            );
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            API: {} (timeout {})\n  \
            Cache TTL: platforms {}, playlists {}, tracks {}, history {}\n  \
            Cache: {} entries max, sweep every {}\n  \
            Paging: {} per page\n  \
            Polling: every {}, give up after {} errors, backoff cap {}",
            self.api_base_url,
            humantime::format_duration(self.api_timeout),
            humantime::format_duration(self.platforms_ttl),
            humantime::format_duration(self.playlists_ttl),
            humantime::format_duration(self.tracks_ttl),
            humantime::format_duration(self.history_ttl),
            self.cache_max_entries,
            humantime::format_duration(self.cache_sweep_interval),
            self.page_size,
            humantime::format_duration(self.poll_interval),
            self.poll_max_errors,
            humantime::format_duration(self.poll_max_backoff),
        )
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            platforms_ttl: self.platforms_ttl,
            playlists_ttl: self.playlists_ttl,
            tracks_ttl: self.tracks_ttl,
            history_ttl: self.history_ttl,
            max_entries: self.cache_max_entries,
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: self.poll_interval,
            max_consecutive_errors: self.poll_max_errors,
            max_backoff: self.poll_max_backoff,
            ..PollerConfig::default()
        }
    }
}

fn duration(value: Option<String>, key: &str, default: Duration) -> Result<Duration> {
    match value {
        Some(raw) => humantime::parse_duration(raw.trim())
            .with_context(|| format!("{} is not a valid duration: {}", key, raw)),
        None => Ok(default),
    }
}

fn number<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} is not a valid number: {}", key, raw)),
        None => Ok(default),
    }
}

/// Durations serialize as humantime strings ("5m", "1h 30m").
mod duration_str {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.platforms_ttl, Duration::from_secs(300));
        assert_eq!(config.playlists_ttl, Duration::from_secs(120));
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        config.validate().unwrap();
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("API_BASE_URL", "https://bridge.example.com/api"),
            ("CACHE_TTL_TRACKS", "45s"),
            ("CACHE_TTL_HISTORY", "1h 30m"),
            ("CACHE_MAX_ENTRIES", "250"),
            ("PAGE_SIZE", "50"),
            ("POLL_INTERVAL", "3s"),
            ("POLL_MAX_ERRORS", "8"),
            ("POLL_MAX_BACKOFF", ""),
        ])
        .unwrap();

        assert_eq!(config.api_base_url, "https://bridge.example.com/api");
        assert_eq!(config.tracks_ttl, Duration::from_secs(45));
        assert_eq!(config.history_ttl, Duration::from_secs(5400));
        assert_eq!(config.cache_max_entries, 250);
        assert_eq!(config.page_size, 50);
        // blank values fall back to the default
        assert_eq!(config.poll_max_backoff, Duration::from_secs(120));

        let poller = config.poller_config();
        assert_eq!(poller.interval, Duration::from_secs(3));
        assert_eq!(poller.max_consecutive_errors, 8);

        let cache = config.cache_settings();
        assert_eq!(cache.max_entries, 250);
        assert_eq!(cache.history_ttl, Duration::from_secs(5400));
    }

    #[test]
    fn test_malformed_values_are_errors() {
        let err = from_pairs(&[("CACHE_TTL_PLATFORMS", "five minutes")]).unwrap_err();
        assert!(err.to_string().contains("CACHE_TTL_PLATFORMS"));

        let err = from_pairs(&[("PAGE_SIZE", "-3")]).unwrap_err();
        assert!(err.to_string().contains("PAGE_SIZE"));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.api_base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.playlists_ttl = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.poll_max_backoff = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_mentions_durations() {
        let summary = Config::default().summary();
        assert!(summary.contains("platforms 5m"));
        assert!(summary.contains("every 10s"));
    }

    #[test]
    fn test_serde_uses_humantime() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["history_ttl"], "5m");

        let back: Config = serde_json::from_value(json).unwrap();
        assert_eq!(back, Config::default());
    }
}
