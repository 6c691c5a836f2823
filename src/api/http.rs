use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use super::{
    ConversionHistoryEnvelope, JobApi, JobEnvelope, PlatformsEnvelope, PlaylistApi,
    SyncHistoryEnvelope,
};
use crate::error::ApiError;
use crate::jobs::{ConversionRequest, JobKind, JobRecord, StartedJob, SyncRequest};
use crate::models::{Platform, PlatformStatus, Playlist, Track};
use crate::pagination::{Page, PageQuery};

/// HTTP client for the playlist service.
///
/// Endpoints, relative to the base url:
///
/// | call | method | path |
/// |------|--------|------|
/// | platforms | GET | `platforms` |
/// | playlists | GET | `{platform}/playlists` |
/// | tracks | GET | `{platform}/playlists/{id}/tracks` |
/// | start | POST | `convert`, `sync` |
/// | status | GET | `convert/status/{id}`, `sync/status/{id}` |
/// | history | GET | `convert/history`, `sync/history` |
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        // relative joins only keep the last path segment with a trailing slash
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("playlist-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ApiError::Transport {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a path made of segments; each segment is percent-encoded.
    ///
    /// Empty and dot segments are refused: url resolution would fold them
    /// into a different endpoint, even when percent-encoded.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        if let Some(bad) = segments
            .iter()
            .find(|segment| matches!(**segment, "" | "." | ".."))
        {
            return Err(ApiError::InvalidId(bad.to_string()));
        }

        let path = segments
            .iter()
            .map(|segment| urlencoding::encode(segment))
            .collect::<Vec<_>>()
            .join("/");
        Ok(self.base_url.join(&path)?)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&'static str, String)],
    ) -> Result<T, ApiError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;
        Self::decode(url, response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!("POST {}", url);
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;
        Self::decode(url, response).await
    }

    async fn decode<T: DeserializeOwned>(
        url: Url,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        let bytes = response.bytes().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            error!("❌ {} returned {}: {}", url, status, body);
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl PlaylistApi for HttpApiClient {
    async fn platforms(&self) -> Result<Vec<PlatformStatus>, ApiError> {
        let url = self.endpoint(&["platforms"])?;
        let envelope: PlatformsEnvelope = self.get_json(url, &[]).await?;
        Ok(envelope.platforms)
    }

    async fn playlists(
        &self,
        platform: Platform,
        query: &PageQuery,
    ) -> Result<Page<Playlist>, ApiError> {
        let url = self.endpoint(&[platform.as_str(), "playlists"])?;
        self.get_json(url, &query.query_pairs()).await
    }

    async fn tracks(
        &self,
        platform: Platform,
        playlist_id: &str,
        query: &PageQuery,
    ) -> Result<Page<Track>, ApiError> {
        let url = self.endpoint(&[platform.as_str(), "playlists", playlist_id, "tracks"])?;
        self.get_json(url, &query.query_pairs()).await
    }
}

#[async_trait]
impl JobApi for HttpApiClient {
    async fn start_conversion(&self, request: &ConversionRequest) -> Result<StartedJob, ApiError> {
        let url = self.endpoint(&[JobKind::Conversion.endpoint()])?;
        self.post_json(url, request).await
    }

    async fn start_sync(&self, request: &SyncRequest) -> Result<StartedJob, ApiError> {
        let url = self.endpoint(&[JobKind::Sync.endpoint()])?;
        self.post_json(url, request).await
    }

    async fn job_status(&self, kind: JobKind, job_id: &str) -> Result<JobRecord, ApiError> {
        let url = self.endpoint(&[kind.endpoint(), "status", job_id])?;
        let envelope: JobEnvelope = self.get_json(url, &[]).await?;
        Ok(envelope.job)
    }

    async fn history(&self, kind: JobKind) -> Result<Vec<JobRecord>, ApiError> {
        let url = self.endpoint(&[kind.endpoint(), "history"])?;
        match kind {
            JobKind::Conversion => {
                let envelope: ConversionHistoryEnvelope = self.get_json(url, &[]).await?;
                Ok(envelope.conversions)
            }
            JobKind::Sync => {
                let envelope: SyncHistoryEnvelope = self.get_json(url, &[]).await?;
                Ok(envelope.syncs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpApiClient {
        HttpApiClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_base_url_keeps_its_path() {
        let client = client("http://localhost:8000/api");
        assert_eq!(client.base_url().as_str(), "http://localhost:8000/api/");
        assert_eq!(
            client.endpoint(&["platforms"]).unwrap().as_str(),
            "http://localhost:8000/api/platforms"
        );
    }

    #[test]
    fn test_endpoint_encodes_ids() {
        let client = client("http://localhost:8000/api/");
        let url = client
            .endpoint(&["youtube", "playlists", "PL/x y", "tracks"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/youtube/playlists/PL%2Fx%20y/tracks"
        );

        let url = client
            .endpoint(&[JobKind::Sync.endpoint(), "status", "job-1"])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/sync/status/job-1");
    }

    #[test]
    fn test_dot_segment_ids_are_refused() {
        let client = client("http://localhost:8000/api/");
        for id in ["..", ".", ""] {
            let err = client
                .endpoint(&[JobKind::Sync.endpoint(), "status", id])
                .unwrap_err();
            assert!(matches!(err, ApiError::InvalidId(ref bad) if bad == id));
        }
        // dots inside an id are fine
        assert_eq!(
            client.endpoint(&["spotify", "playlists", "a..b", "tracks"]).unwrap().as_str(),
            "http://localhost:8000/api/spotify/playlists/a..b/tracks"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpApiClient::new("not a url", Duration::from_secs(5)),
            Err(ApiError::Url(_))
        ));
    }

    #[test]
    fn test_history_envelopes() {
        let conversions: ConversionHistoryEnvelope = serde_json::from_str(
            r#"{"conversions":[{"id":"c1","status":"completed"},{"id":"c2","status":"failed"}]}"#,
        )
        .unwrap();
        assert_eq!(conversions.conversions.len(), 2);

        let syncs: SyncHistoryEnvelope = serde_json::from_str(r#"{"syncs":[]}"#).unwrap();
        assert!(syncs.syncs.is_empty());
    }

    #[test]
    fn test_page_wire_format() {
        let page: Page<Playlist> = serde_json::from_str(
            r#"{
                "data": [{"id": "p1", "name": "Road trip", "track_count": 12}],
                "next_page_token": "CAUQAA",
                "has_more": true,
                "total": 31
            }"#,
        )
        .unwrap();
        assert_eq!(page.data[0].name, "Road trip");
        assert_eq!(page.next_page_token.as_deref(), Some("CAUQAA"));
        assert_eq!(page.offset, None);
        assert_eq!(page.total, Some(31));
    }
}
