pub mod vimeo;
pub mod youtube;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::core::error::{SourceError, SourceResult};

pub use vimeo::VimeoClient;
pub use youtube::YouTubeClient;

/// Fields shared by the YouTube and Vimeo oEmbed responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OembedInfo {
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Only Vimeo reports this, already in seconds.
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct YouTubeVideo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VimeoVideo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub tags: Vec<String>,
    pub duration: Option<u64>,
}

/// Network lookups against the video platforms. Every call is bounded by
/// the configured request timeout.
#[async_trait]
pub trait ExternalSourceClient: Send + Sync {
    /// YouTube Data API `videos.list(part=contentDetails)`.
    async fn youtube_duration(&self, video_id: &str, api_key: &str) -> SourceResult<u64>;

    /// YouTube Data API `videos.list(part=snippet,contentDetails)`.
    async fn youtube_video(&self, video_id: &str, api_key: &str) -> SourceResult<YouTubeVideo>;

    /// Duration read from the public watch page.
    async fn youtube_watch_page_duration(&self, video_id: &str) -> SourceResult<u64>;

    async fn youtube_oembed(&self, video_id: &str) -> SourceResult<OembedInfo>;

    async fn vimeo_oembed(&self, video_id: &str) -> SourceResult<OembedInfo>;

    /// Vimeo simple API v2 `video/{id}.json`.
    async fn vimeo_video(&self, video_id: &str) -> SourceResult<VimeoVideo>;
}

/// Production client composed of the per-platform HTTP clients.
pub struct HttpSourceClient {
    youtube: YouTubeClient,
    vimeo: VimeoClient,
}

impl HttpSourceClient {
    pub fn new(config: &ApiConfig) -> SourceResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| SourceError::from_reqwest("client", e))?;

        Ok(Self {
            youtube: YouTubeClient::new(client.clone()),
            vimeo: VimeoClient::new(client),
        })
    }
}

#[async_trait]
impl ExternalSourceClient for HttpSourceClient {
    async fn youtube_duration(&self, video_id: &str, api_key: &str) -> SourceResult<u64> {
        self.youtube.content_duration(video_id, api_key).await
    }

    async fn youtube_video(&self, video_id: &str, api_key: &str) -> SourceResult<YouTubeVideo> {
        self.youtube.video(video_id, api_key).await
    }

    async fn youtube_watch_page_duration(&self, video_id: &str) -> SourceResult<u64> {
        self.youtube.watch_page_duration(video_id).await
    }

    async fn youtube_oembed(&self, video_id: &str) -> SourceResult<OembedInfo> {
        self.youtube.oembed(video_id).await
    }

    async fn vimeo_oembed(&self, video_id: &str) -> SourceResult<OembedInfo> {
        self.vimeo.oembed(video_id).await
    }

    async fn vimeo_video(&self, video_id: &str) -> SourceResult<VimeoVideo> {
        self.vimeo.video(video_id).await
    }
}

/// Send a request and decode a JSON body, classifying every failure.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    endpoint: &'static str,
    request: RequestBuilder,
) -> SourceResult<T> {
    let response = send(endpoint, request).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| SourceError::from_reqwest(endpoint, e))
}

pub(crate) async fn fetch_text(endpoint: &'static str, request: RequestBuilder) -> SourceResult<String> {
    let response = send(endpoint, request).await?;
    response
        .text()
        .await
        .map_err(|e| SourceError::from_reqwest(endpoint, e))
}

async fn send(endpoint: &'static str, request: RequestBuilder) -> SourceResult<reqwest::Response> {
    let response = request
        .send()
        .await
        .map_err(|e| SourceError::from_reqwest(endpoint, e))?;

    let status = response.status();
    if !status.is_success() {
        tracing::debug!(endpoint, %status, "upstream rejected request");
        return Err(SourceError::Status {
            endpoint,
            status: status.as_u16(),
        });
    }

    Ok(response)
}
