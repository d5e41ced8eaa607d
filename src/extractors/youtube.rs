use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::core::error::{SourceError, SourceResult};
use crate::extractors::{fetch_json, fetch_text, OembedInfo, YouTubeVideo};
use crate::utils::parse_iso8601_duration;

const DATA_API_URL: &str = "https://www.googleapis.com/youtube/v3/videos";
const OEMBED_URL: &str = "https://www.youtube.com/oembed";
const WATCH_URL: &str = "https://www.youtube.com/watch";

static LENGTH_SECONDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""lengthSeconds"\s*:\s*"(\d+)""#).expect("Failed to compile lengthSeconds regex")
});

static ITEMPROP_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<meta\s+itemprop="duration"\s+content="([^"]+)""#)
        .expect("Failed to compile itemprop regex")
});

static PLAYER_RESPONSE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"ytInitialPlayerResponse\s*=\s*(\{.+?\});"#,
        r#"var\s+ytInitialPlayerResponse\s*=\s*(\{.+?\});"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Failed to compile player response regex"))
    .collect()
});

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    #[serde(default)]
    snippet: Option<Snippet>,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

pub struct YouTubeClient {
    client: reqwest::Client,
}

impl YouTubeClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn content_duration(&self, video_id: &str, api_key: &str) -> SourceResult<u64> {
        let item = self.list_video(video_id, api_key, "contentDetails").await?;
        item.content_details
            .and_then(|details| details.duration)
            .and_then(|raw| parse_iso8601_duration(&raw))
            .ok_or(SourceError::NoDuration {
                endpoint: "youtube-data-api",
            })
    }

    pub async fn video(&self, video_id: &str, api_key: &str) -> SourceResult<YouTubeVideo> {
        let item = self
            .list_video(video_id, api_key, "snippet,contentDetails")
            .await?;
        let snippet = item.snippet;
        let duration = item
            .content_details
            .and_then(|details| details.duration)
            .and_then(|raw| parse_iso8601_duration(&raw));

        Ok(match snippet {
            Some(snippet) => YouTubeVideo {
                title: snippet.title,
                description: snippet.description,
                tags: snippet.tags,
                duration,
            },
            None => YouTubeVideo {
                duration,
                ..Default::default()
            },
        })
    }

    async fn list_video(&self, video_id: &str, api_key: &str, part: &str) -> SourceResult<VideoItem> {
        let request = self
            .client
            .get(DATA_API_URL)
            .query(&[("id", video_id), ("part", part), ("key", api_key)]);
        let response: VideoListResponse = fetch_json("youtube-data-api", request).await?;

        response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::NotFound {
                id: video_id.to_string(),
            })
    }

    pub async fn oembed(&self, video_id: &str) -> SourceResult<OembedInfo> {
        let watch_url = Url::parse_with_params(WATCH_URL, &[("v", video_id)]).map_err(|e| {
            SourceError::Transport {
                endpoint: "youtube-oembed",
                message: e.to_string(),
            }
        })?;
        let request = self
            .client
            .get(OEMBED_URL)
            .query(&[("url", watch_url.as_str()), ("format", "json")]);
        let mut info: OembedInfo = fetch_json("youtube-oembed", request).await?;
        // YouTube never reports a duration here; ignore anything unexpected.
        info.duration = None;
        Ok(info)
    }

    pub async fn watch_page_duration(&self, video_id: &str) -> SourceResult<u64> {
        let request = self
            .client
            .get(WATCH_URL)
            .query(&[("v", video_id)])
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.5")
            .header("DNT", "1")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Cache-Control", "max-age=0");
        let html = fetch_text("youtube-watch-page", request).await?;

        duration_from_watch_page(&html).ok_or(SourceError::NoDuration {
            endpoint: "youtube-watch-page",
        })
    }
}

/// Try, in order: the embedded player response, a bare `lengthSeconds`
/// field, then the `itemprop="duration"` meta tag.
pub fn duration_from_watch_page(html: &str) -> Option<u64> {
    if let Some(seconds) = extract_player_response(html)
        .as_ref()
        .and_then(|player| player.get("videoDetails"))
        .and_then(|details| details.get("lengthSeconds"))
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
    {
        return Some(seconds);
    }

    if let Some(seconds) = LENGTH_SECONDS
        .captures(html)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
    {
        return Some(seconds);
    }

    ITEMPROP_DURATION
        .captures(html)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_iso8601_duration(m.as_str()))
}

fn extract_player_response(html: &str) -> Option<Value> {
    PLAYER_RESPONSE.iter().find_map(|re| {
        re.captures(html)
            .and_then(|caps| caps.get(1))
            .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
    })
}
