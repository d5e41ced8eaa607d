use serde::Deserialize;
use url::Url;

use crate::core::error::{SourceError, SourceResult};
use crate::extractors::{fetch_json, OembedInfo, VimeoVideo};

const VIDEO_PAGE_URL: &str = "https://vimeo.com/";
const OEMBED_URL: &str = "https://vimeo.com/api/oembed.json";
const SIMPLE_API_URL: &str = "https://vimeo.com/api/v2/video";

/// One element of the v2 `video/{id}.json` array.
#[derive(Debug, Deserialize)]
struct SimpleVideo {
    title: Option<String>,
    description: Option<String>,
    thumbnail_large: Option<String>,
    #[serde(default)]
    tags: String,
    duration: Option<u64>,
}

impl From<SimpleVideo> for VimeoVideo {
    fn from(video: SimpleVideo) -> Self {
        Self {
            title: video.title,
            description: video.description,
            thumbnail_url: video.thumbnail_large,
            tags: split_tags(&video.tags),
            duration: video.duration.filter(|secs| *secs > 0),
        }
    }
}

pub struct VimeoClient {
    client: reqwest::Client,
}

impl VimeoClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn oembed(&self, video_id: &str) -> SourceResult<OembedInfo> {
        let video_url = Url::parse(VIDEO_PAGE_URL)
            .and_then(|base| base.join(video_id))
            .map_err(|e| SourceError::Transport {
                endpoint: "vimeo-oembed",
                message: e.to_string(),
            })?;
        let request = self
            .client
            .get(OEMBED_URL)
            .query(&[("url", video_url.as_str())]);
        let mut info: OembedInfo = fetch_json("vimeo-oembed", request).await?;
        info.duration = info.duration.filter(|secs| *secs > 0);
        Ok(info)
    }

    pub async fn video(&self, video_id: &str) -> SourceResult<VimeoVideo> {
        let url = format!("{}/{}.json", SIMPLE_API_URL, video_id);
        let videos: Vec<SimpleVideo> = fetch_json("vimeo-simple-api", self.client.get(url)).await?;

        videos
            .into_iter()
            .next()
            .map(VimeoVideo::from)
            .ok_or_else(|| SourceError::NotFound {
                id: video_id.to_string(),
            })
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(", ")
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_tags() {
        assert_eq!(split_tags("gamification, design,  play"), vec!["gamification", "design", "play"]);
        assert!(split_tags("").is_empty());
    }

    #[test]
    fn test_decode_simple_api_array() {
        let body = r#"[{"id":76979871,"title":"The New Vimeo Player","description":"d","thumbnail_large":"https://i.vimeocdn.com/video/1_640.jpg","tags":"player, html5","duration":62}]"#;
        let videos: Vec<SimpleVideo> = serde_json::from_str(body).unwrap();
        let video: VimeoVideo = videos.into_iter().next().unwrap().into();
        assert_eq!(video.duration, Some(62));
        assert_eq!(video.tags, vec!["player", "html5"]);
        assert_eq!(video.thumbnail_url.as_deref(), Some("https://i.vimeocdn.com/video/1_640.jpg"));
    }

    #[test]
    fn test_decode_oembed_duration() {
        let body = r#"{"type":"video","title":"Storytelling","author_name":"x","duration":845,"thumbnail_url":"t"}"#;
        let info: OembedInfo = serde_json::from_str(body).unwrap();
        assert_eq!(info.duration, Some(845));
        assert_eq!(info.title.as_deref(), Some("Storytelling"));
    }
}
