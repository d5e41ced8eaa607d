use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

use crate::core::platform::PlatformKind;

/// Richer per-video metadata returned by `ExtractMetadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub platform: PlatformKind,
    pub external_id: Option<String>,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration: Option<u64>,
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl VideoMetadata {
    pub fn bare(platform: PlatformKind, external_id: Option<String>, url: &str) -> Self {
        Self {
            platform,
            external_id,
            url: url.to_string(),
            title: None,
            description: None,
            duration: None,
            thumbnail_url: None,
            tags: Vec::new(),
        }
    }
}

/// Which resolution state produced a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DurationSource {
    Cache,
    ManualOverride,
    PlatformApi,
    PageScrape,
    Oembed,
    Heuristic,
}

impl DurationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationSource::Cache => "cache",
            DurationSource::ManualOverride => "manual-override",
            DurationSource::PlatformApi => "platform-api",
            DurationSource::PageScrape => "page-scrape",
            DurationSource::Oembed => "oembed",
            DurationSource::Heuristic => "heuristic",
        }
    }

    /// Sources backed by the platform itself rather than text guessing.
    pub fn is_authoritative(&self) -> bool {
        matches!(
            self,
            DurationSource::ManualOverride | DurationSource::PlatformApi | DurationSource::PageScrape
        )
    }
}

impl fmt::Display for DurationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful resolution. `seconds` is always positive; a failed lookup
/// is `None` at the call site, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDuration {
    pub seconds: u64,
    pub source: DurationSource,
    pub computed_at: SystemTime,
}

impl ResolvedDuration {
    pub fn new(seconds: u64, source: DurationSource) -> Self {
        debug_assert!(seconds > 0, "resolved durations are positive");
        Self {
            seconds,
            source,
            computed_at: SystemTime::now(),
        }
    }
}

/// Raw content of a stored video plus whatever the caller already knows
/// about it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoContentDescriptor {
    pub content: String,
    pub title: Option<String>,
    pub internal_id: Option<i64>,
}

impl VideoContentDescriptor {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.title = if title.trim().is_empty() { None } else { Some(title) };
        self
    }

    pub fn with_internal_id(mut self, id: i64) -> Self {
        self.internal_id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_labels_are_kebab_case() {
        assert_eq!(DurationSource::ManualOverride.as_str(), "manual-override");
        assert_eq!(
            serde_json::to_string(&DurationSource::PlatformApi).unwrap(),
            "\"platform-api\""
        );
    }

    #[test]
    fn test_blank_title_is_dropped() {
        let descriptor = VideoContentDescriptor::new("https://youtu.be/abc").with_title("   ");
        assert_eq!(descriptor.title, None);
    }
}
