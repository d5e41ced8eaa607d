use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Substrings that mark content served by our own infrastructure.
const LOCAL_MARKERS: &[&str] = &["localhost", "127.0.0.1", "gamifier"];

static IFRAME_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<iframe\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#)
        .expect("Failed to compile iframe src regex")
});

static YOUTUBE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"youtube\.com/watch\?v=([A-Za-z0-9_-]+)",
        r"youtu\.be/([A-Za-z0-9_-]+)",
        r"youtube\.com/embed/([A-Za-z0-9_-]+)",
        r#""videoId"\s*:\s*"([A-Za-z0-9_-]+)""#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Failed to compile YouTube id regex"))
    .collect()
});

static VIMEO_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"vimeo\.com/(\d+)", r"player\.vimeo\.com/video/(\d+)"]
        .iter()
        .map(|p| Regex::new(p).expect("Failed to compile Vimeo id regex"))
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    YouTube,
    Vimeo,
    Local,
    Unknown,
}

impl PlatformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::YouTube => "youtube",
            PlatformKind::Vimeo => "vimeo",
            PlatformKind::Local => "local",
            PlatformKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a content string. Total: empty or unrecognised input is `Unknown`.
pub fn detect_platform(content: &str) -> PlatformKind {
    if content.trim().is_empty() {
        return PlatformKind::Unknown;
    }

    let lower = content.to_lowercase();

    if lower.contains("youtube.com") || lower.contains("youtu.be") {
        return PlatformKind::YouTube;
    }

    if lower.contains("vimeo.com") {
        return PlatformKind::Vimeo;
    }

    if LOCAL_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return PlatformKind::Local;
    }

    PlatformKind::Unknown
}

/// Returns the `src` of the first iframe in `content`, if it is HTML-wrapped.
pub fn iframe_src(content: &str) -> Option<&str> {
    IFRAME_SRC
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Pull the platform-native video identifier out of `content`.
///
/// Iframe markup is narrowed to its `src` first. Patterns are tried in
/// order and the first match wins.
pub fn extract_identifier(content: &str, platform: PlatformKind) -> Option<String> {
    let patterns: &[Regex] = match platform {
        PlatformKind::YouTube => &YOUTUBE_PATTERNS,
        PlatformKind::Vimeo => &VIMEO_PATTERNS,
        PlatformKind::Local | PlatformKind::Unknown => return None,
    };

    let target = iframe_src(content).unwrap_or(content);

    first_capture(patterns, target).or_else(|| {
        // An iframe src can be relative or proxied; the surrounding markup
        // may still carry the id (e.g. a data attribute or JSON blob).
        if target.len() != content.len() {
            first_capture(patterns, content)
        } else {
            None
        }
    })
}

fn first_capture(patterns: &[Regex], haystack: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(haystack)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_platform() {
        let cases = [
            ("https://www.youtube.com/watch?v=EEZkQv25uEs", PlatformKind::YouTube),
            ("https://YOUTU.BE/EEZkQv25uEs", PlatformKind::YouTube),
            ("https://vimeo.com/76979871", PlatformKind::Vimeo),
            ("http://localhost:3000/media/intro.mp4", PlatformKind::Local),
            ("Tutorial: Cómo usar la plataforma", PlatformKind::Unknown),
            ("", PlatformKind::Unknown),
            ("   ", PlatformKind::Unknown),
        ];

        for (content, expected) in cases {
            assert_eq!(detect_platform(content), expected, "content: {content}");
        }
    }

    #[test]
    fn test_youtube_markers_win_over_local() {
        let content = "http://localhost/proxy?to=https://youtu.be/abc123";
        assert_eq!(detect_platform(content), PlatformKind::YouTube);
    }

    #[test]
    fn test_extract_youtube_identifier_variants() {
        let cases = [
            ("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=12", "dQw4w9WgXcQ"),
            ("https://youtu.be/ScMzIvxBSi4?si=share", "ScMzIvxBSi4"),
            ("https://www.youtube.com/embed/ZXsQAXx_ao0", "ZXsQAXx_ao0"),
            (r#"{"videoId": "kJQP7kiw5Fk", "url": "youtube.com"}"#, "kJQP7kiw5Fk"),
        ];

        for (content, expected) in cases {
            assert_eq!(
                extract_identifier(content, PlatformKind::YouTube).as_deref(),
                Some(expected),
                "content: {content}"
            );
        }
    }

    #[test]
    fn test_first_youtube_pattern_wins() {
        let content = r#"https://www.youtube.com/watch?v=first11char {"videoId":"second"}"#;
        assert_eq!(
            extract_identifier(content, PlatformKind::YouTube).as_deref(),
            Some("first11char")
        );
    }

    #[test]
    fn test_extract_from_iframe_markup() {
        let content = r#"<div class="player"><iframe width="560" height="315"
            src="https://www.youtube.com/embed/EEZkQv25uEs?rel=0" title="YouTube video player"
            frameborder="0" allowfullscreen></iframe></div>"#;
        assert_eq!(iframe_src(content), Some("https://www.youtube.com/embed/EEZkQv25uEs?rel=0"));
        assert_eq!(
            extract_identifier(content, PlatformKind::YouTube).as_deref(),
            Some("EEZkQv25uEs")
        );

        let vimeo = r#"<iframe src='https://player.vimeo.com/video/76979871' allow="autoplay"></iframe>"#;
        assert_eq!(
            extract_identifier(vimeo, PlatformKind::Vimeo).as_deref(),
            Some("76979871")
        );
    }

    #[test]
    fn test_extract_returns_none_without_identifier() {
        assert_eq!(extract_identifier("https://vimeo.com/channels/staff", PlatformKind::Vimeo), None);
        assert_eq!(extract_identifier("https://youtube.com/", PlatformKind::YouTube), None);
        assert_eq!(
            extract_identifier("https://youtu.be/abc", PlatformKind::Unknown),
            None
        );
        assert_eq!(
            extract_identifier("http://localhost/video.mp4", PlatformKind::Local),
            None
        );
    }
}
