//! Rule-based duration guessing for when no platform answers.
//!
//! Rules run in a fixed order and the first hit wins: known identifiers,
//! explicit timestamps, natural-language phrases, content-type keywords,
//! then the blind default.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::core::platform::{detect_platform, extract_identifier};

/// Historical catch-all estimate written by older importers.
pub const GENERIC_FALLBACK_SECS: u64 = 300;
/// Default when no rule matches.
pub const DEFAULT_FALLBACK_SECS: u64 = 480;
/// Values known to have been stamped onto rows as placeholders.
pub const LEGACY_DEFAULT_SECS: [u64; 3] = [300, 600, 900];
/// Pattern-derived values at or above this are treated as garbage.
pub const MAX_PATTERN_SECS: u64 = 36_000;

/// Every value the estimator may return without real evidence.
pub fn is_generic_fallback(seconds: u64) -> bool {
    seconds == GENERIC_FALLBACK_SECS || seconds == DEFAULT_FALLBACK_SECS
}

pub fn is_legacy_default(seconds: u64) -> bool {
    LEGACY_DEFAULT_SECS.contains(&seconds)
}

static BRACKETED_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\[(\d+):(\d+):(\d+)\]",
        r"\[(\d+):(\d+)\]",
        r"\((\d+):(\d+):(\d+)\)",
        r"\((\d+):(\d+)\)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Failed to compile duration marker regex"))
    .collect()
});

static BARE_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(\d+):(\d+):(\d+)", r"(\d+):(\d+)"]
        .iter()
        .map(|p| Regex::new(p).expect("Failed to compile duration marker regex"))
        .collect()
});

/// `host:port` pairs, which the bare `MM:SS` rule would otherwise read.
static HOST_PORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?://[^/\s:@]+|\blocalhost|\b\d{1,3}(?:\.\d{1,3}){3}):\d+")
        .expect("Failed to compile host:port regex")
});

static PHRASES: Lazy<Vec<(Regex, u64)>> = Lazy::new(|| {
    [
        (r"(?i)(\d+)\s*hours?", 3600),
        (r"(?i)(\d+)\s*hrs?", 3600),
        (r"(?i)(\d+)\s*minutes?", 60),
        (r"(?i)(\d+)\s*mins?", 60),
        (r"(?i)(\d+)\s*min\b", 60),
    ]
    .iter()
    .map(|(p, m)| (Regex::new(p).expect("Failed to compile phrase regex"), *m))
    .collect()
});

struct KeywordBucket {
    name: &'static str,
    seconds: u64,
    pattern: Regex,
}

/// Keywords match at the start of a word so "ted" does not fire on
/// "created" while "stream" still fires on "streaming".
static KEYWORD_BUCKETS: Lazy<Vec<KeywordBucket>> = Lazy::new(|| {
    let table: [(&'static str, u64, &[&str]); 14] = [
        ("short", 60, &["short", "shorts"]),
        ("trailer", 120, &["trailer", "teaser"]),
        ("tutorial", 600, &["tutorial", "how to", "how-to", "cómo"]),
        ("podcast", 2400, &["podcast", "interview", "entrevista"]),
        ("live", 3600, &["live", "stream", "en vivo"]),
        ("movie", 6000, &["full movie", "película completa", "film"]),
        ("ted", 1080, &["ted", "tedx"]),
        ("gamification", 720, &["gamification", "gamificación"]),
        ("game-elements", 480, &["game elements", "game-elements", "elementos de juego"]),
        ("storytelling", 360, &["narrative", "narrativa", "storytelling"]),
        ("mechanics", 420, &["mechanic", "mecánica", "reward", "recompensa"]),
        ("assessment", 360, &["assessment", "evaluation", "evaluación"]),
        ("course", 900, &["course", "curso", "class", "clase", "lesson", "lección"]),
        ("introduction", 480, &["introduction", "introducción", "intro"]),
    ];

    table
        .into_iter()
        .map(|(name, seconds, words)| {
            let alternatives = words
                .iter()
                .map(|w| regex::escape(w))
                .collect::<Vec<_>>()
                .join("|");
            KeywordBucket {
                name,
                seconds,
                pattern: Regex::new(&format!(r"(?i)\b(?:{alternatives})"))
                    .expect("Failed to compile keyword regex"),
            }
        })
        .collect()
});

/// Parse an `H:MM:SS` / `MM:SS` marker wrapped in brackets or parentheses.
pub fn parse_bracketed_marker(text: &str) -> Option<u64> {
    first_valid_marker(&BRACKETED_MARKERS, text)
}

/// Parse any explicit timestamp, bracketed forms first, then bare ones.
pub fn parse_explicit_marker(text: &str) -> Option<u64> {
    parse_bracketed_marker(text)
        .or_else(|| first_valid_marker(&BARE_MARKERS, &HOST_PORT.replace_all(text, " ")))
}

fn first_valid_marker(patterns: &[Regex], text: &str) -> Option<u64> {
    for pattern in patterns {
        let Some(caps) = pattern.captures(text) else {
            continue;
        };
        let parts: Option<Vec<u64>> = caps
            .iter()
            .skip(1)
            .map(|m| m.and_then(|m| m.as_str().parse::<u64>().ok()))
            .collect();
        let seconds = match parts.as_deref() {
            Some([h, m, s]) => h
                .checked_mul(3600)
                .zip(m.checked_mul(60))
                .and_then(|(h, m)| h.checked_add(m))
                .and_then(|hm| hm.checked_add(*s)),
            Some([m, s]) => m.checked_mul(60).and_then(|m| m.checked_add(*s)),
            _ => None,
        };
        let Some(seconds) = seconds else {
            continue;
        };
        if seconds > 0 && seconds < MAX_PATTERN_SECS {
            return Some(seconds);
        }
    }
    None
}

fn parse_phrase(text: &str) -> Option<u64> {
    for (pattern, multiplier) in PHRASES.iter() {
        let Some(count) = pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
        else {
            continue;
        };
        let seconds = count.saturating_mul(*multiplier);
        if seconds > 0 && seconds < MAX_PATTERN_SECS {
            return Some(seconds);
        }
    }
    None
}

/// Hand-verified durations keyed by platform-native id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnownDurations(HashMap<String, u64>);

impl KnownDurations {
    pub fn new(entries: HashMap<String, u64>) -> Self {
        Self(entries.into_iter().filter(|(_, secs)| *secs > 0).collect())
    }

    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    pub fn get(&self, platform_id: &str) -> Option<u64> {
        self.0.get(platform_id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for KnownDurations {
    fn default() -> Self {
        Self::new(HashMap::from([
            ("EEZkQv25uEs".to_string(), 729),
            ("ScMzIvxBSi4".to_string(), 94),
            ("ZXsQAXx_ao0".to_string(), 64),
            ("9bZkp7q19f0".to_string(), 252),
            ("kJQP7kiw5Fk".to_string(), 282),
            ("dQw4w9WgXcQ".to_string(), 212),
        ]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", content = "bucket", rename_all = "kebab-case")]
pub enum HeuristicRule {
    KnownIdentifier,
    ExplicitMarker,
    Phrase,
    Keyword(&'static str),
    Fallback,
}

impl fmt::Display for HeuristicRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeuristicRule::KnownIdentifier => f.write_str("known-identifier"),
            HeuristicRule::ExplicitMarker => f.write_str("explicit-marker"),
            HeuristicRule::Phrase => f.write_str("phrase"),
            HeuristicRule::Keyword(bucket) => write!(f, "keyword:{bucket}"),
            HeuristicRule::Fallback => f.write_str("fallback"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeuristicEstimate {
    pub seconds: u64,
    pub rule: HeuristicRule,
}

#[derive(Debug, Clone, Default)]
pub struct DurationHeuristics {
    known: KnownDurations,
}

impl DurationHeuristics {
    pub fn new(known: KnownDurations) -> Self {
        Self { known }
    }

    pub fn known_duration(&self, platform_id: &str) -> Option<u64> {
        self.known.get(platform_id)
    }

    /// Always returns a positive estimate. `title` is analysed in place of
    /// `content` when present.
    pub fn estimate(&self, content: &str, title: Option<&str>) -> HeuristicEstimate {
        let platform = detect_platform(content);
        if let Some(seconds) =
            extract_identifier(content, platform).and_then(|id| self.known_duration(&id))
        {
            return self.hit(seconds, HeuristicRule::KnownIdentifier);
        }

        let text = title.filter(|t| !t.trim().is_empty()).unwrap_or(content);

        if let Some(seconds) = parse_explicit_marker(text) {
            return self.hit(seconds, HeuristicRule::ExplicitMarker);
        }

        if let Some(seconds) = parse_phrase(text) {
            return self.hit(seconds, HeuristicRule::Phrase);
        }

        if let Some(bucket) = KEYWORD_BUCKETS.iter().find(|b| b.pattern.is_match(text)) {
            return self.hit(bucket.seconds, HeuristicRule::Keyword(bucket.name));
        }

        self.hit(DEFAULT_FALLBACK_SECS, HeuristicRule::Fallback)
    }

    fn hit(&self, seconds: u64, rule: HeuristicRule) -> HeuristicEstimate {
        debug!(seconds, %rule, "heuristic estimate");
        HeuristicEstimate { seconds, rule }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(text: &str) -> HeuristicEstimate {
        DurationHeuristics::default().estimate(text, None)
    }

    #[test]
    fn test_known_identifier_beats_everything() {
        let est = DurationHeuristics::default().estimate(
            "https://www.youtube.com/watch?v=EEZkQv25uEs",
            Some("Full movie tutorial (3:00)"),
        );
        assert_eq!(est.seconds, 729);
        assert_eq!(est.rule, HeuristicRule::KnownIdentifier);
    }

    #[test]
    fn test_explicit_markers_in_order() {
        assert_eq!(estimate("[12:09] Sacred Economics").seconds, 729);
        assert_eq!(estimate("Keynote [1:02:03]").seconds, 3723);
        assert_eq!(estimate("Recap (4:42)").seconds, 282);
        assert_eq!(estimate("Workshop (1:00:00)").seconds, 3600);
        assert_eq!(estimate("Clip 2:05:00 highlights").seconds, 7505);
        assert_eq!(estimate("Clip 3:32").seconds, 212);
        // Brackets win over an earlier bare timestamp.
        assert_eq!(estimate("Part 1:30 of talk [10:00]").seconds, 600);
    }

    #[test]
    fn test_marker_beats_keyword() {
        let est = estimate("[12:09] Sacred Economics tutorial");
        assert_eq!(est.seconds, 729);
        assert_eq!(est.rule, HeuristicRule::ExplicitMarker);
    }

    #[test]
    fn test_garbage_markers_are_rejected() {
        // 99:99:99 exceeds the ten hour ceiling, so the bare MM:SS rule
        // picks up the first two groups instead.
        assert_eq!(parse_explicit_marker("[99:99:99]"), Some(99 * 60 + 99));
        assert_eq!(parse_explicit_marker("0:00"), None);
        assert_eq!(parse_explicit_marker("no timestamps here"), None);
        assert_eq!(parse_bracketed_marker("starts 12:09"), None);
    }

    #[test]
    fn test_oversized_markers_are_rejected() {
        assert_eq!(parse_explicit_marker("[5124095576030432:00:05]"), None);
        assert_eq!(parse_explicit_marker("Talk 18446744073709551615:01"), None);
        assert_eq!(parse_explicit_marker("(307445734561825861:59)"), None);

        let est = estimate("Webinar [5124095576030432:00:05]");
        assert_eq!(est.seconds, DEFAULT_FALLBACK_SECS);
        assert_eq!(est.rule, HeuristicRule::Fallback);
        assert_eq!(estimate("Talk 18446744073709551615:01").rule, HeuristicRule::Fallback);
    }

    #[test]
    fn test_ports_are_not_timestamps() {
        let est = estimate("http://127.0.0.1:8080/media/intro.mp4");
        assert_eq!(est.seconds, 480);
        assert_eq!(est.rule, HeuristicRule::Keyword("introduction"));

        assert_eq!(parse_explicit_marker("https://cdn.example.com:8443/clip.mp4"), None);
        assert_eq!(parse_explicit_marker("served from localhost:3000"), None);
        assert_eq!(parse_explicit_marker("10.0.0.7:9000 mirror"), None);
        // A real timestamp next to a URL still counts.
        assert_eq!(
            parse_explicit_marker("http://localhost:8080/v.mp4 recap 4:42"),
            Some(282)
        );
    }

    #[test]
    fn test_phrases() {
        assert_eq!(estimate("A 2 hours masterclass").seconds, 7200);
        assert_eq!(estimate("Quick 5 min overview").seconds, 300);
        assert_eq!(estimate("15 minutes of focus").seconds, 900);
        assert_eq!(estimate("Relax 3 hrs").seconds, 10800);
        assert_eq!(estimate("The 12 hours stream").rule, HeuristicRule::Keyword("live"));
    }

    #[test]
    fn test_keyword_buckets() {
        let cases = [
            ("Tutorial: Cómo usar la plataforma", 600),
            ("#shorts quick tip", 60),
            ("Official trailer", 120),
            ("Entrevista con el equipo", 2400),
            ("En vivo desde la sede", 3600),
            ("Película completa", 6000),
            ("TEDx Madrid", 1080),
            ("Gamificación aplicada", 720),
            ("Elementos de Juego en Educación", 480),
            ("Narrativa y Storytelling", 360),
            ("Mecánicas de Recompensa", 420),
            ("Evaluación Gamificada", 360),
            ("Curso de liderazgo", 900),
            ("Introducción al módulo", 480),
        ];
        for (title, expected) in cases {
            assert_eq!(estimate(title).seconds, expected, "title: {title}");
        }
    }

    #[test]
    fn test_keyword_matches_word_start_only() {
        assert_eq!(estimate("Created with care").rule, HeuristicRule::Fallback);
        assert_eq!(estimate("Streaming setup").rule, HeuristicRule::Keyword("live"));
        assert_eq!(estimate("Microlesson: onboarding").seconds, DEFAULT_FALLBACK_SECS);
    }

    #[test]
    fn test_title_replaces_content() {
        let heuristics = DurationHeuristics::default();
        let est = heuristics.estimate("https://example.com/video", Some("Podcast #12"));
        assert_eq!(est.seconds, 2400);
    }

    #[test]
    fn test_fallback() {
        let est = estimate("Bienvenida");
        assert_eq!(est.seconds, DEFAULT_FALLBACK_SECS);
        assert_eq!(est.rule, HeuristicRule::Fallback);
        assert!(is_generic_fallback(est.seconds));
    }

    #[test]
    fn test_custom_known_table() {
        let heuristics =
            DurationHeuristics::new(KnownDurations::new(HashMap::from([("76979871".to_string(), 95)])));
        assert_eq!(heuristics.estimate("https://vimeo.com/76979871", None).seconds, 95);
        assert_eq!(
            heuristics
                .estimate("https://www.youtube.com/watch?v=EEZkQv25uEs", None)
                .rule,
            HeuristicRule::Fallback
        );
    }
}
