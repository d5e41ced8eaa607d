use once_cell::sync::Lazy;
use regex::Regex;

static ISO8601_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^P(?:(\d+)D)?T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$")
        .expect("Failed to compile ISO-8601 duration regex")
});

/// Convert an ISO-8601 duration such as `PT12M9S` to seconds. Zero-length
/// values (live streams report `P0D`) are `None`.
pub fn parse_iso8601_duration(duration: &str) -> Option<u64> {
    let caps = ISO8601_DURATION.captures(duration.trim())?;
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };

    let seconds = part(1) * 86_400 + part(2) * 3600 + part(3) * 60 + part(4);
    (seconds > 0).then_some(seconds)
}

/// Render seconds as `H:MM:SS` or `M:SS`.
pub fn format_clock(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Shorten content for log lines without splitting a UTF-8 sequence.
pub fn truncate_for_log(content: &str, max_chars: usize) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso8601_duration() {
        assert_eq!(parse_iso8601_duration("PT12M9S"), Some(729));
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), Some(3723));
        assert_eq!(parse_iso8601_duration("PT45S"), Some(45));
        assert_eq!(parse_iso8601_duration("PT2H"), Some(7200));
        assert_eq!(parse_iso8601_duration("P1DT1S"), Some(86_401));
        assert_eq!(parse_iso8601_duration("P0D"), None);
        assert_eq!(parse_iso8601_duration("PT0S"), None);
        assert_eq!(parse_iso8601_duration("12:09"), None);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(729), "12:09");
        assert_eq!(format_clock(64), "1:04");
        assert_eq!(format_clock(3723), "1:02:03");
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("Cómo usar", 4), "Cómo...");
    }
}
