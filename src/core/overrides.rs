use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One curated row. Written by people, never by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualOverrideEntry {
    pub internal_id: i64,
    #[serde(default)]
    pub platform_id: Option<String>,
    pub seconds: u64,
}

/// Human-verified durations. Outranks every computed value.
#[derive(Debug, Clone, Default)]
pub struct ManualOverrideRegistry {
    by_internal: HashMap<i64, u64>,
    by_platform: HashMap<String, u64>,
}

impl ManualOverrideRegistry {
    pub fn new(entries: impl IntoIterator<Item = ManualOverrideEntry>) -> Self {
        let mut registry = Self::default();
        for entry in entries {
            if entry.seconds == 0 {
                tracing::warn!(
                    internal_id = entry.internal_id,
                    "ignoring manual override with zero duration"
                );
                continue;
            }
            registry.by_internal.insert(entry.internal_id, entry.seconds);
            if let Some(platform_id) = entry.platform_id {
                registry.by_platform.insert(platform_id, entry.seconds);
            }
        }
        registry
    }

    pub fn by_internal_id(&self, internal_id: i64) -> Option<u64> {
        self.by_internal.get(&internal_id).copied()
    }

    pub fn by_platform_id(&self, platform_id: &str) -> Option<u64> {
        self.by_platform.get(platform_id).copied()
    }

    /// Internal id takes precedence over platform id.
    pub fn lookup(&self, internal_id: Option<i64>, platform_id: Option<&str>) -> Option<u64> {
        internal_id
            .and_then(|id| self.by_internal_id(id))
            .or_else(|| platform_id.and_then(|id| self.by_platform_id(id)))
    }

    pub fn len(&self) -> usize {
        self.by_internal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_internal.is_empty()
    }
}

/// Catalog rows whose durations were checked by hand against the source.
pub fn default_manual_overrides() -> Vec<ManualOverrideEntry> {
    [(39, 729), (40, 94), (41, 64), (42, 252), (43, 282)]
        .into_iter()
        .map(|(internal_id, seconds)| ManualOverrideEntry {
            internal_id,
            platform_id: None,
            seconds,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_precedence() {
        let registry = ManualOverrideRegistry::new(vec![
            ManualOverrideEntry {
                internal_id: 7,
                platform_id: Some("abc".to_string()),
                seconds: 100,
            },
            ManualOverrideEntry {
                internal_id: 8,
                platform_id: None,
                seconds: 200,
            },
        ]);

        assert_eq!(registry.lookup(Some(8), Some("abc")), Some(200));
        assert_eq!(registry.lookup(Some(99), Some("abc")), Some(100));
        assert_eq!(registry.lookup(None, Some("abc")), Some(100));
        assert_eq!(registry.lookup(None, Some("zzz")), None);
        assert_eq!(registry.lookup(None, None), None);
    }

    #[test]
    fn test_zero_entries_are_skipped() {
        let registry = ManualOverrideRegistry::new(vec![ManualOverrideEntry {
            internal_id: 1,
            platform_id: Some("x".to_string()),
            seconds: 0,
        }]);
        assert!(registry.is_empty());
        assert_eq!(registry.by_platform_id("x"), None);
    }

    #[test]
    fn test_default_rows() {
        let registry = ManualOverrideRegistry::new(default_manual_overrides());
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.by_internal_id(39), Some(729));
        assert_eq!(registry.by_internal_id(43), Some(282));
    }
}
