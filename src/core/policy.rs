//! Guards a catalog-wide sweep against replacing good durations with
//! worse estimates.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::heuristics::{is_generic_fallback, is_legacy_default};

pub const DEFAULT_TOLERANCE_SECS: u64 = 10;
pub const DEFAULT_MAX_RELATIVE_CHANGE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionPolicy {
    /// Differences up to this many seconds count as "already correct".
    pub tolerance_secs: u64,
    /// Relative swings above this are presumed noise.
    pub max_relative_change: f64,
}

impl Default for ProtectionPolicy {
    fn default() -> Self {
        Self {
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
            max_relative_change: DEFAULT_MAX_RELATIVE_CHANGE,
        }
    }
}

impl ProtectionPolicy {
    pub fn within_tolerance(&self, current: Option<u64>, candidate: u64) -> bool {
        match current {
            Some(current) if current > 0 => current.abs_diff(candidate) <= self.tolerance_secs,
            _ => false,
        }
    }

    pub fn should_replace(&self, current: Option<u64>, candidate: u64, title: &str) -> bool {
        let current = match current {
            Some(current) if current > 0 => current,
            _ => return true,
        };

        if self.within_tolerance(Some(current), candidate) {
            debug!(current, candidate, title, "within tolerance, keeping current");
            return false;
        }

        if is_generic_fallback(candidate) {
            let allowed = is_legacy_default(current);
            debug!(
                current,
                candidate, title, allowed, "candidate is a generic fallback"
            );
            return allowed;
        }

        let relative = current.abs_diff(candidate) as f64 / current as f64;
        if relative > self.max_relative_change {
            debug!(
                current,
                candidate,
                title,
                relative,
                "relative change too large, keeping current"
            );
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ProtectionPolicy {
        ProtectionPolicy::default()
    }

    #[test]
    fn test_missing_or_invalid_current_is_replaced() {
        assert!(policy().should_replace(None, 480, "x"));
        assert!(policy().should_replace(Some(0), 300, "x"));
    }

    #[test]
    fn test_small_difference_is_not_replaced() {
        assert!(!policy().should_replace(Some(94), 96, "Elementos de Juego"));
        assert!(!policy().should_replace(Some(100), 110, "x"));
        assert!(policy().should_replace(Some(100), 111, "x"));
    }

    #[test]
    fn test_generic_fallback_only_replaces_legacy_defaults() {
        assert!(policy().should_replace(Some(300), 480, "x"));
        assert!(policy().should_replace(Some(900), 480, "x"));
        assert!(policy().should_replace(Some(600), 300, "x"));
        assert!(!policy().should_replace(Some(420), 480, "x"));
        assert!(!policy().should_replace(Some(729), 300, "x"));
    }

    #[test]
    fn test_large_swings_are_rejected() {
        assert!(!policy().should_replace(Some(600), 50, "x"));
        assert!(!policy().should_replace(Some(100), 151, "x"));
        assert!(policy().should_replace(Some(100), 150, "x"));
        assert!(policy().should_replace(Some(700), 729, "x"));
    }

    #[test]
    fn test_thresholds_are_tunable() {
        let strict = ProtectionPolicy {
            tolerance_secs: 0,
            max_relative_change: 0.1,
        };
        assert!(strict.should_replace(Some(94), 96, "x"));
        assert!(!strict.should_replace(Some(100), 120, "x"));
    }
}
