use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::metadata::DurationSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOp {
    Get,
    Set,
    Delete,
}

impl CacheOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOp::Get => "get",
            CacheOp::Set => "set",
            CacheOp::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOutcome {
    Hit,
    Miss,
    Success,
    Error,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
            CacheOutcome::Success => "success",
            CacheOutcome::Error => "error",
        }
    }
}

/// Counters and latency histograms for the resolution pipeline.
pub trait MetricsRecorder: Send + Sync {
    fn record_cache_operation(&self, op: CacheOp, outcome: CacheOutcome);
    fn record_resolution(&self, method: DurationSource, success: bool);
    fn observe_latency(&self, method: DurationSource, seconds: f64);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn record_cache_operation(&self, _op: CacheOp, _outcome: CacheOutcome) {}
    fn record_resolution(&self, _method: DurationSource, _success: bool) {}
    fn observe_latency(&self, _method: DurationSource, _seconds: f64) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub sum_seconds: f64,
    pub max_seconds: f64,
}

impl LatencySummary {
    pub fn mean_seconds(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_seconds / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub cache_operations: BTreeMap<String, u64>,
    pub resolutions: BTreeMap<String, u64>,
    pub latency: BTreeMap<String, LatencySummary>,
}

/// Keeps counters in memory; the CLI prints them after a run.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    cache_operations: DashMap<(CacheOp, CacheOutcome), u64>,
    resolutions: DashMap<(DurationSource, bool), u64>,
    latency: DashMap<DurationSource, LatencySummary>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_count(&self, op: CacheOp, outcome: CacheOutcome) -> u64 {
        self.cache_operations
            .get(&(op, outcome))
            .map(|v| *v)
            .unwrap_or(0)
    }

    pub fn resolution_count(&self, method: DurationSource, success: bool) -> u64 {
        self.resolutions
            .get(&(method, success))
            .map(|v| *v)
            .unwrap_or(0)
    }

    pub fn latency(&self, method: DurationSource) -> LatencySummary {
        self.latency.get(&method).map(|v| *v).unwrap_or_default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let cache_operations = self
            .cache_operations
            .iter()
            .map(|e| {
                let (op, outcome) = e.key();
                (format!("{}:{}", op.as_str(), outcome.as_str()), *e.value())
            })
            .collect();
        let resolutions = self
            .resolutions
            .iter()
            .map(|e| {
                let (method, success) = e.key();
                (format!("{}:{}", method.as_str(), success), *e.value())
            })
            .collect();
        let latency = self
            .latency
            .iter()
            .map(|e| (e.key().as_str().to_string(), *e.value()))
            .collect();

        MetricsSnapshot {
            cache_operations,
            resolutions,
            latency,
        }
    }
}

impl MetricsRecorder for InMemoryMetrics {
    fn record_cache_operation(&self, op: CacheOp, outcome: CacheOutcome) {
        *self.cache_operations.entry((op, outcome)).or_insert(0) += 1;
    }

    fn record_resolution(&self, method: DurationSource, success: bool) {
        *self.resolutions.entry((method, success)).or_insert(0) += 1;
    }

    fn observe_latency(&self, method: DurationSource, seconds: f64) {
        let mut summary = self.latency.entry(method).or_default();
        summary.count += 1;
        summary.sum_seconds += seconds;
        if seconds > summary.max_seconds {
            summary.max_seconds = seconds;
        }
    }
}
