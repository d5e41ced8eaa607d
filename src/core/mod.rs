pub mod cache;
pub mod catalog;
pub mod error;
pub mod heuristics;
pub mod metadata;
pub mod metrics;
pub mod overrides;
pub mod platform;
pub mod policy;
pub mod recalc;
pub mod resolver;

pub use cache::{CacheStore, MemoryCache};
pub use catalog::{CatalogItem, CatalogStore, JsonCatalog, MemoryCatalog};
pub use heuristics::DurationHeuristics;
pub use metadata::{DurationSource, ResolvedDuration, VideoContentDescriptor, VideoMetadata};
pub use metrics::{InMemoryMetrics, MetricsRecorder, NoopMetrics};
pub use overrides::ManualOverrideRegistry;
pub use platform::{detect_platform, extract_identifier, PlatformKind};
pub use policy::ProtectionPolicy;
pub use recalc::{BulkRecalcResult, BulkRecalculationJob, RecalcMode, RecalcOptions, RecalcStatus};
pub use resolver::DurationResolver;
