pub mod cli;
pub mod config;
pub mod core;
pub mod extractors;
pub mod utils;

pub use config::Config;
pub use core::{
    BulkRecalcResult, BulkRecalculationJob, DurationResolver, PlatformKind, ResolvedDuration,
    VideoMetadata,
};
pub use extractors::{ExternalSourceClient, HttpSourceClient};
