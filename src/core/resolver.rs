//! The duration state machine.
//!
//! States run in strict priority order: manual override, known-id table,
//! cache, platform API, watch page (opt-in), oEmbed title, heuristics.
//! Every upstream failure is logged and falls through to the next state,
//! so `resolve` always produces a positive duration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::cache::CacheStore;
use crate::core::error::{SourceError, SourceResult};
use crate::core::heuristics::{parse_bracketed_marker, DurationHeuristics};
use crate::core::metadata::{
    DurationSource, ResolvedDuration, VideoContentDescriptor, VideoMetadata,
};
use crate::core::metrics::{CacheOp, CacheOutcome, MetricsRecorder};
use crate::core::overrides::ManualOverrideRegistry;
use crate::core::platform::{detect_platform, extract_identifier, iframe_src, PlatformKind};
use crate::extractors::ExternalSourceClient;
use crate::utils::truncate_for_log;

/// Knobs the resolver reads on every call.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub youtube_api_key: Option<String>,
    pub scrape_watch_page: bool,
    pub cache_ttl: Duration,
    pub heuristic_ttl: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ResolverSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            youtube_api_key: config.api.api_key().map(String::from),
            scrape_watch_page: config.api.scrape_watch_page,
            cache_ttl: config.cache.ttl(),
            heuristic_ttl: config.cache.heuristic_ttl(),
        }
    }
}

/// Platform, identifier and cache key derived once per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTarget {
    pub platform: PlatformKind,
    pub platform_id: Option<String>,
    pub cache_key: Option<String>,
}

impl VideoTarget {
    pub fn from_content(content: &str) -> Self {
        let platform = detect_platform(content);
        let platform_id = extract_identifier(content, platform);
        let cache_key = match platform_id.as_deref() {
            Some(id) => Some(format!("{}:{}", platform.as_str(), id)),
            None => {
                let trimmed = content.trim();
                (!trimmed.is_empty())
                    .then(|| format!("content:{}", urlencoding::encode(trimmed)))
            }
        };

        Self {
            platform,
            platform_id,
            cache_key,
        }
    }

    /// Canonical page URL for the video, or the raw location otherwise.
    pub fn canonical_url(&self, content: &str) -> String {
        match (self.platform, self.platform_id.as_deref()) {
            (PlatformKind::YouTube, Some(id)) => format!("https://www.youtube.com/watch?v={}", id),
            (PlatformKind::Vimeo, Some(id)) => format!("https://vimeo.com/{}", id),
            _ => iframe_src(content).unwrap_or(content.trim()).to_string(),
        }
    }
}

fn require_positive(seconds: u64, endpoint: &'static str) -> SourceResult<u64> {
    if seconds > 0 {
        Ok(seconds)
    } else {
        Err(SourceError::NoDuration { endpoint })
    }
}

pub fn youtube_thumbnail(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", video_id)
}

pub struct DurationResolver {
    client: Arc<dyn ExternalSourceClient>,
    cache: Arc<dyn CacheStore>,
    metrics: Arc<dyn MetricsRecorder>,
    overrides: ManualOverrideRegistry,
    heuristics: DurationHeuristics,
    settings: ResolverSettings,
}

impl DurationResolver {
    pub fn new(
        client: Arc<dyn ExternalSourceClient>,
        cache: Arc<dyn CacheStore>,
        metrics: Arc<dyn MetricsRecorder>,
        overrides: ManualOverrideRegistry,
        heuristics: DurationHeuristics,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            client,
            cache,
            metrics,
            overrides,
            heuristics,
            settings,
        }
    }

    pub fn from_config(
        config: &Config,
        client: Arc<dyn ExternalSourceClient>,
        cache: Arc<dyn CacheStore>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self::new(
            client,
            cache,
            metrics,
            ManualOverrideRegistry::new(config.manual_overrides.clone()),
            DurationHeuristics::new(config.known_durations.clone()),
            ResolverSettings::from_config(config),
        )
    }

    pub fn overrides(&self) -> &ManualOverrideRegistry {
        &self.overrides
    }

    pub async fn resolve(&self, content: &str) -> ResolvedDuration {
        self.resolve_descriptor(&VideoContentDescriptor::new(content))
            .await
    }

    pub async fn resolve_descriptor(&self, descriptor: &VideoContentDescriptor) -> ResolvedDuration {
        let started = Instant::now();
        let content = descriptor.content.as_str();
        let target = VideoTarget::from_content(content);
        let platform_id = target.platform_id.as_deref();

        debug!(
            platform = %target.platform,
            platform_id = ?platform_id,
            content = %truncate_for_log(content, 80),
            "resolving duration"
        );

        if let Some(seconds) = self.overrides.lookup(descriptor.internal_id, platform_id) {
            return self.finish(seconds, DurationSource::ManualOverride, started);
        }

        if let Some(seconds) = platform_id.and_then(|id| self.heuristics.known_duration(id)) {
            debug!(seconds, "known identifier, skipping cache");
            return self.finish(seconds, DurationSource::Heuristic, started);
        }

        let cache_key = self.usable_cache_key(&target).await;

        if let Some(key) = cache_key {
            if let Some(seconds) = self.cached_duration(key).await {
                return self.finish(seconds, DurationSource::Cache, started);
            }
        }

        let mut fetched_title = None;

        if let Some(id) = platform_id {
            match target.platform {
                PlatformKind::YouTube => {
                    match self.youtube_api(id).await {
                        Ok(seconds) => {
                            return self
                                .store(cache_key, seconds, DurationSource::PlatformApi, started)
                                .await;
                        }
                        Err(err) => self.fall_through(DurationSource::PlatformApi, &err),
                    }

                    if self.settings.scrape_watch_page {
                        match self
                            .client
                            .youtube_watch_page_duration(id)
                            .await
                            .and_then(|secs| require_positive(secs, "youtube-watch-page"))
                        {
                            Ok(seconds) => {
                                return self
                                    .store(cache_key, seconds, DurationSource::PageScrape, started)
                                    .await;
                            }
                            Err(err) => self.fall_through(DurationSource::PageScrape, &err),
                        }
                    }

                    match self.client.youtube_oembed(id).await {
                        Ok(info) => fetched_title = info.title,
                        Err(err) => self.fall_through(DurationSource::Oembed, &err),
                    }
                }
                PlatformKind::Vimeo => {
                    match self.client.vimeo_oembed(id).await {
                        Ok(info) => {
                            if let Some(seconds) = info.duration.filter(|secs| *secs > 0) {
                                return self
                                    .store(cache_key, seconds, DurationSource::PlatformApi, started)
                                    .await;
                            }
                            fetched_title = info.title;
                        }
                        Err(err) => self.fall_through(DurationSource::PlatformApi, &err),
                    }

                    match self.client.vimeo_video(id).await {
                        Ok(video) => {
                            if let Some(seconds) = video.duration.filter(|secs| *secs > 0) {
                                return self
                                    .store(cache_key, seconds, DurationSource::PlatformApi, started)
                                    .await;
                            }
                            fetched_title = fetched_title.or(video.title);
                        }
                        Err(err) => self.fall_through(DurationSource::PlatformApi, &err),
                    }
                }
                PlatformKind::Local | PlatformKind::Unknown => {}
            }
        }

        if let Some(title) = fetched_title.as_deref() {
            match parse_bracketed_marker(title) {
                Some(seconds) => {
                    return self
                        .store(cache_key, seconds, DurationSource::Oembed, started)
                        .await;
                }
                None => {
                    debug!(title, "oEmbed title carries no timestamp");
                    self.metrics
                        .record_resolution(DurationSource::Oembed, false);
                }
            }
        }

        let title = descriptor.title.as_deref().or(fetched_title.as_deref());
        let estimate = self.heuristics.estimate(content, title);
        debug!(rule = %estimate.rule, seconds = estimate.seconds, "falling back to heuristics");
        self.store(cache_key, estimate.seconds, DurationSource::Heuristic, started)
            .await
    }

    /// Drop the cached duration so the next resolution starts fresh.
    pub async fn invalidate(&self, content: &str) {
        let Some(key) = VideoTarget::from_content(content).cache_key else {
            return;
        };
        if !self.cache.is_healthy().await {
            return;
        }
        match self.cache.delete_duration(&key).await {
            Ok(()) => self
                .metrics
                .record_cache_operation(CacheOp::Delete, CacheOutcome::Success),
            Err(err) => {
                warn!(key = %key, error = %err, "failed to invalidate cached duration");
                self.metrics
                    .record_cache_operation(CacheOp::Delete, CacheOutcome::Error);
            }
        }
    }

    /// Richer per-video metadata. Fields the platforms do not answer stay
    /// empty; `duration` is always filled, falling back to `resolve`.
    pub async fn extract_metadata(&self, content: &str) -> VideoMetadata {
        let target = VideoTarget::from_content(content);
        let cache_key = self.usable_cache_key(&target).await;

        if let Some(key) = cache_key {
            if let Some(metadata) = self.cached_metadata(key).await {
                return metadata;
            }
        }

        let mut metadata = VideoMetadata::bare(
            target.platform,
            target.platform_id.clone(),
            &target.canonical_url(content),
        );

        match (target.platform, target.platform_id.as_deref()) {
            (PlatformKind::YouTube, Some(id)) => self.enrich_youtube(id, &mut metadata).await,
            (PlatformKind::Vimeo, Some(id)) => self.enrich_vimeo(id, &mut metadata).await,
            _ => {}
        }

        if metadata.duration.is_none() {
            let mut descriptor = VideoContentDescriptor::new(content);
            descriptor.title = metadata.title.clone();
            metadata.duration = Some(self.resolve_descriptor(&descriptor).await.seconds);
        }

        if let Some(key) = cache_key {
            self.store_metadata(key, &metadata).await;
        }

        info!(
            platform = %metadata.platform,
            title = ?metadata.title,
            duration = ?metadata.duration,
            "extracted metadata"
        );
        metadata
    }

    async fn enrich_youtube(&self, id: &str, metadata: &mut VideoMetadata) {
        metadata.thumbnail_url = Some(youtube_thumbnail(id));

        if let Some(key) = self.settings.youtube_api_key.as_deref() {
            match self.client.youtube_video(id, key).await {
                Ok(video) => {
                    metadata.title = video.title;
                    metadata.description = video.description;
                    metadata.tags = video.tags;
                    metadata.duration = video.duration;
                }
                Err(err) => warn!(video_id = id, error = %err, "YouTube Data API metadata failed"),
            }
        }

        if metadata.title.is_none() {
            match self.client.youtube_oembed(id).await {
                Ok(info) => metadata.title = info.title,
                Err(err) => warn!(video_id = id, error = %err, "YouTube oEmbed failed"),
            }
        }
    }

    async fn enrich_vimeo(&self, id: &str, metadata: &mut VideoMetadata) {
        match self.client.vimeo_video(id).await {
            Ok(video) => {
                metadata.title = video.title;
                metadata.description = video.description;
                metadata.thumbnail_url = video.thumbnail_url;
                metadata.tags = video.tags;
                metadata.duration = video.duration;
                return;
            }
            Err(err) => warn!(video_id = id, error = %err, "Vimeo API metadata failed"),
        }

        match self.client.vimeo_oembed(id).await {
            Ok(info) => {
                metadata.title = info.title;
                metadata.thumbnail_url = info.thumbnail_url;
                metadata.duration = info.duration;
            }
            Err(err) => warn!(video_id = id, error = %err, "Vimeo oEmbed failed"),
        }
    }

    async fn usable_cache_key<'t>(&self, target: &'t VideoTarget) -> Option<&'t str> {
        let key = target.cache_key.as_deref()?;
        if self.cache.is_healthy().await {
            Some(key)
        } else {
            warn!("cache unhealthy, continuing without it");
            None
        }
    }

    async fn youtube_api(&self, id: &str) -> SourceResult<u64> {
        let key = self
            .settings
            .youtube_api_key
            .as_deref()
            .ok_or(SourceError::MissingApiKey { platform: "youtube" })?;
        let seconds = self.client.youtube_duration(id, key).await?;
        require_positive(seconds, "youtube-data-api")
    }

    fn fall_through(&self, state: DurationSource, err: &SourceError) {
        match err {
            SourceError::MissingApiKey { .. } => debug!(%state, "{}", err),
            _ => warn!(%state, error = %err, "resolution state failed, falling through"),
        }
        self.metrics.record_resolution(state, false);
    }

    async fn cached_duration(&self, key: &str) -> Option<u64> {
        match self.cache.get_duration(key).await {
            Ok(Some(seconds)) => {
                self.metrics
                    .record_cache_operation(CacheOp::Get, CacheOutcome::Hit);
                Some(seconds)
            }
            Ok(None) => {
                self.metrics
                    .record_cache_operation(CacheOp::Get, CacheOutcome::Miss);
                None
            }
            Err(err) => {
                warn!(key, error = %err, "cache read failed");
                self.metrics
                    .record_cache_operation(CacheOp::Get, CacheOutcome::Error);
                None
            }
        }
    }

    async fn cached_metadata(&self, key: &str) -> Option<VideoMetadata> {
        match self.cache.get_metadata(key).await {
            Ok(Some(value)) => match serde_json::from_value::<VideoMetadata>(value) {
                Ok(metadata) => {
                    self.metrics
                        .record_cache_operation(CacheOp::Get, CacheOutcome::Hit);
                    Some(metadata)
                }
                Err(err) => {
                    warn!(key, error = %err, "cached metadata has an unexpected shape");
                    self.metrics
                        .record_cache_operation(CacheOp::Get, CacheOutcome::Error);
                    None
                }
            },
            Ok(None) => {
                self.metrics
                    .record_cache_operation(CacheOp::Get, CacheOutcome::Miss);
                None
            }
            Err(err) => {
                warn!(key, error = %err, "metadata cache read failed");
                self.metrics
                    .record_cache_operation(CacheOp::Get, CacheOutcome::Error);
                None
            }
        }
    }

    async fn store_metadata(&self, key: &str, metadata: &VideoMetadata) {
        let value = match serde_json::to_value(metadata) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "could not serialize metadata");
                return;
            }
        };
        let outcome = match self
            .cache
            .set_metadata(key, &value, self.settings.cache_ttl)
            .await
        {
            Ok(()) => CacheOutcome::Success,
            Err(err) => {
                warn!(key, error = %err, "metadata cache write failed");
                CacheOutcome::Error
            }
        };
        self.metrics.record_cache_operation(CacheOp::Set, outcome);
    }

    /// Write-through, then report.
    async fn store(
        &self,
        cache_key: Option<&str>,
        seconds: u64,
        source: DurationSource,
        started: Instant,
    ) -> ResolvedDuration {
        if let Some(key) = cache_key {
            let ttl = if source.is_authoritative() {
                self.settings.cache_ttl
            } else {
                self.settings.heuristic_ttl
            };
            let outcome = match self.cache.set_duration(key, seconds, ttl).await {
                Ok(()) => CacheOutcome::Success,
                Err(err) => {
                    warn!(key, error = %err, "cache write failed");
                    CacheOutcome::Error
                }
            };
            self.metrics.record_cache_operation(CacheOp::Set, outcome);
        }

        self.finish(seconds, source, started)
    }

    fn finish(&self, seconds: u64, source: DurationSource, started: Instant) -> ResolvedDuration {
        self.metrics.record_resolution(source, true);
        self.metrics
            .observe_latency(source, started.elapsed().as_secs_f64());
        info!(seconds, %source, "resolved duration");
        ResolvedDuration::new(seconds, source)
    }
}
