//! Catalog-wide duration sweep.
//!
//! Items are processed one at a time, in catalog order, with a pause
//! between them to stay under upstream rate limits. Each item lands in
//! exactly one outcome bucket.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::catalog::{CatalogItem, CatalogStore};
use crate::core::error::CatalogError;
use crate::core::metadata::{DurationSource, VideoContentDescriptor};
use crate::core::platform::{detect_platform, extract_identifier};
use crate::core::policy::ProtectionPolicy;
use crate::core::resolver::DurationResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecalcMode {
    /// Only items without a stored duration.
    #[default]
    NullsOnly,
    /// Every item; cached durations are dropped first.
    Force,
}

impl fmt::Display for RecalcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecalcMode::NullsOnly => f.write_str("nulls-only"),
            RecalcMode::Force => f.write_str("force"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecalcOptions {
    pub mode: RecalcMode,
    /// Classify without writing anything back.
    pub dry_run: bool,
    pub cancel: CancellationToken,
}

impl RecalcOptions {
    pub fn new(mode: RecalcMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecalcStatus {
    Updated,
    /// A manual override put back over a drifted value. Counted as updated.
    Restored,
    Verified,
    Protected,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecalcItemResult {
    pub id: i64,
    pub title: String,
    pub status: RecalcStatus,
    pub before: Option<u64>,
    pub after: Option<u64>,
    pub source: Option<DurationSource>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkRecalcResult {
    pub total: usize,
    pub updated: usize,
    pub verified: usize,
    pub protected: usize,
    pub errors: usize,
    pub cancelled: bool,
    pub dry_run: bool,
    pub items: Vec<RecalcItemResult>,
}

impl BulkRecalcResult {
    fn record(&mut self, item: RecalcItemResult) {
        match item.status {
            RecalcStatus::Updated | RecalcStatus::Restored => self.updated += 1,
            RecalcStatus::Verified => self.verified += 1,
            RecalcStatus::Protected => self.protected += 1,
            RecalcStatus::Error => self.errors += 1,
        }
        self.total += 1;
        self.items.push(item);
    }

    pub fn error_items(&self) -> impl Iterator<Item = &RecalcItemResult> {
        self.items
            .iter()
            .filter(|item| item.status == RecalcStatus::Error)
    }
}

pub struct BulkRecalculationJob {
    resolver: Arc<DurationResolver>,
    catalog: Arc<dyn CatalogStore>,
    policy: ProtectionPolicy,
    delay: Duration,
}

impl BulkRecalculationJob {
    pub fn new(
        resolver: Arc<DurationResolver>,
        catalog: Arc<dyn CatalogStore>,
        policy: ProtectionPolicy,
        delay: Duration,
    ) -> Self {
        Self {
            resolver,
            catalog,
            policy,
            delay,
        }
    }

    pub async fn recalculate_all(&self, mode: RecalcMode) -> Result<BulkRecalcResult, CatalogError> {
        self.run(RecalcOptions::new(mode)).await
    }

    /// Fails only when the catalog cannot be listed; per-item failures are
    /// recorded in the result.
    pub async fn run(&self, options: RecalcOptions) -> Result<BulkRecalcResult, CatalogError> {
        let items = self.catalog.list(options.mode).await?;
        info!(
            mode = %options.mode,
            dry_run = options.dry_run,
            items = items.len(),
            "starting duration recalculation"
        );

        let mut result = BulkRecalcResult {
            dry_run: options.dry_run,
            ..Default::default()
        };

        for (index, item) in items.iter().enumerate() {
            if options.cancel.is_cancelled() {
                warn!(
                    processed = result.total,
                    remaining = items.len() - index,
                    "recalculation cancelled"
                );
                result.cancelled = true;
                break;
            }

            let outcome = self.process(item, &options).await;
            debug!(
                id = item.id,
                status = ?outcome.status,
                before = ?outcome.before,
                after = ?outcome.after,
                "item processed"
            );
            result.record(outcome);

            let last = index + 1 == items.len();
            if !last && !self.delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => {}
                    _ = options.cancel.cancelled() => {}
                }
            }
        }

        info!(
            total = result.total,
            updated = result.updated,
            verified = result.verified,
            protected = result.protected,
            errors = result.errors,
            cancelled = result.cancelled,
            "recalculation finished"
        );
        Ok(result)
    }

    async fn process(&self, item: &CatalogItem, options: &RecalcOptions) -> RecalcItemResult {
        let mut outcome = RecalcItemResult {
            id: item.id,
            title: item.title.clone(),
            status: RecalcStatus::Error,
            before: item.duration,
            after: item.duration,
            source: None,
            message: None,
        };

        if item.content.trim().is_empty() {
            outcome.message = Some("item has no video content".to_string());
            return outcome;
        }

        let platform_id = extract_identifier(&item.content, detect_platform(&item.content));
        if let Some(seconds) = self
            .resolver
            .overrides()
            .lookup(Some(item.id), platform_id.as_deref())
        {
            outcome.source = Some(DurationSource::ManualOverride);
            if item.duration == Some(seconds) {
                outcome.status = RecalcStatus::Protected;
                outcome.message = Some("matches manual override".to_string());
                return outcome;
            }
            return self
                .write(outcome, seconds, RecalcStatus::Restored, options)
                .await;
        }

        if options.mode == RecalcMode::Force && !options.dry_run {
            self.resolver.invalidate(&item.content).await;
        }

        let descriptor =
            VideoContentDescriptor::new(item.content.clone()).with_title(item.title.clone());
        let resolved = self.resolver.resolve_descriptor(&descriptor).await;
        let candidate = resolved.seconds;
        outcome.source = Some(resolved.source);

        if self.policy.within_tolerance(item.duration, candidate) {
            outcome.status = RecalcStatus::Verified;
            return outcome;
        }

        if !self
            .policy
            .should_replace(item.duration, candidate, &item.title)
        {
            outcome.status = RecalcStatus::Protected;
            outcome.message = Some(format!("kept current value over candidate {candidate}s"));
            return outcome;
        }

        self.write(outcome, candidate, RecalcStatus::Updated, options)
            .await
    }

    async fn write(
        &self,
        mut outcome: RecalcItemResult,
        seconds: u64,
        status: RecalcStatus,
        options: &RecalcOptions,
    ) -> RecalcItemResult {
        if !options.dry_run {
            if let Err(err) = self.catalog.update_duration(outcome.id, seconds).await {
                warn!(id = outcome.id, error = %err, "failed to store duration");
                outcome.status = RecalcStatus::Error;
                outcome.message = Some(err.to_string());
                return outcome;
            }
        }

        info!(id = outcome.id, before = ?outcome.before, after = seconds, ?status, "duration changed");
        outcome.status = status;
        outcome.after = Some(seconds);
        outcome
    }
}
