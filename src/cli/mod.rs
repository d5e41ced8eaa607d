use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::Config;
use crate::core::metadata::VideoContentDescriptor;
use crate::core::platform::{detect_platform, extract_identifier};
use crate::core::recalc::{BulkRecalcResult, RecalcMode, RecalcOptions};
use crate::core::{
    BulkRecalculationJob, DurationResolver, InMemoryMetrics, JsonCatalog, MemoryCache,
};
use crate::extractors::HttpSourceClient;
use crate::utils::format_clock;

#[derive(Parser)]
#[command(name = "vidlen")]
#[command(about = "Resolve durations and metadata for embedded videos")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the platform and video id found in a piece of content
    Detect {
        #[arg(value_name = "CONTENT")]
        content: String,
    },
    /// Resolve a duration in seconds
    Resolve {
        #[arg(value_name = "CONTENT")]
        content: String,

        /// Title to analyse when no platform answers
        #[arg(short, long)]
        title: Option<String>,

        /// Catalog id, consulted against manual overrides
        #[arg(long)]
        id: Option<i64>,
    },
    /// Fetch title, description, thumbnail, tags and duration
    Metadata {
        #[arg(value_name = "CONTENT")]
        content: String,
    },
    /// Recalculate durations across a JSON catalog file
    Recalc {
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Revisit every item, not only those missing a duration
        #[arg(long)]
        force: bool,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        let config = Config::load_or_default(self.config.as_deref())?;

        if let Command::Detect { content } = &self.command {
            let platform = detect_platform(content);
            println!("Platform: {}", platform);
            match extract_identifier(content, platform) {
                Some(id) => println!("Video id: {}", id),
                None => println!("Video id: none"),
            }
            return Ok(());
        }

        let client = Arc::new(HttpSourceClient::new(&config.api)?);
        let cache = Arc::new(MemoryCache::new(config.cache.namespace.clone()));
        let metrics = Arc::new(InMemoryMetrics::new());
        let resolver = Arc::new(DurationResolver::from_config(
            &config,
            client,
            cache.clone(),
            metrics.clone(),
        ));

        match &self.command {
            Command::Detect { .. } => {}
            Command::Resolve { content, title, id } => {
                let mut descriptor = VideoContentDescriptor::new(content.clone());
                if let Some(title) = title {
                    descriptor = descriptor.with_title(title.clone());
                }
                if let Some(id) = id {
                    descriptor = descriptor.with_internal_id(*id);
                }

                let resolved = resolver.resolve_descriptor(&descriptor).await;
                println!(
                    "Duration: {}s ({})",
                    resolved.seconds,
                    format_clock(resolved.seconds)
                );
                println!("Source: {}", resolved.source);
            }
            Command::Metadata { content } => {
                let metadata = resolver.extract_metadata(content).await;
                println!("{}", serde_json::to_string_pretty(&metadata)?);
            }
            Command::Recalc {
                catalog,
                force,
                dry_run,
            } => {
                let mode = if *force {
                    RecalcMode::Force
                } else {
                    RecalcMode::NullsOnly
                };
                let job = BulkRecalculationJob::new(
                    resolver.clone(),
                    Arc::new(JsonCatalog::new(catalog.clone())),
                    config.policy,
                    config.bulk.delay(),
                );

                let cancel = CancellationToken::new();
                let on_interrupt = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupt received, stopping after the current item");
                        on_interrupt.cancel();
                    }
                });

                let result = job
                    .run(RecalcOptions {
                        mode,
                        dry_run: *dry_run,
                        cancel,
                    })
                    .await?;
                print_summary(&result);
            }
        }

        if self.verbose {
            let stats = cache.stats();
            println!(
                "Cache: {} durations, {} metadata, {} expired",
                stats.duration_entries, stats.metadata_entries, stats.expired_entries
            );
            println!("{}", serde_json::to_string_pretty(&metrics.snapshot())?);
        }

        Ok(())
    }
}

fn print_summary(result: &BulkRecalcResult) {
    if result.dry_run {
        println!("Dry run: no durations were written");
    }
    for item in &result.items {
        println!(
            "  #{} {:?} {} -> {} {}",
            item.id,
            item.status,
            item.before.map(format_clock).unwrap_or_else(|| "-".to_string()),
            item.after.map(format_clock).unwrap_or_else(|| "-".to_string()),
            item.title
        );
    }
    println!(
        "Processed {}: {} updated, {} verified, {} protected, {} errors{}",
        result.total,
        result.updated,
        result.verified,
        result.protected,
        result.errors,
        if result.cancelled { " (cancelled)" } else { "" }
    );
    for item in result.error_items() {
        println!(
            "  error #{} {}: {}",
            item.id,
            item.title,
            item.message.as_deref().unwrap_or("unknown error")
        );
    }
}
