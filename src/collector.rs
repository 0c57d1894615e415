//! Bucket statistics collector / 存储桶统计采集器
//!
//! Each bucket is scraped independently: probe, then walk the listing page by
//! page. Whatever happens to one bucket ends up as a `BucketStat`, so a bad
//! bucket never hides the others.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::ExporterConfig;
use crate::models::{BucketStat, ScrapeRun};
use crate::state::RegistrySnapshot;
use crate::storage::{walk_objects, ErrorKind, ObjectPage, ObjectStore, StorageError};

const PROGRESS_EVERY_PAGES: u32 = 10;

/// Running totals of a bucket listing / 列表累计值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingTally {
    pub size_bytes: u64,
    pub object_count: u64,
    pub pages: u32,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ListingTally {
    fn add_page(&mut self, page: &ObjectPage) {
        self.pages += 1;
        for obj in &page.objects {
            self.size_bytes += obj.size;
            self.object_count += 1;
            if obj.last_modified > self.last_modified {
                self.last_modified = obj.last_modified;
            }
        }
    }
}

/// Result of scraping one bucket / 单个存储桶的采集结果
#[derive(Debug, Clone, PartialEq)]
pub enum BucketOutcome {
    /// Full listing succeeded
    Complete(ListingTally),
    /// Listing broke off after some pages were counted
    Partial(ListingTally, StorageError),
    /// Nothing usable was read
    Failed(StorageError),
}

impl BucketOutcome {
    /// Fold into a stat, falling back to `previous` when nothing was counted
    pub fn into_stat(
        self,
        bucket: &str,
        latency: Duration,
        previous: Option<&BucketStat>,
    ) -> BucketStat {
        match self {
            BucketOutcome::Complete(tally) => BucketStat {
                bucket: bucket.to_string(),
                size_bytes: tally.size_bytes,
                object_count: tally.object_count,
                healthy: true,
                latency,
                error: None,
                error_kind: None,
                last_modified: tally.last_modified,
            },
            BucketOutcome::Partial(tally, err) => BucketStat {
                bucket: bucket.to_string(),
                size_bytes: tally.size_bytes,
                object_count: tally.object_count,
                healthy: false,
                latency,
                error: Some(format!("listing incomplete after {} page(s): {}", tally.pages, err)),
                error_kind: Some(ErrorKind::PartialListing),
                last_modified: tally.last_modified,
            },
            BucketOutcome::Failed(err) => {
                let last_known = previous.cloned().unwrap_or_else(|| BucketStat::empty(bucket));
                BucketStat {
                    bucket: bucket.to_string(),
                    size_bytes: last_known.size_bytes,
                    object_count: last_known.object_count,
                    healthy: false,
                    latency,
                    error: Some(err.to_string()),
                    error_kind: Some(err.kind()),
                    last_modified: last_known.last_modified,
                }
            }
        }
    }
}

pub struct BucketCollector {
    store: Arc<dyn ObjectStore>,
    buckets: Vec<String>,
    bucket_timeout: Duration,
    concurrency: usize,
}

impl BucketCollector {
    pub fn new(store: Arc<dyn ObjectStore>, config: &ExporterConfig) -> Self {
        Self {
            store,
            buckets: config.buckets.clone(),
            bucket_timeout: config.bucket_timeout,
            concurrency: config.scrape_concurrency.max(1),
        }
    }

    pub fn buckets(&self) -> &[String] {
        &self.buckets
    }

    /// Compare configured buckets with the account listing; only logs / 启动时检查存储桶是否存在
    pub async fn check_connection(&self) -> bool {
        tracing::info!("Testing connection to {} by listing buckets...", self.store.name());
        match self.store.list_buckets().await {
            Ok(available) => {
                tracing::info!("✓ Connection successful, found {} bucket(s)", available.len());
                for bucket in &self.buckets {
                    if !available.contains(bucket) {
                        tracing::warn!("⚠ Bucket '{}' not found in account", bucket);
                    }
                }
                true
            }
            Err(e) => {
                tracing::warn!("✗ Connection test failed: {}", e);
                false
            }
        }
    }

    /// Scrape every configured bucket once / 采集所有存储桶
    pub async fn collect(&self, previous: &RegistrySnapshot) -> ScrapeRun {
        let started_at = Utc::now();
        let start = Instant::now();

        // 有界并发：最多 concurrency 个存储桶同时采集
        let mut pending = self.buckets.iter();
        let mut in_flight: FuturesUnordered<BoxFuture<'_, BucketStat>> = FuturesUnordered::new();
        let mut stats: Vec<BucketStat> = Vec::with_capacity(self.buckets.len());
        loop {
            while in_flight.len() < self.concurrency {
                match pending.next() {
                    Some(bucket) => in_flight
                        .push(self.collect_bucket(bucket, previous.stat(bucket)).boxed()),
                    None => break,
                }
            }
            match in_flight.next().await {
                Some(stat) => stats.push(stat),
                None => break,
            }
        }
        stats.sort_by_key(|s| self.buckets.iter().position(|b| *b == s.bucket));

        ScrapeRun {
            sequence: 0,
            started_at,
            finished_at: Utc::now(),
            duration: start.elapsed(),
            buckets: stats,
        }
    }

    /// Scrape one bucket into a stat; never fails / 采集单个存储桶
    pub async fn collect_bucket(&self, bucket: &str, previous: Option<&BucketStat>) -> BucketStat {
        tracing::info!("→ Collecting metrics for: {}", bucket);
        let start = Instant::now();
        let outcome = self.scrape_bucket(bucket).await;
        let stat = outcome.into_stat(bucket, start.elapsed(), previous);

        if stat.healthy {
            tracing::info!(
                "✓ {}: {} objects, {:.2} GB, {:.2}s",
                bucket,
                stat.object_count,
                stat.size_bytes as f64 / (1024.0 * 1024.0 * 1024.0),
                stat.latency.as_secs_f64()
            );
        } else {
            tracing::warn!(
                "✗ {}: {}",
                bucket,
                stat.error.as_deref().unwrap_or("unknown error")
            );
        }
        stat
    }

    async fn scrape_bucket(&self, bucket: &str) -> BucketOutcome {
        let mut tally = ListingTally::default();
        let result =
            tokio::time::timeout(self.bucket_timeout, self.probe_and_walk(bucket, &mut tally))
                .await
                .unwrap_or(Err(StorageError::Timeout(self.bucket_timeout)));

        match result {
            Ok(()) => BucketOutcome::Complete(tally),
            Err(err) if tally.pages > 0 => BucketOutcome::Partial(tally, err),
            Err(err) => BucketOutcome::Failed(err),
        }
    }

    async fn probe_and_walk(
        &self,
        bucket: &str,
        tally: &mut ListingTally,
    ) -> Result<(), StorageError> {
        self.store.probe_bucket(bucket).await?;
        walk_objects(self.store.as_ref(), bucket, |page| {
            tally.add_page(page);
            if tally.pages % PROGRESS_EVERY_PAGES == 0 {
                tracing::info!(
                    "  {}: processing page {}... ({} objects so far)",
                    bucket,
                    tally.pages,
                    tally.object_count
                );
            }
        })
        .await?;
        Ok(())
    }
}
