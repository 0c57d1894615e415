//! Scrape scheduler / 定时采集调度器
//!
//! One timer task: scrape immediately, then every `SCRAPE_INTERVAL`. A run that
//! overruns the interval delays the next tick instead of overlapping it.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::collector::BucketCollector;
use crate::state::MetricsRegistry;

pub struct ScrapeScheduler {
    collector: Arc<BucketCollector>,
    registry: Arc<MetricsRegistry>,
    interval: Duration,
    cancel: CancellationToken,
}

impl ScrapeScheduler {
    pub fn new(
        collector: Arc<BucketCollector>,
        registry: Arc<MetricsRegistry>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            collector,
            registry,
            interval,
            cancel,
        }
    }

    /// Spawn the timer loop / 启动调度任务
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Scrape all buckets and publish the result atomically / 执行一次完整采集
    pub async fn run_once(&self) -> u64 {
        info!("{}", "=".repeat(60));
        info!(
            "Starting metrics collection for {} bucket(s) at {}",
            self.collector.buckets().len(),
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
        );

        let previous = self.registry.snapshot();
        let run = self.collector.collect(&previous).await;
        let healthy = run.healthy_count();
        let total = run.buckets.len();
        let duration = run.duration;
        let sequence = self.registry.publish(run);

        info!(
            "Collection #{} completed in {:.2}s ({}/{} buckets healthy)",
            sequence,
            duration.as_secs_f64(),
            healthy,
            total
        );
        info!("Next collection in {} seconds", self.interval.as_secs());
        sequence
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("📅 Scrape scheduler started, interval {}s", self.interval.as_secs());

        loop {
            // The first tick completes immediately / 第一次立即触发
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Scrape cancelled during collection");
                    break;
                }
                _ = self.run_once() => {}
            }
        }

        info!("📅 Scrape scheduler stopped");
    }
}
