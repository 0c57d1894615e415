//! Shared scrape state / 共享采集状态
//!
//! The scheduler is the only writer; HTTP handlers only take snapshots.
//! A publish swaps one `Arc`, so readers see either the old run or the new one.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::ExporterConfig;
use crate::models::{BucketStat, ScrapeRun};

/// Build time stamped by build.rs / 构建时间
pub const BUILD_TIME: &str = env!("BUILD_TIME");

/// Static exporter description / 导出器信息
#[derive(Debug, Clone)]
pub struct ExporterInfo {
    pub version: String,
    pub build_time: String,
    pub endpoint: String,
    pub buckets: Vec<String>,
}

impl ExporterInfo {
    pub fn from_config(config: &ExporterConfig) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_time: BUILD_TIME.to_string(),
            endpoint: config.endpoint.clone(),
            buckets: config.buckets.clone(),
        }
    }
}

/// State shared by both HTTP servers / HTTP服务共享状态
pub struct AppState {
    pub registry: Arc<MetricsRegistry>,
    pub info: ExporterInfo,
}

/// Last published scrape run / 最近一次采集结果
pub struct MetricsRegistry {
    current: RwLock<Option<Arc<ScrapeRun>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Replace the live run, returning its sequence number / 原子替换当前结果
    pub fn publish(&self, mut run: ScrapeRun) -> u64 {
        let mut current = self.current.write();
        run.sequence = current.as_ref().map(|r| r.sequence).unwrap_or(0) + 1;
        let sequence = run.sequence;
        *current = Some(Arc::new(run));
        sequence
    }

    /// Cheap read of the live run; never blocks on a scrape / 获取当前快照
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            run: self.current.read().clone(),
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable view of the registry / 注册表只读视图
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub run: Option<Arc<ScrapeRun>>,
}

impl RegistrySnapshot {
    /// Stats of the live run, empty before the first scrape
    pub fn buckets(&self) -> &[BucketStat] {
        match self.run {
            Some(ref run) => &run.buckets,
            None => &[],
        }
    }

    pub fn stat(&self, bucket: &str) -> Option<&BucketStat> {
        self.run.as_ref().and_then(|run| run.stat(bucket))
    }

    pub fn sequence(&self) -> u64 {
        self.run.as_ref().map(|r| r.sequence).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn run_with(buckets: &[&str], size: u64) -> ScrapeRun {
        let now = Utc::now();
        ScrapeRun {
            sequence: 0,
            started_at: now,
            finished_at: now,
            duration: Duration::from_millis(10),
            buckets: buckets
                .iter()
                .map(|b| BucketStat {
                    size_bytes: size,
                    healthy: true,
                    ..BucketStat::empty(b)
                })
                .collect(),
        }
    }

    #[test]
    fn test_empty_before_first_publish() {
        let registry = MetricsRegistry::new();
        let snapshot = registry.snapshot();
        assert!(snapshot.run.is_none());
        assert!(snapshot.buckets().is_empty());
        assert_eq!(snapshot.sequence(), 0);
    }

    #[test]
    fn test_publish_replaces_wholesale() {
        let registry = MetricsRegistry::new();
        assert_eq!(registry.publish(run_with(&["a", "b"], 1)), 1);
        let old = registry.snapshot();

        assert_eq!(registry.publish(run_with(&["a"], 2)), 2);
        let new = registry.snapshot();

        // Old snapshots stay intact / 旧快照保持不变
        assert_eq!(old.buckets().len(), 2);
        assert_eq!(old.stat("a").unwrap().size_bytes, 1);
        assert_eq!(new.buckets().len(), 1);
        assert!(new.stat("b").is_none());
        assert_eq!(new.stat("a").unwrap().size_bytes, 2);
    }

    #[test]
    fn test_concurrent_snapshots_never_mix_runs() {
        let registry = Arc::new(MetricsRegistry::new());
        let names = ["a", "b", "c", "d"];
        registry.publish(run_with(&names, 0));

        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for size in 1..=500u64 {
                    registry.publish(run_with(&names, size));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = registry.snapshot();
                        let buckets = snapshot.buckets();
                        assert_eq!(buckets.len(), 4);
                        let size = buckets[0].size_bytes;
                        assert!(buckets.iter().all(|b| b.size_bytes == size));
                        assert_eq!(snapshot.sequence(), size + 1);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(registry.snapshot().sequence(), 501);
    }
}
