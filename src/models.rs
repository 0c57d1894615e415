use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::storage::ErrorKind;

/// Statistics for one bucket from one scrape run / 单个存储桶的一次采集结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketStat {
    pub bucket: String,
    pub size_bytes: u64,
    pub object_count: u64,
    pub healthy: bool,
    #[serde(rename = "latency_seconds", serialize_with = "as_seconds")]
    pub latency: Duration,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// Newest object modification time / 最新对象修改时间
    pub last_modified: Option<DateTime<Utc>>,
}

impl BucketStat {
    /// Placeholder for a bucket that has never been scraped / 从未采集过的存储桶占位
    pub fn empty(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            size_bytes: 0,
            object_count: 0,
            healthy: false,
            latency: Duration::ZERO,
            error: None,
            error_kind: None,
            last_modified: None,
        }
    }
}

/// One complete pass over all configured buckets / 一次完整采集
#[derive(Debug, Clone)]
pub struct ScrapeRun {
    /// Assigned by the registry on publish, starts at 1 / 发布序号
    pub sequence: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
    pub buckets: Vec<BucketStat>,
}

impl ScrapeRun {
    pub fn stat(&self, bucket: &str) -> Option<&BucketStat> {
        self.buckets.iter().find(|s| s.bucket == bucket)
    }

    pub fn healthy_count(&self) -> usize {
        self.buckets.iter().filter(|s| s.healthy).count()
    }
}

fn as_seconds<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
