//! In-memory object store for tests / 测试用内存对象存储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::storage::{ObjectEntry, ObjectPage, ObjectStore, StorageError};

pub fn object(key: &str, size: u64) -> ObjectEntry {
    ObjectEntry {
        key: key.to_string(),
        size,
        last_modified: None,
    }
}

pub fn object_at(key: &str, size: u64, unix: i64) -> ObjectEntry {
    ObjectEntry {
        last_modified: DateTime::<Utc>::from_timestamp(unix, 0),
        ..object(key, size)
    }
}

#[derive(Default)]
struct Inner {
    buckets: HashMap<String, Vec<ObjectEntry>>,
    unreachable: HashSet<String>,
    /// bucket -> listing fails once this many pages were served
    fail_after: HashMap<String, u32>,
    /// bucket -> listing hangs once this many pages were served, `None` hangs the probe
    hang_after: HashMap<String, Option<u32>>,
    page_requests: HashMap<String, u32>,
    probes: u32,
    in_flight: u32,
    max_in_flight: u32,
}

/// Scriptable [`ObjectStore`] fake
pub struct MemoryStore {
    inner: Mutex<Inner>,
    page_size: usize,
    probe_delay: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            page_size: 1000,
            probe_delay: Duration::ZERO,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub fn put_bucket(&self, name: &str, objects: Vec<ObjectEntry>) {
        let mut inner = self.inner.lock();
        inner.unreachable.remove(name);
        inner.buckets.insert(name.to_string(), objects);
    }

    pub fn set_unreachable(&self, name: &str) {
        self.inner.lock().unreachable.insert(name.to_string());
    }

    pub fn fail_listing_after(&self, name: &str, pages: u32) {
        self.inner.lock().fail_after.insert(name.to_string(), pages);
    }

    pub fn hang(&self, name: &str, after_pages: Option<u32>) {
        self.inner.lock().hang_after.insert(name.to_string(), after_pages);
    }

    pub fn page_requests(&self, name: &str) -> u32 {
        self.inner.lock().page_requests.get(name).copied().unwrap_or(0)
    }

    pub fn probes(&self) -> u32 {
        self.inner.lock().probes
    }

    pub fn max_in_flight(&self) -> u32 {
        self.inner.lock().max_in_flight
    }

    pub fn in_flight(&self) -> u32 {
        self.inner.lock().in_flight
    }

    fn check(&self, name: &str) -> Result<(), StorageError> {
        let inner = self.inner.lock();
        if inner.unreachable.contains(name) {
            return Err(StorageError::Unreachable("connection refused".to_string()));
        }
        if !inner.buckets.contains_key(name) {
            return Err(StorageError::BucketNotFound(name.to_string()));
        }
        Ok(())
    }
}

struct InFlightGuard<'a>(&'a Mutex<Inner>);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().in_flight -= 1;
    }
}

async fn hang_forever() {
    tokio::time::sleep(Duration::from_secs(365 * 24 * 3600)).await;
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_buckets(&self) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = self.inner.lock().buckets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn probe_bucket(&self, name: &str) -> Result<(), StorageError> {
        let hang = {
            let mut inner = self.inner.lock();
            inner.probes += 1;
            inner.in_flight += 1;
            inner.max_in_flight = inner.max_in_flight.max(inner.in_flight);
            matches!(inner.hang_after.get(name), Some(None))
        };
        // Released on drop too, a timed-out probe is no longer in flight
        let _guard = InFlightGuard(&self.inner);
        if hang {
            hang_forever().await;
        }
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        self.check(name)
    }

    async fn list_page(
        &self,
        name: &str,
        continuation: Option<String>,
    ) -> Result<ObjectPage, StorageError> {
        self.check(name)?;
        let (served, fail_after, hang_after) = {
            let mut inner = self.inner.lock();
            let served = inner.page_requests.entry(name.to_string()).or_insert(0);
            let before = *served;
            *served += 1;
            (
                before,
                inner.fail_after.get(name).copied(),
                inner.hang_after.get(name).copied().flatten(),
            )
        };
        if hang_after.is_some_and(|n| served >= n) {
            hang_forever().await;
        }
        if fail_after.is_some_and(|n| served >= n) {
            return Err(StorageError::Unreachable("connection reset".to_string()));
        }

        let start: usize = continuation.map(|t| t.parse().unwrap_or(0)).unwrap_or(0);
        let inner = self.inner.lock();
        let objects = &inner.buckets[name];
        let end = (start + self.page_size).min(objects.len());
        let continuation = (end < objects.len()).then(|| end.to_string());
        Ok(ObjectPage {
            objects: objects[start..end].to_vec(),
            continuation,
        })
    }
}
