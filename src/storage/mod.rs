//! Object storage abstraction / 对象存储抽象
//!
//! The collector only talks to [`ObjectStore`]; the S3 implementation lives in
//! `drivers::s3`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Per-bucket storage failures / 存储桶级别的错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Connection, TLS, auth or any unexpected API failure
    #[error("storage unreachable: {0}")]
    Unreachable(String),
    #[error("bucket '{0}' does not exist")]
    BucketNotFound(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Unreachable(_) => ErrorKind::StorageUnreachable,
            StorageError::BucketNotFound(_) => ErrorKind::BucketNotFound,
            StorageError::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

/// Error classification surfaced on the health endpoint / 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    StorageUnreachable,
    BucketNotFound,
    Timeout,
    PartialListing,
}

/// One listed object / 对象条目
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a bucket listing / 单页列表结果
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectEntry>,
    /// Token for the next page, `None` on the last page / 下一页标记
    pub continuation: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Storage name used in logs
    fn name(&self) -> &str;

    /// All buckets visible to the configured credentials / 列出所有存储桶
    async fn list_buckets(&self) -> Result<Vec<String>, StorageError>;

    /// Cheap existence and reachability check / 轻量级可达性检查
    async fn probe_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    /// Fetch a single listing page / 获取一页对象
    async fn list_page(
        &self,
        bucket: &str,
        continuation: Option<String>,
    ) -> Result<ObjectPage, StorageError>;
}

/// Page through a bucket, handing every page to `visit` as it arrives.
///
/// Pages already visited stay visited when a later page fails, so callers can
/// keep partial totals / 分页遍历，失败时已访问的页仍然有效
pub async fn walk_objects<F>(
    store: &dyn ObjectStore,
    bucket: &str,
    mut visit: F,
) -> Result<u32, StorageError>
where
    F: FnMut(&ObjectPage) + Send,
{
    let mut pages = 0u32;
    let mut continuation = None;
    loop {
        let page = store.list_page(bucket, continuation).await?;
        pages += 1;
        visit(&page);
        match page.continuation {
            Some(token) => continuation = Some(token),
            None => return Ok(pages),
        }
    }
}

/// Full listing of a bucket / 列出存储桶内全部对象
pub async fn list_objects(
    store: &dyn ObjectStore,
    bucket: &str,
) -> Result<Vec<ObjectEntry>, StorageError> {
    let mut objects = Vec::new();
    walk_objects(store, bucket, |page| objects.extend(page.objects.iter().cloned())).await?;
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, object};

    #[tokio::test]
    async fn test_list_objects_follows_pages() {
        let store = MemoryStore::new().with_page_size(2);
        store.put_bucket("a", vec![object("x", 1), object("y", 2), object("z", 3)]);

        let objects = list_objects(&store, "a").await.unwrap();
        let keys: Vec<_> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["x", "y", "z"]);
        assert_eq!(store.page_requests("a"), 2);
    }

    #[tokio::test]
    async fn test_list_objects_missing_bucket() {
        let store = MemoryStore::new();
        let err = list_objects(&store, "nope").await.unwrap_err();
        assert_eq!(err, StorageError::BucketNotFound("nope".to_string()));
        assert_eq!(err.kind(), ErrorKind::BucketNotFound);
    }
}
