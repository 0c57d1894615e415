//! S3驱动核心实现
//!
//! 设计原则：
//! - 只提供只读原语（list_buckets, probe_bucket, list_page）
//! - 每个存储桶的客户端句柄只创建一次
//! - 所有错误都归类为 StorageError，由采集器决定如何降级

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::serde_types::Object;
use s3::Region;

use super::config::S3Config;
use crate::storage::{ObjectEntry, ObjectPage, ObjectStore, StorageError};

/// S3驱动
pub struct S3Store {
    config: S3Config,
    credentials: Credentials,
    buckets: RwLock<HashMap<String, Arc<Bucket>>>,
}

impl S3Store {
    /// 创建新的S3驱动实例
    pub fn new(config: S3Config) -> Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key_id),
            Some(&config.secret_access_key),
            None,
            None,
            None,
        )
        .map_err(|e| anyhow!("创建S3凭证失败: {}", e))?;

        // 提前校验一次端点配置
        Bucket::new("probe", Self::region(&config), credentials.clone())
            .map_err(|e| anyhow!("创建S3 Bucket失败: {}", e))?;

        Ok(Self {
            config,
            credentials,
            buckets: RwLock::new(HashMap::new()),
        })
    }

    fn region(config: &S3Config) -> Region {
        Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// 获取（或创建并缓存）存储桶客户端
    fn bucket(&self, name: &str) -> Result<Arc<Bucket>, StorageError> {
        if let Some(bucket) = self.buckets.read().get(name) {
            return Ok(bucket.clone());
        }

        let bucket = Bucket::new(name, Self::region(&self.config), self.credentials.clone())
            .map_err(|e| classify_error(name, e))?;
        let bucket = if self.config.force_path_style {
            bucket.with_path_style()
        } else {
            bucket
        };
        let bucket: Arc<Bucket> = Arc::from(bucket);

        self.buckets
            .write()
            .entry(name.to_string())
            .or_insert_with(|| bucket.clone());
        Ok(bucket)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        &self.config.endpoint
    }

    async fn list_buckets(&self) -> Result<Vec<String>, StorageError> {
        let response = Bucket::list_buckets(Self::region(&self.config), self.credentials.clone())
            .await
            .map_err(|e| StorageError::Unreachable(e.to_string()))?;
        Ok(response.bucket_names().collect())
    }

    async fn probe_bucket(&self, name: &str) -> Result<(), StorageError> {
        let bucket = self.bucket(name)?;
        // 只请求一个key，开销接近HEAD
        bucket
            .list_page(String::new(), None, None, None, Some(1))
            .await
            .map_err(|e| classify_error(name, e))?;
        Ok(())
    }

    async fn list_page(
        &self,
        name: &str,
        continuation: Option<String>,
    ) -> Result<ObjectPage, StorageError> {
        let bucket = self.bucket(name)?;
        let (result, _code) = bucket
            .list_page(String::new(), None, continuation, None, None)
            .await
            .map_err(|e| classify_error(name, e))?;

        // 目录占位对象（以/结尾）同样计入统计
        let objects = result.contents.into_iter().map(to_entry).collect();

        // 部分实现在最后一页仍返回token，以is_truncated为准
        let continuation = if result.is_truncated {
            result.next_continuation_token
        } else {
            None
        };

        tracing::trace!("S3 list_page: bucket={}, more={}", name, continuation.is_some());
        Ok(ObjectPage {
            objects,
            continuation,
        })
    }
}

fn to_entry(obj: Object) -> ObjectEntry {
    ObjectEntry {
        last_modified: parse_last_modified(&obj.last_modified),
        size: obj.size as u64,
        key: obj.key,
    }
}

fn parse_last_modified(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// 将S3错误归类：404/NoSuchBucket视为存储桶不存在，其余视为不可达
pub fn classify_error(bucket: &str, err: S3Error) -> StorageError {
    match err {
        S3Error::HttpFailWithBody(404, _) => StorageError::BucketNotFound(bucket.to_string()),
        S3Error::HttpFailWithBody(_, ref body) if body.contains("NoSuchBucket") => {
            StorageError::BucketNotFound(bucket.to_string())
        }
        other => StorageError::Unreachable(other.to_string()),
    }
}
