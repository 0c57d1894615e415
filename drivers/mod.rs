// Driver package / 驱动包
pub mod s3;

use std::sync::Arc;

use crate::config::ExporterConfig;
use crate::storage::ObjectStore;

/// Create the object store for the configured endpoint / 根据配置创建对象存储驱动
pub fn create_store(config: &ExporterConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store = s3::S3Store::new(s3::S3Config::from(config))?;
    Ok(Arc::new(store))
}
