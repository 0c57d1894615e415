//! S3驱动配置

use serde::{Deserialize, Serialize};

use crate::config::{ExporterConfig, DEFAULT_REGION};

/// S3配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// S3端点地址
    /// iDrive e2: https://s3.idrivee2.com
    /// MinIO: http://localhost:9000
    pub endpoint: String,
    /// 区域
    #[serde(default = "default_region")]
    pub region: String,
    /// Access Key ID
    pub access_key_id: String,
    /// Secret Access Key
    #[serde(skip_serializing)]
    pub secret_access_key: String,
    /// 强制使用路径风格（而非虚拟主机风格）
    /// MinIO等需要设置为true
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl From<&ExporterConfig> for S3Config {
    fn from(config: &ExporterConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            region: config.region.clone(),
            access_key_id: config.access_key.clone(),
            secret_access_key: config.secret_key.clone(),
            force_path_style: config.force_path_style,
        }
    }
}
