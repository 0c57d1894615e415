//! Exporter configuration module / 导出器配置模块
//!
//! All settings come from environment variables and are validated once at startup.
//! Any invalid value is fatal / 任何非法配置都会导致启动失败

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "https://s3.idrivee2.com";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_SCRAPE_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_BUCKET_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SCRAPE_CONCURRENCY: usize = 4;
pub const DEFAULT_METRICS_PORT: u16 = 8000;
pub const DEFAULT_HEALTH_PORT: u16 = 8001;

/// Startup configuration errors / 启动配置错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("BUCKETS must list at least one bucket, e.g. BUCKETS=bucket1,bucket2")]
    NoBuckets,
    #[error("{name} must be a positive integer, got {value:?}")]
    NotPositive { name: &'static str, value: String },
    #[error("{name} is not a valid {expected}: {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Exporter configuration / 导出器配置
#[derive(Debug, Clone, Serialize)]
pub struct ExporterConfig {
    /// S3 endpoint URL / S3端点地址
    pub endpoint: String,
    /// Signing region / 签名区域
    pub region: String,
    pub access_key: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    /// Buckets to scrape, trimmed and de-duplicated / 需要采集的存储桶
    pub buckets: Vec<String>,
    /// Use path style instead of virtual hosted style / 强制路径风格
    pub force_path_style: bool,
    pub scrape_interval: Duration,
    /// Upper bound for one bucket's probe + listing / 单个存储桶的超时时间
    pub bucket_timeout: Duration,
    pub scrape_concurrency: usize,
    pub listen_host: String,
    pub metrics_port: u16,
    pub health_port: u16,
}

impl ExporterConfig {
    /// Load configuration from the process environment / 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset / 空值视为未设置
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let access_key = get("ACCESS_KEY").ok_or(ConfigError::Missing("ACCESS_KEY"))?;
        let secret_key = get("SECRET_KEY").ok_or(ConfigError::Missing("SECRET_KEY"))?;

        let buckets = parse_buckets(&get("BUCKETS").unwrap_or_default());
        if buckets.is_empty() {
            return Err(ConfigError::NoBuckets);
        }

        let scrape_interval = positive_secs(
            "SCRAPE_INTERVAL",
            get("SCRAPE_INTERVAL"),
            DEFAULT_SCRAPE_INTERVAL_SECS,
        )?;
        let bucket_timeout = positive_secs(
            "BUCKET_TIMEOUT",
            get("BUCKET_TIMEOUT"),
            DEFAULT_BUCKET_TIMEOUT_SECS,
        )?;
        let scrape_concurrency = match get("SCRAPE_CONCURRENCY") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::NotPositive {
                        name: "SCRAPE_CONCURRENCY",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_SCRAPE_CONCURRENCY,
        };

        let force_path_style = match get("FORCE_PATH_STYLE") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid {
                name: "FORCE_PATH_STYLE",
                expected: "boolean",
                value: raw,
            })?,
            None => false,
        };

        let metrics_port = port("METRICS_PORT", get("METRICS_PORT"), DEFAULT_METRICS_PORT)?;
        let health_port = port("HEALTH_PORT", get("HEALTH_PORT"), DEFAULT_HEALTH_PORT)?;

        Ok(Self {
            endpoint: get("ENDPOINT_URL").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            region: get("REGION_NAME").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            access_key,
            secret_key,
            buckets,
            force_path_style,
            scrape_interval,
            bucket_timeout,
            scrape_concurrency,
            listen_host: get("LISTEN_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            metrics_port,
            health_port,
        })
    }

    /// Access key with the middle masked, for startup logs / 脱敏后的Access Key
    pub fn masked_access_key(&self) -> String {
        let chars: Vec<char> = self.access_key.chars().collect();
        if chars.len() <= 12 {
            return "****".to_string();
        }
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }

    pub fn metrics_address(&self) -> String {
        format!("{}:{}", self.listen_host, self.metrics_port)
    }

    pub fn health_address(&self) -> String {
        format!("{}:{}", self.listen_host, self.health_port)
    }
}

/// Split a comma separated bucket list, dropping blanks and duplicates / 解析存储桶列表
pub fn parse_buckets(raw: &str) -> Vec<String> {
    let mut buckets: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !buckets.iter().any(|b| b == name) {
            buckets.push(name.to_string());
        }
    }
    buckets
}

fn positive_secs(
    name: &'static str,
    raw: Option<String>,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs(default));
    };
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::NotPositive { name, value: raw }),
    }
}

fn port(name: &'static str, raw: Option<String>, default: u16) -> Result<u16, ConfigError> {
    match raw {
        Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
            name,
            expected: "port",
            value: raw,
        }),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
