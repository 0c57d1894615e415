//! S3兼容对象存储驱动

mod config;
mod driver;

pub use config::S3Config;
pub use driver::{classify_error, S3Store};
