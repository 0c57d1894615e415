pub mod api;
pub mod collector;
pub mod config;
pub mod models;
pub mod scheduler;
pub mod state;
pub mod storage;

// Driver modules (point to project root drivers via path attribute) / 驱动模块
#[path = "../drivers/mod.rs"]
pub mod drivers;

#[cfg(test)]
pub(crate) mod testing;
