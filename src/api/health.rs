//! GET /health - 健康检查

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::models::BucketStat;
use crate::state::{AppState, RegistrySnapshot};

/// Overall exporter status / 整体状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    /// No scrape has completed yet
    Starting,
    Healthy,
    Degraded,
    Unhealthy,
}

impl OverallStatus {
    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Self {
        let Some(run) = snapshot.run.as_ref() else {
            return OverallStatus::Starting;
        };
        let healthy = run.healthy_count();
        if healthy == run.buckets.len() {
            OverallStatus::Healthy
        } else if healthy == 0 {
            OverallStatus::Unhealthy
        } else {
            OverallStatus::Degraded
        }
    }

    pub fn http_status(self) -> StatusCode {
        match self {
            OverallStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::OK,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub last_scrape: Option<String>,
    pub last_scrape_duration_seconds: Option<f64>,
    pub scrape_count: u64,
    pub buckets: Vec<BucketStat>,
}

impl HealthReport {
    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Self {
        let run = snapshot.run.as_ref();
        Self {
            status: OverallStatus::from_snapshot(snapshot),
            last_scrape: run.map(|r| r.finished_at.to_rfc3339()),
            last_scrape_duration_seconds: run.map(|r| r.duration.as_secs_f64()),
            scrape_count: snapshot.sequence(),
            buckets: snapshot.buckets().to_vec(),
        }
    }
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let report = HealthReport::from_snapshot(&state.registry.snapshot());
    (report.status.http_status(), Json(report))
}
