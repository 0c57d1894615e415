//! GET /metrics - Prometheus文本格式导出
//!
//! Every request renders one immutable snapshot into a throwaway
//! `prometheus::Registry`, so a render can never mix two scrape runs.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::state::{AppState, ExporterInfo, RegistrySnapshot};

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.registry.snapshot();
    match render_metrics(&snapshot, &state.info) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("渲染指标失败: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn bucket_gauge(registry: &Registry, name: &str, help: &str) -> prometheus::Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help), &["bucket"])?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn plain_gauge(registry: &Registry, name: &str, help: &str) -> prometheus::Result<Gauge> {
    let gauge = Gauge::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Render a snapshot in Prometheus text exposition format / 渲染快照
pub fn render_metrics(snapshot: &RegistrySnapshot, info: &ExporterInfo) -> prometheus::Result<String> {
    let registry = Registry::new();

    let exporter_info = GaugeVec::new(
        Opts::new("idrive_exporter_info", "Exporter information"),
        &["version", "build_time", "endpoint", "buckets"],
    )?;
    registry.register(Box::new(exporter_info.clone()))?;
    exporter_info
        .with_label_values(&[
            info.version.as_str(),
            info.build_time.as_str(),
            info.endpoint.as_str(),
            info.buckets.join(",").as_str(),
        ])
        .set(1.0);

    if let Some(run) = snapshot.run.as_ref() {
        let size = bucket_gauge(&registry, "idrive_bucket_size_bytes", "Total size of bucket in bytes")?;
        let count = bucket_gauge(&registry, "idrive_bucket_object_count", "Number of objects in bucket")?;
        let healthy = bucket_gauge(
            &registry,
            "idrive_bucket_healthy",
            "Whether the last scrape of the bucket succeeded (1 = healthy)",
        )?;
        let latency = bucket_gauge(
            &registry,
            "idrive_bucket_scrape_latency_seconds",
            "Time taken to scrape the bucket",
        )?;
        let last_modified = bucket_gauge(
            &registry,
            "idrive_bucket_last_modified",
            "Timestamp of last modified object",
        )?;
        let duration = plain_gauge(
            &registry,
            "idrive_scrape_duration_seconds",
            "Time taken by the last complete scrape of all buckets",
        )?;
        let finished = plain_gauge(
            &registry,
            "idrive_last_scrape_timestamp_seconds",
            "Unix time the last scrape completed",
        )?;

        for stat in &run.buckets {
            let labels = [stat.bucket.as_str()];
            size.with_label_values(&labels).set(stat.size_bytes as f64);
            count.with_label_values(&labels).set(stat.object_count as f64);
            healthy
                .with_label_values(&labels)
                .set(if stat.healthy { 1.0 } else { 0.0 });
            latency
                .with_label_values(&labels)
                .set(stat.latency.as_secs_f64());
            if let Some(ts) = stat.last_modified {
                last_modified.with_label_values(&labels).set(ts.timestamp() as f64);
            }
        }
        duration.set(run.duration.as_secs_f64());
        finished.set(run.finished_at.timestamp_millis() as f64 / 1000.0);
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
