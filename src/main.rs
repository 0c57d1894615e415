use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use idrive_exporter::api;
use idrive_exporter::collector::BucketCollector;
use idrive_exporter::config::ExporterConfig;
use idrive_exporter::drivers;
use idrive_exporter::scheduler::ScrapeScheduler;
use idrive_exporter::state::{AppState, ExporterInfo, MetricsRegistry};

/// Wait for Ctrl-C or SIGTERM / 等待退出信号
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "idrive_exporter=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("{}", "=".repeat(60));
    tracing::info!("iDrive e2 Prometheus Exporter Starting...");
    tracing::info!("{}", "=".repeat(60));

    // Load configuration; any error exits before binding ports / 加载配置，失败时在绑定端口前退出
    let config = match ExporterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("ERROR: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("Endpoint: {} (region {})", config.endpoint, config.region);
    tracing::info!("Buckets: {:?}", config.buckets);
    tracing::info!("Scrape interval: {} seconds", config.scrape_interval.as_secs());
    tracing::info!("Access Key: {}", config.masked_access_key());

    let store = drivers::create_store(&config)?;
    tracing::info!("✓ S3 client created successfully");

    let collector = Arc::new(BucketCollector::new(store, &config));

    let registry = Arc::new(MetricsRegistry::new());
    let state = Arc::new(AppState {
        registry: registry.clone(),
        info: ExporterInfo::from_config(&config),
    });

    let metrics_listener = tokio::net::TcpListener::bind(config.metrics_address()).await?;
    let health_listener = tokio::net::TcpListener::bind(config.health_address()).await?;
    tracing::info!("✓ Metrics available at http://{}/metrics", config.metrics_address());
    tracing::info!("✓ Health available at http://{}/health", config.health_address());

    // Runs beside the servers so /health answers "starting" meanwhile; only warns on failure / 后台连接检查，失败仅告警
    tokio::spawn({
        let collector = collector.clone();
        async move {
            collector.check_connection().await;
        }
    });

    let cancel = CancellationToken::new();
    let scheduler = ScrapeScheduler::new(
        collector,
        registry,
        config.scrape_interval,
        cancel.child_token(),
    )
    .start();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("Shutting down...");
            cancel.cancel();
        });
    }

    let metrics_server = axum::serve(metrics_listener, api::metrics_router(state.clone()))
        .with_graceful_shutdown(cancel.clone().cancelled_owned());
    let health_server = axum::serve(health_listener, api::health_router(state))
        .with_graceful_shutdown(cancel.clone().cancelled_owned());

    let (metrics_result, health_result, scheduler_result) = tokio::join!(
        async { metrics_server.await },
        async { health_server.await },
        scheduler,
    );
    metrics_result?;
    health_result?;
    if let Err(e) = scheduler_result {
        tracing::error!("Scrape scheduler task failed: {}", e);
    }

    tracing::info!("Exporter stopped");
    Ok(())
}
