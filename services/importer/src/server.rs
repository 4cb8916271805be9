use crate::cli::ServeArgs;
use crate::infra::{AppState, ImportState};
use crate::routes::router;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use pt_jobs::config::AppConfig;
use pt_jobs::error::AppError;
use pt_jobs::imports::BulkPlan;
use pt_jobs::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let imports = ImportState::open(&config, &config.import.store_path)?;

    if config.import.bulk_enabled {
        startup_bulk_import(&config, &imports);
    }

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        imports,
    };

    let app = router()
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "pt jobs import service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Failures are logged and never keep the service from starting.
fn startup_bulk_import(config: &AppConfig, imports: &ImportState) {
    let base = &config.import.bulk_base;
    info!(base = %base.display(), "running start-up bulk import");

    let options = imports.options(false, None, None);
    let bulk = BulkPlan::standard(base).run(
        imports.store.as_ref(),
        imports.notifier.as_deref(),
        &options,
    );
    for failure in &bulk.failures {
        warn!(%failure, "start-up bulk step skipped");
    }

    if let Err(error) = imports.persist() {
        warn!(%error, "failed to save record store after start-up bulk import");
    }
}
