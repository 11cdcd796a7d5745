use crate::cli::ServeArgs;
use crate::infra::{build_report_service, seed_from_path, AppState};
use crate::routes::with_report_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use disaster_watch::config::AppConfig;
use disaster_watch::error::AppError;
use disaster_watch::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let report_service = build_report_service(config.verification);
    if let Some(path) = args.seed_csv.take() {
        seed_from_path(&report_service, &path)?;
    }

    let app = with_report_routes(report_service, config.proximity)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        high_min_yes = config.verification.high_min_yes,
        medium_min_yes = config.verification.medium_min_yes,
        "disaster report service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
