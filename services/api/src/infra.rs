use disaster_watch::error::AppError;
use disaster_watch::reports::{
    ConfidencePolicy, InMemoryReportRepository, ReportCsvImporter, ReportService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type InMemoryReportService = ReportService<InMemoryReportRepository>;

pub(crate) fn build_report_service(policy: ConfidencePolicy) -> Arc<InMemoryReportService> {
    let repository = Arc::new(InMemoryReportRepository::default());
    Arc::new(ReportService::new(repository, policy))
}

/// Loads a seed export into the store, returning how many reports were created.
pub(crate) fn seed_from_path(
    service: &InMemoryReportService,
    path: &Path,
) -> Result<usize, AppError> {
    let rows = ReportCsvImporter::from_path(path)?;
    let stored = ReportCsvImporter::seed(service, rows)?;
    info!(path = %path.display(), stored, "seeded report store");
    Ok(stored)
}
