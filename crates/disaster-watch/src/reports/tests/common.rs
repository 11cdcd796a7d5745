use std::collections::BTreeMap;
use std::sync::Arc;

use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::config::ProximityConfig;
use crate::reports::domain::{
    Caller, NewReport, Report, ReportId, ReportSubmission, Role, UserId,
};
use crate::reports::memory::InMemoryReportRepository;
use crate::reports::repository::{
    ReportFilter, ReportMutation, ReportRepository, ReportSubscription, RepositoryError,
};
use crate::reports::router::report_router;
use crate::reports::service::ReportService;
use crate::reports::status::ReportStatus;
use crate::reports::timestamp::Timestamp;
use crate::reports::verification::{ConfidenceLevel, ConfidencePolicy};

pub(super) fn citizen(name: &str) -> Caller {
    Caller::new(name, Role::Citizen)
}

pub(super) fn operator() -> Caller {
    Caller::new("operator-1", Role::Operator)
}

pub(super) fn submission_at(title: &str, lat: Option<f64>, lng: Option<f64>) -> ReportSubmission {
    ReportSubmission {
        title: title.to_string(),
        description: "Reported from the field".to_string(),
        category: "flood".to_string(),
        location_text: "Riverside".to_string(),
        lat,
        lng,
    }
}

pub(super) fn submission() -> ReportSubmission {
    submission_at("Flooded underpass", Some(0.0), Some(0.0))
}

pub(super) fn stamp() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 9, 14, 6, 45, 0)
        .single()
        .expect("valid instant")
}

/// Bare report record for engine-level tests that never touch a store.
pub(super) fn report_at(id: &str, lat: Option<f64>, lng: Option<f64>) -> Report {
    Report {
        id: ReportId(id.to_string()),
        reporter_id: UserId("citizen-1".to_string()),
        title: format!("report {id}"),
        description: String::new(),
        category: "storm".to_string(),
        location_text: String::new(),
        lat,
        lng,
        status: ReportStatus::Submitted,
        created_at: stamp(),
        updated_at: stamp(),
        yes_count: 0,
        no_count: 0,
        confidence_level: ConfidenceLevel::Low,
        voters: BTreeMap::new(),
    }
}

/// Degrees of latitude spanning `km` along a meridian.
pub(super) fn km_north(km: f64) -> f64 {
    (km / 6371.0).to_degrees()
}

pub(super) fn build_service() -> (
    ReportService<InMemoryReportRepository>,
    Arc<InMemoryReportRepository>,
) {
    let repository = Arc::new(InMemoryReportRepository::default());
    let service = ReportService::new(repository.clone(), ConfidencePolicy::default());
    (service, repository)
}

pub(super) fn router_with_service(
    service: ReportService<InMemoryReportRepository>,
) -> axum::Router {
    report_router(Arc::new(service), ProximityConfig::default())
}

pub(super) struct UnavailableRepository;

impl ReportRepository for UnavailableRepository {
    fn create(&self, _report: NewReport) -> Result<Report, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ReportId) -> Result<Option<Report>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn apply(&self, _id: &ReportId, _mutation: ReportMutation) -> Result<Report, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn query(&self, _filter: &ReportFilter) -> Result<Vec<Report>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn watch(&self, filter: ReportFilter) -> ReportSubscription {
        let (sender, receiver) = tokio::sync::broadcast::channel(1);
        drop(sender);
        ReportSubscription::new(receiver, filter)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
