use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::config::ProximityConfig;

use super::domain::{Caller, ReportId, ReportSubmission, Role, UserId};
use super::proximity::GeometryError;
use super::repository::{ReportFilter, ReportRepository};
use super::service::{ReportService, ReportServiceError};
use super::status::{ReportStatus, TransitionError};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Shared handler state: the service plus the radius bounds enforced at the edge.
pub struct ReportRouterState<R> {
    service: Arc<ReportService<R>>,
    proximity: ProximityConfig,
}

impl<R> Clone for ReportRouterState<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            proximity: self.proximity,
        }
    }
}

impl<R> ReportRouterState<R> {
    pub fn new(service: Arc<ReportService<R>>, proximity: ProximityConfig) -> Self {
        Self { service, proximity }
    }
}

/// Router builder exposing report intake, lifecycle, verification, and proximity endpoints.
pub fn report_router<R>(service: Arc<ReportService<R>>, proximity: ProximityConfig) -> Router
where
    R: ReportRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/reports",
            post(submit_handler::<R>).get(list_handler::<R>),
        )
        .route("/api/v1/reports/nearby", get(nearby_handler::<R>))
        .route("/api/v1/reports/:report_id", get(get_handler::<R>))
        .route(
            "/api/v1/reports/:report_id/advance",
            post(advance_handler::<R>),
        )
        .route(
            "/api/v1/reports/:report_id/transition",
            post(transition_handler::<R>),
        )
        .route("/api/v1/reports/:report_id/votes", post(vote_handler::<R>))
        .with_state(ReportRouterState::new(service, proximity))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    status: Option<String>,
    category: Option<String>,
    reporter_id: Option<String>,
    limit: Option<usize>,
}

impl ListQuery {
    fn into_filter(self) -> Result<ReportFilter, ReportServiceError> {
        let status = match self.status.as_deref() {
            Some(raw) => Some(
                ReportStatus::from_label(raw)
                    .ok_or_else(|| TransitionError::UnknownStatus(raw.to_string()))?,
            ),
            None => None,
        };

        Ok(ReportFilter {
            status,
            category: self.category,
            reporter_id: self.reporter_id.map(UserId),
            limit: self.limit,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NearbyQuery {
    lat: f64,
    lng: f64,
    radius_km: Option<f64>,
    status: Option<String>,
    category: Option<String>,
    limit: Option<usize>,
}

impl NearbyQuery {
    fn filter(&self) -> ListQuery {
        ListQuery {
            status: self.status.clone(),
            category: self.category.clone(),
            reporter_id: None,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransitionRequest {
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VoteRequest {
    choice: String,
}

fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, Response> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            let payload = json!({ "error": format!("missing {USER_ID_HEADER} header") });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })?;

    let role = headers
        .get(USER_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(Role::from_label)
        .unwrap_or(Role::Citizen);

    Ok(Caller::new(user_id, role))
}

fn error_response(error: ReportServiceError) -> Response {
    let status = match &error {
        ReportServiceError::InvalidTransition(_)
        | ReportServiceError::InvalidChoice(_)
        | ReportServiceError::InvalidGeometry(_)
        | ReportServiceError::InvalidSubmission(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ReportServiceError::DuplicateVote { .. } | ReportServiceError::StaleStatus { .. } => {
            StatusCode::CONFLICT
        }
        ReportServiceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        ReportServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ReportServiceError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };

    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

pub(crate) async fn submit_handler<R>(
    State(state): State<ReportRouterState<R>>,
    headers: HeaderMap,
    Json(submission): Json<ReportSubmission>,
) -> Response
where
    R: ReportRepository + 'static,
{
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match state.service.submit(&caller, submission) {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<R>(
    State(state): State<ReportRouterState<R>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: ReportRepository + 'static,
{
    let result = query
        .into_filter()
        .and_then(|filter| state.service.list(&filter));

    match result {
        Ok(reports) => (StatusCode::OK, Json(reports)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_handler<R>(
    State(state): State<ReportRouterState<R>>,
    Path(report_id): Path<String>,
) -> Response
where
    R: ReportRepository + 'static,
{
    match state.service.get(&ReportId(report_id)) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn nearby_handler<R>(
    State(state): State<ReportRouterState<R>>,
    Query(query): Query<NearbyQuery>,
) -> Response
where
    R: ReportRepository + 'static,
{
    let radius_km = query
        .radius_km
        .unwrap_or(state.proximity.default_radius_km);
    if radius_km > state.proximity.max_radius_km {
        return error_response(GeometryError::InvalidRadius(radius_km).into());
    }

    let result = query.filter().into_filter().and_then(|filter| {
        state
            .service
            .nearby(query.lat, query.lng, radius_km, &filter)
    });

    match result {
        Ok(results) => {
            let payload = json!({
                "origin": { "lat": query.lat, "lng": query.lng },
                "radius_km": radius_km,
                "results": results,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn advance_handler<R>(
    State(state): State<ReportRouterState<R>>,
    headers: HeaderMap,
    Path(report_id): Path<String>,
) -> Response
where
    R: ReportRepository + 'static,
{
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match state.service.advance(&caller, &ReportId(report_id)) {
        Ok(outcome) => {
            let payload = json!({
                "outcome": outcome.label(),
                "report": outcome.report(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn transition_handler<R>(
    State(state): State<ReportRouterState<R>>,
    headers: HeaderMap,
    Path(report_id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Response
where
    R: ReportRepository + 'static,
{
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match state
        .service
        .transition(&caller, &ReportId(report_id), &request.from, &request.to)
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn vote_handler<R>(
    State(state): State<ReportRouterState<R>>,
    headers: HeaderMap,
    Path(report_id): Path<String>,
    Json(request): Json<VoteRequest>,
) -> Response
where
    R: ReportRepository + 'static,
{
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match state
        .service
        .cast_vote(&caller, &ReportId(report_id), &request.choice)
    {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(error) => error_response(error),
    }
}
