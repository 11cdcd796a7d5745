use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{Caller, Report, ReportId, ReportSubmission, Role, SubmissionError, UserId};
use super::proximity::{nearby, Coordinates, GeometryError, NearbyReport};
use super::repository::{
    ConditionFailure, ReportFilter, ReportMutation, ReportRepository, ReportSubscription,
    RepositoryError,
};
use super::status::{
    plan_advance, plan_transition, Advance, ReportStatus, StatusChange, TransitionError,
};
use super::verification::{ConfidencePolicy, VerificationError, Vote, VoteChoice, VoteTally};

/// Trusted write path for reports: role checks, validation, then conditional store updates.
pub struct ReportService<R> {
    repository: Arc<R>,
    policy: ConfidencePolicy,
}

/// Result of an advance request. Reaching the end of the lifecycle is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    Advanced { report: Report, change: StatusChange },
    AlreadyTerminal(Report),
}

impl AdvanceOutcome {
    pub fn report(&self) -> &Report {
        match self {
            AdvanceOutcome::Advanced { report, .. } | AdvanceOutcome::AlreadyTerminal(report) => {
                report
            }
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            AdvanceOutcome::Advanced { .. } => "advanced",
            AdvanceOutcome::AlreadyTerminal(_) => "already_terminal",
        }
    }
}

/// The stored report after a vote, plus the resulting tally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteReceipt {
    pub report: Report,
    pub tally: VoteTally,
}

impl<R> ReportService<R>
where
    R: ReportRepository + 'static,
{
    pub fn new(repository: Arc<R>, policy: ConfidencePolicy) -> Self {
        Self { repository, policy }
    }

    pub fn policy(&self) -> ConfidencePolicy {
        self.policy
    }

    /// File a new report on behalf of `caller`.
    pub fn submit(
        &self,
        caller: &Caller,
        submission: ReportSubmission,
    ) -> Result<Report, ReportServiceError> {
        let payload = submission.validate(caller.user_id.clone()).map_err(|err| {
            warn!(user_id = %caller.user_id, error = %err, "rejected report submission");
            ReportServiceError::InvalidSubmission(err)
        })?;

        let report = self.repository.create(payload)?;
        info!(report_id = %report.id, user_id = %caller.user_id, "report submitted");
        Ok(report)
    }

    pub fn get(&self, id: &ReportId) -> Result<Report, ReportServiceError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| ReportServiceError::NotFound(id.clone()))
    }

    pub fn list(&self, filter: &ReportFilter) -> Result<Vec<Report>, ReportServiceError> {
        Ok(self.repository.query(filter)?)
    }

    pub fn watch(&self, filter: ReportFilter) -> ReportSubscription {
        self.repository.watch(filter)
    }

    /// Move a report one step along its lifecycle.
    pub fn advance(
        &self,
        caller: &Caller,
        id: &ReportId,
    ) -> Result<AdvanceOutcome, ReportServiceError> {
        self.require_manager(caller)?;
        let report = self.get(id)?;

        match plan_advance(&report, Utc::now()) {
            Advance::AlreadyTerminal => {
                info!(report_id = %id, user_id = %caller.user_id, "report already resolved");
                Ok(AdvanceOutcome::AlreadyTerminal(report))
            }
            Advance::To(planned) => {
                let report = self.apply_status(caller, id, planned.from, planned.to)?;
                let change = StatusChange {
                    at: report.updated_at,
                    ..planned
                };
                Ok(AdvanceOutcome::Advanced { report, change })
            }
        }
    }

    /// Apply an explicit `from -> to` request; only single forward steps are accepted.
    pub fn transition(
        &self,
        caller: &Caller,
        id: &ReportId,
        from: &str,
        to: &str,
    ) -> Result<Report, ReportServiceError> {
        self.require_manager(caller)?;
        let (from, to) = plan_transition(from, to).map_err(|err| {
            warn!(report_id = %id, user_id = %caller.user_id, error = %err, "rejected transition");
            ReportServiceError::InvalidTransition(err)
        })?;
        self.apply_status(caller, id, from, to)
    }

    /// Record a community vote. Each user may vote once per report.
    pub fn cast_vote(
        &self,
        caller: &Caller,
        id: &ReportId,
        choice: &str,
    ) -> Result<VoteReceipt, ReportServiceError> {
        let choice = VoteChoice::from_label(choice).map_err(|err| {
            warn!(report_id = %id, user_id = %caller.user_id, error = %err, "rejected vote");
            ReportServiceError::from(err)
        })?;

        let mutation = ReportMutation::RecordVote {
            vote: Vote {
                report_id: id.clone(),
                voter_id: caller.user_id.clone(),
                choice,
            },
            policy: self.policy,
        };

        let report = self
            .repository
            .apply(id, mutation)
            .map_err(|err| storage_error(id, err))?;
        let tally = VoteTally::of(&report);
        info!(
            report_id = %id,
            user_id = %caller.user_id,
            choice = choice.label(),
            confidence = tally.confidence_level.label(),
            "vote recorded"
        );
        Ok(VoteReceipt { report, tally })
    }

    /// Reports within `radius_km` of `(lat, lng)`, nearest first.
    pub fn nearby(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
        filter: &ReportFilter,
    ) -> Result<Vec<NearbyReport>, ReportServiceError> {
        let origin = Coordinates::new(lat, lng)?;
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(GeometryError::InvalidRadius(radius_km).into());
        }

        // Full scan; the radius is applied after the fetch, so the limit must be too.
        let candidates = self.repository.query(&ReportFilter {
            limit: None,
            ..filter.clone()
        })?;
        let mut results = nearby(origin, radius_km, candidates)?;
        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    fn require_manager(&self, caller: &Caller) -> Result<(), ReportServiceError> {
        if caller.role.can_manage_reports() {
            Ok(())
        } else {
            warn!(user_id = %caller.user_id, role = caller.role.label(), "status change refused");
            Err(ReportServiceError::Forbidden { role: caller.role })
        }
    }

    fn apply_status(
        &self,
        caller: &Caller,
        id: &ReportId,
        from: ReportStatus,
        to: ReportStatus,
    ) -> Result<Report, ReportServiceError> {
        let report = self
            .repository
            .apply(id, ReportMutation::AdvanceStatus { from, to })
            .map_err(|err| storage_error(id, err))?;
        info!(
            report_id = %id,
            user_id = %caller.user_id,
            status = to.label(),
            "report status advanced"
        );
        Ok(report)
    }
}

fn storage_error(id: &ReportId, err: RepositoryError) -> ReportServiceError {
    match err {
        RepositoryError::NotFound => ReportServiceError::NotFound(id.clone()),
        RepositoryError::ConditionFailed(ConditionFailure::Vote(err)) => {
            warn!(report_id = %id, error = %err, "vote refused by store");
            ReportServiceError::from(err)
        }
        RepositoryError::ConditionFailed(ConditionFailure::StatusChanged {
            expected,
            actual,
        }) => {
            warn!(
                report_id = %id,
                expected = expected.label(),
                status = actual.label(),
                "status changed underneath request"
            );
            ReportServiceError::StaleStatus { expected, actual }
        }
        other => ReportServiceError::StorageUnavailable(other),
    }
}

/// Error raised by the report service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReportServiceError {
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("user {voter} has already voted on this report")]
    DuplicateVote { voter: UserId },
    #[error("vote choice '{0}' must be yes or no")]
    InvalidChoice(String),
    #[error(transparent)]
    InvalidGeometry(#[from] GeometryError),
    #[error(transparent)]
    InvalidSubmission(#[from] SubmissionError),
    #[error("role {} may not change report status", .role.label())]
    Forbidden { role: Role },
    #[error("report {0} not found")]
    NotFound(ReportId),
    #[error("report status is {} but the request expected {}", .actual.label(), .expected.label())]
    StaleStatus {
        expected: ReportStatus,
        actual: ReportStatus,
    },
    #[error("storage unavailable: {0}")]
    StorageUnavailable(RepositoryError),
}

impl From<VerificationError> for ReportServiceError {
    fn from(value: VerificationError) -> Self {
        match value {
            VerificationError::DuplicateVote { voter } => Self::DuplicateVote { voter },
            VerificationError::InvalidChoice(choice) => Self::InvalidChoice(choice),
        }
    }
}

impl From<RepositoryError> for ReportServiceError {
    fn from(value: RepositoryError) -> Self {
        Self::StorageUnavailable(value)
    }
}
