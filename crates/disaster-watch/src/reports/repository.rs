use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use super::domain::{NewReport, Report, ReportId, UserId};
use super::status::{apply_status_change, ReportStatus, StatusChange};
use super::timestamp::Timestamp;
use super::verification::{cast_vote, ConfidencePolicy, VerificationError, Vote};

/// Storage abstraction over the hosted document store.
///
/// Mutations are conditional: an implementation must evaluate the condition carried by a
/// [`ReportMutation`] and write the result as one atomic step, so concurrent callers can never
/// double-count a vote or advance a report twice from the same status.
pub trait ReportRepository: Send + Sync {
    fn create(&self, report: NewReport) -> Result<Report, RepositoryError>;
    fn fetch(&self, id: &ReportId) -> Result<Option<Report>, RepositoryError>;
    fn apply(&self, id: &ReportId, mutation: ReportMutation) -> Result<Report, RepositoryError>;
    fn query(&self, filter: &ReportFilter) -> Result<Vec<Report>, RepositoryError>;
    fn watch(&self, filter: ReportFilter) -> ReportSubscription;
}

/// Field deltas the engines ask the store to apply.
///
/// Mutations carry no timestamp; the store stamps `updated_at` from its own clock at commit.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportMutation {
    /// Compare-and-swap on `status`: succeeds only while the stored status equals `from`.
    AdvanceStatus { from: ReportStatus, to: ReportStatus },
    /// Insert the voter only if absent and bump the matching counter.
    RecordVote { vote: Vote, policy: ConfidencePolicy },
}

impl ReportMutation {
    /// Evaluates the condition against `report` and applies the delta in place, stamped `at`.
    ///
    /// On failure `report` is left unchanged.
    pub fn apply_to(&self, report: &mut Report, at: Timestamp) -> Result<(), ConditionFailure> {
        match self {
            ReportMutation::AdvanceStatus { from, to } => {
                if report.status != *from {
                    return Err(ConditionFailure::StatusChanged {
                        expected: *from,
                        actual: report.status,
                    });
                }
                apply_status_change(
                    report,
                    &StatusChange {
                        from: *from,
                        to: *to,
                        at,
                    },
                );
                Ok(())
            }
            ReportMutation::RecordVote { vote, policy } => {
                if vote.report_id != report.id {
                    return Err(ConditionFailure::WrongReport {
                        vote_for: vote.report_id.clone(),
                        applied_to: report.id.clone(),
                    });
                }
                cast_vote(report, &vote.voter_id, vote.choice, policy, at)
                    .map(|_| ())
                    .map_err(ConditionFailure::Vote)
            }
        }
    }
}

/// Narrowing applied to queries and subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub category: Option<String>,
    pub reporter_id: Option<UserId>,
    pub limit: Option<usize>,
}

impl ReportFilter {
    pub fn with_status(status: ReportStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, report: &Report) -> bool {
        if let Some(status) = self.status {
            if report.status != status {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !report.category.eq_ignore_ascii_case(category.trim()) {
                return false;
            }
        }
        if let Some(reporter) = &self.reporter_id {
            if &report.reporter_id != reporter {
                return false;
            }
        }
        true
    }
}

/// Change notification emitted to subscribers, in commit order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportChange {
    Created { report: Report },
    Updated { previous: Report, report: Report },
}

impl ReportChange {
    /// State after the change.
    pub fn report(&self) -> &Report {
        match self {
            ReportChange::Created { report } | ReportChange::Updated { report, .. } => report,
        }
    }

    /// True when the report was in `filter` before the change or is in it afterwards.
    pub fn touches(&self, filter: &ReportFilter) -> bool {
        match self {
            ReportChange::Created { report } => filter.matches(report),
            ReportChange::Updated { previous, report } => {
                filter.matches(previous) || filter.matches(report)
            }
        }
    }

    /// True when the change moved the report out of `filter`.
    pub fn leaves(&self, filter: &ReportFilter) -> bool {
        match self {
            ReportChange::Created { .. } => false,
            ReportChange::Updated { previous, report } => {
                filter.matches(previous) && !filter.matches(report)
            }
        }
    }
}

/// Live feed of report changes narrowed by a [`ReportFilter`].
pub struct ReportSubscription {
    receiver: broadcast::Receiver<ReportChange>,
    filter: ReportFilter,
}

impl ReportSubscription {
    pub fn new(receiver: broadcast::Receiver<ReportChange>, filter: ReportFilter) -> Self {
        Self { receiver, filter }
    }

    /// Waits for the next change touching the filter, including changes that move a report
    /// out of it; `None` once the store has shut down.
    pub async fn next(&mut self) -> Option<ReportChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.touches(&self.filter) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "report subscriber lagged; dropping missed changes");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionFailure {
    #[error("status is {} but the update expected {}", .actual.label(), .expected.label())]
    StatusChanged {
        expected: ReportStatus,
        actual: ReportStatus,
    },
    #[error(transparent)]
    Vote(VerificationError),
    #[error("vote for report {vote_for} applied to report {applied_to}")]
    WrongReport {
        vote_for: ReportId,
        applied_to: ReportId,
    },
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("report not found")]
    NotFound,
    #[error("conditional update failed: {0}")]
    ConditionFailed(ConditionFailure),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
