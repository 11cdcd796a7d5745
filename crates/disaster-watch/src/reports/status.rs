//! Report lifecycle ordering and single-step transition rules.

use serde::{Deserialize, Serialize};

use super::domain::Report;
use super::timestamp::Timestamp;

/// Lifecycle status of a report. The ordering is defined once, by [`ReportStatus::SEQUENCE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Submitted,
    Reviewed,
    Working,
    Resolved,
}

impl ReportStatus {
    pub const SEQUENCE: [ReportStatus; 4] = [
        ReportStatus::Submitted,
        ReportStatus::Reviewed,
        ReportStatus::Working,
        ReportStatus::Resolved,
    ];

    pub const INITIAL: ReportStatus = Self::SEQUENCE[0];

    pub const fn label(self) -> &'static str {
        match self {
            ReportStatus::Submitted => "submitted",
            ReportStatus::Reviewed => "reviewed",
            ReportStatus::Working => "working",
            ReportStatus::Resolved => "resolved",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::SEQUENCE
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(raw))
    }

    fn position(self) -> usize {
        Self::SEQUENCE
            .iter()
            .position(|status| *status == self)
            .unwrap_or_default()
    }

    /// The status immediately after this one, or `None` at the end of the lifecycle.
    pub fn next(self) -> Option<Self> {
        Self::SEQUENCE.get(self.position() + 1).copied()
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    pub fn can_transition_to(self, to: Self) -> bool {
        self.next() == Some(to)
    }
}

/// Successor of a status label; `None` for unknown labels and for the terminal status.
pub fn next_status(current: &str) -> Option<ReportStatus> {
    ReportStatus::from_label(current).and_then(ReportStatus::next)
}

/// True only for a recognized pair where `to` is exactly one step after `from`.
pub fn can_transition(from: &str, to: &str) -> bool {
    match (ReportStatus::from_label(from), ReportStatus::from_label(to)) {
        (Some(from), Some(to)) => from.can_transition_to(to),
        _ => false,
    }
}

/// A planned status write. The store applies it only while the status still equals `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub from: ReportStatus,
    pub to: ReportStatus,
    #[serde(with = "super::timestamp")]
    pub at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    To(StatusChange),
    AlreadyTerminal,
}

/// Plans the next lifecycle step for `report` without touching storage.
pub fn plan_advance(report: &Report, now: Timestamp) -> Advance {
    match report.status.next() {
        Some(to) => Advance::To(StatusChange {
            from: report.status,
            to,
            at: now,
        }),
        None => Advance::AlreadyTerminal,
    }
}

/// Validates an explicit `from -> to` request expressed in wire labels.
pub fn plan_transition(
    from: &str,
    to: &str,
) -> Result<(ReportStatus, ReportStatus), TransitionError> {
    let from_status = ReportStatus::from_label(from)
        .ok_or_else(|| TransitionError::UnknownStatus(from.to_string()))?;
    let to_status = ReportStatus::from_label(to)
        .ok_or_else(|| TransitionError::UnknownStatus(to.to_string()))?;

    if from_status.can_transition_to(to_status) {
        Ok((from_status, to_status))
    } else {
        Err(TransitionError::NotSingleStep {
            from: from_status,
            to: to_status,
        })
    }
}

pub fn apply_status_change(report: &mut Report, change: &StatusChange) {
    report.status = change.to;
    report.updated_at = change.at;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("unknown report status '{0}'")]
    UnknownStatus(String),
    #[error("cannot move a report from {} to {}; only single forward steps are allowed", .from.label(), .to.label())]
    NotSingleStep {
        from: ReportStatus,
        to: ReportStatus,
    },
}
