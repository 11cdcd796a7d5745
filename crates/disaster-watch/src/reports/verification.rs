//! Community verification: one vote per user, tallied into a confidence label.

use serde::{Deserialize, Serialize};

use super::domain::{Report, ReportId, UserId};
use super::timestamp::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Yes,
    No,
}

impl VoteChoice {
    pub fn from_label(raw: &str) -> Result<Self, VerificationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            _ => Err(VerificationError::InvalidChoice(raw.to_string())),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            VoteChoice::Yes => "yes",
            VoteChoice::No => "no",
        }
    }
}

/// Ordered confidence labels; `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub const fn label(self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }
}

/// Thresholds mapping a `(yes, no)` tally onto a [`ConfidenceLevel`].
///
/// * `High` when `yes >= high_min_yes` and `yes > no`
/// * `Medium` when `yes >= medium_min_yes` and `yes >= no`
/// * `Low` otherwise
///
/// With `medium_min_yes >= 1` an empty tally is always `Low`, and since every condition only
/// gets easier to meet as `yes` grows, adding corroborating votes never lowers the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidencePolicy {
    pub high_min_yes: u32,
    pub medium_min_yes: u32,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            high_min_yes: 3,
            medium_min_yes: 1,
        }
    }
}

impl ConfidencePolicy {
    pub fn new(high_min_yes: u32, medium_min_yes: u32) -> Result<Self, PolicyError> {
        if medium_min_yes == 0 {
            return Err(PolicyError::ZeroMediumThreshold);
        }
        if high_min_yes < medium_min_yes {
            return Err(PolicyError::HighBelowMedium {
                high: high_min_yes,
                medium: medium_min_yes,
            });
        }
        Ok(Self {
            high_min_yes,
            medium_min_yes,
        })
    }

    pub fn derive(&self, yes_count: u32, no_count: u32) -> ConfidenceLevel {
        if yes_count >= self.high_min_yes && yes_count > no_count {
            ConfidenceLevel::High
        } else if yes_count >= self.medium_min_yes && yes_count >= no_count {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("medium confidence needs at least one yes vote")]
    ZeroMediumThreshold,
    #[error("high threshold ({high}) must not be below the medium threshold ({medium})")]
    HighBelowMedium { high: u32, medium: u32 },
}

/// Confidence label under the default thresholds.
pub fn derive_confidence(yes_count: u32, no_count: u32) -> ConfidenceLevel {
    ConfidencePolicy::default().derive(yes_count, no_count)
}

/// A single vote request against a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub report_id: ReportId,
    pub voter_id: UserId,
    pub choice: VoteChoice,
}

/// Counts and label after a vote has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub yes_count: u32,
    pub no_count: u32,
    pub confidence_level: ConfidenceLevel,
}

impl VoteTally {
    pub fn of(report: &Report) -> Self {
        Self {
            yes_count: report.yes_count,
            no_count: report.no_count,
            confidence_level: report.confidence_level,
        }
    }
}

/// Records `choice` for `voter` on `report`.
///
/// A voter already present in `report.voters` is rejected with
/// [`VerificationError::DuplicateVote`] and the report is left untouched.
pub fn cast_vote(
    report: &mut Report,
    voter: &UserId,
    choice: VoteChoice,
    policy: &ConfidencePolicy,
    now: Timestamp,
) -> Result<VoteTally, VerificationError> {
    if report.has_voted(voter) {
        return Err(VerificationError::DuplicateVote {
            voter: voter.clone(),
        });
    }

    match choice {
        VoteChoice::Yes => report.yes_count = report.yes_count.saturating_add(1),
        VoteChoice::No => report.no_count = report.no_count.saturating_add(1),
    }
    report.voters.insert(voter.clone(), choice);
    report.confidence_level = policy.derive(report.yes_count, report.no_count);
    report.updated_at = now;

    Ok(VoteTally::of(report))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("user {voter} has already voted on this report")]
    DuplicateVote { voter: UserId },
    #[error("vote choice '{0}' must be yes or no")]
    InvalidChoice(String),
}
