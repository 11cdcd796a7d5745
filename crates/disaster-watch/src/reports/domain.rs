use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::proximity::Coordinates;
use super::status::ReportStatus;
use super::timestamp::{self, Timestamp};
use super::verification::{ConfidenceLevel, VoteChoice};

/// Identifier assigned by the document store when a report is created.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub String);

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identity issued by the authentication provider; never validated here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account roles recognized by the write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    Operator,
    Admin,
}

impl Role {
    /// Unknown or missing roles fall back to the least privileged one.
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "operator" => Self::Operator,
            "admin" => Self::Admin,
            _ => Self::Citizen,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Operator => "operator",
            Role::Admin => "admin",
        }
    }

    /// Operators and admins may move reports through the lifecycle.
    pub const fn can_manage_reports(self) -> bool {
        matches!(self, Role::Operator | Role::Admin)
    }
}

/// The authenticated identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            role,
        }
    }
}

/// A persisted disaster report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub reporter_id: UserId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location_text: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    pub status: ReportStatus,
    #[serde(with = "timestamp")]
    pub created_at: Timestamp,
    #[serde(with = "timestamp")]
    pub updated_at: Timestamp,
    #[serde(default)]
    pub yes_count: u32,
    #[serde(default)]
    pub no_count: u32,
    #[serde(default)]
    pub confidence_level: ConfidenceLevel,
    #[serde(default)]
    pub voters: BTreeMap<UserId, VoteChoice>,
}

impl Report {
    /// Position of the report, if both coordinates are present and in range.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Coordinates::new(lat, lng).ok(),
            _ => None,
        }
    }

    pub fn has_voted(&self, voter: &UserId) -> bool {
        self.voters.contains_key(voter)
    }
}

/// Creation payload submitted by a citizen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSubmission {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub location_text: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

impl ReportSubmission {
    /// Trims the text fields and checks coordinates, producing the store payload.
    pub fn validate(self, reporter_id: UserId) -> Result<NewReport, SubmissionError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(SubmissionError::MissingField("title"));
        }
        let category = self.category.trim().to_string();
        if category.is_empty() {
            return Err(SubmissionError::MissingField("category"));
        }

        let (lat, lng) = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => {
                Coordinates::new(lat, lng).map_err(|_| SubmissionError::CoordinatesOutOfRange)?;
                (Some(lat), Some(lng))
            }
            (None, None) => (None, None),
            _ => return Err(SubmissionError::PartialCoordinates),
        };

        Ok(NewReport {
            reporter_id,
            title,
            description: self.description.trim().to_string(),
            category,
            location_text: self.location_text.trim().to_string(),
            lat,
            lng,
        })
    }
}

/// Validated payload handed to [`super::ReportRepository::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub reporter_id: UserId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location_text: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmissionError {
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("lat and lng must be supplied together")]
    PartialCoordinates,
    #[error("coordinates must be within lat [-90, 90] and lng [-180, 180]")]
    CoordinatesOutOfRange,
}
