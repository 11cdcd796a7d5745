//! Citizen disaster reports: lifecycle, community verification, and proximity lookups.
//!
//! The three engines (`status`, `verification`, `proximity`) are pure functions over
//! [`Report`] values. Persistence is isolated behind [`ReportRepository`], whose conditional
//! mutations make vote recording and status advances atomic; [`ReportService`] is the trusted
//! write path that enforces roles and validation before anything reaches the store.

pub mod domain;
pub mod import;
pub mod memory;
pub mod proximity;
pub mod repository;
pub mod router;
pub mod service;
pub mod status;
pub mod timestamp;
pub mod verification;

#[cfg(test)]
mod tests;

pub use domain::{
    Caller, NewReport, Report, ReportId, ReportSubmission, Role, SubmissionError, UserId,
};
pub use import::{ReportCsvImporter, SeedImportError, SeedRow};
pub use memory::InMemoryReportRepository;
pub use proximity::{haversine_km, nearby, Coordinates, GeometryError, NearbyReport};
pub use repository::{
    ConditionFailure, ReportChange, ReportFilter, ReportMutation, ReportRepository,
    ReportSubscription, RepositoryError,
};
pub use router::report_router;
pub use service::{AdvanceOutcome, ReportService, ReportServiceError, VoteReceipt};
pub use status::{
    can_transition, next_status, plan_advance, plan_transition, Advance, ReportStatus,
    StatusChange, TransitionError,
};
pub use timestamp::Timestamp;
pub use verification::{
    cast_vote, derive_confidence, ConfidenceLevel, ConfidencePolicy, PolicyError, Vote,
    VoteChoice, VoteTally, VerificationError,
};
