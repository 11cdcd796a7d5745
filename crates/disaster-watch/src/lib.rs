//! Report lifecycle, community verification, and proximity queries for citizen disaster
//! reporting, plus the configuration, telemetry, and error plumbing shared by the API service.

pub mod config;
pub mod error;
pub mod reports;
pub mod telemetry;
