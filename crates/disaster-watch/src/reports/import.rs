//! CSV seeding for demo and staging stores.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::domain::{Caller, ReportSubmission, Role};
use super::repository::ReportRepository;
use super::service::{ReportService, ReportServiceError};

const REQUIRED_COLUMNS: [&str; 3] = ["reporter_id", "title", "category"];

/// One row of a seed export: `reporter_id,title,description,category,location_text,lat,lng`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedRow {
    pub reporter_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub location_text: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub lng: Option<f64>,
}

impl SeedRow {
    fn into_parts(self) -> (Caller, ReportSubmission) {
        let caller = Caller::new(self.reporter_id, Role::Citizen);
        let submission = ReportSubmission {
            title: self.title,
            description: self.description,
            category: self.category,
            location_text: self.location_text,
            lat: self.lat,
            lng: self.lng,
        };
        (caller, submission)
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

pub struct ReportCsvImporter;

impl ReportCsvImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<SeedRow>, SeedImportError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<SeedRow>, SeedImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|header| header == column) {
                return Err(SeedImportError::MissingColumn(column));
            }
        }

        let mut rows = Vec::new();
        for record in csv_reader.deserialize::<SeedRow>() {
            rows.push(record?);
        }
        Ok(rows)
    }

    /// Submits every row through the service so seeds obey the same validation as live traffic.
    ///
    /// Stops at the first rejected row; rows before it stay stored.
    pub fn seed<R>(
        service: &ReportService<R>,
        rows: Vec<SeedRow>,
    ) -> Result<usize, SeedImportError>
    where
        R: ReportRepository + 'static,
    {
        let mut stored = 0;
        for (index, row) in rows.into_iter().enumerate() {
            let (caller, submission) = row.into_parts();
            service
                .submit(&caller, submission)
                .map_err(|source| SeedImportError::Rejected {
                    row: index + 1,
                    source,
                })?;
            stored += 1;
        }
        Ok(stored)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SeedImportError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed seed csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("seed csv is missing the '{0}' column")]
    MissingColumn(&'static str),
    #[error("seed row {row} rejected: {source}")]
    Rejected {
        row: usize,
        source: ReportServiceError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::memory::InMemoryReportRepository;
    use crate::reports::repository::ReportFilter;
    use crate::reports::verification::ConfidencePolicy;
    use std::io::Cursor;
    use std::sync::Arc;

    const SEED: &str = "reporter_id,title,description,category,location_text,lat,lng\n\
        citizen-1,Flooded underpass,Water over curb,flood,5th & Main,41.59,-93.62\n\
        citizen-2,Downed line,,storm,Grand Ave,,\n";

    #[test]
    fn parses_rows_with_blank_coordinates() {
        let rows = ReportCsvImporter::from_reader(Cursor::new(SEED)).expect("seed parses");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].lat, Some(41.59));
        assert_eq!(rows[1].lat, None);
        assert_eq!(rows[1].lng, None);
        assert_eq!(rows[1].description, "");
    }

    #[test]
    fn reports_missing_columns() {
        let err = ReportCsvImporter::from_reader(Cursor::new("title,category\nA,flood\n"))
            .expect_err("reporter column required");
        assert!(matches!(err, SeedImportError::MissingColumn("reporter_id")));
    }

    #[test]
    fn seed_stores_rows_through_the_service() {
        let repository = Arc::new(InMemoryReportRepository::default());
        let service = ReportService::new(repository.clone(), ConfidencePolicy::default());
        let rows = ReportCsvImporter::from_reader(Cursor::new(SEED)).expect("seed parses");

        let stored = ReportCsvImporter::seed(&service, rows).expect("rows stored");
        assert_eq!(stored, 2);

        let reports = service.list(&ReportFilter::default()).expect("list");
        assert_eq!(reports[0].reporter_id.0, "citizen-1");
        assert_eq!(reports[1].coordinates(), None);
    }

    #[test]
    fn seed_reports_the_offending_row() {
        let service = ReportService::new(
            Arc::new(InMemoryReportRepository::default()),
            ConfidencePolicy::default(),
        );
        let csv = "reporter_id,title,category,lat,lng\nc1,Fire,wildfire,10,10\nc2,Bad,flood,95,10\n";
        let rows = ReportCsvImporter::from_reader(Cursor::new(csv)).expect("parses");

        match ReportCsvImporter::seed(&service, rows) {
            Err(SeedImportError::Rejected { row: 2, .. }) => {}
            other => panic!("expected row 2 rejection, got {other:?}"),
        }
    }
}
