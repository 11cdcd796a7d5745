use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::broadcast;

use super::domain::{NewReport, Report, ReportId};
use super::repository::{
    ReportChange, ReportFilter, ReportMutation, ReportRepository, ReportSubscription,
    RepositoryError,
};
use super::status::ReportStatus;
use super::timestamp::Timestamp;
use super::verification::ConfidenceLevel;

const CHANGE_BUFFER: usize = 256;

/// Process-local document store. Every mutation runs under one lock, which makes the
/// conditional updates in [`ReportMutation`] atomic.
pub struct InMemoryReportRepository {
    records: Mutex<HashMap<ReportId, Report>>,
    last_issued: Mutex<Option<Timestamp>>,
    sequence: AtomicU64,
    changes: broadcast::Sender<ReportChange>,
}

impl Default for InMemoryReportRepository {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            records: Mutex::new(HashMap::new()),
            last_issued: Mutex::new(None),
            sequence: AtomicU64::new(1),
            changes,
        }
    }
}

impl InMemoryReportRepository {
    pub fn len(&self) -> usize {
        self.records.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn records(&self) -> Result<MutexGuard<'_, HashMap<ReportId, Report>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }

    fn next_id(&self) -> ReportId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        ReportId(format!("rpt-{id:06}"))
    }

    /// Wall-clock time clamped so stamps never go backwards within this store.
    ///
    /// Callers hold the records lock, so stamps follow commit order.
    fn issue_timestamp(&self) -> Result<Timestamp, RepositoryError> {
        let mut last = self
            .last_issued
            .lock()
            .map_err(|_| RepositoryError::Unavailable("clock mutex poisoned".to_string()))?;
        let now = match *last {
            Some(previous) => Utc::now().max(previous),
            None => Utc::now(),
        };
        *last = Some(now);
        Ok(now)
    }

    /// Must be called with the records lock held so the feed follows commit order.
    fn publish(&self, change: ReportChange) {
        // No subscribers is not an error.
        let _ = self.changes.send(change);
    }
}

impl ReportRepository for InMemoryReportRepository {
    fn create(&self, report: NewReport) -> Result<Report, RepositoryError> {
        let mut guard = self.records()?;
        let created_at = self.issue_timestamp()?;
        let record = Report {
            id: self.next_id(),
            reporter_id: report.reporter_id,
            title: report.title,
            description: report.description,
            category: report.category,
            location_text: report.location_text,
            lat: report.lat,
            lng: report.lng,
            status: ReportStatus::INITIAL,
            created_at,
            updated_at: created_at,
            yes_count: 0,
            no_count: 0,
            confidence_level: ConfidenceLevel::Low,
            voters: Default::default(),
        };

        guard.insert(record.id.clone(), record.clone());
        self.publish(ReportChange::Created {
            report: record.clone(),
        });
        Ok(record)
    }

    fn fetch(&self, id: &ReportId) -> Result<Option<Report>, RepositoryError> {
        Ok(self.records()?.get(id).cloned())
    }

    fn apply(&self, id: &ReportId, mutation: ReportMutation) -> Result<Report, RepositoryError> {
        let mut guard = self.records()?;
        let stored = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        let mut candidate = stored.clone();
        let at = self.issue_timestamp()?;
        mutation
            .apply_to(&mut candidate, at)
            .map_err(RepositoryError::ConditionFailed)?;

        let previous = std::mem::replace(stored, candidate.clone());
        self.publish(ReportChange::Updated {
            previous,
            report: candidate.clone(),
        });
        Ok(candidate)
    }

    fn query(&self, filter: &ReportFilter) -> Result<Vec<Report>, RepositoryError> {
        let guard = self.records()?;
        let mut matches: Vec<Report> = guard
            .values()
            .filter(|report| filter.matches(report))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    fn watch(&self, filter: ReportFilter) -> ReportSubscription {
        ReportSubscription::new(self.changes.subscribe(), filter)
    }
}
