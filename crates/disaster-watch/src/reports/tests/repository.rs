use std::sync::{Arc, Barrier};
use std::thread;

use super::common::*;
use crate::reports::domain::UserId;
use crate::reports::memory::InMemoryReportRepository;
use crate::reports::repository::{
    ConditionFailure, ReportChange, ReportFilter, ReportMutation, ReportRepository,
    RepositoryError,
};
use crate::reports::status::ReportStatus;
use crate::reports::verification::{ConfidencePolicy, VerificationError, Vote, VoteChoice};

fn new_report(repository: &InMemoryReportRepository) -> crate::reports::domain::Report {
    let payload = submission()
        .validate(UserId("citizen-1".to_string()))
        .expect("valid payload");
    repository.create(payload).expect("created")
}

fn vote(report: &crate::reports::domain::Report, voter: &str, choice: VoteChoice) -> ReportMutation {
    ReportMutation::RecordVote {
        vote: Vote {
            report_id: report.id.clone(),
            voter_id: UserId(voter.to_string()),
            choice,
        },
        policy: ConfidencePolicy::default(),
    }
}

fn advance(from: ReportStatus, to: ReportStatus) -> ReportMutation {
    ReportMutation::AdvanceStatus { from, to }
}

#[test]
fn create_assigns_identity_and_initial_state() {
    let repository = InMemoryReportRepository::default();
    let first = new_report(&repository);
    let second = new_report(&repository);

    assert_eq!(first.id.0, "rpt-000001");
    assert_eq!(second.id.0, "rpt-000002");
    assert_eq!(first.status, ReportStatus::Submitted);
    assert_eq!((first.yes_count, first.no_count), (0, 0));
    assert!(first.voters.is_empty());
    assert_eq!(first.created_at, first.updated_at);
    assert!(second.created_at >= first.created_at);
    assert_eq!(repository.len(), 2);
}

#[test]
fn status_swap_requires_expected_status() {
    let repository = InMemoryReportRepository::default();
    let report = new_report(&repository);

    let err = repository
        .apply(
            &report.id,
            advance(ReportStatus::Reviewed, ReportStatus::Working),
        )
        .expect_err("stale swap rejected");
    assert_eq!(
        err,
        RepositoryError::ConditionFailed(ConditionFailure::StatusChanged {
            expected: ReportStatus::Reviewed,
            actual: ReportStatus::Submitted,
        })
    );

    let stored = repository.fetch(&report.id).expect("fetch").expect("present");
    assert_eq!(stored.status, ReportStatus::Submitted);
}

#[test]
fn apply_on_missing_report_is_not_found() {
    let repository = InMemoryReportRepository::default();
    let report = report_at("rpt-404", None, None);
    let err = repository
        .apply(&report.id, vote(&report, "v1", VoteChoice::Yes))
        .expect_err("missing");
    assert_eq!(err, RepositoryError::NotFound);
}

#[test]
fn concurrent_duplicate_votes_count_once() {
    let repository = Arc::new(InMemoryReportRepository::default());
    let report = new_report(&repository);
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let repository = repository.clone();
            let barrier = barrier.clone();
            let mutation = vote(&report, "same-voter", VoteChoice::Yes);
            let id = report.id.clone();
            thread::spawn(move || {
                barrier.wait();
                repository.apply(&id, mutation)
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread finished"))
        .collect();
    let accepted = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(accepted, 1);
    assert!(outcomes.iter().filter_map(|o| o.as_ref().err()).all(|err| matches!(
        err,
        RepositoryError::ConditionFailed(ConditionFailure::Vote(
            VerificationError::DuplicateVote { .. }
        ))
    )));

    let stored = repository.fetch(&report.id).expect("fetch").expect("present");
    assert_eq!(stored.yes_count, 1);
    assert_eq!(stored.voters.len(), 1);
}

#[test]
fn concurrent_votes_from_distinct_users_are_not_lost() {
    let repository = Arc::new(InMemoryReportRepository::default());
    let report = new_report(&repository);

    let handles: Vec<_> = (0..16)
        .map(|index| {
            let repository = repository.clone();
            let choice = if index % 4 == 0 {
                VoteChoice::No
            } else {
                VoteChoice::Yes
            };
            let mutation = vote(&report, &format!("voter-{index}"), choice);
            let id = report.id.clone();
            thread::spawn(move || repository.apply(&id, mutation))
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread finished").expect("vote stored");
    }

    let stored = repository.fetch(&report.id).expect("fetch").expect("present");
    assert_eq!(stored.yes_count, 12);
    assert_eq!(stored.no_count, 4);
    assert_eq!(stored.voters.len(), 16);
}

#[test]
fn query_filters_and_limits_in_creation_order() {
    let repository = InMemoryReportRepository::default();
    let first = new_report(&repository);
    let second = new_report(&repository);
    let third = new_report(&repository);
    repository
        .apply(
            &second.id,
            advance(ReportStatus::Submitted, ReportStatus::Reviewed),
        )
        .expect("advanced");

    let submitted = repository
        .query(&ReportFilter::with_status(ReportStatus::Submitted))
        .expect("query");
    let ids: Vec<_> = submitted.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec![first.id.clone(), third.id.clone()]);

    let limited = repository
        .query(&ReportFilter {
            limit: Some(2),
            category: Some("FLOOD".to_string()),
            ..ReportFilter::default()
        })
        .expect("query");
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].id, first.id);
}

#[test]
fn vote_for_another_report_is_refused() {
    let repository = InMemoryReportRepository::default();
    let target = new_report(&repository);
    let other = new_report(&repository);

    let err = repository
        .apply(&target.id, vote(&other, "v1", VoteChoice::Yes))
        .expect_err("mismatched vote refused");
    assert_eq!(
        err,
        RepositoryError::ConditionFailed(ConditionFailure::WrongReport {
            vote_for: other.id.clone(),
            applied_to: target.id.clone(),
        })
    );

    let stored = repository.fetch(&target.id).expect("fetch").expect("present");
    assert_eq!(stored.yes_count, 0);
}

#[test]
fn store_stamps_updates_after_creation() {
    let repository = InMemoryReportRepository::default();
    let report = new_report(&repository);

    let voted = repository
        .apply(&report.id, vote(&report, "v1", VoteChoice::Yes))
        .expect("vote stored");
    let reviewed = repository
        .apply(
            &report.id,
            advance(ReportStatus::Submitted, ReportStatus::Reviewed),
        )
        .expect("advanced");

    assert!(voted.updated_at >= report.created_at);
    assert!(reviewed.updated_at >= voted.updated_at);
    assert_eq!(reviewed.created_at, report.created_at);
}

#[tokio::test]
async fn watch_delivers_matching_changes_only() {
    let repository = InMemoryReportRepository::default();
    let mut reviewed = repository.watch(ReportFilter::with_status(ReportStatus::Reviewed));
    let mut everything = repository.watch(ReportFilter::default());

    let report = new_report(&repository);
    let advanced = repository
        .apply(
            &report.id,
            advance(ReportStatus::Submitted, ReportStatus::Reviewed),
        )
        .expect("advanced");

    match everything.next().await {
        Some(ReportChange::Created { report: created }) => assert_eq!(created.id, report.id),
        other => panic!("expected creation event, got {other:?}"),
    }
    match reviewed.next().await {
        Some(ReportChange::Updated { previous, report }) => {
            assert_eq!(previous.status, ReportStatus::Submitted);
            assert_eq!(report.status, ReportStatus::Reviewed);
            assert_eq!(report.updated_at, advanced.updated_at);
        }
        other => panic!("expected reviewed update, got {other:?}"),
    }
}

#[tokio::test]
async fn watch_reports_changes_that_leave_the_filter() {
    let repository = InMemoryReportRepository::default();
    let report = new_report(&repository);
    let filter = ReportFilter::with_status(ReportStatus::Submitted);
    let mut submitted = repository.watch(filter.clone());

    repository
        .apply(
            &report.id,
            advance(ReportStatus::Submitted, ReportStatus::Reviewed),
        )
        .expect("advanced");

    let change = tokio::time::timeout(std::time::Duration::from_millis(200), submitted.next())
        .await
        .expect("change delivered")
        .expect("feed open");
    assert!(change.leaves(&filter));
    assert_eq!(change.report().status, ReportStatus::Reviewed);
}

#[tokio::test]
async fn feed_follows_commit_order_under_concurrent_votes() {
    let voters = 8;
    for _ in 0..50 {
        let repository = Arc::new(InMemoryReportRepository::default());
        let report = new_report(&repository);
        let mut feed = repository.watch(ReportFilter::default());
        let barrier = Arc::new(Barrier::new(voters));

        let handles: Vec<_> = (0..voters)
            .map(|index| {
                let repository = repository.clone();
                let barrier = barrier.clone();
                let mutation = vote(&report, &format!("voter-{index}"), VoteChoice::Yes);
                let id = report.id.clone();
                thread::spawn(move || {
                    barrier.wait();
                    repository.apply(&id, mutation)
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread finished").expect("vote stored");
        }

        let mut counts = Vec::new();
        while counts.len() < voters {
            match feed.next().await {
                Some(ReportChange::Updated { report, .. }) => counts.push(report.yes_count),
                Some(ReportChange::Created { .. }) => {}
                None => break,
            }
        }
        let expected: Vec<u32> = (1..=voters as u32).collect();
        assert_eq!(counts, expected, "feed out of commit order");
    }
}
