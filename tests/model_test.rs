//! Tests for the job model and the in-memory store.

use chrono::{TimeZone, Utc};
use jobgate::error::Error;
use jobgate::model::{JobRecord, JobStatus, NewJob};
use jobgate::store::{JobStore, MemoryStore};
use serde_json::json;

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

#[test]
fn status_moves_forward_only() {
    use JobStatus::*;

    assert!(Waiting.can_transition_to(Queued));
    assert!(Queued.can_transition_to(Processing));
    assert!(Queued.can_transition_to(Done));
    assert!(Processing.can_transition_to(Errored));
    assert!(Processing.can_transition_to(Processing));

    assert!(!Processing.can_transition_to(Queued));
    assert!(!Queued.can_transition_to(Waiting));
    assert!(!Done.can_transition_to(Errored));
    assert!(!Errored.can_transition_to(Processing));
}

#[test]
fn ensure_transition_reports_both_ends() {
    let err = JobStatus::Done
        .ensure_transition(JobStatus::Queued)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidTransition {
            from: JobStatus::Done,
            to: JobStatus::Queued
        }
    ));
    assert_eq!(err.to_string(), "invalid status transition: done -> queued");
}

#[test]
fn status_serializes_snake_case() {
    let value = serde_json::to_value(JobStatus::Processing).unwrap();
    assert_eq!(value, json!("processing"));
}

#[test]
fn differs_from_ignores_timestamps() {
    let a = NewJob::new(json!({})).into_record();
    let b = JobRecord {
        updated_at: a.updated_at + chrono::Duration::seconds(30),
        ..a.clone()
    };
    assert!(!a.differs_from(&b));

    let c = JobRecord {
        wait_time_secs: Some(12),
        ..a.clone()
    };
    assert!(a.differs_from(&c));
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_write_bumps_the_marker() {
    let store = MemoryStore::new();
    let m0 = store.change_marker().await.unwrap();

    let job = store.insert(NewJob::new(json!({}))).unwrap();
    let m1 = store.change_marker().await.unwrap();
    assert!(m1 > m0);

    store
        .update(&JobRecord {
            status: JobStatus::Queued,
            ..job.clone()
        })
        .await
        .unwrap();
    let m2 = store.change_marker().await.unwrap();
    assert!(m2 > m1);

    store.remove(job.id).unwrap();
    assert!(store.change_marker().await.unwrap() > m2);
}

#[tokio::test]
async fn pending_records_are_oldest_first_and_non_terminal() {
    let store = MemoryStore::new();
    let at = |h| Utc.with_ymd_and_hms(2026, 3, 1, h, 0, 0).unwrap();

    let late = store
        .insert(NewJob::new(json!({"n": 1})).submitted_at(at(9)))
        .unwrap();
    let early = store
        .insert(NewJob::new(json!({"n": 2})).submitted_at(at(7)))
        .unwrap();
    let finished = store
        .insert(NewJob::new(json!({"n": 3})).submitted_at(at(8)))
        .unwrap();
    store
        .update(&JobRecord {
            status: JobStatus::Errored,
            error_message: Some("nsfw filter".to_string()),
            ..finished.clone()
        })
        .await
        .unwrap();

    let pending = store.pending_records().await.unwrap();
    let ids: Vec<_> = pending.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);

    // Terminal records are still retrievable directly.
    assert_eq!(store.get(finished.id).unwrap().status, JobStatus::Errored);
    assert_eq!(store.all().unwrap().len(), 3);
}

#[tokio::test]
async fn store_rejects_backward_updates() {
    let store = MemoryStore::new();
    let job = store.insert(NewJob::new(json!({}))).unwrap();
    let processing = JobRecord {
        status: JobStatus::Processing,
        ..job
    };
    store.update(&processing).await.unwrap();

    let result = store
        .update(&JobRecord {
            status: JobStatus::Waiting,
            ..processing
        })
        .await;

    assert!(matches!(result, Err(Error::InvalidTransition { .. })));
}

#[tokio::test]
async fn updating_unknown_job_is_not_found() {
    let store = MemoryStore::new();
    let ghost = NewJob::new(json!({})).into_record();

    let result = store.update(&ghost).await;

    assert!(matches!(result, Err(Error::NotFound(id)) if id == ghost.id));
}
