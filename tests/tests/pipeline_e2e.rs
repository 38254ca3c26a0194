//! End-to-end tests for the sync pipeline.
//!
//! Source rows flow through the real orchestrator, queue and worker pool:
//! MockSource → EtlOrchestrator → MemoryQueue → WorkerPool → MockTarget
//!
//! No external services are needed.

use chrono::{Duration, Utc};
use integration_tests::{fixtures, setup::TestContext};
use job_queue::JobQueue;
use sync_core::{ApplyOutcome, SyncAction, SyncJob};

/// The reference record arrives in the target normalized.
#[tokio::test]
async fn test_reference_record_end_to_end() {
    let ctx = TestContext::new();
    ctx.source
        .push(fixtures::dupont_raw(Utc::now() - Duration::minutes(1)));

    let enqueued = ctx.orchestrator.run_once().await;
    assert_eq!(enqueued, 1);

    let processed = ctx.drain().await;
    assert_eq!(processed, 1);

    let row = ctx
        .target
        .row("jean.dupont@x.com")
        .expect("record should be in the target");
    assert_eq!(row.nom, "DUPONT");
    assert_eq!(row.prenom, "Jean");
    assert_eq!(row.telephone.as_deref(), Some("01 23 45 67 89"));
    assert_eq!(row.ville.as_deref(), Some("Paris"));
    assert_eq!(row.adresse.as_deref(), Some("12 rue de Rivoli"));
    assert_eq!(row.code_postal.as_deref(), Some("75001"));
    assert_eq!(row.statut, "active");
    assert!(!row.is_tombstoned());
}

#[tokio::test]
async fn test_run_once_reports_jobs_enqueued() {
    let ctx = TestContext::new();
    ctx.source.set_rows(fixtures::recent_raws(5));

    // Enqueue sees the normalized (lower-cased) email.
    ctx.queue.reject("client1@example.com");
    ctx.queue.reject("client3@example.com");

    let enqueued = ctx.orchestrator.run_once().await;
    assert_eq!(enqueued, 3, "5 extracted minus 2 publish failures");
    assert_eq!(ctx.queue.depth().await.unwrap(), 3);

    ctx.drain().await;
    assert_eq!(ctx.target.rows().len(), 3);
    assert!(ctx.target.row("client1@example.com").is_none());
    assert!(ctx.target.row("client0@example.com").is_some());
}

#[tokio::test]
async fn test_source_outage_produces_no_jobs() {
    let ctx = TestContext::new();
    ctx.source.set_rows(fixtures::recent_raws(3));
    ctx.source.set_down(true);

    assert_eq!(ctx.orchestrator.run_once().await, 0);
    assert_eq!(ctx.queue.depth().await.unwrap(), 0);

    // The next cycle after recovery picks the rows up.
    ctx.source.set_down(false);
    assert_eq!(ctx.orchestrator.run_once().await, 3);
}

#[tokio::test]
async fn test_rows_outside_window_are_not_extracted() {
    let ctx = TestContext::new();
    let now = Utc::now();
    ctx.source.set_rows(vec![
        fixtures::raw_at("fresh@x.com", now - Duration::minutes(2)),
        fixtures::raw_at("old@x.com", now - Duration::minutes(30)),
    ]);

    assert_eq!(ctx.orchestrator.run_once().await, 1);
    ctx.drain().await;

    assert!(ctx.target.row("fresh@x.com").is_some());
    assert!(ctx.target.row("old@x.com").is_none());
}

/// Overlapping windows re-extract the same rows; the target keeps one row
/// per email.
#[tokio::test]
async fn test_repeated_runs_are_idempotent() {
    let ctx = TestContext::new();
    ctx.source.set_rows(fixtures::recent_raws(2));

    assert_eq!(ctx.orchestrator.run_once().await, 2);
    assert_eq!(ctx.orchestrator.run_once().await, 2);
    ctx.drain().await;

    assert_eq!(ctx.target.rows().len(), 2);
    assert_eq!(ctx.target.count_email("client0@example.com"), 1);

    let outcomes: Vec<ApplyOutcome> = ctx
        .target
        .applies()
        .into_iter()
        .filter(|(email, _)| email == "client0@example.com")
        .map(|(_, outcome)| outcome)
        .collect();
    assert_eq!(outcomes, vec![ApplyOutcome::Created, ApplyOutcome::Updated]);
}

#[tokio::test]
async fn test_delete_of_unknown_email_is_noop() {
    let ctx = TestContext::new();

    let job = SyncJob::delete("ghost@x.com", Utc::now());
    ctx.queue.enqueue(&job).await.unwrap();
    ctx.drain().await;

    assert!(ctx.target.rows().is_empty());
    assert_eq!(
        ctx.target.applies(),
        vec![("ghost@x.com".to_string(), ApplyOutcome::Noop)]
    );
    assert_eq!(ctx.queue.failed_count().await.unwrap(), 0);
}

/// Same-email jobs settle on the newest version whatever order they are
/// applied in.
#[tokio::test]
async fn test_newest_version_wins_regardless_of_order() {
    let ctx = TestContext::new();
    let older = fixtures::canonical("race@x.com", "OLDER", Some(fixtures::at(0)));
    let newer = fixtures::canonical("race@x.com", "NEWER", Some(fixtures::at(60)));

    ctx.queue
        .enqueue(&SyncJob::new(newer, SyncAction::Upsert))
        .await
        .unwrap();
    ctx.queue
        .enqueue(&SyncJob::new(older, SyncAction::Upsert))
        .await
        .unwrap();
    ctx.drain().await;

    let row = ctx.target.row("race@x.com").unwrap();
    assert_eq!(row.nom, "NEWER");
    assert_eq!(row.source_updated_at, Some(fixtures::at(60)));
    assert_eq!(ctx.target.count_email("race@x.com"), 1);
}

#[tokio::test]
async fn test_stale_delete_does_not_remove_newer_row() {
    let ctx = TestContext::new();
    let record = fixtures::canonical("keep@x.com", "KEEP", Some(fixtures::at(120)));
    ctx.target.seed(&record, Utc::now());

    ctx.queue
        .enqueue(&SyncJob::delete("keep@x.com", fixtures::at(60)))
        .await
        .unwrap();
    ctx.drain().await;

    let row = ctx.target.row("keep@x.com").unwrap();
    assert!(!row.is_tombstoned());
    assert_eq!(
        ctx.target.applies(),
        vec![("keep@x.com".to_string(), ApplyOutcome::Stale)]
    );
}

#[tokio::test]
async fn test_delete_then_newer_upsert_revives_row() {
    let ctx = TestContext::new();
    let record = fixtures::canonical("back@x.com", "FIRST", Some(fixtures::at(0)));
    ctx.target.seed(&record, Utc::now());

    ctx.queue
        .enqueue(&SyncJob::delete("back@x.com", fixtures::at(10)))
        .await
        .unwrap();
    ctx.drain().await;
    assert!(ctx.target.row("back@x.com").unwrap().is_tombstoned());

    let revived = fixtures::canonical("back@x.com", "AGAIN", Some(fixtures::at(20)));
    ctx.queue
        .enqueue(&SyncJob::new(revived, SyncAction::Upsert))
        .await
        .unwrap();
    ctx.drain().await;

    let row = ctx.target.row("back@x.com").unwrap();
    assert!(!row.is_tombstoned());
    assert_eq!(row.nom, "AGAIN");
    assert_eq!(ctx.target.count_email("back@x.com"), 1);
}
