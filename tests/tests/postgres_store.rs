//! PostgreSQL-backed tests for the source reader, target store and job
//! table.
//!
//! Requires Docker (or `CLIENT_SYNC_TEST_POSTGRES_URL`); run with
//! `cargo test -p integration-tests --test postgres_store -- --ignored`.

use chrono::{Duration as ChronoDuration, Utc};
use integration_tests::{containers::TestContainers, fixtures, setup::fast_retry};
use job_queue::{JobQueue, PgQueue};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use store::{
    connect_source, connect_target, health, DatabaseConfig, PgSource, PgTarget, SourceStore,
    TargetStore,
};
use sync_core::{ApplyOutcome, ClientQuery, SyncJob};
use worker::{EtlOrchestrator, SyncWorker, WorkerConfig, WorkerPool};

struct PgContext {
    #[allow(dead_code)]
    containers: TestContainers,
    source_admin: PgPool,
    source: PgSource,
    target: PgTarget,
}

impl PgContext {
    async fn new() -> Self {
        let containers = TestContainers::start().await;

        let source_admin = PgPool::connect(&containers.source_url)
            .await
            .expect("Failed to connect to source database");
        health::init_source_schema(&source_admin)
            .await
            .expect("Failed to create source table");
        sqlx::query("TRUNCATE clients")
            .execute(&source_admin)
            .await
            .unwrap();

        let source_pool = connect_source(&DatabaseConfig::new(&containers.source_url)).unwrap();
        let target_pool = connect_target(&DatabaseConfig::new(&containers.target_url))
            .await
            .expect("Failed to connect to target database");
        health::init_schema(&target_pool)
            .await
            .expect("Failed to create target table");
        sqlx::query("TRUNCATE clients")
            .execute(&target_pool)
            .await
            .unwrap();

        Self {
            containers,
            source_admin,
            source: PgSource::new(source_pool),
            target: PgTarget::new(target_pool),
        }
    }

    async fn insert_source(&self, raw: &sync_core::RawRecord) {
        sqlx::query(
            r"
            INSERT INTO clients (nom, prenom, email, telephone, adresse, ville,
                                 code_postal, date_naissance, statut, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(&raw.nom)
        .bind(&raw.prenom)
        .bind(&raw.email)
        .bind(&raw.telephone)
        .bind(&raw.adresse)
        .bind(&raw.ville)
        .bind(&raw.code_postal)
        .bind(raw.date_naissance)
        .bind(&raw.statut)
        .bind(raw.updated_at)
        .execute(&self.source_admin)
        .await
        .expect("Failed to seed source row");
    }

    async fn queue(&self) -> PgQueue {
        sqlx::query("DROP TABLE IF EXISTS jobs, failed_jobs")
            .execute(self.target.pool())
            .await
            .unwrap();
        let queue = PgQueue::new(
            self.target.pool().clone(),
            "client-sync-test",
            Duration::from_secs(30),
        );
        queue.init_schema().await.expect("Failed to create queue tables");
        queue
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_target_upsert_is_idempotent() {
    let ctx = PgContext::new().await;
    let record = fixtures::canonical("twice@x.com", "TWICE", Some(fixtures::at(0)));

    let first = ctx.target.upsert(&record, record.updated_at).await.unwrap();
    let second = ctx.target.upsert(&record, record.updated_at).await.unwrap();

    assert_eq!(first, ApplyOutcome::Created);
    assert_eq!(second, ApplyOutcome::Updated);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients WHERE email = $1")
        .bind("twice@x.com")
        .fetch_one(ctx.target.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_target_rejects_older_versions() {
    let ctx = PgContext::new().await;
    let newer = fixtures::canonical("lww@x.com", "NEWER", Some(fixtures::at(60)));
    let older = fixtures::canonical("lww@x.com", "OLDER", Some(fixtures::at(0)));

    ctx.target.upsert(&newer, newer.updated_at).await.unwrap();
    assert_eq!(
        ctx.target.upsert(&older, older.updated_at).await.unwrap(),
        ApplyOutcome::Stale
    );
    assert_eq!(
        ctx.target
            .tombstone("lww@x.com", Some(fixtures::at(30)))
            .await
            .unwrap(),
        ApplyOutcome::Stale
    );

    let row = ctx.target.find_by_email("lww@x.com").await.unwrap().unwrap();
    assert_eq!(row.nom, "NEWER");
    assert!(!row.is_tombstoned());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_target_tombstone_and_revive() {
    let ctx = PgContext::new().await;

    assert_eq!(
        ctx.target.tombstone("ghost@x.com", None).await.unwrap(),
        ApplyOutcome::Noop
    );
    assert!(ctx.target.find_by_email("ghost@x.com").await.unwrap().is_none());

    let record = fixtures::canonical("cycle@x.com", "CYCLE", Some(fixtures::at(0)));
    ctx.target.upsert(&record, record.updated_at).await.unwrap();
    let id = ctx.target.find_by_email("cycle@x.com").await.unwrap().unwrap().id;

    assert_eq!(
        ctx.target
            .tombstone("cycle@x.com", Some(fixtures::at(10)))
            .await
            .unwrap(),
        ApplyOutcome::Tombstoned
    );
    assert!(ctx.target.get(id).await.unwrap().is_none());
    assert_eq!(
        ctx.target
            .tombstone("cycle@x.com", Some(fixtures::at(10)))
            .await
            .unwrap(),
        ApplyOutcome::Noop
    );

    let revived = fixtures::canonical("cycle@x.com", "BACK", Some(fixtures::at(20)));
    assert_eq!(
        ctx.target.upsert(&revived, revived.updated_at).await.unwrap(),
        ApplyOutcome::Updated
    );
    let row = ctx.target.get(id).await.unwrap().unwrap();
    assert_eq!(row.nom, "BACK");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_target_reads() {
    let ctx = PgContext::new().await;
    let mut inactive = fixtures::canonical("b@x.com", "BERNARD", None);
    inactive.statut = "inactive".into();
    ctx.target
        .upsert(&fixtures::canonical("a@x.com", "ARNAUD", None), None)
        .await
        .unwrap();
    ctx.target.upsert(&inactive, None).await.unwrap();
    ctx.target
        .upsert(&fixtures::canonical("c_d@x.com", "CHARLES", None), None)
        .await
        .unwrap();
    ctx.target.tombstone("c_d@x.com", None).await.unwrap();

    let page = ctx
        .target
        .list(&ClientQuery {
            statut: None,
            page: 1,
            per_page: 15,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.data[0].email, "b@x.com");

    let page = ctx
        .target
        .list(&ClientQuery {
            statut: Some("inactive".into()),
            page: 1,
            per_page: 15,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    let found = ctx.target.search("arn", 15).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].email, "a@x.com");

    // `_` is literal, and tombstoned rows are hidden.
    assert!(ctx.target.search("c_d", 15).await.unwrap().is_empty());
    assert!(ctx.target.search("a_x", 15).await.unwrap().is_empty());

    let stats = ctx.target.stats().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.inactive, 1);
    assert_eq!(stats.recent_24h, 2);
    assert_eq!(stats.tombstoned, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_source_reads_window_and_is_read_only() {
    let ctx = PgContext::new().await;
    let now = Utc::now();
    ctx.insert_source(&fixtures::raw_at("recent@x.com", now - ChronoDuration::minutes(1)))
        .await;
    ctx.insert_source(&fixtures::raw_at("old@x.com", now - ChronoDuration::hours(2)))
        .await;

    let rows = ctx
        .source
        .changed_since(now - ChronoDuration::minutes(5))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].email, "recent@x.com");
    assert_eq!(ctx.source.count().await.unwrap(), 2);

    assert!(ctx.source.health_check().await);
    assert!(ctx.target.health_check().await);

    // An unbounded window reads every row.
    let all = ctx
        .source
        .changed_since(chrono::DateTime::<Utc>::MIN_UTC)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let write = sqlx::query("DELETE FROM clients")
        .execute(ctx.source.pool())
        .await;
    assert!(write.is_err(), "source pool must reject writes");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_pg_queue_lease_retry_and_dead_letter() {
    let ctx = PgContext::new().await;
    let queue = ctx.queue().await;

    let job = SyncJob::delete("q@x.com", Utc::now());
    queue.enqueue(&job).await.unwrap();
    assert_eq!(queue.depth().await.unwrap(), 1);

    let leased = queue.lease(5).await.unwrap();
    assert_eq!(leased.len(), 1);
    assert_eq!(leased[0].attempts, 1);
    assert_eq!(leased[0].job, job);
    assert!(queue.lease(5).await.unwrap().is_empty(), "single owner");

    queue
        .retry(&leased[0], Duration::from_millis(100))
        .await
        .unwrap();
    assert!(queue.lease(5).await.unwrap().is_empty(), "retry delay");
    tokio::time::sleep(Duration::from_millis(200)).await;

    let again = queue.lease(5).await.unwrap();
    assert_eq!(again[0].attempts, 2);

    queue.dead_letter(&again[0], "boom").await.unwrap();
    assert_eq!(queue.depth().await.unwrap(), 0);
    assert_eq!(queue.failed_count().await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_pipeline_over_postgres() {
    let ctx = PgContext::new().await;
    let queue: Arc<dyn JobQueue> = Arc::new(ctx.queue().await);
    ctx.insert_source(&fixtures::dupont_raw(Utc::now() - ChronoDuration::minutes(1)))
        .await;

    let orchestrator =
        EtlOrchestrator::with_stores(Arc::new(ctx.source.clone()), queue.clone(), 5);
    let pool = WorkerPool::new(
        queue.clone(),
        SyncWorker::new(Arc::new(ctx.target.clone())),
        fast_retry(),
        WorkerConfig::default(),
    );

    assert_eq!(orchestrator.run_once().await, 1);
    assert_eq!(orchestrator.run_once().await, 1);
    assert_eq!(pool.run_until_idle().await, 2);

    let row = ctx
        .target
        .find_by_email("jean.dupont@x.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.nom, "DUPONT");
    assert_eq!(row.prenom, "Jean");
    assert_eq!(row.telephone.as_deref(), Some("01 23 45 67 89"));
    assert_eq!(row.ville.as_deref(), Some("Paris"));
    assert_eq!(row.statut, "active");
    assert_eq!(queue.depth().await.unwrap(), 0);
}
