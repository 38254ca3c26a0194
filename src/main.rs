//! Client Sync Pipeline
//!
//! Keeps a target client table in step with a legacy source database:
//! - Periodic extraction of recently modified source rows
//! - Field normalization into canonical records
//! - Durable job queue (PostgreSQL, Redpanda or in-memory)
//! - Pooled sync workers applying jobs transactionally with retries
//!
//! Run modes: `serve` (default), `etl:run`, `work`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use api::{router, AppState};
use job_queue::{JobQueue, MemoryQueue, PgQueue, QueueBackend, QueueConfig, RetryPolicy};
use redpanda::{RedpandaConfig, RedpandaQueue};
use store::{DatabaseConfig, PgSource, PgTarget, SourceStore, TargetStore};
use telemetry::{health, init_tracing_from_env};
use worker::{EtlConfig, EtlOrchestrator, SyncWorker, WorkerConfig, WorkerPool, WorkerScheduler};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// Upstream database, read-only
    #[serde(default = "DatabaseConfig::source_default")]
    source: DatabaseConfig,

    /// Target database; also hosts the PostgreSQL queue tables
    #[serde(default = "DatabaseConfig::target_default")]
    target: DatabaseConfig,

    #[serde(default)]
    queue: QueueConfig,

    #[serde(default)]
    retry: RetryPolicy,

    #[serde(default)]
    worker: WorkerConfig,

    #[serde(default)]
    etl: EtlConfig,

    #[serde(default)]
    redpanda: RedpandaConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            source: DatabaseConfig::source_default(),
            target: DatabaseConfig::target_default(),
            queue: QueueConfig::default(),
            retry: RetryPolicy::default(),
            worker: WorkerConfig::default(),
            etl: EtlConfig::default(),
            redpanda: RedpandaConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// HTTP API, worker pool and ETL schedule
    Serve,
    /// One ETL cycle, then exit
    EtlRun,
    /// Worker pool only
    Work,
}

impl Mode {
    fn from_args() -> Result<Self> {
        match std::env::args().nth(1).as_deref() {
            None | Some("serve") => Ok(Mode::Serve),
            Some("etl:run") => Ok(Mode::EtlRun),
            Some("work") => Ok(Mode::Work),
            Some(other) => bail!("Unknown command '{other}' (expected serve, etl:run or work)"),
        }
    }
}

/// Stores, queue and pipeline components shared by every run mode.
struct Pipeline {
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
    queue: Arc<dyn JobQueue>,
    orchestrator: Arc<EtlOrchestrator>,
    pool: Arc<WorkerPool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23+ requires an explicit crypto provider before any TLS use
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        bail!("Failed to install rustls crypto provider");
    }

    dotenvy::dotenv().ok();

    init_tracing_from_env();

    let mode = Mode::from_args()?;
    info!(mode = ?mode, "Starting Client Sync v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!(
        backend = ?config.queue.backend,
        etl_enabled = config.etl.enabled,
        window_minutes = config.etl.window_minutes,
        concurrency = config.worker.concurrency,
        "Loaded configuration"
    );

    let pipeline = build_pipeline(&config).await?;
    check_health(&pipeline).await;

    match mode {
        Mode::EtlRun => {
            let enqueued = pipeline.orchestrator.run_once().await;
            println!("{enqueued}");
            Ok(())
        }
        Mode::Work => run_workers(pipeline).await,
        Mode::Serve => serve(&config, pipeline).await,
    }
}

async fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let target_pool = store::connect_target(&config.target)
        .await
        .context("Failed to connect to target database")?;
    store::health::init_schema(&target_pool)
        .await
        .context("Failed to initialize target schema")?;

    let source_pool =
        store::connect_source(&config.source).context("Failed to configure source database")?;

    let lease_timeout = Duration::from_secs(config.queue.lease_timeout_secs);
    let queue: Arc<dyn JobQueue> = match config.queue.backend {
        QueueBackend::Memory => {
            warn!("Using in-memory queue; jobs are lost on restart");
            Arc::new(MemoryQueue::new(lease_timeout))
        }
        QueueBackend::Postgres => {
            let queue = PgQueue::new(target_pool.clone(), &config.queue.name, lease_timeout);
            queue
                .init_schema()
                .await
                .context("Failed to initialize queue schema")?;
            Arc::new(queue)
        }
        QueueBackend::Redpanda => Arc::new(
            RedpandaQueue::connect(config.redpanda.clone(), lease_timeout)
                .await
                .context("Failed to connect to Redpanda")?,
        ),
    };

    let source: Arc<dyn SourceStore> = Arc::new(PgSource::new(source_pool));
    let target: Arc<dyn TargetStore> = Arc::new(PgTarget::new(target_pool));

    let orchestrator = Arc::new(EtlOrchestrator::with_stores(
        source.clone(),
        queue.clone(),
        config.etl.window_minutes,
    ));
    let pool = Arc::new(WorkerPool::new(
        queue.clone(),
        SyncWorker::new(target.clone()),
        config.retry.clone(),
        config.worker.clone(),
    ));

    Ok(Pipeline {
        source,
        target,
        queue,
        orchestrator,
        pool,
    })
}

async fn serve(config: &Config, pipeline: Pipeline) -> Result<()> {
    let scheduler = Arc::new(WorkerScheduler::new(
        config.etl.clone(),
        pipeline.orchestrator.clone(),
        pipeline.pool.clone(),
    ));
    let handles = scheduler.clone().start();

    let state = AppState::new(
        pipeline.source,
        pipeline.target,
        pipeline.queue,
        pipeline.orchestrator,
    );
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down...");
    scheduler.shutdown();
    for handle in handles {
        if let Err(e) = handle.await {
            error!("Background task failed: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

async fn run_workers(pipeline: Pipeline) -> Result<()> {
    let pool = pipeline.pool.clone();
    let handle = tokio::spawn(async move {
        pool.run().await;
    });

    shutdown_signal().await;
    info!("Shutting down...");
    pipeline.pool.shutdown();
    handle.await.context("Worker pool task failed")?;

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("CLIENT_SYNC")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // The config crate splits on "_" inside prefixed keys inconsistently, so
    // the common single-value overrides are read directly.
    if let Ok(url) = std::env::var("CLIENT_SYNC_SOURCE_URL") {
        config.source.url = url;
    }
    if let Ok(url) = std::env::var("CLIENT_SYNC_TARGET_URL") {
        config.target.url = url;
    }
    if let Ok(backend) = std::env::var("CLIENT_SYNC_QUEUE_BACKEND") {
        config.queue.backend = backend
            .parse::<QueueBackend>()
            .map_err(anyhow::Error::msg)
            .context("Invalid CLIENT_SYNC_QUEUE_BACKEND")?;
    }
    if let Ok(brokers) = std::env::var("CLIENT_SYNC_REDPANDA_BROKERS") {
        config.redpanda.brokers = brokers.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Ok(username) = std::env::var("CLIENT_SYNC_REDPANDA_SASL_USERNAME") {
        config.redpanda.sasl_username = Some(username);
    }
    if let Ok(password) = std::env::var("CLIENT_SYNC_REDPANDA_SASL_PASSWORD") {
        config.redpanda.sasl_password = Some(password);
    }

    Ok(config)
}

/// Check component health on startup.
async fn check_health(pipeline: &Pipeline) {
    let (source, target, queue) = tokio::join!(
        pipeline.source.health_check(),
        pipeline.target.health_check(),
        pipeline.queue.health_check(),
    );

    for (component, healthy) in [
        (&health().source, source),
        (&health().target, target),
        (&health().queue, queue),
    ] {
        if healthy {
            component.set_healthy();
            info!("{} connection: healthy", component.name());
        } else {
            component.set_unhealthy("Connection failed");
            error!("{} connection: unhealthy", component.name());
        }
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
