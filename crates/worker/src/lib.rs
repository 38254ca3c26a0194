//! Pipeline workers for client sync.
//!
//! - Extractor (windowed, fail-open source reads)
//! - Queue publisher (canonical record → durable job)
//! - ETL orchestrator (extract → normalize → publish)
//! - Sync worker and pool (lease → transactional apply → ack/retry/dead-letter)
//! - Scheduler (pool + periodic ETL)

pub mod config;
pub mod etl;
pub mod extractor;
pub mod pool;
pub mod publisher;
pub mod scheduler;
pub mod sync;

pub use config::*;
pub use etl::EtlOrchestrator;
pub use extractor::Extractor;
pub use pool::WorkerPool;
pub use publisher::QueuePublisher;
pub use scheduler::WorkerScheduler;
pub use sync::SyncWorker;
