//! Windowed extraction from the source store.
//!
//! Extraction fails open: a source outage yields an empty batch, an
//! error-level log, a failure count and an unhealthy `source` component.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use store::SourceStore;
use sync_core::RawRecord;
use telemetry::{health, metrics};
use tracing::{error, info};

/// Reads recently changed records from the source.
pub struct Extractor {
    source: Arc<dyn SourceStore>,
}

impl Extractor {
    pub fn new(source: Arc<dyn SourceStore>) -> Self {
        Self { source }
    }

    /// Records changed within the last `window_minutes`. Never fails.
    pub async fn extract(&self, window_minutes: u64) -> Vec<RawRecord> {
        self.extract_since(window_cutoff(Utc::now(), window_minutes), window_minutes)
            .await
    }

    async fn extract_since(&self, cutoff: DateTime<Utc>, window_minutes: u64) -> Vec<RawRecord> {
        match self.source.changed_since(cutoff).await {
            Ok(records) => {
                health().source.set_healthy();
                metrics().records_extracted.inc_by(records.len() as u64);
                info!(
                    count = records.len(),
                    window_minutes = window_minutes,
                    cutoff = %cutoff,
                    "Extracted changed records"
                );
                records
            }
            Err(e) => {
                metrics().extraction_failures.inc();
                health().source.set_unhealthy(e.to_string());
                error!(
                    error = %e,
                    code = ?e.error_code(),
                    window_minutes = window_minutes,
                    cutoff = %cutoff,
                    "Source unavailable, extraction returned no records"
                );
                Vec::new()
            }
        }
    }
}

/// `now - window_minutes`, clamped to the earliest representable instant.
fn window_cutoff(now: DateTime<Utc>, window_minutes: u64) -> DateTime<Utc> {
    i64::try_from(window_minutes)
        .ok()
        .and_then(Duration::try_minutes)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
