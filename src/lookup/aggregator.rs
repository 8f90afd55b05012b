use std::sync::Arc;

use crate::models::{EnrichmentResult, NormalizedKey};
use crate::{log_info, log_warn};

use super::LookupClient;

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "enrich";

/// Runs the record and schedule searches side by side and joins on both.
#[derive(Clone)]
pub struct EnrichmentAggregator {
    client: Arc<dyn LookupClient>,
}

impl EnrichmentAggregator {
    pub fn new(client: Arc<dyn LookupClient>) -> Self {
        Self { client }
    }

    /// Always resolves. A failed search leaves its slot empty.
    pub async fn enrich(&self, key: NormalizedKey) -> EnrichmentResult {
        let (record, schedule) = tokio::join!(
            self.client.search_record(&key),
            self.client.search_schedule(&key)
        );

        let record = record.unwrap_or_else(|err| {
            log_warn!("record search for {} failed: {err}", key);
            None
        });
        let schedule = match schedule {
            Ok(entries) => entries.into_iter().next(),
            Err(err) => {
                log_warn!("schedule search for {} failed: {err}", key);
                None
            }
        };

        log_info!(
            "enriched {}: record={} schedule={}",
            key,
            record.is_some(),
            schedule.is_some()
        );

        EnrichmentResult {
            key,
            record,
            schedule,
            both_completed: true,
        }
    }
}
