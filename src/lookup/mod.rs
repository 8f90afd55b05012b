pub mod aggregator;
pub mod http;

use async_trait::async_trait;

use crate::error::LookupError;
use crate::models::{NormalizedKey, RecordMatch, ScheduleEntry};

pub use aggregator::EnrichmentAggregator;
pub use http::SupabaseLookupClient;

/// The two independent searches run for every call.
#[async_trait]
pub trait LookupClient: Send + Sync {
    /// First matching record, if any.
    async fn search_record(&self, key: &NormalizedKey) -> Result<Option<RecordMatch>, LookupError>;

    async fn search_schedule(&self, key: &NormalizedKey)
        -> Result<Vec<ScheduleEntry>, LookupError>;
}
