use serde::{Deserialize, Serialize};

use super::{NormalizedKey, RecordMatch, ScheduleEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    pub key: NormalizedKey,
    pub record: Option<RecordMatch>,
    pub schedule: Option<ScheduleEntry>,
    pub both_completed: bool,
}
