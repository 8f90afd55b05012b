use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    /// ISO-like timestamp string exactly as returned by the calendar lookup.
    pub start: String,
    /// Multi-line `key: value` text.
    pub description: String,
    pub attachment_url: Option<String>,
}
