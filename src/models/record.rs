use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Free-text record fields in display order, with their row labels.
pub const DETAIL_FIELDS: [(&str, &str); 7] = [
    ("personalNote", "Personal note"),
    ("complaints", "Complaints"),
    ("findings", "Findings"),
    ("investigations", "Investigations"),
    ("diagnosis", "Diagnosis"),
    ("advice", "Advice"),
    ("followup", "Follow up"),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum Medications {
    /// Names pulled from a structured prescription list.
    Structured(Vec<String>),
    Raw(String),
}

impl Medications {
    /// Arrays keep the non-empty `name` of each object entry; strings are kept
    /// verbatim. Anything else carries no medication data.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => {
                let names = items
                    .iter()
                    .filter_map(|item| item.as_object())
                    .filter_map(|obj| obj.get("name").and_then(Value::as_str))
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
                Some(Medications::Structured(names))
            }
            Value::String(raw) => Some(Medications::Raw(raw.clone())),
            _ => None,
        }
    }

    /// Display text, `None` when a structured list produced no names.
    pub fn display_text(&self) -> Option<String> {
        match self {
            Medications::Structured(names) if names.is_empty() => None,
            Medications::Structured(names) => Some(names.join(", ")),
            Medications::Raw(raw) => Some(raw.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMatch {
    pub id: String,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Keyed by the names in [`DETAIL_FIELDS`].
    #[serde(default)]
    pub free_text_fields: BTreeMap<String, String>,
    pub medications: Option<Medications>,
    pub location: Option<String>,
    pub created_at: Option<String>,
}

impl RecordMatch {
    /// Explicit name first, then `first last`; empty when neither yields text.
    pub fn composed_name(&self) -> String {
        if let Some(name) = self.display_name.as_deref() {
            return name.trim().to_string();
        }
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }

    pub fn free_text(&self, field: &str) -> Option<&str> {
        self.free_text_fields.get(field).map(String::as_str)
    }
}
