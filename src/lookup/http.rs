//! HTTP lookup client for the clinic's Supabase edge functions.
//!
//! Both searches POST JSON to `functions/v1/*` with the anon key sent as
//! `apikey` and as a Bearer token.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::LookupError;
use crate::models::{Medications, NormalizedKey, RecordMatch, ScheduleEntry};
use crate::settings::LookupSettings;

use super::LookupClient;

const SEARCH_PATIENTS_PATH: &str = "functions/v1/search-patients";
const SEARCH_EVENTS_PATH: &str = "functions/v1/search-calendar-events";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PatientSearchRequest<'a> {
    search_term: &'a str,
    search_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventSearchRequest<'a> {
    phone_number: &'a str,
}

/// Patient row as returned by `search-patients`.
#[derive(Debug, Clone, Default, Deserialize)]
struct PatientDetailsDto {
    id: String,
    name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    #[serde(rename = "personalNote")]
    personal_note: Option<String>,
    complaints: Option<String>,
    findings: Option<String>,
    investigations: Option<String>,
    diagnosis: Option<String>,
    medications: Option<Value>,
    advice: Option<String>,
    followup: Option<String>,
    location: Option<String>,
    created_at: Option<String>,
}

impl From<PatientDetailsDto> for RecordMatch {
    fn from(dto: PatientDetailsDto) -> Self {
        let free_text_fields: BTreeMap<String, String> = [
            ("personalNote", dto.personal_note),
            ("complaints", dto.complaints),
            ("findings", dto.findings),
            ("investigations", dto.investigations),
            ("diagnosis", dto.diagnosis),
            ("advice", dto.advice),
            ("followup", dto.followup),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field.to_string(), v)))
        .collect();

        RecordMatch {
            id: dto.id,
            display_name: dto.name,
            first_name: dto.first_name,
            last_name: dto.last_name,
            free_text_fields,
            medications: dto.medications.as_ref().and_then(Medications::from_json),
            location: dto.location,
            created_at: dto.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CalendarEventDto {
    start: String,
    description: String,
    attachments: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarEventResponse {
    #[serde(default)]
    calendar_events: Vec<CalendarEventDto>,
}

pub struct SupabaseLookupClient {
    client: reqwest::Client,
    base_url: url::Url,
    api_key: String,
}

impl SupabaseLookupClient {
    pub fn new(settings: &LookupSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("failed to build lookup HTTP client")?;
        let base_url = url::Url::parse(&settings.base_url)
            .with_context(|| format!("invalid lookup base url '{}'", settings.base_url))?;

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone(),
        })
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, LookupError> {
        let endpoint = self
            .base_url
            .join(path)
            .map_err(|e| LookupError::Request(format!("bad endpoint {path}: {e}")))?;

        let resp = self
            .client
            .post(endpoint)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| LookupError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LookupError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))
    }
}

#[async_trait]
impl LookupClient for SupabaseLookupClient {
    async fn search_record(&self, key: &NormalizedKey) -> Result<Option<RecordMatch>, LookupError> {
        let request = PatientSearchRequest {
            search_term: key.as_str(),
            search_type: "phone",
        };
        let rows: Vec<PatientDetailsDto> = self.post(SEARCH_PATIENTS_PATH, &request).await?;
        Ok(rows.into_iter().next().map(RecordMatch::from))
    }

    async fn search_schedule(
        &self,
        key: &NormalizedKey,
    ) -> Result<Vec<ScheduleEntry>, LookupError> {
        let request = EventSearchRequest {
            phone_number: key.as_str(),
        };
        let response: CalendarEventResponse = self.post(SEARCH_EVENTS_PATH, &request).await?;
        Ok(response
            .calendar_events
            .into_iter()
            .map(|event| ScheduleEntry {
                start: event.start,
                description: event.description,
                attachment_url: event.attachments,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_row_maps_into_record() {
        let row: PatientDetailsDto = serde_json::from_str(
            r#"{
                "id": "p-1",
                "name": null,
                "first_name": "Lakshmi",
                "last_name": "Devi",
                "personalNote": "-",
                "complaints": "Knee pain",
                "medications": [{"name": "Etoricoxib"}, {"name": "Rabeprazole"}],
                "location": "Kakinada",
                "created_at": "2024-02-01T10:15:00+05:30"
            }"#,
        )
        .unwrap();

        let record = RecordMatch::from(row);
        assert_eq!(record.composed_name(), "Lakshmi Devi");
        assert_eq!(record.free_text("complaints"), Some("Knee pain"));
        assert_eq!(record.free_text("personalNote"), Some("-"));
        assert_eq!(record.free_text("advice"), None);
        assert_eq!(
            record.medications.and_then(|m| m.display_text()).as_deref(),
            Some("Etoricoxib, Rabeprazole")
        );
    }

    #[test]
    fn calendar_response_tolerates_missing_list() {
        let response: CalendarEventResponse = serde_json::from_str("{}").unwrap();
        assert!(response.calendar_events.is_empty());
    }

    #[test]
    fn request_bodies_use_edge_function_field_names() {
        let body = serde_json::to_value(PatientSearchRequest {
            search_term: "9876543210",
            search_type: "phone",
        })
        .unwrap();
        assert_eq!(body["searchTerm"], "9876543210");
        assert_eq!(body["searchType"], "phone");

        let body = serde_json::to_value(EventSearchRequest {
            phone_number: "9876543210",
        })
        .unwrap();
        assert_eq!(body["phoneNumber"], "9876543210");
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let settings = LookupSettings {
            base_url: "not a url".into(),
            ..Default::default()
        };
        assert!(SupabaseLookupClient::new(&settings).is_err());
    }
}
