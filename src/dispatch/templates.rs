use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Substituted with the weekday or Sunday hours when a template has them.
const HOURS_PLACEHOLDER: &str = "{hours}";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OpeningHours {
    pub weekday: String,
    pub sunday: String,
}

/// A canned message behind one of the overlay's quick-send buttons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuickReplyTemplate {
    pub id: String,
    pub label: String,
    pub body: String,
    #[serde(default)]
    pub hours: Option<OpeningHours>,
}

impl QuickReplyTemplate {
    pub fn render(&self, today: Weekday) -> String {
        match &self.hours {
            Some(hours) => {
                let slot = if today == Weekday::Sun {
                    &hours.sunday
                } else {
                    &hours.weekday
                };
                self.body.replace(HOURS_PLACEHOLDER, slot)
            }
            None => self.body.clone(),
        }
    }
}

pub fn default_templates() -> Vec<QuickReplyTemplate> {
    vec![
        QuickReplyTemplate {
            id: "clinic".into(),
            label: "Clinic".into(),
            body: "Dr Samuel Manoj Cherukuri\n98668 12555\n\n{hours} at  OrthoLife :\nRoad number 3,\nR R Nagar, near RTO office,\nKakinada\n\nLocation:\nhttps://g.co/kgs/6ZEukv".into(),
            hours: Some(OpeningHours {
                weekday: "After 7:30 pm".into(),
                sunday: "After 4 pm".into(),
            }),
        },
        QuickReplyTemplate {
            id: "laxmi".into(),
            label: "Laxmi".into(),
            body: "Dr Samuel Manoj Cherukuri\n98668 12555\n\n9-5 pm at:\nLaxmi Hospital,\nGudarigunta, Kakinada\n\nLocation:\nhttps://g.co/kgs/5Xkr4FU".into(),
            hours: None,
        },
        QuickReplyTemplate {
            id: "badam".into(),
            label: "Badam".into(),
            body: "Dr Samuel Manoj Cherukuri\n98668 12555\n\n5-7 pm at:\n Badam clinical laboratory \nhttps://g.co/kgs/eAgkp5S".into(),
            hours: None,
        },
    ]
}
