//! View-model emitted to the rendering surface on every overlay transition.
//!
//! Building a view is pure: the same session, settings and date always give
//! the same view.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{RecordMatch, ScheduleEntry, DETAIL_FIELDS};
use crate::settings::AppSettings;

use super::state::{OverlaySession, OverlayState};

/// Free-text value meaning "nothing recorded".
const EMPTY_SENTINEL: &str = "-";
/// Schedule description keys carrying channel or payment metadata.
const SUPPRESSED_KEYS: [&str; 4] = ["Phone", "SMS", "WhatsApp", "Payment"];
const PATIENT_KEY: &str = "Patient";
const DOB_KEY: &str = "DOB";
const DOB_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OverlayLayout {
    Fullscreen,
    CornerAnchor,
    CompactStrip,
    Hidden,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DetailRow {
    pub field: String,
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    pub when: String,
    pub description: String,
    pub attachment_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SectionVisibility {
    pub main_content: bool,
    pub location: bool,
    pub created_date: bool,
    pub details: bool,
    pub calendar: bool,
    pub attachment: bool,
    pub attachment_preview: bool,
    pub actions: bool,
    pub restore: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuickReplyControl {
    pub id: String,
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionControls {
    pub accept_call: bool,
    pub decline_call: bool,
    pub end_call: bool,
    pub minimize: bool,
    pub restore: bool,
    pub speaker: bool,
    pub open_chat: bool,
    pub quick_replies: Vec<QuickReplyControl>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OverlayView {
    pub session_id: String,
    pub state: OverlayState,
    pub layout: OverlayLayout,
    pub caller_number: String,
    pub caller_name: String,
    pub location: Option<String>,
    pub created_date: Option<String>,
    pub details: Vec<DetailRow>,
    pub schedule: Option<ScheduleView>,
    pub sections: SectionVisibility,
    pub actions: ActionControls,
}

/// Schedule description after line filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDescription {
    pub text: String,
    pub patient_name: Option<String>,
}

pub fn build_view(session: &OverlaySession, settings: &AppSettings, today: NaiveDate) -> OverlayView {
    let state = session.state;
    let enrichment = session.enrichment.as_ref();
    let record = enrichment.and_then(|e| e.record.as_ref());
    let entry = enrichment.and_then(|e| e.schedule.as_ref());
    let parsed = entry.map(|e| parse_description(&e.description, today));

    let caller_name = record
        .map(RecordMatch::composed_name)
        .filter(|name| !name.is_empty())
        .or_else(|| parsed.as_ref().and_then(|p| p.patient_name.clone()))
        .unwrap_or_else(|| settings.overlay.placeholder_name.clone());

    let compact = state == OverlayState::ShownCompactUnknown;
    let visible = state.is_visible();
    let expanded = visible && state != OverlayState::Minimized;

    let (location, created_date, details, schedule) = if compact {
        (None, None, Vec::new(), None)
    } else {
        (
            record
                .and_then(|r| r.location.clone())
                .filter(|l| !l.trim().is_empty()),
            record
                .and_then(|r| r.created_at.as_deref())
                .and_then(format_created_date),
            record.map(detail_rows).unwrap_or_default(),
            entry.zip(parsed).map(|(entry, parsed)| schedule_view(entry, parsed)),
        )
    };

    let has_attachment = schedule
        .as_ref()
        .is_some_and(|s| s.attachment_url.is_some());

    let sections = SectionVisibility {
        main_content: expanded,
        location: expanded && location.is_some(),
        created_date: expanded && created_date.is_some(),
        details: expanded && !compact && record.is_some(),
        calendar: expanded && schedule.is_some(),
        attachment: expanded && has_attachment,
        attachment_preview: expanded && has_attachment && session.attachment_open,
        actions: expanded,
        restore: state == OverlayState::Minimized,
    };

    let can_accept = session.can_accept();
    let actions = ActionControls {
        accept_call: can_accept,
        decline_call: can_accept,
        end_call: visible && !can_accept,
        minimize: session.can_minimize(),
        restore: state == OverlayState::Minimized,
        speaker: visible,
        open_chat: expanded,
        quick_replies: settings
            .quick_replies
            .iter()
            .map(|template| QuickReplyControl {
                id: template.id.clone(),
                label: template.label.clone(),
                enabled: expanded,
            })
            .collect(),
    };

    let layout = match state {
        OverlayState::ShownFull => OverlayLayout::Fullscreen,
        OverlayState::Minimized => OverlayLayout::CornerAnchor,
        OverlayState::ShownCompactUnknown => OverlayLayout::CompactStrip,
        OverlayState::Idle | OverlayState::Loading | OverlayState::Closed => OverlayLayout::Hidden,
    };

    OverlayView {
        session_id: session.id.clone(),
        state,
        layout,
        caller_number: session.call_event.raw_number.clone(),
        caller_name,
        location,
        created_date,
        details,
        schedule,
        sections,
        actions,
    }
}

fn has_content(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != EMPTY_SENTINEL
}

fn detail_rows(record: &RecordMatch) -> Vec<DetailRow> {
    let mut rows: Vec<DetailRow> = DETAIL_FIELDS
        .iter()
        .filter_map(|(field, label)| {
            record
                .free_text(field)
                .filter(|text| has_content(text))
                .map(|text| DetailRow {
                    field: field.to_string(),
                    label: label.to_string(),
                    text: text.to_string(),
                })
        })
        .collect();

    if let Some(text) = record
        .medications
        .as_ref()
        .and_then(|m| m.display_text())
        .filter(|text| has_content(text))
    {
        rows.push(DetailRow {
            field: "medications".into(),
            label: "Medications".into(),
            text,
        });
    }
    rows
}

fn schedule_view(entry: &ScheduleEntry, parsed: ParsedDescription) -> ScheduleView {
    ScheduleView {
        when: format_schedule_start(&entry.start),
        description: parsed.text,
        attachment_url: entry
            .attachment_url
            .clone()
            .filter(|url| !url.trim().is_empty()),
    }
}

/// Date part of an ISO timestamp.
pub fn format_created_date(created_at: &str) -> Option<String> {
    let created_at = created_at.trim();
    if created_at.is_empty() {
        return None;
    }
    Some(created_at.get(..10).unwrap_or(created_at).to_string())
}

/// `2024-06-12T10:30:00+05:30` becomes `2024-06-12 10:30`. Short strings pass
/// through unchanged.
pub fn format_schedule_start(start: &str) -> String {
    let spaced = start.replace('T', " ");
    match spaced.get(..16) {
        Some(prefix) => prefix.to_string(),
        None => start.to_string(),
    }
}

/// Whole years between `dob` and `today`. One year is taken off while
/// today's day-of-year is still before the birth day-of-year.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if today.ordinal() < dob.ordinal() {
        age -= 1;
    }
    age
}

pub fn parse_description(description: &str, today: NaiveDate) -> ParsedDescription {
    let mut lines = Vec::new();
    let mut patient_name = None;

    for line in description.lines() {
        let Some((key, value)) = line.split_once(": ") else {
            if !line.trim().is_empty() {
                lines.push(line.to_string());
            }
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        if SUPPRESSED_KEYS
            .iter()
            .any(|suppressed| key.eq_ignore_ascii_case(suppressed))
        {
            continue;
        }
        if key.eq_ignore_ascii_case(PATIENT_KEY) {
            if !value.is_empty() && patient_name.is_none() {
                patient_name = Some(value.to_string());
            }
            continue;
        }
        if key.eq_ignore_ascii_case(DOB_KEY) {
            match NaiveDate::parse_from_str(value, DOB_FORMAT) {
                Ok(dob) => lines.push(format!("Age: {}", age_on(dob, today))),
                Err(_) => lines.push(format!("{key}: {value}")),
            }
            continue;
        }
        if !value.is_empty() {
            lines.push(format!("{key}: {value}"));
        }
    }

    ParsedDescription {
        text: lines.join("\n").trim().to_string(),
        patient_name,
    }
}
