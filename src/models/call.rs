use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Country prefix dropped from full-length numbers before lookup.
const COUNTRY_PREFIX: &str = "91";
/// Digit count of a number that still carries the country prefix.
const PREFIXED_LEN: usize = 12;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CallDirection {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEvent {
    pub raw_number: String,
    pub direction: CallDirection,
    pub timestamp: DateTime<Utc>,
}

impl CallEvent {
    pub fn new(raw_number: impl Into<String>, direction: CallDirection) -> Self {
        Self {
            raw_number: raw_number.into(),
            direction,
            timestamp: Utc::now(),
        }
    }

    pub fn key(&self) -> NormalizedKey {
        normalize(&self.raw_number)
    }
}

/// Digits-only lookup key derived from a dialled or incoming number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize(raw: &str) -> NormalizedKey {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == PREFIXED_LEN && digits.starts_with(COUNTRY_PREFIX) {
        NormalizedKey(digits[COUNTRY_PREFIX.len()..].to_string())
    } else {
        NormalizedKey(digits)
    }
}
