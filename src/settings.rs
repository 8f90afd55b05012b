use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::dispatch::templates::{default_templates, QuickReplyTemplate};

const API_KEY_ENV: &str = "ORTHOLINK_API_KEY";
const BASE_URL_ENV: &str = "ORTHOLINK_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LookupSettings {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout_secs: u64,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            base_url: "https://vqskeanwpnvuyxorymib.supabase.co/".into(),
            api_key: String::new(),
            request_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlaySettings {
    /// Delay between the telephony idle signal and closing the overlay.
    pub call_end_grace_ms: u64,
    pub placeholder_name: String,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            call_end_grace_ms: 5_000,
            placeholder_name: "Unknown Caller".into(),
        }
    }
}

impl OverlaySettings {
    pub fn call_end_grace(&self) -> Duration {
        Duration::from_millis(self.call_end_grace_ms)
    }
}

/// Timing and budget knobs for the messaging automation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AutomationTimings {
    /// Minimum wait before pressing send on a plain message.
    pub send_delay_ms: u64,
    /// Minimum wait when the message carries a link, so the preview renders.
    pub link_send_delay_ms: u64,
    /// Upper bound on the settle wait before pressing send anyway.
    pub settle_max_ms: u64,
    pub settle_poll_ms: u64,
    /// Pause after a successful send before backing out of the chat.
    pub post_send_ms: u64,
    /// Pause between the two back navigations.
    pub back_gap_ms: u64,
    pub retry_budget: u32,
}

impl Default for AutomationTimings {
    fn default() -> Self {
        Self {
            send_delay_ms: 500,
            link_send_delay_ms: 2_500,
            settle_max_ms: 4_000,
            settle_poll_ms: 100,
            post_send_ms: 1_000,
            back_gap_ms: 500,
            retry_budget: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub lookup: LookupSettings,
    pub overlay: OverlaySettings,
    pub automation: AutomationTimings,
    pub quick_replies: Vec<QuickReplyTemplate>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            lookup: LookupSettings::default(),
            overlay: OverlaySettings::default(),
            automation: AutomationTimings::default(),
            quick_replies: default_templates(),
        }
    }
}

impl AppSettings {
    /// Apply `ORTHOLINK_API_KEY` / `ORTHOLINK_BASE_URL` when they are set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.lookup.api_key = key.trim().to_string();
            }
        }
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.lookup.base_url = url.trim().to_string();
            }
        }
        self
    }

    pub fn template(&self, id: &str) -> Option<&QuickReplyTemplate> {
        self.quick_replies.iter().find(|template| template.id == id)
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring unreadable settings at {}: {err}",
                    path.display()
                );
                AppSettings::default()
            })
        } else {
            AppSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> AppSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: AppSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed settings in {}", self.path.display()))?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data;
        Ok(())
    }

    fn persist(&self, data: &AppSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let settings = store.current();
        assert_eq!(settings.automation.retry_budget, 1);
        assert_eq!(settings.overlay.call_end_grace_ms, 5_000);
        assert!(settings.template("clinic").is_some());
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.current();
        settings.automation.link_send_delay_ms = 3_000;
        settings.lookup.api_key = "anon".into();
        store.update(settings).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.current().automation.link_send_delay_ms, 3_000);
        assert_eq!(reopened.current().lookup.api_key, "anon");
        reopened.reload().unwrap();
        assert_eq!(reopened.current().lookup.api_key, "anon");
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"overlay": {"callEndGraceMs": 2000}}"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().current();
        assert_eq!(settings.overlay.call_end_grace_ms, 2_000);
        assert_eq!(settings.overlay.placeholder_name, "Unknown Caller");
        assert_eq!(settings.automation.send_delay_ms, 500);
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(SettingsStore::new(path).unwrap().current(), AppSettings::default());
    }
}
