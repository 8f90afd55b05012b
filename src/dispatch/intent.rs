use serde::{Deserialize, Serialize};

use crate::error::FallbackError;

/// Marker that makes a message count as carrying a link.
const LINK_MARKER: &str = "http";

/// One outbound attempt, handed from the coordinator to the watcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchIntent {
    pub recipient: String,
    pub message: Option<String>,
    pub auto_send: bool,
    pub has_link: bool,
    /// Retries already spent on this dispatch; zero for a fresh one.
    pub attempt: u32,
}

impl DispatchIntent {
    pub fn new(recipient: impl Into<String>, message: Option<String>, auto_send: bool) -> Self {
        let has_link = message
            .as_deref()
            .is_some_and(|text| text.contains(LINK_MARKER));
        Self {
            recipient: recipient.into(),
            message,
            auto_send,
            has_link,
            attempt: 0,
        }
    }
}

/// In-flight dispatch as seen by the watcher. Only the watcher mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchState {
    pub should_send: bool,
    pub recipient: Option<String>,
    pub message: Option<String>,
    pub has_link: bool,
    pub retry_count: u32,
}

impl DispatchState {
    pub fn arm(&mut self, intent: DispatchIntent) {
        *self = Self {
            should_send: intent.auto_send,
            recipient: Some(intent.recipient),
            message: intent.message,
            has_link: intent.has_link,
            retry_count: intent.attempt,
        };
    }

    pub fn disarm(&mut self) {
        self.should_send = false;
    }

    /// Intent to relaunch with, carrying the retries spent so far.
    pub fn retry_intent(&self) -> Option<DispatchIntent> {
        let recipient = self.recipient.clone()?;
        Some(DispatchIntent {
            recipient,
            message: self.message.clone(),
            auto_send: true,
            has_link: self.has_link,
            attempt: self.retry_count,
        })
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone)]
pub enum WatcherCommand {
    Arm(DispatchIntent),
    /// Abandon the dispatch and forget its recipient.
    Disarm,
}

/// Acknowledgements flowing back from the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherEvent {
    Sent { recipient: String },
    RetryRequested(DispatchIntent),
    /// Transient failure consumed a retry without asking for a relaunch.
    Disarmed { retry_count: u32 },
    FellBack { recipient: String },
    FallbackFailed { recipient: String, error: FallbackError },
    /// Fallback had no message to deliver.
    FallbackSkipped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_detection_follows_message_text() {
        let with_link = DispatchIntent::new("98", Some("map: https://g.co/x".into()), true);
        assert!(with_link.has_link);
        assert!(!DispatchIntent::new("98", Some("see you at 5".into()), true).has_link);
        assert!(!DispatchIntent::new("98", None, false).has_link);
    }

    #[test]
    fn arming_replaces_previous_dispatch() {
        let mut state = DispatchState {
            should_send: false,
            recipient: Some("old".into()),
            message: Some("old".into()),
            has_link: true,
            retry_count: 1,
        };
        state.arm(DispatchIntent::new("new", Some("hello".into()), true));
        assert!(state.should_send);
        assert_eq!(state.recipient.as_deref(), Some("new"));
        assert!(!state.has_link);
        assert_eq!(state.retry_count, 0);
    }

    #[test]
    fn retry_intent_carries_spent_retries() {
        let mut state = DispatchState::default();
        assert!(state.retry_intent().is_none());
        state.arm(DispatchIntent::new("98", Some("hi".into()), true));
        state.retry_count = 1;
        let intent = state.retry_intent().unwrap();
        assert_eq!(intent.attempt, 1);
        assert!(intent.auto_send);
    }
}
