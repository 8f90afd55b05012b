use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OverlayError;
use crate::models::{CallDirection, CallEvent, EnrichmentResult};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OverlayState {
    #[default]
    Idle,
    Loading,
    ShownFull,
    ShownCompactUnknown,
    Minimized,
    Closed,
}

impl OverlayState {
    /// Whether a surface is attached in this state.
    pub fn is_visible(self) -> bool {
        matches!(
            self,
            OverlayState::ShownFull | OverlayState::ShownCompactUnknown | OverlayState::Minimized
        )
    }

    pub fn is_live(self) -> bool {
        !matches!(self, OverlayState::Idle | OverlayState::Closed)
    }
}

/// Presentation state for one call. Mutated only by the overlay controller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySession {
    pub id: String,
    pub state: OverlayState,
    pub call_event: CallEvent,
    pub enrichment: Option<EnrichmentResult>,
    pub is_call_accepted: bool,
    pub attachment_open: bool,
}

impl OverlaySession {
    /// A session starts out loading; known contacts are closed right away
    /// by the controller.
    pub fn new(call_event: CallEvent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: OverlayState::Loading,
            call_event,
            enrichment: None,
            is_call_accepted: false,
            attachment_open: false,
        }
    }

    fn invalid(&self, action: &'static str) -> OverlayError {
        OverlayError::InvalidTransition {
            from: self.state,
            action,
        }
    }

    pub fn show(&mut self, result: EnrichmentResult) -> Result<OverlayState, OverlayError> {
        if self.state != OverlayState::Loading {
            return Err(self.invalid("show"));
        }
        self.state = if result.record.is_some() {
            OverlayState::ShownFull
        } else {
            OverlayState::ShownCompactUnknown
        };
        self.enrichment = Some(result);
        Ok(self.state)
    }

    /// The minimize control is offered for outgoing calls, or once an
    /// incoming call has been picked up.
    pub fn can_minimize(&self) -> bool {
        self.state == OverlayState::ShownFull
            && (self.call_event.direction == CallDirection::Outgoing || self.is_call_accepted)
    }

    pub fn minimize(&mut self) -> Result<(), OverlayError> {
        if !self.can_minimize() {
            return Err(self.invalid("minimize"));
        }
        self.state = OverlayState::Minimized;
        Ok(())
    }

    /// Minimize after handing the screen to the messaging app. Only the full
    /// layout moves aside; the compact strip stays where it is.
    pub fn minimize_for_dispatch(&mut self) -> bool {
        if self.state == OverlayState::ShownFull {
            self.state = OverlayState::Minimized;
            true
        } else {
            false
        }
    }

    pub fn restore(&mut self) -> Result<(), OverlayError> {
        if self.state != OverlayState::Minimized {
            return Err(self.invalid("restore"));
        }
        self.state = OverlayState::ShownFull;
        Ok(())
    }

    pub fn can_accept(&self) -> bool {
        self.state.is_visible()
            && self.call_event.direction == CallDirection::Incoming
            && !self.is_call_accepted
    }

    pub fn mark_accepted(&mut self) -> Result<(), OverlayError> {
        if !self.can_accept() {
            return Err(self.invalid("accept-call"));
        }
        self.is_call_accepted = true;
        Ok(())
    }

    pub fn attachment_url(&self) -> Option<&str> {
        self.enrichment
            .as_ref()
            .and_then(|e| e.schedule.as_ref())
            .and_then(|s| s.attachment_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    pub fn set_attachment_open(&mut self, open: bool) -> Result<(), OverlayError> {
        if self.state != OverlayState::ShownFull || self.attachment_url().is_none() {
            return Err(self.invalid(if open { "open-attachment" } else { "close-attachment" }));
        }
        self.attachment_open = open;
        Ok(())
    }

    pub fn close(&mut self) {
        self.state = OverlayState::Closed;
        self.attachment_open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{normalize, RecordMatch};

    fn result(with_record: bool) -> EnrichmentResult {
        EnrichmentResult {
            key: normalize("9876543210"),
            record: with_record.then(RecordMatch::default),
            schedule: None,
            both_completed: true,
        }
    }

    fn session(direction: CallDirection) -> OverlaySession {
        OverlaySession::new(CallEvent::new("+91 98765 43210", direction))
    }

    #[test]
    fn no_session_reads_as_idle() {
        let state = OverlayState::default();
        assert_eq!(state, OverlayState::Idle);
        assert!(!state.is_visible());
        assert!(!state.is_live());
        assert_eq!(serde_json::to_string(&state).unwrap(), "\"idle\"");
    }

    #[test]
    fn record_presence_picks_the_mode() {
        let mut full = session(CallDirection::Incoming);
        assert_eq!(full.show(result(true)).unwrap(), OverlayState::ShownFull);

        let mut compact = session(CallDirection::Incoming);
        assert_eq!(
            compact.show(result(false)).unwrap(),
            OverlayState::ShownCompactUnknown
        );
        assert!(compact.show(result(true)).is_err());
    }

    #[test]
    fn minimize_requires_outgoing_or_accepted_call() {
        let mut incoming = session(CallDirection::Incoming);
        incoming.show(result(true)).unwrap();
        assert!(incoming.minimize().is_err());
        incoming.mark_accepted().unwrap();
        incoming.minimize().unwrap();
        assert_eq!(incoming.state, OverlayState::Minimized);
        incoming.restore().unwrap();
        assert_eq!(incoming.state, OverlayState::ShownFull);

        let mut outgoing = session(CallDirection::Outgoing);
        outgoing.show(result(true)).unwrap();
        outgoing.minimize().unwrap();
        assert!(outgoing.minimize().is_err());
    }

    #[test]
    fn compact_strip_never_minimizes() {
        let mut compact = session(CallDirection::Outgoing);
        compact.show(result(false)).unwrap();
        assert!(compact.minimize().is_err());
        assert!(!compact.minimize_for_dispatch());
        assert_eq!(compact.state, OverlayState::ShownCompactUnknown);
    }

    #[test]
    fn accept_only_once_and_only_incoming() {
        let mut outgoing = session(CallDirection::Outgoing);
        outgoing.show(result(true)).unwrap();
        assert!(outgoing.mark_accepted().is_err());

        let mut incoming = session(CallDirection::Incoming);
        incoming.show(result(false)).unwrap();
        incoming.mark_accepted().unwrap();
        assert!(incoming.mark_accepted().is_err());
    }
}
