//! Call-state and call-control seam.

use log::debug;

use crate::error::TelephonyError;
use crate::models::{CallDirection, CallEvent};
use crate::overlay::OverlayController;

/// Platform call control plus the contacts check used to suppress overlays
/// for people already in the address book.
pub trait Telephony: Send + Sync {
    fn is_known_contact(&self, raw_number: &str) -> bool;
    fn accept_ringing_call(&self) -> Result<(), TelephonyError>;
    fn end_active_call(&self) -> Result<(), TelephonyError>;
    /// Flips the speakerphone and returns whether it is now on.
    fn toggle_speakerphone(&self) -> Result<bool, TelephonyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonySignal {
    /// Phone is ringing or a call is being placed.
    Ringing {
        number: String,
        direction: CallDirection,
    },
    Idle,
}

/// Feed one telephony signal into the overlay.
pub async fn route_signal(controller: &OverlayController, signal: TelephonySignal) {
    match signal {
        TelephonySignal::Ringing { number, direction } => {
            if number.trim().is_empty() {
                debug!("ignoring call signal without a number");
                return;
            }
            controller.on_call_event(CallEvent::new(number, direction)).await;
        }
        TelephonySignal::Idle => controller.call_ended().await,
    }
}
