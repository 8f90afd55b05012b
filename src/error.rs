//! Error types, grouped by how each one is recovered.
//!
//! - Recovered locally: `LookupError` becomes "no data" for that slot.
//! - Fatal to the overlay session: `SurfaceError`.
//! - Surfaced as a notice: `DispatchError`, `TelephonyError`, `FallbackError`.

use thiserror::Error;

use crate::overlay::OverlayState;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup request failed: {0}")]
    Request(String),

    #[error("lookup returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode lookup response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("overlay surface could not be attached: {0}")]
    Attach(String),

    #[error("overlay surface update failed: {0}")]
    Update(String),
}

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("no live overlay session")]
    NoSession,

    #[error("action '{action}' is not allowed while {from:?}")]
    InvalidTransition {
        from: OverlayState,
        action: &'static str,
    },

    #[error("unknown quick reply '{0}'")]
    UnknownTemplate(String),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Telephony(#[from] TelephonyError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelephonyError {
    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not supported on this device")]
    Unsupported,

    #[error("telephony call failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("messaging app is not installed")]
    AppNotInstalled,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("WhatsApp not installed")]
    AppNotInstalled,

    #[error("recipient '{0}' has no digits")]
    InvalidRecipient(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FallbackError {
    #[error("SMS delivery failed: {0}")]
    Delivery(String),
}

impl TelephonyError {
    /// Short text for the notice shown when an accept attempt fails.
    pub fn accept_notice(&self) -> &'static str {
        match self {
            TelephonyError::PermissionDenied => "Permission denied",
            TelephonyError::Unsupported => "Not supported on this Android version",
            TelephonyError::Failed(_) => "Failed to answer call",
        }
    }
}
