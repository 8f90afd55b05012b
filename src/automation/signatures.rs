//! Screen classification for the messaging app.
//!
//! Identifiers and strings are tied to a UI version; keep one matcher per
//! version so the retry policy in the watcher never changes with them.

use super::snapshot::{UiElement, UiSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    /// Recipient has no account on the platform. Permanent.
    NotOnPlatform,
    ConnectionError,
    NoNetwork,
    /// Compose screen with a send affordance ready.
    ComposeReady(UiElement),
    Unrelated,
}

pub trait SignatureMatcher: Send + Sync {
    /// Packages whose snapshots this matcher understands.
    fn packages(&self) -> &[&'static str];

    /// Classify in priority order: error dialogs win over the compose screen.
    fn classify(&self, snapshot: &dyn UiSnapshot) -> Signature;

    fn send_affordance(&self, snapshot: &dyn UiSnapshot) -> Option<UiElement>;

    /// Whether the compose box shows a rendered preview for a pasted link.
    fn link_preview_ready(&self, snapshot: &dyn UiSnapshot) -> bool;

    /// Button that closes an error dialog, if one is showing.
    fn dismiss_affordance(&self, snapshot: &dyn UiSnapshot) -> Option<UiElement>;

    fn accepts(&self, snapshot: &dyn UiSnapshot) -> bool {
        self.packages().contains(&snapshot.package())
    }
}

pub const WHATSAPP_PACKAGE: &str = "com.whatsapp";
pub const WHATSAPP_BUSINESS_PACKAGE: &str = "com.whatsapp.w4b";

/// Matcher for the current WhatsApp / WhatsApp Business Android UI.
#[derive(Debug, Clone)]
pub struct WhatsAppSignatures {
    packages: [&'static str; 2],
    send_button_id: &'static str,
    send_button_label: &'static str,
    send_button_classes: [&'static str; 2],
    link_preview_id: &'static str,
    not_on_platform_text: &'static str,
    connection_error_text: &'static str,
    no_network_text: &'static str,
    dismiss_label: &'static str,
}

impl Default for WhatsAppSignatures {
    fn default() -> Self {
        Self {
            packages: [WHATSAPP_PACKAGE, WHATSAPP_BUSINESS_PACKAGE],
            send_button_id: "com.whatsapp:id/send",
            send_button_label: "Send",
            send_button_classes: ["android.widget.ImageButton", "android.widget.ImageView"],
            link_preview_id: "com.whatsapp:id/link_preview_frame",
            not_on_platform_text: "on WhatsApp",
            connection_error_text: "Couldn't connect",
            no_network_text: "internet",
            dismiss_label: "OK",
        }
    }
}

impl SignatureMatcher for WhatsAppSignatures {
    fn packages(&self) -> &[&'static str] {
        &self.packages
    }

    fn classify(&self, snapshot: &dyn UiSnapshot) -> Signature {
        if !snapshot.find_by_text(self.not_on_platform_text).is_empty() {
            return Signature::NotOnPlatform;
        }
        if !snapshot.find_by_text(self.connection_error_text).is_empty() {
            return Signature::ConnectionError;
        }
        if !snapshot.find_by_text(self.no_network_text).is_empty() {
            return Signature::NoNetwork;
        }
        match self.send_affordance(snapshot) {
            Some(button) => Signature::ComposeReady(button),
            None => Signature::Unrelated,
        }
    }

    fn send_affordance(&self, snapshot: &dyn UiSnapshot) -> Option<UiElement> {
        if let Some(button) = snapshot.find_by_id(self.send_button_id).into_iter().next() {
            return Some(button);
        }
        snapshot
            .find_by_text(self.send_button_label)
            .into_iter()
            .find(|node| node.has_class(&self.send_button_classes))
    }

    fn link_preview_ready(&self, snapshot: &dyn UiSnapshot) -> bool {
        !snapshot.find_by_id(self.link_preview_id).is_empty()
    }

    fn dismiss_affordance(&self, snapshot: &dyn UiSnapshot) -> Option<UiElement> {
        snapshot.find_by_text(self.dismiss_label).into_iter().next()
    }
}
