use std::sync::Arc;

use log::{error, info, warn};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::error::{DispatchError, LaunchError};

use super::{DispatchIntent, WatcherCommand, WatcherEvent};

const SEND_ENDPOINT: &str = "https://api.whatsapp.com/send";

/// Deep link that opens a chat, optionally with a pre-filled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLink {
    pub recipient: String,
    pub message: Option<String>,
    pub url: String,
}

impl DeepLink {
    pub fn compose(recipient: &str, message: Option<&str>) -> Result<Self, DispatchError> {
        let phone: String = recipient.chars().filter(|c| c.is_ascii_digit()).collect();
        if phone.is_empty() {
            return Err(DispatchError::InvalidRecipient(recipient.to_string()));
        }

        let url = match message {
            Some(text) => {
                let encoded: String = url::form_urlencoded::byte_serialize(text.as_bytes()).collect();
                format!("{SEND_ENDPOINT}?phone={phone}&text={encoded}")
            }
            None => format!("{SEND_ENDPOINT}?phone={phone}"),
        };

        Ok(Self {
            recipient: phone,
            message: message.map(str::to_string),
            url,
        })
    }
}

/// Opens the external messaging app.
pub trait MessagingLauncher: Send + Sync {
    fn launch(&self, link: &DeepLink) -> Result<(), LaunchError>;
}

/// User-visible, short-lived notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, text: &str);
}

#[derive(Clone)]
pub struct DispatchCoordinator {
    launcher: Arc<dyn MessagingLauncher>,
    notifier: Arc<dyn Notifier>,
    watcher: mpsc::UnboundedSender<WatcherCommand>,
}

impl DispatchCoordinator {
    pub fn new(
        launcher: Arc<dyn MessagingLauncher>,
        notifier: Arc<dyn Notifier>,
        watcher: mpsc::UnboundedSender<WatcherCommand>,
    ) -> Self {
        Self {
            launcher,
            notifier,
            watcher,
        }
    }

    /// Record the intent with the watcher, then open the chat.
    pub fn dispatch(
        &self,
        recipient: &str,
        message: Option<String>,
        auto_send: bool,
    ) -> Result<DeepLink, DispatchError> {
        self.launch_intent(DispatchIntent::new(recipient, message, auto_send))
    }

    fn launch_intent(&self, intent: DispatchIntent) -> Result<DeepLink, DispatchError> {
        let link = DeepLink::compose(&intent.recipient, intent.message.as_deref())?;
        let auto_send = intent.auto_send;

        if self.watcher.send(WatcherCommand::Arm(intent)).is_err() && auto_send {
            warn!("automation watcher is not running; message to {} needs a manual send", link.recipient);
        }

        match self.launcher.launch(&link) {
            Ok(()) => {
                info!(
                    "opened chat with {} (auto_send={}, message={})",
                    link.recipient,
                    auto_send,
                    link.message.is_some()
                );
                Ok(link)
            }
            Err(LaunchError::AppNotInstalled) => {
                let _ = self.watcher.send(WatcherCommand::Disarm);
                self.notifier.notify("WhatsApp not installed");
                Err(DispatchError::AppNotInstalled)
            }
        }
    }

    /// Consume watcher acknowledgements: relaunch on retry requests and
    /// surface fallback outcomes.
    pub fn spawn_retry_listener(
        &self,
        mut events: mpsc::UnboundedReceiver<WatcherEvent>,
    ) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                coordinator.handle_event(event);
            }
            info!("retry listener stopped");
        })
    }

    pub fn handle_event(&self, event: WatcherEvent) {
        match event {
            WatcherEvent::RetryRequested(intent) => {
                info!(
                    "relaunching chat with {} (attempt {})",
                    intent.recipient, intent.attempt
                );
                if let Err(err) = self.launch_intent(intent) {
                    error!("retry relaunch failed: {err}");
                }
            }
            WatcherEvent::Sent { recipient } => info!("message to {recipient} sent"),
            WatcherEvent::Disarmed { retry_count } => {
                info!("automation disarmed after transient failure (retries={retry_count})")
            }
            WatcherEvent::FellBack { .. } => self.notifier.notify("Sent via SMS"),
            WatcherEvent::FallbackFailed { recipient, error } => {
                error!("SMS fallback to {recipient} failed: {error}");
                self.notifier.notify(&format!("Failed to send SMS: {error}"));
            }
            WatcherEvent::FallbackSkipped => {
                warn!("fallback skipped: no recipient or message recorded")
            }
        }
    }
}
