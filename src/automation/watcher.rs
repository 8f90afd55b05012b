use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{sync::mpsc, time::sleep};

use crate::dispatch::{DispatchState, WatcherCommand, WatcherEvent};
use crate::error::FallbackError;
use crate::settings::AutomationTimings;
use crate::{log_error, log_info, log_warn};

use super::signatures::{Signature, SignatureMatcher};
use super::snapshot::{AutomationDriver, UiElement, UiSnapshot};
use super::wait::{settle, SettleBounds};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "watcher";

/// Alternate delivery channel used once the messaging app path is exhausted.
pub trait FallbackSender: Send + Sync {
    fn send(&self, recipient: &str, message: &str) -> Result<(), FallbackError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    Sent,
    Retry,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WatcherPhase {
    Idle,
    Armed,
    Resolved(Resolution),
}

/// Drives the messaging app from UI snapshots while a dispatch is armed.
pub struct AutomationWatcher {
    state: DispatchState,
    phase: WatcherPhase,
    matcher: Arc<dyn SignatureMatcher>,
    driver: Arc<dyn AutomationDriver>,
    fallback: Arc<dyn FallbackSender>,
    events: mpsc::UnboundedSender<WatcherEvent>,
    timings: AutomationTimings,
}

impl AutomationWatcher {
    pub fn new(
        matcher: Arc<dyn SignatureMatcher>,
        driver: Arc<dyn AutomationDriver>,
        fallback: Arc<dyn FallbackSender>,
        events: mpsc::UnboundedSender<WatcherEvent>,
        timings: AutomationTimings,
    ) -> Self {
        Self {
            state: DispatchState::default(),
            phase: WatcherPhase::Idle,
            matcher,
            driver,
            fallback,
            events,
            timings,
        }
    }

    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    pub fn phase(&self) -> WatcherPhase {
        self.phase
    }

    pub fn apply(&mut self, command: WatcherCommand) {
        match command {
            WatcherCommand::Arm(intent) => {
                log_info!(
                    "dispatch to {} recorded (auto_send={}, attempt={})",
                    intent.recipient,
                    intent.auto_send,
                    intent.attempt
                );
                self.state.arm(intent);
                self.phase = if self.state.should_send {
                    WatcherPhase::Armed
                } else {
                    WatcherPhase::Idle
                };
            }
            WatcherCommand::Disarm => {
                self.state.clear();
                self.phase = WatcherPhase::Idle;
            }
        }
    }

    /// React to one snapshot. Foreign packages and snapshots seen while
    /// disarmed are ignored, which keeps manual use of the app untouched.
    pub async fn observe(&mut self, snapshot: &dyn UiSnapshot) -> Option<Resolution> {
        if !self.matcher.accepts(snapshot) || !self.state.should_send {
            return None;
        }

        match self.matcher.classify(snapshot) {
            Signature::NotOnPlatform => {
                self.fall_back(snapshot, "recipient not on platform").await;
                Some(Resolution::Fallback)
            }
            Signature::ConnectionError => Some(self.on_transient(snapshot, true).await),
            Signature::NoNetwork => Some(self.on_transient(snapshot, false).await),
            Signature::ComposeReady(button) => self.press_send(snapshot, button).await,
            Signature::Unrelated => None,
        }
    }

    async fn on_transient(&mut self, snapshot: &dyn UiSnapshot, relaunch: bool) -> Resolution {
        let reason = if relaunch { "couldn't connect" } else { "no internet" };

        if self.state.retry_count >= self.timings.retry_budget {
            log_warn!("{reason}: retry budget spent, falling back to SMS");
            self.fall_back(snapshot, reason).await;
            return Resolution::Fallback;
        }

        self.state.retry_count += 1;
        log_info!("{reason}: retrying (retry_count={})", self.state.retry_count);

        if relaunch {
            self.dismiss_dialog(snapshot);
        }
        self.back_out().await;

        // Disarm before handing off so a stray snapshot cannot act twice.
        self.state.disarm();
        self.phase = WatcherPhase::Resolved(Resolution::Retry);

        let event = match (relaunch, self.state.retry_intent()) {
            (true, Some(intent)) => WatcherEvent::RetryRequested(intent),
            _ => WatcherEvent::Disarmed {
                retry_count: self.state.retry_count,
            },
        };
        self.emit(event);
        Resolution::Retry
    }

    async fn fall_back(&mut self, snapshot: &dyn UiSnapshot, reason: &str) {
        log_info!("falling back to SMS: {reason}");
        self.dismiss_dialog(snapshot);
        self.back_out().await;

        let event = match (self.state.recipient.clone(), self.state.message.clone()) {
            (Some(recipient), Some(message)) => match self.fallback.send(&recipient, &message) {
                Ok(()) => {
                    log_info!("SMS sent to {recipient}");
                    WatcherEvent::FellBack { recipient }
                }
                Err(error) => {
                    log_error!("SMS to {recipient} failed: {error}");
                    WatcherEvent::FallbackFailed { recipient, error }
                }
            },
            _ => {
                log_error!("cannot send SMS: recipient or message missing");
                WatcherEvent::FallbackSkipped
            }
        };

        self.state.clear();
        self.phase = WatcherPhase::Resolved(Resolution::Fallback);
        self.emit(event);
    }

    async fn press_send(
        &mut self,
        snapshot: &dyn UiSnapshot,
        button: UiElement,
    ) -> Option<Resolution> {
        if self.state.has_link {
            let min = self.timings.link_send_delay_ms;
            let bounds = SettleBounds {
                min: Duration::from_millis(min),
                max: Duration::from_millis(self.timings.settle_max_ms.max(min)),
                poll: Duration::from_millis(self.timings.settle_poll_ms),
            };
            log_info!("message has a link, waiting for the preview");
            let matcher = Arc::clone(&self.matcher);
            if !settle(bounds, || matcher.link_preview_ready(snapshot)).await {
                log_warn!("no link preview after {}ms, sending anyway", bounds.max.as_millis());
            }
        } else {
            sleep(Duration::from_millis(self.timings.send_delay_ms)).await;
        }

        // The compose screen may have re-rendered while we waited.
        let button = self.matcher.send_affordance(snapshot).unwrap_or(button);
        if !snapshot.perform_click(&button) {
            log_error!("failed to click send button");
            return None;
        }

        // Cleared before any further waiting so a follow-up snapshot is a no-op.
        self.state.should_send = false;
        self.phase = WatcherPhase::Resolved(Resolution::Sent);
        if let Some(recipient) = self.state.recipient.clone() {
            self.emit(WatcherEvent::Sent { recipient });
        }

        sleep(Duration::from_millis(self.timings.post_send_ms)).await;
        self.back_out().await;
        self.state.clear();
        Some(Resolution::Sent)
    }

    fn dismiss_dialog(&self, snapshot: &dyn UiSnapshot) {
        if let Some(ok) = self.matcher.dismiss_affordance(snapshot) {
            if !snapshot.perform_click(&ok) {
                log_warn!("dialog dismiss click was rejected");
            }
        }
    }

    /// Two back navigations with a pause between them.
    async fn back_out(&self) {
        self.driver.navigate_back();
        sleep(Duration::from_millis(self.timings.back_gap_ms)).await;
        self.driver.navigate_back();
    }

    fn emit(&self, event: WatcherEvent) {
        if self.events.send(event).is_err() {
            log_warn!("no listener for watcher events");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::signatures::{WhatsAppSignatures, WHATSAPP_PACKAGE};
    use crate::dispatch::DispatchIntent;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };
    use tokio::time::Instant;

    struct FakeScreen {
        package: &'static str,
        nodes: Vec<UiElement>,
        clicks: Mutex<Vec<u64>>,
        accept_clicks: bool,
    }

    impl FakeScreen {
        fn new(package: &'static str, nodes: Vec<UiElement>) -> Self {
            Self {
                package,
                nodes,
                clicks: Mutex::new(Vec::new()),
                accept_clicks: true,
            }
        }

        fn clicked(&self) -> Vec<u64> {
            self.clicks.lock().unwrap().clone()
        }
    }

    impl UiSnapshot for FakeScreen {
        fn package(&self) -> &str {
            self.package
        }

        fn find_by_id(&self, view_id: &str) -> Vec<UiElement> {
            self.nodes
                .iter()
                .filter(|n| n.view_id.as_deref() == Some(view_id))
                .cloned()
                .collect()
        }

        fn find_by_text(&self, text: &str) -> Vec<UiElement> {
            let needle = text.to_lowercase();
            self.nodes
                .iter()
                .filter(|n| {
                    n.text
                        .as_deref()
                        .is_some_and(|t| t.to_lowercase().contains(&needle))
                })
                .cloned()
                .collect()
        }

        fn perform_click(&self, element: &UiElement) -> bool {
            self.clicks.lock().unwrap().push(element.node_id);
            self.accept_clicks
        }
    }

    #[derive(Default)]
    struct CountingDriver(AtomicUsize);

    impl AutomationDriver for CountingDriver {
        fn navigate_back(&self) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[derive(Default)]
    struct RecordingSms {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl FallbackSender for RecordingSms {
        fn send(&self, recipient: &str, message: &str) -> Result<(), FallbackError> {
            if self.fail {
                return Err(FallbackError::Delivery("no service".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), message.to_string()));
            Ok(())
        }
    }

    struct Harness {
        watcher: AutomationWatcher,
        driver: Arc<CountingDriver>,
        sms: Arc<RecordingSms>,
        events: mpsc::UnboundedReceiver<WatcherEvent>,
    }

    fn harness() -> Harness {
        let driver = Arc::new(CountingDriver::default());
        let sms = Arc::new(RecordingSms::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = AutomationWatcher::new(
            Arc::new(WhatsAppSignatures::default()),
            driver.clone(),
            sms.clone(),
            tx,
            AutomationTimings::default(),
        );
        Harness {
            watcher,
            driver,
            sms,
            events: rx,
        }
    }

    fn node(id: u64, text: &str) -> UiElement {
        UiElement {
            node_id: id,
            text: Some(text.into()),
            class_name: Some("android.widget.TextView".into()),
            ..Default::default()
        }
    }

    fn send_button() -> UiElement {
        UiElement {
            node_id: 7,
            view_id: Some("com.whatsapp:id/send".into()),
            class_name: Some("android.widget.ImageButton".into()),
            ..Default::default()
        }
    }

    fn compose_screen() -> FakeScreen {
        FakeScreen::new(WHATSAPP_PACKAGE, vec![node(1, "Type a message"), send_button()])
    }

    fn connection_dialog() -> FakeScreen {
        FakeScreen::new(
            WHATSAPP_PACKAGE,
            vec![node(2, "Couldn't connect. Try again."), node(3, "OK"), send_button()],
        )
    }

    fn arm(watcher: &mut AutomationWatcher, message: &str) {
        watcher.apply(WatcherCommand::Arm(DispatchIntent::new(
            "919876543210",
            Some(message.into()),
            true,
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_watcher_ignores_everything() {
        let mut h = harness();
        for screen in [compose_screen(), connection_dialog()] {
            assert_eq!(h.watcher.observe(&screen).await, None);
            assert!(screen.clicked().is_empty());
        }
        assert_eq!(h.driver.0.load(Ordering::SeqCst), 0);
        assert!(h.events.try_recv().is_err());
        assert_eq!(h.watcher.phase(), WatcherPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_open_chat_is_not_automated() {
        let mut h = harness();
        h.watcher
            .apply(WatcherCommand::Arm(DispatchIntent::new("98", None, false)));
        let screen = compose_screen();
        assert_eq!(h.watcher.observe(&screen).await, None);
        assert!(screen.clicked().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn other_packages_are_ignored() {
        let mut h = harness();
        arm(&mut h.watcher, "hello");
        let screen = FakeScreen::new("com.android.chrome", vec![send_button()]);
        assert_eq!(h.watcher.observe(&screen).await, None);
        assert!(h.watcher.state().should_send);
    }

    #[tokio::test(start_paused = true)]
    async fn sends_after_short_delay_and_backs_out() {
        let mut h = harness();
        arm(&mut h.watcher, "see you at 5");
        let screen = compose_screen();

        let started = Instant::now();
        assert_eq!(h.watcher.observe(&screen).await, Some(Resolution::Sent));

        assert_eq!(screen.clicked(), vec![7]);
        assert_eq!(*h.watcher.state(), DispatchState::default());
        assert_eq!(h.driver.0.load(Ordering::SeqCst), 2);
        // 500ms send delay, 1000ms post-send, 500ms between backs.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(2_000));
        assert!(elapsed < Duration::from_millis(2_100));
        assert_eq!(
            h.events.try_recv().unwrap(),
            WatcherEvent::Sent {
                recipient: "919876543210".into()
            }
        );

        // A second snapshot of the same screen is now a no-op.
        assert_eq!(h.watcher.observe(&screen).await, None);
        assert_eq!(screen.clicked(), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn link_messages_send_once_preview_renders() {
        let mut h = harness();
        arm(&mut h.watcher, "Location:\nhttps://g.co/kgs/5Xkr4FU");
        let preview = UiElement {
            node_id: 10,
            view_id: Some("com.whatsapp:id/link_preview_frame".into()),
            ..Default::default()
        };
        let screen = FakeScreen::new(
            WHATSAPP_PACKAGE,
            vec![node(1, "Type a message"), preview, send_button()],
        );

        let started = Instant::now();
        assert_eq!(h.watcher.observe(&screen).await, Some(Resolution::Sent));
        // 2500ms link delay, then post-send and back gap.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(2_500 + 1_000 + 500));
        assert!(elapsed < Duration::from_millis(2_500 + 1_000 + 500 + 100));
        assert_eq!(screen.clicked(), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn link_messages_without_preview_send_at_the_cap() {
        let mut h = harness();
        arm(&mut h.watcher, "Location:\nhttps://g.co/kgs/5Xkr4FU");
        let screen = compose_screen();

        let started = Instant::now();
        assert_eq!(h.watcher.observe(&screen).await, Some(Resolution::Sent));
        // Polled up to the 4000ms cap before pressing anyway.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(4_000 + 1_000 + 500));
        assert!(elapsed < Duration::from_millis(4_000 + 1_000 + 500 + 100));
        assert_eq!(screen.clicked(), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn send_button_found_by_label_when_id_changes() {
        let mut h = harness();
        arm(&mut h.watcher, "hello");
        let labelled = UiElement {
            node_id: 9,
            text: Some("Send".into()),
            class_name: Some("android.widget.ImageView".into()),
            ..Default::default()
        };
        let screen = FakeScreen::new(WHATSAPP_PACKAGE, vec![node(8, "Send"), labelled]);
        assert_eq!(h.watcher.observe(&screen).await, Some(Resolution::Sent));
        assert_eq!(screen.clicked(), vec![9]);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_click_stays_armed() {
        let mut h = harness();
        arm(&mut h.watcher, "hello");
        let mut screen = compose_screen();
        screen.accept_clicks = false;
        assert_eq!(h.watcher.observe(&screen).await, None);
        assert!(h.watcher.state().should_send);
        assert_eq!(h.watcher.phase(), WatcherPhase::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn connection_error_retries_once_then_falls_back() {
        let mut h = harness();
        arm(&mut h.watcher, "hello");
        let dialog = connection_dialog();

        assert_eq!(h.watcher.observe(&dialog).await, Some(Resolution::Retry));
        assert_eq!(h.watcher.state().retry_count, 1);
        assert!(!h.watcher.state().should_send);
        // OK dismissed, send button untouched.
        assert_eq!(dialog.clicked(), vec![3]);
        assert_eq!(h.driver.0.load(Ordering::SeqCst), 2);

        let relaunch = match h.events.try_recv().unwrap() {
            WatcherEvent::RetryRequested(intent) => intent,
            other => panic!("expected retry request, got {other:?}"),
        };
        assert_eq!(relaunch.attempt, 1);
        assert!(h.events.try_recv().is_err());

        // The relaunch re-arms with the spent retry carried over.
        h.watcher.apply(WatcherCommand::Arm(relaunch));
        assert_eq!(h.watcher.state().retry_count, 1);

        assert_eq!(h.watcher.observe(&dialog).await, Some(Resolution::Fallback));
        assert_eq!(*h.watcher.state(), DispatchState::default());
        assert_eq!(
            h.sms.sent.lock().unwrap().as_slice(),
            [("919876543210".to_string(), "hello".to_string())]
        );
        assert_eq!(
            h.events.try_recv().unwrap(),
            WatcherEvent::FellBack {
                recipient: "919876543210".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn not_on_platform_falls_back_immediately() {
        let mut h = harness();
        arm(&mut h.watcher, "hello");
        let dialog = FakeScreen::new(
            WHATSAPP_PACKAGE,
            vec![
                node(4, "+91 98765 43210 isn't on WhatsApp."),
                node(5, "OK"),
                send_button(),
            ],
        );

        assert_eq!(h.watcher.observe(&dialog).await, Some(Resolution::Fallback));
        assert_eq!(dialog.clicked(), vec![5]);
        assert_eq!(h.sms.sent.lock().unwrap().len(), 1);
        assert_eq!(h.watcher.phase(), WatcherPhase::Resolved(Resolution::Fallback));
    }

    #[tokio::test(start_paused = true)]
    async fn no_network_retries_without_relaunch() {
        let mut h = harness();
        arm(&mut h.watcher, "hello");
        let banner = FakeScreen::new(
            WHATSAPP_PACKAGE,
            vec![node(6, "No internet connection"), send_button()],
        );

        assert_eq!(h.watcher.observe(&banner).await, Some(Resolution::Retry));
        assert!(banner.clicked().is_empty());
        assert_eq!(
            h.events.try_recv().unwrap(),
            WatcherEvent::Disarmed { retry_count: 1 }
        );

        h.watcher.apply(WatcherCommand::Arm(h.watcher.state().retry_intent().unwrap()));
        assert_eq!(h.watcher.observe(&banner).await, Some(Resolution::Fallback));
        assert_eq!(h.sms.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_forgets_the_dispatch() {
        let mut h = harness();
        arm(&mut h.watcher, "hello");
        h.watcher.apply(WatcherCommand::Disarm);
        assert_eq!(*h.watcher.state(), DispatchState::default());
        assert!(h.watcher.state().retry_intent().is_none());

        let screen = compose_screen();
        assert_eq!(h.watcher.observe(&screen).await, None);
        assert!(screen.clicked().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_failure_is_reported() {
        let driver = Arc::new(CountingDriver::default());
        let sms = Arc::new(RecordingSms {
            fail: true,
            ..Default::default()
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = AutomationWatcher::new(
            Arc::new(WhatsAppSignatures::default()),
            driver,
            sms,
            tx,
            AutomationTimings::default(),
        );
        arm(&mut watcher, "hello");
        let dialog = FakeScreen::new(WHATSAPP_PACKAGE, vec![node(4, "isn't on WhatsApp")]);

        assert_eq!(watcher.observe(&dialog).await, Some(Resolution::Fallback));
        assert!(matches!(
            rx.try_recv().unwrap(),
            WatcherEvent::FallbackFailed { .. }
        ));
        assert!(!watcher.state().should_send);
    }
}
