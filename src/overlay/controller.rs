use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use log::{error, info, warn};
use tokio::{sync::Mutex, task::JoinHandle, time};

use crate::dispatch::{DispatchCoordinator, Notifier};
use crate::error::{OverlayError, TelephonyError};
use crate::lookup::EnrichmentAggregator;
use crate::models::{CallEvent, EnrichmentResult};
use crate::settings::AppSettings;
use crate::telephony::Telephony;

use super::{build_view, OverlaySession, OverlayState, OverlayView, RenderSurface};

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Owns the single overlay session and every transition on it.
#[derive(Clone)]
pub struct OverlayController {
    session: Arc<Mutex<Option<OverlaySession>>>,
    enrichment_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    close_timer: Arc<Mutex<Option<JoinHandle<()>>>>,
    aggregator: EnrichmentAggregator,
    dispatcher: DispatchCoordinator,
    telephony: Arc<dyn Telephony>,
    surface: Arc<dyn RenderSurface>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<AppSettings>,
    today: fn() -> NaiveDate,
}

impl OverlayController {
    pub fn new(
        settings: AppSettings,
        aggregator: EnrichmentAggregator,
        dispatcher: DispatchCoordinator,
        telephony: Arc<dyn Telephony>,
        surface: Arc<dyn RenderSurface>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(None)),
            enrichment_task: Arc::new(Mutex::new(None)),
            close_timer: Arc::new(Mutex::new(None)),
            aggregator,
            dispatcher,
            telephony,
            surface,
            notifier,
            settings: Arc::new(settings),
            today: local_today,
        }
    }

    /// Replace the clock used for ages and opening hours.
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub async fn session(&self) -> Option<OverlaySession> {
        self.session.lock().await.clone()
    }

    pub async fn state(&self) -> OverlayState {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.state)
            .unwrap_or_default()
    }

    pub async fn view(&self) -> Option<OverlayView> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| self.render(session))
    }

    /// Start a session for a new call, replacing whatever was there.
    ///
    /// Enrichment runs in the background; its result is applied only if this
    /// session is still the live one when it lands.
    pub async fn on_call_event(&self, event: CallEvent) -> OverlayState {
        self.cancel_close_timer().await;

        let mut guard = self.session.lock().await;
        if let Some(stale) = guard.take() {
            if stale.state.is_visible() {
                self.surface.detach(&stale.id);
            }
            if stale.state.is_live() {
                info!("replacing overlay session {} ({:?})", stale.id, stale.state);
            }
        }

        let mut session = OverlaySession::new(event);
        if self.telephony.is_known_contact(&session.call_event.raw_number) {
            info!("caller is a saved contact, overlay suppressed");
            session.close();
            *guard = Some(session);
            return OverlayState::Closed;
        }

        let session_id = session.id.clone();
        let key = session.call_event.key();
        info!(
            "overlay session {} loading for {:?} call",
            session_id, session.call_event.direction
        );
        *guard = Some(session);
        drop(guard);

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            let result = controller.aggregator.enrich(key).await;
            if let Err(err) = controller.apply_enrichment(&session_id, result).await {
                error!("failed to show overlay {session_id}: {err}");
            }
        });
        *self.enrichment_task.lock().await = Some(handle);

        OverlayState::Loading
    }

    /// Returns `None` when the result belongs to a session that is no longer
    /// loading; such results are dropped.
    pub async fn apply_enrichment(
        &self,
        session_id: &str,
        result: EnrichmentResult,
    ) -> Result<Option<OverlayState>, OverlayError> {
        let mut guard = self.session.lock().await;
        let Some(session) = guard
            .as_mut()
            .filter(|s| s.id == session_id && s.state == OverlayState::Loading)
        else {
            info!("dropping enrichment for stale session {session_id}");
            return Ok(None);
        };

        let state = session.show(result)?;
        let view = self.render(session);
        if let Err(err) = self.surface.attach(&view) {
            session.close();
            return Err(err.into());
        }
        info!("overlay session {} shown as {:?}", session.id, state);
        Ok(Some(state))
    }

    /// Wait for the most recent background enrichment to finish.
    pub async fn wait_for_enrichment(&self) {
        let handle = self.enrichment_task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    error!("enrichment task failed: {err}");
                }
            }
        }
    }

    pub async fn minimize(&self) -> Result<OverlayState, OverlayError> {
        self.transition(OverlaySession::minimize).await
    }

    pub async fn restore(&self) -> Result<OverlayState, OverlayError> {
        self.transition(OverlaySession::restore).await
    }

    pub async fn open_attachment(&self) -> Result<OverlayState, OverlayError> {
        self.transition(|session| session.set_attachment_open(true))
            .await
    }

    pub async fn close_attachment(&self) -> Result<OverlayState, OverlayError> {
        self.transition(|session| session.set_attachment_open(false))
            .await
    }

    /// Answer the ringing call. Failures are shown as a notice and returned.
    pub async fn accept_call(&self) -> Result<(), OverlayError> {
        let mut guard = self.session.lock().await;
        let session = visible_session(&mut guard)?;
        if !session.can_accept() {
            return Err(OverlayError::InvalidTransition {
                from: session.state,
                action: "accept-call",
            });
        }

        match self.telephony.accept_ringing_call() {
            Ok(()) => {
                session.mark_accepted()?;
                self.push_update(session);
                Ok(())
            }
            Err(err) => {
                warn!("failed to accept call: {err}");
                self.notifier.notify(err.accept_notice());
                Err(err.into())
            }
        }
    }

    /// Hang up and close the overlay. The overlay closes even when the
    /// hang-up itself fails.
    pub async fn end_call(&self) -> Result<(), OverlayError> {
        self.cancel_close_timer().await;

        let mut guard = self.session.lock().await;
        let session = guard
            .as_mut()
            .filter(|s| s.state.is_live())
            .ok_or(OverlayError::NoSession)?;

        if let Err(err) = self.telephony.end_active_call() {
            warn!("failed to end call: {err}");
            if err == TelephonyError::PermissionDenied {
                self.notifier.notify(err.accept_notice());
            }
        }
        self.close_session(session);
        Ok(())
    }

    pub async fn decline_call(&self) -> Result<(), OverlayError> {
        self.end_call().await
    }

    /// Telephony went idle: close after the grace period unless another
    /// call event arrives first.
    pub async fn call_ended(&self) {
        let live_id = self
            .session
            .lock()
            .await
            .as_ref()
            .filter(|s| s.state.is_live())
            .map(|s| s.id.clone());
        let Some(session_id) = live_id else {
            return;
        };

        let grace = self.settings.overlay.call_end_grace();
        let controller = self.clone();
        let mut timer = self.close_timer.lock().await;
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        *timer = Some(tokio::spawn(async move {
            time::sleep(grace).await;
            controller.close_after_call(&session_id).await;
        }));
    }

    /// Send a canned reply through the messaging app.
    pub async fn quick_send(&self, template_id: &str) -> Result<OverlayState, OverlayError> {
        let template = self
            .settings
            .template(template_id)
            .ok_or_else(|| OverlayError::UnknownTemplate(template_id.to_string()))?;
        let message = template.render((self.today)().weekday());
        self.hand_off(Some(message), true).await
    }

    /// Open the caller's chat without a message.
    pub async fn open_chat(&self) -> Result<OverlayState, OverlayError> {
        self.hand_off(None, false).await
    }

    pub async fn toggle_speaker(&self) -> Result<bool, OverlayError> {
        let mut guard = self.session.lock().await;
        visible_session(&mut guard)?;

        match self.telephony.toggle_speakerphone() {
            Ok(on) => {
                self.notifier
                    .notify(if on { "Speaker ON" } else { "Speaker OFF" });
                Ok(on)
            }
            Err(err) => {
                warn!("failed to toggle speaker: {err}");
                self.notifier.notify(&err.to_string());
                Err(err.into())
            }
        }
    }

    async fn hand_off(
        &self,
        message: Option<String>,
        auto_send: bool,
    ) -> Result<OverlayState, OverlayError> {
        let mut guard = self.session.lock().await;
        let session = visible_session(&mut guard)?;

        self.dispatcher
            .dispatch(&session.call_event.raw_number, message, auto_send)?;
        if session.minimize_for_dispatch() {
            self.push_update(session);
        }
        Ok(session.state)
    }

    async fn transition<F>(&self, apply: F) -> Result<OverlayState, OverlayError>
    where
        F: FnOnce(&mut OverlaySession) -> Result<(), OverlayError>,
    {
        let mut guard = self.session.lock().await;
        let session = visible_session(&mut guard)?;
        apply(session)?;
        self.push_update(session);
        Ok(session.state)
    }

    async fn close_after_call(&self, session_id: &str) {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard
            .as_mut()
            .filter(|s| s.id == session_id && s.state.is_live())
        {
            info!("call ended, closing overlay {session_id}");
            self.close_session(session);
        }
    }

    async fn cancel_close_timer(&self) {
        if let Some(handle) = self.close_timer.lock().await.take() {
            handle.abort();
        }
    }

    fn close_session(&self, session: &mut OverlaySession) {
        if session.state.is_visible() {
            self.surface.detach(&session.id);
        }
        session.close();
    }

    fn push_update(&self, session: &OverlaySession) {
        let view = self.render(session);
        if let Err(err) = self.surface.update(&view) {
            warn!("overlay update for {} failed: {err}", session.id);
        }
    }

    fn render(&self, session: &OverlaySession) -> OverlayView {
        build_view(session, &self.settings, (self.today)())
    }
}

fn visible_session(slot: &mut Option<OverlaySession>) -> Result<&mut OverlaySession, OverlayError> {
    slot.as_mut()
        .filter(|s| s.state.is_visible())
        .ok_or(OverlayError::NoSession)
}
