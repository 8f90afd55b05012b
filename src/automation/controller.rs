use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatch::WatcherCommand;

use super::loop_worker::{watch_loop, SnapshotStream};
use super::watcher::AutomationWatcher;

/// Owns the background task that runs the automation watcher.
pub struct AutomationController {
    handle: Option<JoinHandle<AutomationWatcher>>,
    cancel_token: Option<CancellationToken>,
}

impl Default for AutomationController {
    fn default() -> Self {
        Self::new()
    }
}

impl AutomationController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start(
        &mut self,
        watcher: AutomationWatcher,
        commands: mpsc::UnboundedReceiver<WatcherCommand>,
        snapshots: SnapshotStream,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("automation watcher already running");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(watch_loop(
            watcher,
            commands,
            snapshots,
            cancel_token.clone(),
        ));
        info!("automation watcher started");

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Stop the loop and hand back the watcher with its final state.
    pub async fn stop(&mut self) -> Result<Option<AutomationWatcher>> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        match self.handle.take() {
            Some(handle) => handle
                .await
                .context("automation loop task failed to join")
                .map(Some),
            None => Ok(None),
        }
    }
}
