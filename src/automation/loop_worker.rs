use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dispatch::WatcherCommand;
use crate::{log_info, log_warn};

use super::snapshot::UiSnapshot;
use super::watcher::AutomationWatcher;

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "automation";

pub type SnapshotStream = mpsc::Receiver<Arc<dyn UiSnapshot>>;

/// Feed commands and snapshots into the watcher until cancelled or the
/// snapshot source closes. Commands are drained first so an arm issued just
/// before the app launches is in place for the first snapshot.
pub async fn watch_loop(
    mut watcher: AutomationWatcher,
    mut commands: mpsc::UnboundedReceiver<WatcherCommand>,
    mut snapshots: SnapshotStream,
    cancel_token: CancellationToken,
) -> AutomationWatcher {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("automation loop shutting down");
                break;
            }
            Some(command) = commands.recv() => watcher.apply(command),
            next = snapshots.recv() => match next {
                Some(snapshot) => {
                    if let Some(resolution) = watcher.observe(snapshot.as_ref()).await {
                        log_info!("dispatch resolved: {resolution:?}");
                    }
                }
                None => {
                    log_warn!("snapshot source closed");
                    break;
                }
            },
        }
    }
    watcher
}
