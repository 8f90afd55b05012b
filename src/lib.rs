pub mod automation;
pub mod dispatch;
pub mod error;
pub mod lookup;
pub mod models;
pub mod overlay;
pub mod settings;
pub mod telephony;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use dispatch::{DeepLink, DispatchCoordinator, MessagingLauncher, Notifier};
use error::{LaunchError, SurfaceError, TelephonyError};
use lookup::{EnrichmentAggregator, SupabaseLookupClient};
use models::{CallDirection, CallEvent};
use overlay::{OverlayController, OverlayView, RenderSurface};
use settings::{AppSettings, SettingsStore};
use telephony::Telephony;

const DEFAULT_SETTINGS_FILE: &str = "ortholink.json";

/// Look up one caller and render the overlay to stdout.
#[derive(Parser, Debug)]
#[command(name = "ortholink", version, about = "Caller enrichment lookup")]
struct CliArgs {
    /// Phone number as dialled or received
    number: String,

    /// Treat the call as outgoing
    #[arg(long)]
    outgoing: bool,

    /// Settings file
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    /// Send this quick-reply template once the lookup settles
    #[arg(long, value_name = "TEMPLATE_ID")]
    quick_reply: Option<String>,
}

impl CliArgs {
    fn direction(&self) -> CallDirection {
        if self.outgoing {
            CallDirection::Outgoing
        } else {
            CallDirection::Incoming
        }
    }
}

/// Prints every overlay view to stdout as JSON.
struct ConsoleSurface;

impl ConsoleSurface {
    fn print(view: &OverlayView) -> Result<(), SurfaceError> {
        let json = serde_json::to_string_pretty(view).map_err(|e| SurfaceError::Update(e.to_string()))?;
        println!("{json}");
        Ok(())
    }
}

impl RenderSurface for ConsoleSurface {
    fn attach(&self, view: &OverlayView) -> Result<(), SurfaceError> {
        Self::print(view).map_err(|e| SurfaceError::Attach(e.to_string()))
    }

    fn update(&self, view: &OverlayView) -> Result<(), SurfaceError> {
        Self::print(view)
    }

    fn detach(&self, session_id: &str) {
        info!("overlay {session_id} detached");
    }
}

/// No call control on the command line; every number is treated as unknown.
struct DetachedTelephony;

impl Telephony for DetachedTelephony {
    fn is_known_contact(&self, _raw_number: &str) -> bool {
        false
    }

    fn accept_ringing_call(&self) -> Result<(), TelephonyError> {
        Err(TelephonyError::Unsupported)
    }

    fn end_active_call(&self) -> Result<(), TelephonyError> {
        Err(TelephonyError::Unsupported)
    }

    fn toggle_speakerphone(&self) -> Result<bool, TelephonyError> {
        Err(TelephonyError::Unsupported)
    }
}

struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, text: &str) {
        warn!("{text}");
    }
}

/// Prints the deep link instead of opening an app.
struct PrintLauncher;

impl MessagingLauncher for PrintLauncher {
    fn launch(&self, link: &DeepLink) -> Result<(), LaunchError> {
        println!("{}", link.url);
        Ok(())
    }
}

async fn lookup_once(settings: AppSettings, args: CliArgs) -> Result<()> {
    let client = SupabaseLookupClient::new(&settings.lookup)?;
    let aggregator = EnrichmentAggregator::new(Arc::new(client));
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    // No accessibility source here, so nothing consumes watcher commands.
    let (watcher_tx, _watcher_rx) = tokio::sync::mpsc::unbounded_channel();
    let dispatcher = DispatchCoordinator::new(Arc::new(PrintLauncher), notifier.clone(), watcher_tx);

    let controller = OverlayController::new(
        settings,
        aggregator,
        dispatcher,
        Arc::new(DetachedTelephony),
        Arc::new(ConsoleSurface),
        notifier,
    );

    let direction = args.direction();
    controller
        .on_call_event(CallEvent::new(args.number, direction))
        .await;
    controller.wait_for_enrichment().await;
    info!("overlay settled in {:?}", controller.state().await);

    if let Some(template_id) = args.quick_reply {
        controller.quick_send(&template_id).await?;
    }
    Ok(())
}

pub fn run() -> Result<()> {
    utils::logging::init();

    let args = CliArgs::parse();
    let store = SettingsStore::new(args.settings.clone())?;
    let settings = store.current().with_env_overrides();
    if settings.lookup.api_key.is_empty() {
        warn!("no lookup API key configured; searches will likely be rejected");
    }

    info!("OrthoLink looking up {}", args.number);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(lookup_once(settings, args))
}
