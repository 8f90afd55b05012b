pub mod controller;
pub mod loop_worker;
pub mod signatures;
pub mod snapshot;
pub mod wait;
pub mod watcher;

pub use controller::AutomationController;
pub use loop_worker::SnapshotStream;
pub use signatures::{Signature, SignatureMatcher, WhatsAppSignatures};
pub use snapshot::{AutomationDriver, UiElement, UiSnapshot};
pub use watcher::{AutomationWatcher, FallbackSender, Resolution, WatcherPhase};
