pub mod coordinator;
pub mod intent;
pub mod templates;

pub use coordinator::{DeepLink, DispatchCoordinator, MessagingLauncher, Notifier};
pub use intent::{DispatchIntent, DispatchState, WatcherCommand, WatcherEvent};
pub use templates::QuickReplyTemplate;
