pub mod controller;
pub mod state;
pub mod surface;
pub mod view;

pub use controller::OverlayController;
pub use state::{OverlaySession, OverlayState};
pub use surface::RenderSurface;
pub use view::{build_view, OverlayLayout, OverlayView};
